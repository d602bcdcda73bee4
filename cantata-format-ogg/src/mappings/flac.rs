// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The FLAC-in-OGG mapping.
//!
//! The first packet is the mapping header: `0x7f`, the ASCII `FLAC` signature, the mapping
//! version, a count of trailing header packets, and a complete native `fLaC` marker plus
//! STREAMINFO block. Each subsequent header packet carries exactly one native FLAC metadata
//! block. The granule position counts samples.

use cantata_core::errors::{
    invalid_field_error, invalid_magic_error, truncated_error, Result,
};
use cantata_core::io::{BufReader, BufWriter, FiniteStream, ReadBytes};
use cantata_core::meta::{AudioProperties, ReadOptions, Visual};

use cantata_format_flac::{block_type, read_block_body, MetadataBlock, StreamInfo};
use cantata_metadata::vorbis::VorbisComment;

use log::warn;

use crate::physical::{assemble_packets, audio_pages_after, rewrite_stream, OwnedPage, PhysicalStream};

/// The first byte of the mapping header packet.
const OGG_FLAC_PACKET_BYTE: u8 = 0x7f;

/// The mapping signature following the packet byte.
const OGG_FLAC_SIGNATURE: &[u8; 4] = b"FLAC";

/// An OGG FLAC file.
pub struct OggFlacFile {
    serial: u32,
    major_version: u8,
    minor_version: u8,
    stream_info: StreamInfo,
    blocks: Vec<MetadataBlock>,
    audio_pages: Vec<OwnedPage>,
    last_granule: Option<u64>,
}

impl OggFlacFile {
    /// Read an OGG FLAC file from a buffer.
    pub fn read(buf: &[u8], opts: &ReadOptions) -> Result<OggFlacFile> {
        let stream = PhysicalStream::read(buf, opts)?;
        let packets = assemble_packets(&stream, opts)?;

        if packets.is_empty() {
            return invalid_field_error("ogg (flac): missing mapping header packet");
        }

        let (major_version, minor_version, header_count, stream_info, mut is_last) =
            read_mapping_header(&packets[0].data)?;

        // Read the trailing metadata header packets: either the number the mapping header
        // declares, or until a block carries the last-block flag when the count is unknown.
        let mut blocks = Vec::new();
        let mut num_header_packets = 1;

        for packet in &packets[1..] {
            if is_last || (header_count != 0 && num_header_packets > usize::from(header_count)) {
                break;
            }

            let (block, block_is_last) = read_block_packet(&packet.data, opts)?;

            blocks.push(block);
            num_header_packets += 1;
            is_last = block_is_last;
        }

        let audio_pages = audio_pages_after(&stream, &packets, num_header_packets)?.to_vec();

        Ok(OggFlacFile {
            serial: stream.serial,
            major_version,
            minor_version,
            stream_info,
            blocks,
            audio_pages,
            last_granule: stream.last_granule(),
        })
    }

    /// Render the file.
    ///
    /// The mapping header is rebuilt with an updated header packet count, each metadata block
    /// is re-emitted as its own packet, and the audio pages are renumbered with recomputed
    /// checksums.
    pub fn render(&self) -> Result<Vec<u8>> {
        let mut header = BufWriter::new();

        header.write_u8(OGG_FLAC_PACKET_BYTE);
        header.write_buf(OGG_FLAC_SIGNATURE);
        header.write_u8(self.major_version);
        header.write_u8(self.minor_version);
        header.write_be_u16(self.blocks.len().min(usize::from(u16::MAX)) as u16);
        header.write_buf(b"fLaC");

        // The embedded STREAMINFO block carries the last-block flag when no metadata packets
        // follow.
        cantata_format_flac::write_block(
            &mut header,
            block_type::STREAM_INFO,
            &self.stream_info.render(),
            self.blocks.is_empty(),
        )?;

        let mut groups = vec![vec![header.into_inner()]];

        let mut block_packets = Vec::with_capacity(self.blocks.len());

        for (i, block) in self.blocks.iter().enumerate() {
            let mut packet = BufWriter::new();

            cantata_format_flac::write_block(
                &mut packet,
                block.block_type(),
                &block.render_body(),
                i + 1 == self.blocks.len(),
            )?;

            block_packets.push(packet.into_inner());
        }

        if !block_packets.is_empty() {
            groups.push(block_packets);
        }

        Ok(rewrite_stream(self.serial, &groups, &self.audio_pages))
    }

    /// The embedded STREAMINFO block.
    pub fn stream_info(&self) -> &StreamInfo {
        &self.stream_info
    }

    /// The audio properties from the STREAMINFO. The duration falls back to the final granule
    /// position when the STREAMINFO does not state a sample count.
    pub fn properties(&self) -> Option<AudioProperties> {
        let info = &self.stream_info;

        if info.sample_rate == 0 {
            return None;
        }

        let total_samples = if info.total_samples > 0 {
            Some(info.total_samples)
        }
        else {
            self.last_granule
        };

        Some(AudioProperties {
            sample_rate: info.sample_rate,
            channels: info.channels,
            bits_per_sample: Some(info.bits_per_sample),
            duration_secs: total_samples.map(|n| n as f64 / f64::from(info.sample_rate)),
        })
    }

    /// The Vorbis Comment, if the stream carries one.
    pub fn comment(&self) -> Option<&VorbisComment> {
        self.blocks.iter().find_map(|block| match block {
            MetadataBlock::VorbisComment(comment) => Some(comment),
            _ => None,
        })
    }

    /// The Vorbis Comment, created empty when the stream carries none.
    pub fn comment_mut(&mut self) -> &mut VorbisComment {
        let index = self.blocks.iter().position(|b| matches!(b, MetadataBlock::VorbisComment(_)));

        let index = match index {
            Some(index) => index,
            None => {
                self.blocks.push(MetadataBlock::VorbisComment(VorbisComment::new()));
                self.blocks.len() - 1
            }
        };

        match &mut self.blocks[index] {
            MetadataBlock::VorbisComment(comment) => comment,
            _ => unreachable!(),
        }
    }

    /// All native PICTURE blocks carried in header packets.
    pub fn pictures(&self) -> Vec<Visual> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                MetadataBlock::Picture(visual) => Some(visual.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Parse the mapping header packet. Returns the mapping version pair, the declared header
/// packet count, the embedded STREAMINFO, and whether its block header carried the last-block
/// flag.
fn read_mapping_header(packet: &[u8]) -> Result<(u8, u8, u16, StreamInfo, bool)> {
    let mut reader = BufReader::new(packet);

    if reader.read_u8()? != OGG_FLAC_PACKET_BYTE {
        return invalid_magic_error("ogg (flac): bad mapping header packet byte");
    }

    let mut signature = [0u8; 4];
    reader.read_buf_exact(&mut signature)?;

    if signature != *OGG_FLAC_SIGNATURE {
        return invalid_magic_error("ogg (flac): missing FLAC mapping signature");
    }

    let major_version = reader.read_u8()?;
    let minor_version = reader.read_u8()?;
    let header_count = reader.read_be_u16()?;

    let mut marker = [0u8; 4];
    reader.read_buf_exact(&mut marker)?;

    if marker != *b"fLaC" {
        return invalid_magic_error("ogg (flac): missing native fLaC marker");
    }

    // The native STREAMINFO block, header included.
    let block_header = reader.read_u8()?;
    let is_last = block_header & 0x80 != 0;

    if block_header & 0x7f != block_type::STREAM_INFO {
        return invalid_field_error("ogg (flac): first block is not STREAMINFO");
    }

    let block_len = reader.read_be_u24()?;

    if u64::from(block_len) > reader.bytes_available() {
        return truncated_error("ogg (flac): STREAMINFO length exceeds packet");
    }

    let stream_info = StreamInfo::read(&mut reader)?;

    Ok((major_version, minor_version, header_count, stream_info, is_last))
}

/// Parse one metadata header packet: a single native FLAC metadata block.
fn read_block_packet(packet: &[u8], opts: &ReadOptions) -> Result<(MetadataBlock, bool)> {
    let mut reader = BufReader::new(packet);

    let block_header = reader.read_u8()?;
    let is_last = block_header & 0x80 != 0;
    let ty = block_header & 0x7f;

    let block_len = reader.read_be_u24()? as u64;

    if block_len > reader.bytes_available() {
        return truncated_error("ogg (flac): metadata block length exceeds packet");
    }

    if block_len < reader.bytes_available() {
        warn!("ogg (flac): metadata packet has trailing bytes");
    }

    let body = reader.read_buf_bytes_ref(block_len as usize)?;

    Ok((read_block_body(ty, body, opts)?, is_last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageHeader;

    fn test_stream_info() -> StreamInfo {
        StreamInfo {
            min_block_size: 4096,
            max_block_size: 4096,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate: 48_000,
            channels: 2,
            bits_per_sample: 24,
            total_samples: 48_000 * 4,
            md5: [0; 16],
        }
    }

    fn build_file(blocks: Vec<MetadataBlock>, audio_pages: &[OwnedPage]) -> Vec<u8> {
        let file = OggFlacFile {
            serial: 0x31415926,
            major_version: 1,
            minor_version: 0,
            stream_info: test_stream_info(),
            blocks,
            audio_pages: audio_pages.to_vec(),
            last_granule: None,
        };

        file.render().unwrap()
    }

    fn audio_page(absgp: u64, eos: bool) -> OwnedPage {
        OwnedPage {
            header: PageHeader { absgp, is_last_page: eos, ..Default::default() },
            segment_table: vec![5],
            body: vec![0xff, 0xf8, 1, 2, 3],
        }
    }

    #[test]
    fn verify_read_mapping_header() {
        let mut comment = VorbisComment::new();
        comment.push("TITLE", "Embedded").unwrap();

        let buf = build_file(
            vec![MetadataBlock::VorbisComment(comment)],
            &[audio_page(48_000, true)],
        );

        let file = OggFlacFile::read(&buf, &ReadOptions::default()).unwrap();

        assert_eq!(file.stream_info().sample_rate, 48_000);
        assert_eq!(file.comment().unwrap().get("TITLE"), Some("Embedded"));

        let props = file.properties().unwrap();
        assert_eq!(props.bits_per_sample, Some(24));
        assert!((props.duration_secs.unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn verify_edit_round_trip_preserves_unknown_blocks() {
        let application = MetadataBlock::Application {
            id: *b"CANT",
            data: Box::new([1, 2, 3, 4, 5]),
        };

        let buf = build_file(vec![application.clone()], &[audio_page(10, true)]);

        let mut file = OggFlacFile::read(&buf, &ReadOptions::default()).unwrap();
        file.comment_mut().set_field("ALBUM", "New Album").unwrap();

        let reread = OggFlacFile::read(&file.render().unwrap(), &ReadOptions::default()).unwrap();

        assert_eq!(reread.comment().unwrap().get("ALBUM"), Some("New Album"));
        assert!(reread.blocks.contains(&application));
        assert_eq!(reread.audio_pages.len(), 1);
        assert_eq!(reread.audio_pages[0].body, vec![0xff, 0xf8, 1, 2, 3]);
    }

    #[test]
    fn verify_bad_signature_rejected() {
        let buf = build_file(vec![], &[]);

        let mut corrupt = buf.clone();
        // The mapping signature lives just after the first page header (27 bytes header,
        // 1 lacing byte, then the packet).
        corrupt[29] = b'X';

        assert!(OggFlacFile::read(&corrupt, &ReadOptions::default()).is_err());
    }
}
