// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A FLAC metadata block chain reader and writer.
//!
//! A native FLAC stream is the `fLaC` marker, a STREAMINFO block, zero or more further metadata
//! blocks, and the audio frames. Editing rewrites the block chain and copies the audio frames
//! verbatim; blocks of unrecognized types are preserved byte-for-byte.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Cantata crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::manual_range_contains)]

use cantata_core::errors::{
    invalid_field_error, invalid_magic_error, truncated_error, Result,
};
use cantata_core::io::{BufReader, BufWriter, FiniteStream, ReadBytes};
use cantata_core::meta::{AudioProperties, ReadOptions, Visual};

use cantata_metadata::picture;
use cantata_metadata::vorbis::VorbisComment;

use log::trace;

/// The FLAC stream marker.
const FLAC_MARKER: [u8; 4] = *b"fLaC";

/// The encoded length of a STREAMINFO block body.
const STREAM_INFO_LEN: usize = 34;

/// The maximum encoded length of a metadata block body (a 24-bit length field).
const MAX_BLOCK_LEN: usize = (1 << 24) - 1;

/// FLAC metadata block type codes.
pub mod block_type {
    pub const STREAM_INFO: u8 = 0;
    pub const PADDING: u8 = 1;
    pub const APPLICATION: u8 = 2;
    pub const SEEK_TABLE: u8 = 3;
    pub const VORBIS_COMMENT: u8 = 4;
    pub const PICTURE: u8 = 6;
    pub const INVALID: u8 = 127;
}

/// The STREAMINFO metadata block.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    /// The minimum block size in samples.
    pub min_block_size: u16,
    /// The maximum block size in samples.
    pub max_block_size: u16,
    /// The minimum frame size in bytes, 0 when unknown.
    pub min_frame_size: u32,
    /// The maximum frame size in bytes, 0 when unknown.
    pub max_frame_size: u32,
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The number of channels.
    pub channels: u32,
    /// The number of bits per sample.
    pub bits_per_sample: u32,
    /// The total number of samples per channel, 0 when unknown.
    pub total_samples: u64,
    /// The MD5 signature of the unencoded audio.
    pub md5: [u8; 16],
}

impl StreamInfo {
    /// Read a STREAMINFO block body.
    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<StreamInfo> {
        let min_block_size = reader.read_be_u16()?;
        let max_block_size = reader.read_be_u16()?;
        let min_frame_size = reader.read_be_u24()?;
        let max_frame_size = reader.read_be_u24()?;

        // The next 8 bytes pack the sample rate (20 bits), channel count less one (3 bits),
        // bits per sample less one (5 bits), and the total sample count (36 bits).
        let packed = reader.read_be_u64()?;

        let sample_rate = (packed >> 44) as u32;
        let channels = ((packed >> 41) & 0x7) as u32 + 1;
        let bits_per_sample = ((packed >> 36) & 0x1f) as u32 + 1;
        let total_samples = packed & 0xf_ffff_ffff;

        let mut md5 = [0u8; 16];
        reader.read_buf_exact(&mut md5)?;

        Ok(StreamInfo {
            min_block_size,
            max_block_size,
            min_frame_size,
            max_frame_size,
            sample_rate,
            channels,
            bits_per_sample,
            total_samples,
            md5,
        })
    }

    /// Render the STREAMINFO block body.
    pub fn render(&self) -> Vec<u8> {
        let mut out = BufWriter::with_capacity(STREAM_INFO_LEN);

        out.write_be_u16(self.min_block_size);
        out.write_be_u16(self.max_block_size);
        out.write_be_u24(self.min_frame_size);
        out.write_be_u24(self.max_frame_size);

        let packed = u64::from(self.sample_rate) << 44
            | u64::from((self.channels - 1) & 0x7) << 41
            | u64::from((self.bits_per_sample - 1) & 0x1f) << 36
            | (self.total_samples & 0xf_ffff_ffff);

        out.write_be_u64(packed);
        out.write_buf(&self.md5);

        out.into_inner()
    }
}

/// A FLAC metadata block.
#[derive(Clone, Debug, PartialEq)]
pub enum MetadataBlock {
    /// A PADDING block of the given length. Padding bytes are zero.
    Padding(u32),
    /// An APPLICATION block: a registered application identifier and opaque data.
    Application {
        /// The application identifier.
        id: [u8; 4],
        /// The application data.
        data: Box<[u8]>,
    },
    /// A SEEKTABLE block, carried verbatim.
    SeekTable(Box<[u8]>),
    /// A VORBIS_COMMENT block.
    VorbisComment(VorbisComment),
    /// A PICTURE block.
    Picture(Visual),
    /// Any other block, carried verbatim.
    Unknown {
        /// The block type code.
        block_type: u8,
        /// The block body.
        data: Box<[u8]>,
    },
}

impl MetadataBlock {
    /// The block type code.
    pub fn block_type(&self) -> u8 {
        match self {
            MetadataBlock::Padding(_) => block_type::PADDING,
            MetadataBlock::Application { .. } => block_type::APPLICATION,
            MetadataBlock::SeekTable(_) => block_type::SEEK_TABLE,
            MetadataBlock::VorbisComment(_) => block_type::VORBIS_COMMENT,
            MetadataBlock::Picture(_) => block_type::PICTURE,
            MetadataBlock::Unknown { block_type, .. } => *block_type,
        }
    }

    /// Render the block body.
    pub fn render_body(&self) -> Vec<u8> {
        match self {
            MetadataBlock::Padding(len) => vec![0; *len as usize],
            MetadataBlock::Application { id, data } => {
                let mut out = BufWriter::with_capacity(4 + data.len());
                out.write_buf(id);
                out.write_buf(data);
                out.into_inner()
            }
            MetadataBlock::SeekTable(data) => data.to_vec(),
            MetadataBlock::VorbisComment(comment) => comment.render(),
            MetadataBlock::Picture(visual) => picture::render_picture_block(visual),
            MetadataBlock::Unknown { data, .. } => data.to_vec(),
        }
    }
}

/// A parsed FLAC file: the STREAMINFO, the remaining metadata block chain, and the opaque audio
/// frames.
#[derive(Clone, Debug)]
pub struct FlacFile {
    stream_info: StreamInfo,
    blocks: Vec<MetadataBlock>,
    audio: Vec<u8>,
}

impl FlacFile {
    /// Read a FLAC file from a buffer.
    pub fn read(buf: &[u8], opts: &ReadOptions) -> Result<FlacFile> {
        let mut reader = BufReader::new(buf);

        let marker = reader.read_quad_bytes()?;

        if marker != FLAC_MARKER {
            return invalid_magic_error("flac: missing fLaC stream marker");
        }

        let mut stream_info = None;
        let mut blocks = Vec::new();
        let mut is_last = false;
        let mut is_first = true;

        while !is_last {
            let header = reader.read_u8()?;

            is_last = header & 0x80 != 0;
            let block_type = header & 0x7f;
            let block_len = reader.read_be_u24()? as u64;

            if block_type == block_type::INVALID {
                return invalid_field_error("flac: invalid metadata block type");
            }

            if block_len > reader.bytes_available() {
                return truncated_error("flac: metadata block length exceeds input");
            }

            trace!("flac: block type={}, len={}, last={}", block_type, block_len, is_last);

            // The first metadata block must be the STREAMINFO.
            if is_first && block_type != block_type::STREAM_INFO {
                return invalid_field_error("flac: first metadata block is not STREAMINFO");
            }

            let body = reader.read_buf_bytes_ref(block_len as usize)?;

            if block_type == block_type::STREAM_INFO {
                if !is_first {
                    return invalid_field_error("flac: duplicate STREAMINFO block");
                }
                if block_len as usize != STREAM_INFO_LEN {
                    return invalid_field_error("flac: invalid STREAMINFO block length");
                }

                stream_info = Some(StreamInfo::read(&mut BufReader::new(body))?);
            }
            else {
                blocks.push(read_block_body(block_type, body, opts)?);
            }

            is_first = false;
        }

        let stream_info = match stream_info {
            Some(stream_info) => stream_info,
            None => return invalid_field_error("flac: missing STREAMINFO block"),
        };

        let audio = reader.read_buf_bytes_available_ref().to_vec();

        Ok(FlacFile { stream_info, blocks, audio })
    }

    /// Render the file: marker, the metadata block chain, and the audio frames verbatim.
    pub fn render(&self) -> Result<Vec<u8>> {
        let mut out = BufWriter::new();
        out.write_buf(&FLAC_MARKER);

        // STREAMINFO always leads, and carries the last-block flag when it is alone.
        write_block(
            &mut out,
            block_type::STREAM_INFO,
            &self.stream_info.render(),
            self.blocks.is_empty(),
        )?;

        for (i, block) in self.blocks.iter().enumerate() {
            let is_last = i + 1 == self.blocks.len();
            write_block(&mut out, block.block_type(), &block.render_body(), is_last)?;
        }

        out.write_buf(&self.audio);

        Ok(out.into_inner())
    }

    /// The parsed STREAMINFO block.
    pub fn stream_info(&self) -> &StreamInfo {
        &self.stream_info
    }

    /// The metadata blocks following the STREAMINFO, in stored order.
    pub fn blocks(&self) -> &[MetadataBlock] {
        &self.blocks
    }

    /// The opaque audio frames.
    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    /// The audio properties from the STREAMINFO. A zero sample rate or zero total sample count
    /// reports no properties.
    pub fn properties(&self) -> Option<AudioProperties> {
        let info = &self.stream_info;

        if info.sample_rate == 0 || info.total_samples == 0 {
            return None;
        }

        Some(AudioProperties {
            sample_rate: info.sample_rate,
            channels: info.channels,
            bits_per_sample: Some(info.bits_per_sample),
            duration_secs: Some(info.total_samples as f64 / f64::from(info.sample_rate)),
        })
    }

    /// The Vorbis Comment, if the file carries one.
    pub fn vorbis_comment(&self) -> Option<&VorbisComment> {
        self.blocks.iter().find_map(|block| match block {
            MetadataBlock::VorbisComment(comment) => Some(comment),
            _ => None,
        })
    }

    /// The Vorbis Comment, created empty when the file carries none.
    ///
    /// A new comment block is inserted ahead of any trailing PADDING so that the padding stays
    /// last.
    pub fn vorbis_comment_mut(&mut self) -> &mut VorbisComment {
        let index = self.blocks.iter().position(|b| matches!(b, MetadataBlock::VorbisComment(_)));

        let index = match index {
            Some(index) => index,
            None => {
                let insert_at = match self.blocks.last() {
                    Some(MetadataBlock::Padding(_)) => self.blocks.len() - 1,
                    _ => self.blocks.len(),
                };

                self.blocks
                    .insert(insert_at, MetadataBlock::VorbisComment(VorbisComment::new()));
                insert_at
            }
        };

        match &mut self.blocks[index] {
            MetadataBlock::VorbisComment(comment) => comment,
            _ => unreachable!(),
        }
    }

    /// All native PICTURE blocks.
    pub fn pictures(&self) -> Vec<Visual> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                MetadataBlock::Picture(visual) => Some(visual.clone()),
                _ => None,
            })
            .collect()
    }

    /// Attaches a picture as a native PICTURE block.
    pub fn add_picture(&mut self, visual: Visual) {
        let insert_at = match self.blocks.last() {
            Some(MetadataBlock::Padding(_)) => self.blocks.len() - 1,
            _ => self.blocks.len(),
        };

        self.blocks.insert(insert_at, MetadataBlock::Picture(visual));
    }

    /// Removes all native PICTURE blocks.
    pub fn remove_pictures(&mut self) {
        self.blocks.retain(|block| !matches!(block, MetadataBlock::Picture(_)));
    }
}

/// Parse the body of a non-STREAMINFO metadata block.
pub fn read_block_body(block_type: u8, body: &[u8], opts: &ReadOptions) -> Result<MetadataBlock> {
    let mut reader = BufReader::new(body);

    let block = match block_type {
        block_type::PADDING => MetadataBlock::Padding(body.len() as u32),
        block_type::APPLICATION => {
            if body.len() < 4 {
                return invalid_field_error("flac: application block too small");
            }
            let id = reader.read_quad_bytes()?;
            let data = Box::from(reader.read_buf_bytes_available_ref());
            MetadataBlock::Application { id, data }
        }
        block_type::SEEK_TABLE => {
            if body.len() % 18 != 0 {
                return invalid_field_error("flac: invalid seek table block length");
            }
            MetadataBlock::SeekTable(Box::from(body))
        }
        block_type::VORBIS_COMMENT => {
            MetadataBlock::VorbisComment(VorbisComment::read(&mut reader, opts)?)
        }
        block_type::PICTURE => {
            MetadataBlock::Picture(picture::read_picture_block(&mut reader, opts)?)
        }
        _ => MetadataBlock::Unknown { block_type, data: Box::from(body) },
    };

    Ok(block)
}

/// Emit one metadata block: the header byte with the last-block flag, the 24-bit body length,
/// and the body.
pub fn write_block(out: &mut BufWriter, block_type: u8, body: &[u8], is_last: bool) -> Result<()> {
    if body.len() > MAX_BLOCK_LEN {
        return invalid_field_error("flac: metadata block body too large");
    }

    out.write_u8(if is_last { 0x80 | block_type } else { block_type });
    out.write_be_u24(body.len() as u32);
    out.write_buf(body);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_stream_info() -> StreamInfo {
        StreamInfo {
            min_block_size: 4096,
            max_block_size: 4096,
            min_frame_size: 14,
            max_frame_size: 14,
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
            total_samples: 44100 * 3,
            md5: [0x5a; 16],
        }
    }

    /// Build a minimal FLAC file: marker, STREAMINFO, optional extra block bodies, and fake
    /// audio frames.
    fn build_flac(extra: &[(u8, &[u8])], audio: &[u8]) -> Vec<u8> {
        let mut out = BufWriter::new();
        out.write_buf(b"fLaC");

        let info = test_stream_info().render();
        write_block(&mut out, block_type::STREAM_INFO, &info, extra.is_empty()).unwrap();

        for (i, (ty, body)) in extra.iter().enumerate() {
            write_block(&mut out, *ty, body, i + 1 == extra.len()).unwrap();
        }

        out.write_buf(audio);
        out.into_inner()
    }

    #[test]
    fn verify_stream_info_round_trip() {
        let info = test_stream_info();
        let rendered = info.render();

        assert_eq!(rendered.len(), STREAM_INFO_LEN);
        assert_eq!(StreamInfo::read(&mut BufReader::new(&rendered)).unwrap(), info);
    }

    #[test]
    fn verify_read_and_properties() {
        let buf = build_flac(&[], b"audio-frames");
        let flac = FlacFile::read(&buf, &ReadOptions::default()).unwrap();

        let props = flac.properties().unwrap();
        assert_eq!(props.sample_rate, 44100);
        assert_eq!(props.channels, 2);
        assert_eq!(props.bits_per_sample, Some(16));
        assert!((props.duration_secs.unwrap() - 3.0).abs() < 1e-9);

        assert_eq!(flac.audio(), b"audio-frames");
    }

    #[test]
    fn verify_zero_sample_rate_has_no_properties() {
        let mut info = test_stream_info();
        info.sample_rate = 0;

        let mut out = BufWriter::new();
        out.write_buf(b"fLaC");
        write_block(&mut out, block_type::STREAM_INFO, &info.render(), true).unwrap();

        let flac = FlacFile::read(out.as_slice(), &ReadOptions::default()).unwrap();
        assert!(flac.properties().is_none());
    }

    #[test]
    fn verify_unknown_blocks_survive_round_trip() {
        let application = {
            let mut body = b"FAKE".to_vec();
            body.extend_from_slice(&[9, 8, 7]);
            body
        };

        let buf = build_flac(
            &[
                (block_type::APPLICATION, &application),
                (0x55, &[1, 2, 3, 4]),
                (block_type::PADDING, &[0; 16]),
            ],
            b"frames",
        );

        let flac = FlacFile::read(&buf, &ReadOptions::default()).unwrap();
        let rendered = flac.render().unwrap();

        assert_eq!(rendered, buf);
    }

    #[test]
    fn verify_comment_edit_preserves_audio() {
        let buf = build_flac(&[(block_type::PADDING, &[0; 64])], b"the audio frames");

        let mut flac = FlacFile::read(&buf, &ReadOptions::default()).unwrap();
        flac.vorbis_comment_mut().set_field("TITLE", "New Title").unwrap();

        let rendered = flac.render().unwrap();
        let reread = FlacFile::read(&rendered, &ReadOptions::default()).unwrap();

        assert_eq!(reread.vorbis_comment().unwrap().get("TITLE"), Some("New Title"));
        assert_eq!(reread.audio(), b"the audio frames");

        // The comment slots in ahead of the trailing padding.
        assert!(matches!(reread.blocks().last(), Some(MetadataBlock::Padding(64))));
    }

    #[test]
    fn verify_bad_marker_rejected() {
        let result = FlacFile::read(b"OggSnot-a-flac", &ReadOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn verify_truncated_block_rejected() {
        // STREAMINFO header declaring more bytes than the buffer holds.
        let buf = [b'f', b'L', b'a', b'C', 0x80, 0x00, 0x00, 0x22, 0x00];

        match FlacFile::read(&buf, &ReadOptions::default()) {
            Err(cantata_core::errors::Error::Truncated(_)) => (),
            _ => panic!("expected truncation"),
        }
    }

    #[test]
    fn verify_native_pictures() {
        let buf = build_flac(&[], b"a");
        let mut flac = FlacFile::read(&buf, &ReadOptions::default()).unwrap();

        flac.add_picture(Visual::front_cover("image/png", Box::new([1, 2, 3])));

        let reread = FlacFile::read(&flac.render().unwrap(), &ReadOptions::default()).unwrap();
        let pictures = reread.pictures();

        assert_eq!(pictures.len(), 1);
        assert_eq!(pictures[0].data.as_ref(), &[1, 2, 3]);
    }
}
