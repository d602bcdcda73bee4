// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Vorbis-in-OGG mapping.
//!
//! A Vorbis logical stream opens with three header packets: identification, comment, and
//! setup. The identification packet has a page of its own; the comment and setup packets share
//! the following page(s). The granule position counts PCM samples.

use cantata_core::errors::{
    invalid_field_error, invalid_magic_error, invalid_version_error, truncated_error, Result,
};
use cantata_core::io::{BufReader, BufWriter, ReadBytes};
use cantata_core::meta::{AudioProperties, ReadOptions};

use cantata_metadata::vorbis::VorbisComment;

use crate::physical::{assemble_packets, audio_pages_after, rewrite_stream, OwnedPage, PhysicalStream};

/// The common header signature following the packet type byte.
const VORBIS_SIGNATURE: &[u8; 6] = b"vorbis";

/// Header packet type bytes.
const PACKET_TYPE_IDENTIFICATION: u8 = 0x01;
const PACKET_TYPE_COMMENT: u8 = 0x03;
const PACKET_TYPE_SETUP: u8 = 0x05;

/// The minimum size of an identification packet.
const IDENTIFICATION_PACKET_SIZE: usize = 30;

/// An OGG Vorbis file.
pub struct OggVorbisFile {
    serial: u32,
    /// The identification packet, preserved byte-for-byte.
    identification: Vec<u8>,
    comment: VorbisComment,
    /// The setup packet, preserved byte-for-byte.
    setup: Vec<u8>,
    audio_pages: Vec<OwnedPage>,
    sample_rate: u32,
    channels: u8,
    last_granule: Option<u64>,
}

impl OggVorbisFile {
    /// Read an OGG Vorbis file from a buffer.
    pub fn read(buf: &[u8], opts: &ReadOptions) -> Result<OggVorbisFile> {
        let stream = PhysicalStream::read(buf, opts)?;
        let packets = assemble_packets(&stream, opts)?;

        if packets.len() < 3 {
            return invalid_field_error("ogg (vorbis): missing header packets");
        }

        let (sample_rate, channels) = read_identification(&packets[0].data)?;

        let comment = read_comment_packet(&packets[1].data, opts)?;

        // The setup packet is opaque, but its type byte and signature are checked.
        read_packet_signature(&packets[2].data, PACKET_TYPE_SETUP, "ogg (vorbis): bad setup packet")?;

        let audio_pages = audio_pages_after(&stream, &packets, 3)?.to_vec();

        Ok(OggVorbisFile {
            serial: stream.serial,
            identification: packets[0].data.clone(),
            comment,
            setup: packets[2].data.clone(),
            audio_pages,
            sample_rate,
            channels,
            last_granule: stream.last_granule(),
        })
    }

    /// Render the file.
    ///
    /// The identification and setup packets are re-emitted byte-for-byte, the comment packet is
    /// rebuilt, and the audio pages are renumbered with recomputed checksums.
    pub fn render(&self) -> Vec<u8> {
        let mut comment_packet = BufWriter::new();
        comment_packet.write_u8(PACKET_TYPE_COMMENT);
        comment_packet.write_buf(VORBIS_SIGNATURE);
        self.comment.write(&mut comment_packet);
        // The comment header ends with a set framing bit.
        comment_packet.write_u8(0x01);

        rewrite_stream(
            self.serial,
            &[
                vec![self.identification.clone()],
                vec![comment_packet.into_inner(), self.setup.clone()],
            ],
            &self.audio_pages,
        )
    }

    /// The audio properties from the identification header and final granule position.
    pub fn properties(&self) -> Option<AudioProperties> {
        if self.sample_rate == 0 {
            return None;
        }

        let duration_secs =
            self.last_granule.map(|granule| granule as f64 / f64::from(self.sample_rate));

        Some(AudioProperties {
            sample_rate: self.sample_rate,
            channels: u32::from(self.channels),
            bits_per_sample: None,
            duration_secs,
        })
    }

    /// The Vorbis Comment.
    pub fn comment(&self) -> &VorbisComment {
        &self.comment
    }

    /// The Vorbis Comment, mutable for editing.
    pub fn comment_mut(&mut self) -> &mut VorbisComment {
        &mut self.comment
    }
}

/// Validate a header packet's type byte and signature.
fn read_packet_signature(packet: &[u8], packet_type: u8, msg: &'static str) -> Result<()> {
    if packet.len() < 7 {
        return truncated_error(msg);
    }

    if packet[0] != packet_type || &packet[1..7] != VORBIS_SIGNATURE {
        return invalid_magic_error(msg);
    }

    Ok(())
}

/// Parse the identification header: the stream version must be zero and the framing bit set.
fn read_identification(packet: &[u8]) -> Result<(u32, u8)> {
    if packet.len() < IDENTIFICATION_PACKET_SIZE {
        return truncated_error("ogg (vorbis): identification packet too small");
    }

    read_packet_signature(packet, PACKET_TYPE_IDENTIFICATION, "ogg (vorbis): bad identification packet")?;

    let mut reader = BufReader::new(&packet[7..]);

    let version = reader.read_u32()?;

    if version != 0 {
        return invalid_version_error("ogg (vorbis): unsupported vorbis version");
    }

    let channels = reader.read_u8()?;
    let sample_rate = reader.read_u32()?;

    if channels == 0 {
        return invalid_field_error("ogg (vorbis): channel count is zero");
    }

    // Bitrates (3 x 32-bit) and the blocksize byte.
    reader.ignore_bytes(13)?;

    // The identification header ends with a set framing bit.
    if reader.read_u8()? & 0x01 == 0 {
        return invalid_field_error("ogg (vorbis): identification framing bit is not set");
    }

    Ok((sample_rate, channels))
}

/// Parse the comment header packet.
fn read_comment_packet(packet: &[u8], opts: &ReadOptions) -> Result<VorbisComment> {
    read_packet_signature(packet, PACKET_TYPE_COMMENT, "ogg (vorbis): bad comment packet")?;

    let mut reader = BufReader::new(&packet[7..]);

    VorbisComment::read_with_framing(&mut reader, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;

    /// Build a minimal identification packet.
    pub(crate) fn build_identification(sample_rate: u32, channels: u8) -> Vec<u8> {
        let mut out = BufWriter::new();
        out.write_u8(PACKET_TYPE_IDENTIFICATION);
        out.write_buf(VORBIS_SIGNATURE);
        out.write_u32(0);
        out.write_u8(channels);
        out.write_u32(sample_rate);
        out.write_u32(0);
        out.write_u32(160_000);
        out.write_u32(0);
        out.write_u8(0xb8);
        out.write_u8(0x01);
        out.into_inner()
    }

    fn build_setup() -> Vec<u8> {
        let mut out = BufWriter::new();
        out.write_u8(PACKET_TYPE_SETUP);
        out.write_buf(VORBIS_SIGNATURE);
        out.write_buf(&[0x55; 32]);
        out.into_inner()
    }

    fn build_file(comment: &VorbisComment, audio_pages: &[OwnedPage]) -> Vec<u8> {
        let mut comment_packet = BufWriter::new();
        comment_packet.write_u8(PACKET_TYPE_COMMENT);
        comment_packet.write_buf(VORBIS_SIGNATURE);
        comment.write(&mut comment_packet);
        comment_packet.write_u8(0x01);

        rewrite_stream(
            0x0badcafe,
            &[
                vec![build_identification(44100, 2)],
                vec![comment_packet.into_inner(), build_setup()],
            ],
            audio_pages,
        )
    }

    fn audio_page(absgp: u64, eos: bool) -> OwnedPage {
        use crate::page::PageHeader;

        OwnedPage {
            header: PageHeader { absgp, is_last_page: eos, ..Default::default() },
            segment_table: vec![3],
            body: vec![1, 2, 3],
        }
    }

    #[test]
    fn verify_read_and_properties() {
        let mut comment = VorbisComment::new();
        comment.push("TITLE", "Song").unwrap();

        let buf = build_file(&comment, &[audio_page(44100 * 2, true)]);
        let file = OggVorbisFile::read(&buf, &ReadOptions::default()).unwrap();

        assert_eq!(file.comment().get("TITLE"), Some("Song"));

        let props = file.properties().unwrap();
        assert_eq!(props.sample_rate, 44100);
        assert_eq!(props.channels, 2);
        assert!((props.duration_secs.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn verify_rewrite_preserves_audio_and_renumbers() {
        let buf = build_file(&VorbisComment::new(), &[audio_page(100, false), audio_page(200, true)]);

        let mut file = OggVorbisFile::read(&buf, &ReadOptions::default()).unwrap();
        file.comment_mut()
            .set_field("TITLE", "A considerably longer title than before")
            .unwrap();

        let rendered = file.render();

        // Every rewritten page validates, sequences are contiguous, and EOS is on the final
        // page only.
        let mut pos = 0;
        let mut pages = Vec::new();

        while pos < rendered.len() {
            let (page, consumed) = Page::read(&rendered[pos..], true).unwrap();
            pages.push((page.header, page.body.to_vec()));
            pos += consumed;
        }

        for (i, (header, _)) in pages.iter().enumerate() {
            assert_eq!(header.sequence, i as u32);
            assert_eq!(header.is_last_page, i + 1 == pages.len());
        }

        // The audio page bodies are untouched.
        let reread = OggVorbisFile::read(&rendered, &ReadOptions::default()).unwrap();
        assert_eq!(reread.audio_pages.len(), 2);
        assert_eq!(reread.audio_pages[0].body, vec![1, 2, 3]);
        assert_eq!(reread.comment().get("TITLE"), Some("A considerably longer title than before"));
    }

    #[test]
    fn verify_bad_version_rejected() {
        let mut ident = build_identification(44100, 2);
        // Corrupt the version field.
        ident[7] = 9;

        let buf = rewrite_stream(1, &[vec![ident]], &[]);

        // The comment and setup packets are missing too, but the version error surfaces first
        // when the packet count suffices.
        assert!(OggVorbisFile::read(&buf, &ReadOptions::default()).is_err());
    }

    #[test]
    fn verify_crc_validation_toggle() {
        let buf = build_file(&VorbisComment::new(), &[audio_page(1, true)]);

        // Corrupt a byte inside the final page body.
        let mut corrupt = buf.clone();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0x40;

        assert!(OggVorbisFile::read(&corrupt, &ReadOptions::default()).is_ok());

        let opts = ReadOptions { validate_crc: true, ..Default::default() };
        match OggVorbisFile::read(&corrupt, &opts) {
            Err(cantata_core::errors::Error::CrcMismatch { .. }) => (),
            _ => panic!("expected crc mismatch"),
        }
    }
}
