// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Monkey's Audio dispatcher.
//!
//! Audio properties are probed from the stream descriptor and header of the modern (3.98+)
//! layout; older streams still have their tags read and written, but report no properties.

use cantata_core::errors::{invalid_field_error, invalid_magic_error, Result};
use cantata_core::io::{BufReader, ReadBytes};
use cantata_core::meta::{AudioProperties, ReadOptions};

use cantata_metadata::ape::ApeTag;
use cantata_metadata::id3v1::Id3v1Tag;

use log::debug;

use crate::tail::TaggedStream;

/// The Monkey's Audio stream marker.
const MAC_MARKER: [u8; 4] = *b"MAC ";

/// The first version using the descriptor-based layout.
const MAC_DESCRIPTOR_VERSION: u16 = 3980;

/// Properties probed from a modern Monkey's Audio header.
#[derive(Copy, Clone, Debug)]
struct MacHeader {
    blocks_per_frame: u32,
    final_frame_blocks: u32,
    total_frames: u32,
    bits_per_sample: u16,
    channels: u16,
    sample_rate: u32,
}

impl MacHeader {
    fn read(buf: &[u8]) -> Result<Option<MacHeader>> {
        let mut reader = BufReader::new(buf);

        let marker = reader.read_quad_bytes()?;

        if marker != MAC_MARKER {
            return invalid_magic_error("mac: missing MAC stream marker");
        }

        let version = reader.read_u16()?;

        if version < MAC_DESCRIPTOR_VERSION {
            // The legacy layout interleaves the fields differently; properties are not probed.
            debug!("mac: legacy stream version {}, skipping property probe", version);
            return Ok(None);
        }

        // The remainder of the descriptor.
        let _padding = reader.read_u16()?;
        let descriptor_bytes = reader.read_u32()?;
        let _header_bytes = reader.read_u32()?;
        let _seek_table_bytes = reader.read_u32()?;
        let _wav_header_bytes = reader.read_u32()?;
        let _audio_data_bytes = reader.read_u32()?;
        let _audio_data_bytes_high = reader.read_u32()?;
        let _terminating_data_bytes = reader.read_u32()?;

        let mut md5 = [0u8; 16];
        reader.read_buf_exact(&mut md5)?;

        // The header follows the descriptor, whose stated size spans from the start of the
        // stream.
        let header_start = descriptor_bytes as u64;

        if header_start < reader.pos() || header_start > buf.len() as u64 {
            return invalid_field_error("mac: descriptor size is out of bounds");
        }

        reader.ignore_bytes(header_start - reader.pos())?;

        let _compression_level = reader.read_u16()?;
        let _format_flags = reader.read_u16()?;
        let blocks_per_frame = reader.read_u32()?;
        let final_frame_blocks = reader.read_u32()?;
        let total_frames = reader.read_u32()?;
        let bits_per_sample = reader.read_u16()?;
        let channels = reader.read_u16()?;
        let sample_rate = reader.read_u32()?;

        Ok(Some(MacHeader {
            blocks_per_frame,
            final_frame_blocks,
            total_frames,
            bits_per_sample,
            channels,
            sample_rate,
        }))
    }

    fn total_blocks(&self) -> u64 {
        if self.total_frames == 0 {
            return 0;
        }

        u64::from(self.total_frames - 1) * u64::from(self.blocks_per_frame)
            + u64::from(self.final_frame_blocks)
    }
}

/// A parsed Monkey's Audio file.
pub struct MonkeysAudioFile {
    stream: TaggedStream,
    header: Option<MacHeader>,
}

impl MonkeysAudioFile {
    /// Read a Monkey's Audio file from a buffer.
    pub fn read(buf: &[u8], _opts: &ReadOptions) -> Result<MonkeysAudioFile> {
        if buf.len() < 4 || buf[0..4] != MAC_MARKER {
            return invalid_magic_error("mac: missing MAC stream marker");
        }

        let stream = TaggedStream::read(buf)?;
        let header = MacHeader::read(&stream.audio).unwrap_or(None);

        Ok(MonkeysAudioFile { stream, header })
    }

    /// Render the file: the audio verbatim, followed by the present tags.
    pub fn render(&self) -> Vec<u8> {
        self.stream.render()
    }

    /// The audio properties, for modern streams.
    pub fn properties(&self) -> Option<AudioProperties> {
        let header = self.header.as_ref()?;

        if header.sample_rate == 0 || header.channels == 0 {
            return None;
        }

        Some(AudioProperties {
            sample_rate: header.sample_rate,
            channels: u32::from(header.channels),
            bits_per_sample: Some(u32::from(header.bits_per_sample)),
            duration_secs: Some(header.total_blocks() as f64 / f64::from(header.sample_rate)),
        })
    }

    /// The tagged stream, for tag access.
    pub fn tags(&self) -> &TaggedStream {
        &self.stream
    }

    /// The tagged stream, mutable for editing.
    pub fn tags_mut(&mut self) -> &mut TaggedStream {
        &mut self.stream
    }

    /// The APE tag, if present.
    pub fn ape(&self) -> Option<&ApeTag> {
        self.stream.ape.as_ref()
    }

    /// The ID3v1 tag, if present.
    pub fn id3v1(&self) -> Option<&Id3v1Tag> {
        self.stream.id3v1.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use cantata_core::io::BufWriter;

    use super::*;

    fn build_mac() -> Vec<u8> {
        let mut out = BufWriter::new();

        // Descriptor.
        out.write_buf(b"MAC ");
        out.write_u16(3990);
        out.write_u16(0);
        out.write_u32(52);
        out.write_u32(24);
        out.write_u32(0);
        out.write_u32(0);
        out.write_u32(0);
        out.write_u32(0);
        out.write_u32(0);
        out.write_zeros(16);

        // Header.
        out.write_u16(2000);
        out.write_u16(0);
        out.write_u32(73_728);
        out.write_u32(30_000);
        out.write_u32(2);
        out.write_u16(16);
        out.write_u16(2);
        out.write_u32(44100);

        // Opaque frame data.
        out.write_buf(&[0x21; 128]);

        out.into_inner()
    }

    #[test]
    fn verify_properties() {
        let buf = build_mac();
        let file = MonkeysAudioFile::read(&buf, &ReadOptions::default()).unwrap();

        let props = file.properties().unwrap();
        assert_eq!(props.sample_rate, 44100);
        assert_eq!(props.channels, 2);
        assert_eq!(props.bits_per_sample, Some(16));

        // (2 - 1) * 73728 + 30000 = 103728 blocks.
        assert!((props.duration_secs.unwrap() - 103_728.0 / 44100.0).abs() < 1e-9);
    }

    #[test]
    fn verify_tag_round_trip() {
        let buf = build_mac();

        let mut file = MonkeysAudioFile::read(&buf, &ReadOptions::default()).unwrap();
        file.tags_mut().ape_mut().set_text("Album", "Bananas").unwrap();
        file.tags_mut().id3v1_mut().album = Some("Bananas".to_string());

        let reread = MonkeysAudioFile::read(&file.render(), &ReadOptions::default()).unwrap();

        assert_eq!(reread.ape().unwrap().text("Album"), Some("Bananas"));
        assert_eq!(reread.id3v1().unwrap().album.as_deref(), Some("Bananas"));
        assert_eq!(reread.tags().audio, buf);
    }

    #[test]
    fn verify_bad_marker_rejected() {
        assert!(MonkeysAudioFile::read(b"wvpk", &ReadOptions::default()).is_err());
    }
}
