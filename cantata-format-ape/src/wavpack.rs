// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The WavPack dispatcher.
//!
//! Audio properties are probed from the first `wvpk` block header; the audio itself is opaque
//! and preserved verbatim on rewrite.

use cantata_core::errors::{invalid_magic_error, invalid_version_error, Result};
use cantata_core::io::{BufReader, ReadBytes};
use cantata_core::meta::{AudioProperties, ReadOptions};

use cantata_metadata::ape::ApeTag;
use cantata_metadata::id3v1::Id3v1Tag;

use crate::tail::TaggedStream;

/// The WavPack block marker.
const WAVPACK_MARKER: [u8; 4] = *b"wvpk";

/// The oldest supported stream version.
const WAVPACK_MIN_VERSION: u16 = 0x402;

/// The newest supported stream version.
const WAVPACK_MAX_VERSION: u16 = 0x410;

/// Sample rates indexed by the rate field of the block flags; index 15 means non-standard.
const WAVPACK_SAMPLE_RATES: [u32; 15] = [
    6000, 8000, 9600, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000, 64000, 88200,
    96000, 192_000,
];

/// Properties probed from a `wvpk` block header.
#[derive(Copy, Clone, Debug)]
struct BlockHeader {
    total_samples: u32,
    flags: u32,
}

impl BlockHeader {
    fn read(buf: &[u8]) -> Result<BlockHeader> {
        let mut reader = BufReader::new(buf);

        let marker = reader.read_quad_bytes()?;

        if marker != WAVPACK_MARKER {
            return invalid_magic_error("wavpack: missing wvpk block marker");
        }

        let _block_size = reader.read_u32()?;
        let version = reader.read_u16()?;

        if version < WAVPACK_MIN_VERSION || version > WAVPACK_MAX_VERSION {
            return invalid_version_error("wavpack: unsupported stream version");
        }

        let _block_index_u8 = reader.read_u8()?;
        let _total_samples_u8 = reader.read_u8()?;
        let total_samples = reader.read_u32()?;
        let _block_index = reader.read_u32()?;
        let _block_samples = reader.read_u32()?;
        let flags = reader.read_u32()?;
        let _crc = reader.read_u32()?;

        Ok(BlockHeader { total_samples, flags })
    }

    fn sample_rate(&self) -> Option<u32> {
        let index = ((self.flags >> 23) & 0x0f) as usize;
        WAVPACK_SAMPLE_RATES.get(index).copied()
    }

    fn channels(&self) -> u32 {
        // Bit 2 is the mono flag.
        if self.flags & 0x04 != 0 {
            1
        }
        else {
            2
        }
    }

    fn bits_per_sample(&self) -> u32 {
        // Bits 0 and 1 encode the bytes per sample, less one.
        ((self.flags & 0x03) + 1) * 8
    }
}

/// A parsed WavPack file.
pub struct WavPackFile {
    stream: TaggedStream,
    header: Option<BlockHeader>,
}

impl WavPackFile {
    /// Read a WavPack file from a buffer.
    pub fn read(buf: &[u8], _opts: &ReadOptions) -> Result<WavPackFile> {
        if buf.len() < 4 || buf[0..4] != WAVPACK_MARKER {
            return invalid_magic_error("wavpack: missing wvpk block marker");
        }

        let stream = TaggedStream::read(buf)?;
        let header = BlockHeader::read(&stream.audio).ok();

        Ok(WavPackFile { stream, header })
    }

    /// Render the file: the audio blocks verbatim, followed by the present tags.
    pub fn render(&self) -> Vec<u8> {
        self.stream.render()
    }

    /// The audio properties from the first block header.
    pub fn properties(&self) -> Option<AudioProperties> {
        let header = self.header.as_ref()?;
        let sample_rate = header.sample_rate()?;

        // An all-ones sample count means the length was unknown to the encoder.
        let duration_secs = if header.total_samples != u32::MAX {
            Some(f64::from(header.total_samples) / f64::from(sample_rate))
        }
        else {
            None
        };

        Some(AudioProperties {
            sample_rate,
            channels: header.channels(),
            bits_per_sample: Some(header.bits_per_sample()),
            duration_secs,
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

    pub(crate) fn build_wavpack_block(total_samples: u32, flags: u32) -> Vec<u8> {
        let mut out = BufWriter::new();
        out.write_buf(b"wvpk");
        out.write_u32(24 + 64);
        out.write_u16(0x410);
        out.write_u8(0);
        out.write_u8(0);
        out.write_u32(total_samples);
        out.write_u32(0);
        out.write_u32(total_samples);
        out.write_u32(flags);
        out.write_u32(0);
        out.write_buf(&[0x3c; 64]);
        out.into_inner()
    }

    #[test]
    fn verify_properties() {
        // Rate index 9 (44100 Hz), stereo, 2 bytes per sample.
        let flags = (9 << 23) | 0x01;
        let buf = build_wavpack_block(44100 * 7, flags);

        let file = WavPackFile::read(&buf, &ReadOptions::default()).unwrap();
        let props = file.properties().unwrap();

        assert_eq!(props.sample_rate, 44100);
        assert_eq!(props.channels, 2);
        assert_eq!(props.bits_per_sample, Some(16));
        assert!((props.duration_secs.unwrap() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn verify_tag_edit_preserves_audio() {
        let flags = (10 << 23) | 0x04;
        let buf = build_wavpack_block(1000, flags);

        let mut file = WavPackFile::read(&buf, &ReadOptions::default()).unwrap();
        file.tags_mut().ape_mut().set_text("Title", "WavPack Title").unwrap();

        let rendered = file.render();
        let reread = WavPackFile::read(&rendered, &ReadOptions::default()).unwrap();

        assert_eq!(reread.ape().unwrap().text("Title"), Some("WavPack Title"));
        assert_eq!(reread.tags().audio, buf);
        assert_eq!(reread.properties().unwrap().channels, 1);
    }

    #[test]
    fn verify_bad_marker_rejected() {
        assert!(WavPackFile::read(b"MAC \x90\x0f", &ReadOptions::default()).is_err());
    }
}
