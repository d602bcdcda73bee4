// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Musepack dispatcher.
//!
//! Stream version 7 (`MP+`) headers are probed for audio properties. Stream version 8 (`MPCK`)
//! files are packetized; their tags are read and written, but no properties are probed.

use cantata_core::errors::{invalid_magic_error, Result};
use cantata_core::io::{BufReader, ReadBytes};
use cantata_core::meta::{AudioProperties, ReadOptions};

use cantata_metadata::ape::ApeTag;
use cantata_metadata::id3v1::Id3v1Tag;

use crate::tail::TaggedStream;

/// The stream version 7 marker.
const MPC_SV7_MARKER: [u8; 3] = *b"MP+";

/// The stream version 8 marker.
const MPC_SV8_MARKER: [u8; 4] = *b"MPCK";

/// Samples per SV7 frame.
const MPC_FRAME_SAMPLES: u32 = 1152;

/// Sample rates indexed by the SV7 header rate field.
const MPC_SAMPLE_RATES: [u32; 4] = [44100, 48000, 37800, 32000];

/// Properties probed from an SV7 stream header.
#[derive(Copy, Clone, Debug)]
struct Sv7Header {
    frame_count: u32,
    sample_rate: u32,
}

impl Sv7Header {
    fn read(buf: &[u8]) -> Result<Option<Sv7Header>> {
        let mut reader = BufReader::new(buf);

        let mut marker = [0u8; 3];
        reader.read_buf_exact(&mut marker)?;

        if marker != MPC_SV7_MARKER {
            return Ok(None);
        }

        // The low nibble of the next byte is the stream version.
        let version = reader.read_u8()? & 0x0f;

        if version != 7 {
            return Ok(None);
        }

        let frame_count = reader.read_u32()?;

        // The flags word carries the sample rate index in bits 16 and 17.
        let flags = reader.read_u32()?;
        let sample_rate = MPC_SAMPLE_RATES[((flags >> 16) & 0x03) as usize];

        Ok(Some(Sv7Header { frame_count, sample_rate }))
    }
}

/// A parsed Musepack file.
pub struct MusepackFile {
    stream: TaggedStream,
    header: Option<Sv7Header>,
}

impl MusepackFile {
    /// Read a Musepack file from a buffer.
    pub fn read(buf: &[u8], _opts: &ReadOptions) -> Result<MusepackFile> {
        let is_sv7 = buf.len() >= 4 && buf[0..3] == MPC_SV7_MARKER;
        let is_sv8 = buf.len() >= 4 && buf[0..4] == MPC_SV8_MARKER;

        if !is_sv7 && !is_sv8 {
            return invalid_magic_error("mpc: missing MP+ or MPCK stream marker");
        }

        let stream = TaggedStream::read(buf)?;

        let header = if is_sv7 { Sv7Header::read(&stream.audio)? } else { None };

        Ok(MusepackFile { stream, header })
    }

    /// Render the file: the audio verbatim, followed by the present tags.
    pub fn render(&self) -> Vec<u8> {
        self.stream.render()
    }

    /// The audio properties, for SV7 streams. Musepack is always two channel.
    pub fn properties(&self) -> Option<AudioProperties> {
        let header = self.header.as_ref()?;

        let total_samples = u64::from(header.frame_count) * u64::from(MPC_FRAME_SAMPLES);

        Some(AudioProperties {
            sample_rate: header.sample_rate,
            channels: 2,
            bits_per_sample: None,
            duration_secs: Some(total_samples as f64 / f64::from(header.sample_rate)),
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

    fn build_sv7() -> Vec<u8> {
        let mut out = BufWriter::new();
        out.write_buf(b"MP+");
        out.write_u8(0x17);
        out.write_u32(1000);
        // Sample rate index 1: 48000 Hz.
        out.write_u32(1 << 16);
        out.write_buf(&[0x44; 64]);
        out.into_inner()
    }

    #[test]
    fn verify_sv7_properties() {
        let buf = build_sv7();
        let file = MusepackFile::read(&buf, &ReadOptions::default()).unwrap();

        let props = file.properties().unwrap();
        assert_eq!(props.sample_rate, 48000);
        assert_eq!(props.channels, 2);
        assert!((props.duration_secs.unwrap() - 1000.0 * 1152.0 / 48000.0).abs() < 1e-9);
    }

    #[test]
    fn verify_sv8_reads_tags_without_properties() {
        let mut buf = b"MPCK".to_vec();
        buf.extend_from_slice(&[0x10; 100]);

        let mut tag = ApeTag::new();
        tag.set_text("Title", "SV8").unwrap();
        buf.extend_from_slice(&tag.render());

        let file = MusepackFile::read(&buf, &ReadOptions::default()).unwrap();

        assert!(file.properties().is_none());
        assert_eq!(file.ape().unwrap().text("Title"), Some("SV8"));
    }

    #[test]
    fn verify_tag_round_trip() {
        let buf = build_sv7();

        let mut file = MusepackFile::read(&buf, &ReadOptions::default()).unwrap();
        file.tags_mut().ape_mut().set_text("Genre", "Chiptune").unwrap();

        let reread = MusepackFile::read(&file.render(), &ReadOptions::default()).unwrap();
        assert_eq!(reread.ape().unwrap().text("Genre"), Some("Chiptune"));
        assert_eq!(reread.tags().audio, buf);
    }

    #[test]
    fn verify_bad_marker_rejected() {
        assert!(MusepackFile::read(b"OggS", &ReadOptions::default()).is_err());
    }
}
