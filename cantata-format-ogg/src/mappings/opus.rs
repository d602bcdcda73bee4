// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Opus-in-OGG mapping (RFC 7845).
//!
//! An Opus logical stream opens with two header packets: `OpusHead` and `OpusTags`. The granule
//! position counts output samples at 48 kHz, and the encoder pre-skip is subtracted when
//! deriving the duration.

use cantata_core::errors::{
    invalid_field_error, invalid_magic_error, invalid_version_error, truncated_error, Result,
};
use cantata_core::io::{BufReader, BufWriter, FiniteStream, ReadBytes};
use cantata_core::meta::{AudioProperties, ReadOptions};

use cantata_metadata::vorbis::VorbisComment;

use crate::physical::{assemble_packets, audio_pages_after, rewrite_stream, OwnedPage, PhysicalStream};

/// The signature of an Opus identification packet.
const OPUS_HEAD_SIGNATURE: &[u8; 8] = b"OpusHead";

/// The signature of an Opus metadata packet.
const OPUS_TAGS_SIGNATURE: &[u8; 8] = b"OpusTags";

/// The minimum size of an identification packet.
const OPUS_HEAD_MIN_SIZE: usize = 19;

/// The maximum supported encapsulation version. The version is split into 4-bit major and minor
/// sub-fields; all minor revisions of major version 0 are compatible.
const OPUS_MAPPING_VERSION_MAX: u8 = 0x0f;

/// The Opus granule position rate in Hz.
const OPUS_SAMPLE_RATE: u32 = 48_000;

/// A parsed `OpusHead` identification header.
#[derive(Clone, Debug)]
pub struct OpusHead {
    /// The encapsulation version.
    pub version: u8,
    /// The output channel count.
    pub channels: u8,
    /// Encoder delay in 48 kHz samples, subtracted from the granule position.
    pub pre_skip: u16,
    /// The sample rate of the original input, informational only.
    pub input_sample_rate: u32,
    /// The output gain in Q7.8 dB.
    pub output_gain: i16,
    /// The channel mapping family.
    pub mapping_family: u8,
    /// The packet bytes, preserved for byte-for-byte rewriting.
    raw: Vec<u8>,
}

impl OpusHead {
    /// Parse and validate an `OpusHead` packet.
    pub fn read(packet: &[u8]) -> Result<OpusHead> {
        if packet.len() < OPUS_HEAD_MIN_SIZE {
            return truncated_error("ogg (opus): identification packet too small");
        }

        let mut reader = BufReader::new(packet);

        let mut signature = [0u8; 8];
        reader.read_buf_exact(&mut signature)?;

        if signature != *OPUS_HEAD_SIGNATURE {
            return invalid_magic_error("ogg (opus): missing OpusHead signature");
        }

        let version = reader.read_u8()?;

        if version > OPUS_MAPPING_VERSION_MAX {
            return invalid_version_error("ogg (opus): unsupported OpusHead version");
        }

        let channels = reader.read_u8()?;

        if channels == 0 {
            return invalid_field_error("ogg (opus): channel count is zero");
        }

        let pre_skip = reader.read_u16()?;
        let input_sample_rate = reader.read_u32()?;
        let output_gain = reader.read_u16()? as i16;
        let mapping_family = reader.read_u8()?;

        match mapping_family {
            0 => {
                // The RTP mapping supports mono and stereo only.
                if channels > 2 {
                    return invalid_field_error(
                        "ogg (opus): too many channels for mapping family 0",
                    );
                }
            }
            1 => {
                // The Vorbis mapping supports up to 8 channels.
                if channels > 8 {
                    return invalid_field_error(
                        "ogg (opus): too many channels for mapping family 1",
                    );
                }
            }
            // Families 2 through 254 are reserved.
            2..=254 => {
                return invalid_field_error("ogg (opus): reserved channel mapping family")
            }
            255 => (),
        }

        // Any family other than 0 carries a channel mapping table.
        if mapping_family > 0 {
            if reader.bytes_available() < 2 + u64::from(channels) {
                return truncated_error("ogg (opus): missing channel mapping table");
            }

            let stream_count = reader.read_u8()?;

            if stream_count == 0 {
                return invalid_field_error("ogg (opus): stream count is zero");
            }

            let coupled_count = reader.read_u8()?;

            if coupled_count > stream_count {
                return invalid_field_error(
                    "ogg (opus): coupled stream count exceeds stream count",
                );
            }

            reader.ignore_bytes(u64::from(channels))?;
        }

        Ok(OpusHead {
            version,
            channels,
            pre_skip,
            input_sample_rate,
            output_gain,
            mapping_family,
            raw: packet.to_vec(),
        })
    }

    /// The packet bytes as read.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

/// An OGG Opus file.
pub struct OggOpusFile {
    serial: u32,
    head: OpusHead,
    comment: VorbisComment,
    audio_pages: Vec<OwnedPage>,
    last_granule: Option<u64>,
}

impl OggOpusFile {
    /// Read an OGG Opus file from a buffer.
    pub fn read(buf: &[u8], opts: &ReadOptions) -> Result<OggOpusFile> {
        let stream = PhysicalStream::read(buf, opts)?;
        let packets = assemble_packets(&stream, opts)?;

        if packets.len() < 2 {
            return invalid_field_error("ogg (opus): missing header packets");
        }

        let head = OpusHead::read(&packets[0].data)?;
        let comment = read_opus_tags(&packets[1].data, opts)?;

        let audio_pages = audio_pages_after(&stream, &packets, 2)?.to_vec();

        Ok(OggOpusFile {
            serial: stream.serial,
            head,
            comment,
            audio_pages,
            last_granule: stream.last_granule(),
        })
    }

    /// Render the file.
    ///
    /// The `OpusHead` packet is re-emitted byte-for-byte, the `OpusTags` packet is rebuilt, and
    /// the audio pages are renumbered with recomputed checksums.
    pub fn render(&self) -> Vec<u8> {
        let mut tags_packet = BufWriter::new();
        tags_packet.write_buf(OPUS_TAGS_SIGNATURE);
        self.comment.write(&mut tags_packet);

        rewrite_stream(
            self.serial,
            &[vec![self.head.raw.clone()], vec![tags_packet.into_inner()]],
            &self.audio_pages,
        )
    }

    /// The parsed `OpusHead` header.
    pub fn head(&self) -> &OpusHead {
        &self.head
    }

    /// The audio properties. Opus always decodes at 48 kHz; the duration is the final granule
    /// position less the encoder pre-skip.
    pub fn properties(&self) -> Option<AudioProperties> {
        let duration_secs = self.last_granule.map(|granule| {
            granule.saturating_sub(u64::from(self.head.pre_skip)) as f64
                / f64::from(OPUS_SAMPLE_RATE)
        });

        Some(AudioProperties {
            sample_rate: OPUS_SAMPLE_RATE,
            channels: u32::from(self.head.channels),
            bits_per_sample: None,
            duration_secs,
        })
    }

    /// The comment carried by the `OpusTags` packet.
    pub fn comment(&self) -> &VorbisComment {
        &self.comment
    }

    /// The comment, mutable for editing.
    pub fn comment_mut(&mut self) -> &mut VorbisComment {
        &mut self.comment
    }
}

/// Parse the `OpusTags` packet. Unlike the Vorbis comment header, there is no framing bit.
fn read_opus_tags(packet: &[u8], opts: &ReadOptions) -> Result<VorbisComment> {
    if packet.len() < 8 {
        return truncated_error("ogg (opus): metadata packet too small");
    }

    if &packet[0..8] != OPUS_TAGS_SIGNATURE {
        return invalid_magic_error("ogg (opus): missing OpusTags signature");
    }

    VorbisComment::read(&mut BufReader::new(&packet[8..]), opts)
}

#[cfg(test)]
mod tests {
    use cantata_core::errors::Error;

    use super::*;
    use crate::page::PageHeader;

    fn build_opus_head(version: u8, channels: u8, pre_skip: u16, mapping_family: u8) -> Vec<u8> {
        let mut out = BufWriter::new();
        out.write_buf(OPUS_HEAD_SIGNATURE);
        out.write_u8(version);
        out.write_u8(channels);
        out.write_u16(pre_skip);
        out.write_u32(48_000);
        out.write_u16(0);
        out.write_u8(mapping_family);

        if mapping_family > 0 {
            out.write_u8(1);
            out.write_u8(if channels > 1 { 1 } else { 0 });
            for channel in 0..channels {
                out.write_u8(channel);
            }
        }

        out.into_inner()
    }

    fn build_file(head: Vec<u8>, comment: &VorbisComment, audio_pages: &[OwnedPage]) -> Vec<u8> {
        let mut tags = BufWriter::new();
        tags.write_buf(OPUS_TAGS_SIGNATURE);
        comment.write(&mut tags);

        rewrite_stream(0x600df00d, &[vec![head], vec![tags.into_inner()]], audio_pages)
    }

    fn audio_page(absgp: u64, eos: bool) -> OwnedPage {
        OwnedPage {
            header: PageHeader { absgp, is_last_page: eos, ..Default::default() },
            segment_table: vec![2],
            body: vec![0xf8, 0x00],
        }
    }

    #[test]
    fn verify_version_gate() {
        // Versions 0 through 15 are accepted.
        for version in [0u8, 1, 15] {
            assert!(OpusHead::read(&build_opus_head(version, 2, 312, 0)).is_ok());
        }

        // Versions 16 and up are rejected, with an error mentioning the version.
        for version in [16u8, 50, 100, 255] {
            match OpusHead::read(&build_opus_head(version, 2, 312, 0)) {
                Err(Error::InvalidVersion(msg)) => assert!(msg.contains("version")),
                _ => panic!("expected version rejection"),
            }
        }
    }

    #[test]
    fn verify_head_validation() {
        // Too small.
        assert!(OpusHead::read(&[0; 18]).is_err());
        // Zero channels.
        assert!(OpusHead::read(&build_opus_head(1, 0, 0, 0)).is_err());
        // Family 0 supports at most 2 channels.
        assert!(OpusHead::read(&build_opus_head(1, 3, 0, 0)).is_err());
        // Family 1 supports at most 8 channels.
        assert!(OpusHead::read(&build_opus_head(1, 9, 0, 1)).is_err());
        // Families 2 through 254 are reserved.
        assert!(OpusHead::read(&build_opus_head(1, 2, 0, 2)).is_err());
        assert!(OpusHead::read(&build_opus_head(1, 2, 0, 254)).is_err());
        // A family > 0 without its mapping table.
        let truncated = build_opus_head(1, 2, 0, 1);
        assert!(OpusHead::read(&truncated[..19]).is_err());
        // A valid multichannel head.
        assert!(OpusHead::read(&build_opus_head(1, 6, 312, 1)).is_ok());
    }

    #[test]
    fn verify_duration_subtracts_pre_skip() {
        let head = build_opus_head(1, 2, 312, 0);
        let buf = build_file(head, &VorbisComment::new(), &[audio_page(480_312, true)]);

        let file = OggOpusFile::read(&buf, &ReadOptions::default()).unwrap();
        let props = file.properties().unwrap();

        assert_eq!(props.sample_rate, 48_000);
        assert!((props.duration_secs.unwrap() - 10.0).abs() < 0.01);
    }

    #[test]
    fn verify_duration_clamps_to_zero() {
        let head = build_opus_head(1, 2, 312, 0);
        let buf = build_file(head, &VorbisComment::new(), &[audio_page(100, true)]);

        let file = OggOpusFile::read(&buf, &ReadOptions::default()).unwrap();
        assert_eq!(file.properties().unwrap().duration_secs, Some(0.0));
    }

    #[test]
    fn verify_rewrite_preserves_opus_head() {
        let head = build_opus_head(1, 2, 312, 0);
        let buf = build_file(head.clone(), &VorbisComment::new(), &[audio_page(960, true)]);

        let mut file = OggOpusFile::read(&buf, &ReadOptions::default()).unwrap();
        file.comment_mut().set_field("TITLE", "Rewritten").unwrap();

        let reread = OggOpusFile::read(&file.render(), &ReadOptions::default()).unwrap();

        assert_eq!(reread.head().as_bytes(), head.as_slice());
        assert_eq!(reread.comment().get("TITLE"), Some("Rewritten"));
        assert_eq!(reread.audio_pages.len(), 1);
        assert_eq!(reread.audio_pages[0].body, vec![0xf8, 0x00]);
    }
}
