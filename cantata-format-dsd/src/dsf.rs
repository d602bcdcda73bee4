// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The DSF (DSD Stream File) dispatcher, based on the DSF specification v1.01.

use cantata_core::errors::{
    invalid_field_error, invalid_magic_error, invalid_version_error, unsupported_error, Result,
};
use cantata_core::io::{BufReader, ReadBytes};
use cantata_core::meta::{AudioProperties, ReadOptions};

use cantata_metadata::id3v2::{self, Id3v2Tag};

use log::{debug, warn};

/// The DSF file marker.
const DSF_MAGIC: [u8; 4] = *b"DSD ";

/// The format chunk identifier.
const DSF_FMT_MAGIC: [u8; 4] = *b"fmt ";

/// The total size of the `DSD ` header chunk.
const DSF_HEADER_CHUNK_SIZE: u64 = 28;

/// The total size of the `fmt ` chunk.
const DSF_FMT_CHUNK_SIZE: u64 = 52;

/// The DSF format chunk.
#[derive(Copy, Clone, Debug)]
pub struct DsfFormat {
    /// Format version, always 1.
    pub format_version: u32,
    /// Format identifier, 0 for raw DSD.
    pub format_id: u32,
    /// The number of channels.
    pub channels: u32,
    /// The sampling frequency: 2822400, 5644800, 11289600, or 22579200.
    pub sample_rate: u32,
    /// Bits per sample, 1 or 8.
    pub bits_per_sample: u32,
    /// The number of samples per channel.
    pub sample_count: u64,
    /// The block size per channel in bytes.
    pub block_size_per_channel: u32,
}

impl DsfFormat {
    fn read<B: ReadBytes>(reader: &mut B) -> Result<DsfFormat> {
        let chunk_id = reader.read_quad_bytes()?;

        if chunk_id != DSF_FMT_MAGIC {
            return invalid_magic_error("dsf: invalid format chunk id");
        }

        let chunk_size = reader.read_u64()?;

        if chunk_size != DSF_FMT_CHUNK_SIZE {
            return invalid_field_error("dsf: invalid format chunk size");
        }

        let format_version = reader.read_u32()?;
        let format_id = reader.read_u32()?;
        let _channel_type = reader.read_u32()?;
        let channels = reader.read_u32()?;
        let sample_rate = reader.read_u32()?;
        let bits_per_sample = reader.read_u32()?;
        let sample_count = reader.read_u64()?;
        let block_size_per_channel = reader.read_u32()?;

        // Reserved.
        reader.read_u32()?;

        debug!(
            "dsf: version={}, channels={}, rate={}, bps={}, samples={}",
            format_version, channels, sample_rate, bits_per_sample, sample_count
        );

        if format_version != 1 {
            return invalid_version_error("dsf: unsupported format version");
        }

        if format_id != 0 {
            return unsupported_error("dsf: only raw DSD is supported");
        }

        if bits_per_sample != 1 && bits_per_sample != 8 {
            return invalid_field_error("dsf: invalid bits per sample");
        }

        Ok(DsfFormat {
            format_version,
            format_id,
            channels,
            sample_rate,
            bits_per_sample,
            sample_count,
            block_size_per_channel,
        })
    }
}

/// A parsed DSF file.
pub struct DsfFile {
    /// The header, format chunk, and audio data, byte-for-byte. The file-size and
    /// metadata-pointer fields are patched on render.
    audio: Vec<u8>,
    format: DsfFormat,
    id3v2: Option<Id3v2Tag>,
}

impl DsfFile {
    /// Read a DSF file from a buffer.
    pub fn read(buf: &[u8], opts: &ReadOptions) -> Result<DsfFile> {
        let mut reader = BufReader::new(buf);

        let magic = reader.read_quad_bytes()?;

        if magic != DSF_MAGIC {
            return invalid_magic_error("dsf: invalid magic number");
        }

        let chunk_size = reader.read_u64()?;

        if chunk_size != DSF_HEADER_CHUNK_SIZE {
            return invalid_field_error("dsf: invalid header chunk size");
        }

        let file_size = reader.read_u64()?;
        let metadata_ptr = reader.read_u64()?;

        if file_size as usize > buf.len() {
            warn!("dsf: header file size exceeds actual file size");
        }

        let format = DsfFormat::read(&mut reader)?;

        // The metadata pointer addresses the trailing ID3v2 tag, 0 when there is none.
        let audio_end = if metadata_ptr != 0 {
            if metadata_ptr as usize > buf.len() || metadata_ptr < DSF_HEADER_CHUNK_SIZE {
                return invalid_field_error("dsf: metadata pointer is out of bounds");
            }
            metadata_ptr as usize
        }
        else {
            buf.len()
        };

        let id3v2 = if metadata_ptr != 0 {
            match Id3v2Tag::read(&buf[metadata_ptr as usize..], opts) {
                Ok(tag) => Some(tag),
                Err(err) => {
                    warn!("dsf: ignoring malformed metadata: {}", err);
                    None
                }
            }
        }
        else {
            None
        };

        Ok(DsfFile { audio: buf[..audio_end].to_vec(), format, id3v2 })
    }

    /// Render the file: the audio bytes verbatim, the tag appended, and the header's file-size
    /// and metadata-pointer fields updated.
    pub fn render(&self) -> Result<Vec<u8>> {
        let mut out = self.audio.clone();

        let metadata_ptr = match &self.id3v2 {
            Some(tag) if !tag.frames().is_empty() => {
                let rendered = id3v2::render(tag, &Default::default())?;
                let ptr = out.len() as u64;
                out.extend_from_slice(&rendered);
                ptr
            }
            _ => 0,
        };

        let file_size = out.len() as u64;
        out[12..20].copy_from_slice(&file_size.to_le_bytes());
        out[20..28].copy_from_slice(&metadata_ptr.to_le_bytes());

        Ok(out)
    }

    /// The parsed format chunk.
    pub fn format(&self) -> &DsfFormat {
        &self.format
    }

    /// The audio properties from the format chunk.
    pub fn properties(&self) -> Option<AudioProperties> {
        let format = &self.format;

        if format.sample_rate == 0 || format.channels == 0 {
            return None;
        }

        Some(AudioProperties {
            sample_rate: format.sample_rate,
            channels: format.channels,
            bits_per_sample: Some(format.bits_per_sample),
            duration_secs: Some(format.sample_count as f64 / f64::from(format.sample_rate)),
        })
    }

    /// The trailing ID3v2 tag, if present.
    pub fn id3v2(&self) -> Option<&Id3v2Tag> {
        self.id3v2.as_ref()
    }

    /// The trailing ID3v2 tag, created empty when absent.
    pub fn id3v2_mut(&mut self) -> &mut Id3v2Tag {
        self.id3v2.get_or_insert_with(Id3v2Tag::new)
    }
}

#[cfg(test)]
mod tests {
    use cantata_core::io::BufWriter;

    use super::*;

    fn build_dsf(with_tag: Option<&Id3v2Tag>) -> Vec<u8> {
        let mut out = BufWriter::new();

        // DSD header chunk; the file size and metadata pointer are patched below.
        out.write_buf(b"DSD ");
        out.write_u64(28);
        out.write_u64(0);
        out.write_u64(0);

        // Format chunk.
        out.write_buf(b"fmt ");
        out.write_u64(52);
        out.write_u32(1);
        out.write_u32(0);
        out.write_u32(2);
        out.write_u32(2);
        out.write_u32(2_822_400);
        out.write_u32(1);
        out.write_u64(2_822_400 * 5);
        out.write_u32(4096);
        out.write_u32(0);

        // Data chunk.
        let audio = [0x69u8; 256];
        out.write_buf(b"data");
        out.write_u64(12 + audio.len() as u64);
        out.write_buf(&audio);

        let metadata_ptr = match with_tag {
            Some(tag) => {
                let ptr = out.len() as u64;
                out.write_buf(&id3v2::render(tag, &Default::default()).unwrap());
                ptr
            }
            None => 0,
        };

        let file_size = out.len() as u64;
        out.patch_u64(12, file_size);
        out.patch_u64(20, metadata_ptr);

        out.into_inner()
    }

    #[test]
    fn verify_read_properties() {
        let buf = build_dsf(None);
        let dsf = DsfFile::read(&buf, &ReadOptions::default()).unwrap();

        let props = dsf.properties().unwrap();
        assert_eq!(props.sample_rate, 2_822_400);
        assert_eq!(props.channels, 2);
        assert_eq!(props.bits_per_sample, Some(1));
        assert!((props.duration_secs.unwrap() - 5.0).abs() < 1e-9);
        assert!(dsf.id3v2().is_none());
    }

    #[test]
    fn verify_tag_add_updates_pointer() {
        let buf = build_dsf(None);

        let mut dsf = DsfFile::read(&buf, &ReadOptions::default()).unwrap();
        dsf.id3v2_mut().set_title("DSD Title");
        dsf.id3v2_mut().set_artist("DSD Artist");

        let rendered = dsf.render().unwrap();

        // The metadata pointer addresses the appended tag and the file size covers it.
        let metadata_ptr = u64::from_le_bytes(rendered[20..28].try_into().unwrap());
        let file_size = u64::from_le_bytes(rendered[12..20].try_into().unwrap());

        assert_eq!(metadata_ptr as usize, buf.len());
        assert_eq!(file_size as usize, rendered.len());

        let reread = DsfFile::read(&rendered, &ReadOptions::default()).unwrap();
        assert_eq!(reread.id3v2().unwrap().title(), Some("DSD Title"));

        // The audio region is untouched.
        assert_eq!(&rendered[..12], &buf[..12]);
        assert_eq!(&rendered[28..buf.len()], &buf[28..]);
    }

    #[test]
    fn verify_tag_removal_zeros_pointer() {
        let mut tag = Id3v2Tag::new();
        tag.set_title("x");

        let buf = build_dsf(Some(&tag));

        let mut dsf = DsfFile::read(&buf, &ReadOptions::default()).unwrap();
        assert_eq!(dsf.id3v2().unwrap().title(), Some("x"));

        dsf.id3v2_mut().remove_frames(*b"TIT2");

        let rendered = dsf.render().unwrap();
        assert_eq!(u64::from_le_bytes(rendered[20..28].try_into().unwrap()), 0);

        let reread = DsfFile::read(&rendered, &ReadOptions::default()).unwrap();
        assert!(reread.id3v2().is_none());
    }

    #[test]
    fn verify_bad_magic_rejected() {
        assert!(DsfFile::read(b"DSDXtrailing", &ReadOptions::default()).is_err());
    }

    #[test]
    fn verify_out_of_bounds_pointer_rejected() {
        let mut buf = build_dsf(None);
        // Point the metadata pointer past the end of the file.
        let bogus = (buf.len() as u64 + 100).to_le_bytes();
        buf[20..28].copy_from_slice(&bogus);

        assert!(DsfFile::read(&buf, &ReadOptions::default()).is_err());
    }
}
