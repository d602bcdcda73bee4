// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The AIFF/AIFC (`FORM`) dispatcher.
//!
//! AIFF is the big-endian sibling of RIFF: a `FORM` chunk of type `AIFF` or `AIFC` containing a
//! `COMM` chunk with the audio description, an `SSND` chunk with the sample data, and
//! optionally an `ID3 ` chunk with an embedded ID3v2 tag.

use cantata_core::errors::{invalid_magic_error, Result};
use cantata_core::io::BufWriter;
use cantata_core::meta::{AudioProperties, ReadOptions};

use cantata_metadata::id3v2::{self, Id3v2Tag};

use log::warn;

use crate::chunks::{read_chunks, write_chunk, ByteOrder, CommonChunk, RawChunk};

const FORM_MARKER: [u8; 4] = *b"FORM";
const AIFF_FORM: [u8; 4] = *b"AIFF";
const AIFC_FORM: [u8; 4] = *b"AIFC";

const COMM_CHUNK: [u8; 4] = *b"COMM";
const SSND_CHUNK: [u8; 4] = *b"SSND";
const ID3_CHUNK_UPPER: [u8; 4] = *b"ID3 ";
const ID3_CHUNK_LOWER: [u8; 4] = *b"id3 ";

fn is_id3_chunk(chunk: &RawChunk) -> bool {
    chunk.is(&ID3_CHUNK_UPPER) || chunk.is(&ID3_CHUNK_LOWER)
}

/// A parsed AIFF or AIFC file.
pub struct AiffFile {
    /// Every chunk of the original file, in order. The ID3 chunk is replaced on render.
    chunks: Vec<RawChunk>,
    /// The form type: `AIFF` or `AIFC`.
    form_type: [u8; 4],
    common: Option<CommonChunk>,
    id3v2: Option<Id3v2Tag>,
    id3_chunk_id: [u8; 4],
}

impl AiffFile {
    /// Read an AIFF file from a buffer.
    pub fn read(buf: &[u8], opts: &ReadOptions) -> Result<AiffFile> {
        if buf.len() < 12 || buf[0..4] != FORM_MARKER {
            return invalid_magic_error("aiff: missing FORM marker");
        }

        let form_type = [buf[8], buf[9], buf[10], buf[11]];

        if form_type != AIFF_FORM && form_type != AIFC_FORM {
            return invalid_magic_error("aiff: form type is not AIFF or AIFC");
        }

        let is_aifc = form_type == AIFC_FORM;

        let chunks = read_chunks(&buf[12..], ByteOrder::BigEndian)?;

        let mut common = None;
        let mut id3v2 = None;
        let mut id3_chunk_id = ID3_CHUNK_UPPER;

        for chunk in &chunks {
            if chunk.is(&COMM_CHUNK) {
                common = Some(CommonChunk::read(&chunk.data, is_aifc)?);
            }
            else if is_id3_chunk(chunk) && id3v2.is_none() {
                id3_chunk_id = chunk.id;

                match Id3v2Tag::read(&chunk.data, opts) {
                    Ok(tag) => id3v2 = Some(tag),
                    Err(err) => warn!("aiff: ignoring malformed id3v2 chunk: {}", err),
                }
            }
        }

        Ok(AiffFile { chunks, form_type, common, id3v2, id3_chunk_id })
    }

    /// Render the file with edits applied. Chunks other than the ID3 chunk are emitted verbatim
    /// in their original positions.
    pub fn render(&self) -> Result<Vec<u8>> {
        let id3_chunk = match &self.id3v2 {
            Some(tag) if !tag.frames().is_empty() => {
                Some(id3v2::render(tag, &Default::default())?)
            }
            _ => None,
        };

        let mut body = BufWriter::new();
        let mut wrote_id3 = false;

        for chunk in &self.chunks {
            if is_id3_chunk(chunk) {
                if !wrote_id3 {
                    if let Some(rendered) = &id3_chunk {
                        write_chunk(&mut body, &chunk.id, rendered, ByteOrder::BigEndian);
                    }
                    wrote_id3 = true;
                }
            }
            else {
                write_chunk(&mut body, &chunk.id, &chunk.data, ByteOrder::BigEndian);
            }
        }

        if !wrote_id3 {
            if let Some(rendered) = &id3_chunk {
                write_chunk(&mut body, &self.id3_chunk_id, rendered, ByteOrder::BigEndian);
            }
        }

        let body = body.into_inner();

        let mut out = BufWriter::with_capacity(12 + body.len());
        out.write_buf(&FORM_MARKER);
        out.write_be_u32(4 + body.len() as u32);
        out.write_buf(&self.form_type);
        out.write_buf(&body);

        Ok(out.into_inner())
    }

    /// Every chunk of the original file, in order.
    pub fn chunks(&self) -> &[RawChunk] {
        &self.chunks
    }

    /// The decoded `COMM` chunk.
    pub fn common(&self) -> Option<&CommonChunk> {
        self.common.as_ref()
    }

    /// The audio properties derived from the `COMM` chunk.
    pub fn properties(&self) -> Option<AudioProperties> {
        let common = self.common.as_ref()?;

        if common.sample_rate <= 0.0 || common.channels == 0 {
            return None;
        }

        Some(AudioProperties {
            sample_rate: common.sample_rate as u32,
            channels: u32::from(common.channels),
            bits_per_sample: Some(u32::from(common.bits_per_sample)),
            duration_secs: Some(f64::from(common.sample_frames) / common.sample_rate),
        })
    }

    /// The embedded ID3v2 tag, if present.
    pub fn id3v2(&self) -> Option<&Id3v2Tag> {
        self.id3v2.as_ref()
    }

    /// The embedded ID3v2 tag, created empty when absent.
    pub fn id3v2_mut(&mut self) -> &mut Id3v2Tag {
        self.id3v2.get_or_insert_with(Id3v2Tag::new)
    }
}

#[cfg(test)]
mod tests {
    use crate::chunks::encode_extended_rate;

    use super::*;

    fn build_comm() -> Vec<u8> {
        let mut out = BufWriter::new();
        out.write_be_u16(2);
        out.write_be_u32(48000 * 2);
        out.write_be_u16(24);
        out.write_buf(&encode_extended_rate(48000.0));
        out.into_inner()
    }

    fn build_aiff(extra: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut body = BufWriter::new();

        write_chunk(&mut body, b"COMM", &build_comm(), ByteOrder::BigEndian);

        for (id, data) in extra {
            write_chunk(&mut body, id, data, ByteOrder::BigEndian);
        }

        // SSND: offset, block size, then sample data.
        let mut ssnd = BufWriter::new();
        ssnd.write_be_u32(0);
        ssnd.write_be_u32(0);
        ssnd.write_buf(&[0x77; 600]);
        write_chunk(&mut body, b"SSND", ssnd.as_slice(), ByteOrder::BigEndian);

        let body = body.into_inner();

        let mut out = BufWriter::new();
        out.write_buf(b"FORM");
        out.write_be_u32(4 + body.len() as u32);
        out.write_buf(b"AIFF");
        out.write_buf(&body);
        out.into_inner()
    }

    #[test]
    fn verify_read_properties() {
        let buf = build_aiff(&[]);
        let aiff = AiffFile::read(&buf, &ReadOptions::default()).unwrap();

        let props = aiff.properties().unwrap();
        assert_eq!(props.sample_rate, 48000);
        assert_eq!(props.channels, 2);
        assert_eq!(props.bits_per_sample, Some(24));
        assert!((props.duration_secs.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn verify_id3_edit_preserves_sound_data() {
        let name = b"named tune\0";

        let buf = build_aiff(&[(b"NAME", name)]);

        let mut aiff = AiffFile::read(&buf, &ReadOptions::default()).unwrap();
        aiff.id3v2_mut().set_title("Tagged");
        aiff.id3v2_mut().set_track(Some(2), Some(9));

        let reread = AiffFile::read(&aiff.render().unwrap(), &ReadOptions::default()).unwrap();

        assert_eq!(reread.id3v2().unwrap().title(), Some("Tagged"));
        assert_eq!(reread.id3v2().unwrap().track(), Some(2));

        // The NAME and SSND chunks are untouched.
        let reread_name = reread.chunks().iter().find(|c| c.is(b"NAME")).unwrap();
        assert_eq!(reread_name.data, name);

        let ssnd = reread.chunks().iter().find(|c| c.is(b"SSND")).unwrap();
        assert_eq!(&ssnd.data[8..], &[0x77; 600]);
    }

    #[test]
    fn verify_bad_form_rejected() {
        assert!(AiffFile::read(b"RIFF\x00\x00\x00\x00WAVE", &ReadOptions::default()).is_err());
        assert!(AiffFile::read(b"FORM\x00\x00\x00\x00WAVE", &ReadOptions::default()).is_err());
    }
}
