// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The WAV (`RIFF`/`WAVE`) dispatcher.
//!
//! A WAV file may carry an ID3v2 tag in an `id3 ` (or `ID3 `) chunk and a RIFF `LIST INFO`
//! tag; both may coexist. On read, ID3v2 takes precedence for unified accessors; on rewrite,
//! both present tags are written back. All other chunks are preserved byte-for-byte in their
//! original order.

use cantata_core::errors::{invalid_magic_error, Result};
use cantata_core::io::BufWriter;
use cantata_core::meta::{AudioProperties, ReadOptions};

use cantata_metadata::bext::BextChunk;
use cantata_metadata::id3v2::{self, Id3v2Tag};
use cantata_metadata::riff_info::RiffInfo;

use log::warn;

use crate::chunks::{read_chunks, write_chunk, ByteOrder, RawChunk, WaveFormat};

const RIFF_MARKER: [u8; 4] = *b"RIFF";
const WAVE_FORM: [u8; 4] = *b"WAVE";

const FMT_CHUNK: [u8; 4] = *b"fmt ";
const DATA_CHUNK: [u8; 4] = *b"data";
const LIST_CHUNK: [u8; 4] = *b"LIST";
const BEXT_CHUNK: [u8; 4] = *b"bext";
const ID3_CHUNK_LOWER: [u8; 4] = *b"id3 ";
const ID3_CHUNK_UPPER: [u8; 4] = *b"ID3 ";

fn is_id3_chunk(chunk: &RawChunk) -> bool {
    chunk.is(&ID3_CHUNK_LOWER) || chunk.is(&ID3_CHUNK_UPPER)
}

fn is_info_chunk(chunk: &RawChunk) -> bool {
    chunk.is(&LIST_CHUNK) && chunk.data.len() >= 4 && &chunk.data[0..4] == b"INFO"
}

/// A parsed WAV file.
pub struct WavFile {
    /// Every chunk of the original file, in order. Tag chunks are replaced on render.
    chunks: Vec<RawChunk>,
    format: Option<WaveFormat>,
    data_len: Option<u64>,
    info: Option<RiffInfo>,
    id3v2: Option<Id3v2Tag>,
    /// The identifier spelling of the original ID3v2 chunk, kept on rewrite.
    id3_chunk_id: [u8; 4],
}

impl WavFile {
    /// Read a WAV file from a buffer.
    pub fn read(buf: &[u8], opts: &ReadOptions) -> Result<WavFile> {
        if buf.len() < 12 || buf[0..4] != RIFF_MARKER {
            return invalid_magic_error("wav: missing RIFF marker");
        }

        if buf[8..12] != WAVE_FORM {
            return invalid_magic_error("wav: missing WAVE form type");
        }

        // The declared form size is frequently wrong in the wild (streamed output pads it to
        // the maximum); read the chunks from the actual buffer extent instead.
        let chunks = read_chunks(&buf[12..], ByteOrder::LittleEndian)?;

        let mut format = None;
        let mut data_len = None;
        let mut info = None;
        let mut id3v2 = None;
        let mut id3_chunk_id = ID3_CHUNK_LOWER;

        for chunk in &chunks {
            if chunk.is(&FMT_CHUNK) {
                format = Some(WaveFormat::read(&chunk.data)?);
            }
            else if chunk.is(&DATA_CHUNK) {
                data_len = Some(chunk.data.len() as u64);
            }
            else if is_info_chunk(chunk) && info.is_none() {
                info = Some(RiffInfo::read(&chunk.data[4..])?);
            }
            else if is_id3_chunk(chunk) && id3v2.is_none() {
                id3_chunk_id = chunk.id;

                // A malformed embedded tag is not fatal to the file read.
                match Id3v2Tag::read(&chunk.data, opts) {
                    Ok(tag) => id3v2 = Some(tag),
                    Err(err) => warn!("wav: ignoring malformed id3v2 chunk: {}", err),
                }
            }
        }

        Ok(WavFile { chunks, format, data_len, info, id3v2, id3_chunk_id })
    }

    /// Render the file with edits applied.
    ///
    /// Chunks the editor does not touch are emitted verbatim in their original positions. Tag
    /// chunks are replaced in place, dropped when their tag was emptied, or appended at the end
    /// when newly added.
    pub fn render(&self) -> Result<Vec<u8>> {
        let info_chunk = match &self.info {
            Some(info) if !info.entries().is_empty() => Some(info.render()),
            _ => None,
        };

        let id3_chunk = match &self.id3v2 {
            Some(tag) if !tag.frames().is_empty() => {
                Some(id3v2::render(tag, &Default::default())?)
            }
            _ => None,
        };

        let mut body = BufWriter::new();
        let mut wrote_info = false;
        let mut wrote_id3 = false;

        for chunk in &self.chunks {
            if is_info_chunk(chunk) {
                if !wrote_info {
                    if let Some(rendered) = &info_chunk {
                        // The rendered LIST chunk already carries its own header.
                        body.write_buf(rendered);
                        body.align(2);
                    }
                    wrote_info = true;
                }
            }
            else if is_id3_chunk(chunk) {
                if !wrote_id3 {
                    if let Some(rendered) = &id3_chunk {
                        write_chunk(&mut body, &chunk.id, rendered, ByteOrder::LittleEndian);
                    }
                    wrote_id3 = true;
                }
            }
            else {
                write_chunk(&mut body, &chunk.id, &chunk.data, ByteOrder::LittleEndian);
            }
        }

        if !wrote_info {
            if let Some(rendered) = &info_chunk {
                body.write_buf(rendered);
                body.align(2);
            }
        }

        if !wrote_id3 {
            if let Some(rendered) = &id3_chunk {
                write_chunk(&mut body, &self.id3_chunk_id, rendered, ByteOrder::LittleEndian);
            }
        }

        let body = body.into_inner();

        let mut out = BufWriter::with_capacity(12 + body.len());
        out.write_buf(&RIFF_MARKER);
        out.write_u32(4 + body.len() as u32);
        out.write_buf(&WAVE_FORM);
        out.write_buf(&body);

        Ok(out.into_inner())
    }

    /// Every chunk of the original file, in order.
    pub fn chunks(&self) -> &[RawChunk] {
        &self.chunks
    }

    /// The decoded `fmt ` chunk.
    pub fn format(&self) -> Option<&WaveFormat> {
        self.format.as_ref()
    }

    /// The audio properties derived from the `fmt ` and `data` chunks.
    pub fn properties(&self) -> Option<AudioProperties> {
        let format = self.format.as_ref()?;

        if format.sample_rate == 0 || format.channels == 0 {
            return None;
        }

        let duration_secs = match (self.data_len, format.avg_bytes_per_sec) {
            (Some(len), rate) if rate > 0 => Some(len as f64 / f64::from(rate)),
            _ => None,
        };

        let bits = format
            .extensible
            .as_ref()
            .map(|ext| ext.valid_bits_per_sample)
            .unwrap_or(format.bits_per_sample);

        Some(AudioProperties {
            sample_rate: format.sample_rate,
            channels: u32::from(format.channels),
            bits_per_sample: if bits > 0 { Some(u32::from(bits)) } else { None },
            duration_secs,
        })
    }

    /// The RIFF INFO tag, if present.
    pub fn info(&self) -> Option<&RiffInfo> {
        self.info.as_ref()
    }

    /// The RIFF INFO tag, created empty when absent.
    pub fn info_mut(&mut self) -> &mut RiffInfo {
        self.info.get_or_insert_with(RiffInfo::new)
    }

    /// The embedded ID3v2 tag, if present.
    pub fn id3v2(&self) -> Option<&Id3v2Tag> {
        self.id3v2.as_ref()
    }

    /// The embedded ID3v2 tag, created empty when absent.
    pub fn id3v2_mut(&mut self) -> &mut Id3v2Tag {
        self.id3v2.get_or_insert_with(Id3v2Tag::new)
    }

    /// The decoded `bext` chunk, if present.
    pub fn bext(&self) -> Option<BextChunk> {
        self.chunks
            .iter()
            .find(|chunk| chunk.is(&BEXT_CHUNK))
            .and_then(|chunk| BextChunk::read(&chunk.data).ok())
    }

    /// Replaces or appends the `bext` chunk.
    pub fn set_bext(&mut self, bext: &BextChunk) {
        let data = bext.render();

        match self.chunks.iter_mut().find(|chunk| chunk.is(&BEXT_CHUNK)) {
            Some(chunk) => chunk.data = data,
            None => self.chunks.push(RawChunk { id: BEXT_CHUNK, data }),
        }
    }
}

#[cfg(test)]
mod tests {
    use cantata_core::meta::{StandardTagKey, TagLike, Value};

    use super::*;

    fn pcm_fmt() -> Vec<u8> {
        let mut out = BufWriter::new();
        out.write_u16(1);
        out.write_u16(2);
        out.write_u32(44100);
        out.write_u32(44100 * 4);
        out.write_u16(4);
        out.write_u16(16);
        out.into_inner()
    }

    fn build_wav(extra: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut body = BufWriter::new();

        write_chunk(&mut body, b"fmt ", &pcm_fmt(), ByteOrder::LittleEndian);

        for (id, data) in extra {
            write_chunk(&mut body, id, data, ByteOrder::LittleEndian);
        }

        write_chunk(&mut body, b"data", &[0x11; 1000], ByteOrder::LittleEndian);

        let body = body.into_inner();

        let mut out = BufWriter::new();
        out.write_buf(b"RIFF");
        out.write_u32(4 + body.len() as u32);
        out.write_buf(b"WAVE");
        out.write_buf(&body);
        out.into_inner()
    }

    #[test]
    fn verify_read_properties() {
        let buf = build_wav(&[]);
        let wav = WavFile::read(&buf, &ReadOptions::default()).unwrap();

        let props = wav.properties().unwrap();
        assert_eq!(props.sample_rate, 44100);
        assert_eq!(props.channels, 2);
        assert_eq!(props.bits_per_sample, Some(16));
    }

    #[test]
    fn verify_info_edit_preserves_other_chunks() {
        // A WAV with fact, cue, and smpl chunks that must survive byte-for-byte.
        let fact = [4, 0, 0, 0];
        let cue = [0u8; 28];
        let smpl = [0x22u8; 36];

        let buf = build_wav(&[(b"fact", &fact), (b"cue ", &cue), (b"smpl", &smpl)]);

        let mut wav = WavFile::read(&buf, &ReadOptions::default()).unwrap();
        wav.info_mut().set(StandardTagKey::TrackTitle, Value::from("Modified"));

        let rendered = wav.render().unwrap();
        let reread = WavFile::read(&rendered, &ReadOptions::default()).unwrap();

        // The five original chunks are still there, byte-identical.
        for (id, data) in [
            (*b"fmt ", pcm_fmt()),
            (*b"fact", fact.to_vec()),
            (*b"cue ", cue.to_vec()),
            (*b"smpl", smpl.to_vec()),
            (*b"data", vec![0x11; 1000]),
        ] {
            let chunk = reread.chunks().iter().find(|c| c.is(&id)).unwrap();
            assert_eq!(chunk.data, data, "chunk {:?} was altered", String::from_utf8_lossy(&id));
        }

        // And the INFO tag is present with the new title.
        assert_eq!(reread.info().unwrap().get_id(*b"INAM"), Some("Modified"));
    }

    #[test]
    fn verify_id3_and_info_coexist() {
        let buf = build_wav(&[]);

        let mut wav = WavFile::read(&buf, &ReadOptions::default()).unwrap();
        wav.id3v2_mut().set_title("From Id3");
        wav.info_mut().set_id(*b"INAM", "From Info");

        let reread = WavFile::read(&wav.render().unwrap(), &ReadOptions::default()).unwrap();

        assert_eq!(reread.id3v2().unwrap().title(), Some("From Id3"));
        assert_eq!(reread.info().unwrap().get_id(*b"INAM"), Some("From Info"));
    }

    #[test]
    fn verify_id3_chunk_spelling_preserved() {
        // A file carrying an uppercase "ID3 " chunk keeps that spelling on rewrite.
        let tag = {
            let mut tag = Id3v2Tag::new();
            tag.set_title("x");
            id3v2::render(&tag, &Default::default()).unwrap()
        };

        let buf = build_wav(&[(b"ID3 ", &tag)]);

        let mut wav = WavFile::read(&buf, &ReadOptions::default()).unwrap();
        wav.id3v2_mut().set_title("y");

        let rendered = wav.render().unwrap();
        let reread = WavFile::read(&rendered, &ReadOptions::default()).unwrap();

        assert!(reread.chunks().iter().any(|c| c.is(b"ID3 ")));
        assert_eq!(reread.id3v2().unwrap().title(), Some("y"));
    }

    #[test]
    fn verify_bad_marker_rejected() {
        assert!(WavFile::read(b"FORM\x00\x00\x00\x00AIFF", &ReadOptions::default()).is_err());
        assert!(WavFile::read(b"RIFF\x00\x00\x00\x00AVI ", &ReadOptions::default()).is_err());
    }

    #[test]
    fn verify_bext_round_trip() {
        let buf = build_wav(&[]);
        let mut wav = WavFile::read(&buf, &ReadOptions::default()).unwrap();

        let bext = BextChunk {
            description: "take 5".to_string(),
            originator: "desk".to_string(),
            version: 1,
            ..Default::default()
        };

        wav.set_bext(&bext);

        let reread = WavFile::read(&wav.render().unwrap(), &ReadOptions::default()).unwrap();
        assert_eq!(reread.bext().unwrap().description, "take 5");
    }
}
