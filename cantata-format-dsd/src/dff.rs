// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The DFF (DSDIFF) dispatcher.
//!
//! A DSDIFF file is a big-endian IFF variant: a `FRM8` form of type `DSD ` containing chunks
//! with 64-bit sizes and 2-byte alignment. Audio properties come from the `FS  ` and `CHNL`
//! chunks nested in the `PROP` chunk. The de-facto tagging convention appends an `ID3 ` chunk
//! carrying an ID3v2 tag.

use cantata_core::errors::{invalid_magic_error, truncated_error, Result};
use cantata_core::io::{BufReader, BufWriter, FiniteStream, ReadBytes};
use cantata_core::meta::{AudioProperties, ReadOptions};

use cantata_metadata::id3v2::{self, Id3v2Tag};

use log::warn;

const FRM8_MARKER: [u8; 4] = *b"FRM8";
const DSD_FORM: [u8; 4] = *b"DSD ";

const PROP_CHUNK: [u8; 4] = *b"PROP";
const SND_PROP: [u8; 4] = *b"SND ";
const FS_CHUNK: [u8; 4] = *b"FS  ";
const CHNL_CHUNK: [u8; 4] = *b"CHNL";
const DSD_DATA_CHUNK: [u8; 4] = *b"DSD ";
const ID3_CHUNK: [u8; 4] = *b"ID3 ";

/// An undecoded DSDIFF chunk.
#[derive(Clone, Debug)]
pub struct DffChunk {
    /// The chunk identifier.
    pub id: [u8; 4],
    /// The chunk payload, without the pad byte.
    pub data: Vec<u8>,
}

/// Read every chunk in a DSDIFF form body: 4-byte identifiers, 64-bit big-endian sizes, 2-byte
/// alignment.
fn read_dff_chunks(buf: &[u8]) -> Result<Vec<DffChunk>> {
    let mut reader = BufReader::new(buf);
    let mut chunks = Vec::new();

    while reader.bytes_available() >= 12 {
        let id = reader.read_quad_bytes()?;
        let len = reader.read_be_u64()?;

        if len > reader.bytes_available() {
            return truncated_error("dff: chunk length exceeds form length");
        }

        let data = reader.read_buf_bytes_ref(len as usize)?.to_vec();

        if len & 1 == 1 && reader.bytes_available() > 0 {
            reader.ignore_bytes(1)?;
        }

        chunks.push(DffChunk { id, data });
    }

    Ok(chunks)
}

fn write_dff_chunk(out: &mut BufWriter, id: &[u8; 4], data: &[u8]) {
    out.write_buf(id);
    out.write_be_u64(data.len() as u64);
    out.write_buf(data);
    out.align(2);
}

/// A parsed DFF file.
pub struct DffFile {
    /// Every chunk of the original form, in order. The ID3 chunk is replaced on render.
    chunks: Vec<DffChunk>,
    sample_rate: u32,
    channels: u32,
    audio_len: Option<u64>,
    id3v2: Option<Id3v2Tag>,
}

impl DffFile {
    /// Read a DFF file from a buffer.
    pub fn read(buf: &[u8], opts: &ReadOptions) -> Result<DffFile> {
        if buf.len() < 16 || buf[0..4] != FRM8_MARKER {
            return invalid_magic_error("dff: missing FRM8 marker");
        }

        if buf[12..16] != DSD_FORM {
            return invalid_magic_error("dff: form type is not DSD");
        }

        let chunks = read_dff_chunks(&buf[16..])?;

        let mut sample_rate = 0;
        let mut channels = 0;
        let mut audio_len = None;
        let mut id3v2 = None;

        for chunk in &chunks {
            if chunk.id == PROP_CHUNK && chunk.data.len() >= 4 && chunk.data[0..4] == SND_PROP {
                // The PROP chunk is itself a chunk container.
                for prop in read_dff_chunks(&chunk.data[4..])? {
                    if prop.id == FS_CHUNK && prop.data.len() >= 4 {
                        let rate = [prop.data[0], prop.data[1], prop.data[2], prop.data[3]];
                        sample_rate = u32::from_be_bytes(rate);
                    }
                    else if prop.id == CHNL_CHUNK && prop.data.len() >= 2 {
                        channels = u32::from(u16::from_be_bytes([prop.data[0], prop.data[1]]));
                    }
                }
            }
            else if chunk.id == DSD_DATA_CHUNK {
                audio_len = Some(chunk.data.len() as u64);
            }
            else if chunk.id == ID3_CHUNK && id3v2.is_none() {
                match Id3v2Tag::read(&chunk.data, opts) {
                    Ok(tag) => id3v2 = Some(tag),
                    Err(err) => warn!("dff: ignoring malformed id3 chunk: {}", err),
                }
            }
        }

        Ok(DffFile { chunks, sample_rate, channels, audio_len, id3v2 })
    }

    /// Render the file with edits applied. Chunks other than the ID3 chunk are emitted verbatim
    /// in their original positions, and the `FRM8` size is recomputed.
    pub fn render(&self) -> Result<Vec<u8>> {
        let id3_chunk = match &self.id3v2 {
            Some(tag) if !tag.frames().is_empty() => {
                Some(id3v2::render(tag, &Default::default())?)
            }
            _ => None,
        };

        let mut body = BufWriter::new();
        body.write_buf(&DSD_FORM);

        let mut wrote_id3 = false;

        for chunk in &self.chunks {
            if chunk.id == ID3_CHUNK {
                if !wrote_id3 {
                    if let Some(rendered) = &id3_chunk {
                        write_dff_chunk(&mut body, &ID3_CHUNK, rendered);
                    }
                    wrote_id3 = true;
                }
            }
            else {
                write_dff_chunk(&mut body, &chunk.id, &chunk.data);
            }
        }

        if !wrote_id3 {
            if let Some(rendered) = &id3_chunk {
                write_dff_chunk(&mut body, &ID3_CHUNK, rendered);
            }
        }

        let body = body.into_inner();

        let mut out = BufWriter::with_capacity(12 + body.len());
        out.write_buf(&FRM8_MARKER);
        out.write_be_u64(body.len() as u64);
        out.write_buf(&body);

        Ok(out.into_inner())
    }

    /// Every chunk of the original form, in order.
    pub fn chunks(&self) -> &[DffChunk] {
        &self.chunks
    }

    /// The audio properties from the `PROP` chunk. DSDIFF audio is 1 bit per sample.
    pub fn properties(&self) -> Option<AudioProperties> {
        if self.sample_rate == 0 || self.channels == 0 {
            return None;
        }

        let duration_secs = self
            .audio_len
            .map(|len| (len * 8) as f64 / f64::from(self.sample_rate * self.channels));

        Some(AudioProperties {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: Some(1),
            duration_secs,
        })
    }

    /// The appended ID3v2 tag, if present.
    pub fn id3v2(&self) -> Option<&Id3v2Tag> {
        self.id3v2.as_ref()
    }

    /// The appended ID3v2 tag, created empty when absent.
    pub fn id3v2_mut(&mut self) -> &mut Id3v2Tag {
        self.id3v2.get_or_insert_with(Id3v2Tag::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_dff() -> Vec<u8> {
        // PROP SND with FS and CHNL sub-chunks.
        let mut prop = BufWriter::new();
        prop.write_buf(b"SND ");

        write_dff_chunk(&mut prop, b"FS  ", &2_822_400u32.to_be_bytes());

        let mut chnl = BufWriter::new();
        chnl.write_be_u16(2);
        chnl.write_buf(b"SLFTSRGT");
        write_dff_chunk(&mut prop, b"CHNL", chnl.as_slice());

        let mut body = BufWriter::new();
        body.write_buf(b"DSD ");
        write_dff_chunk(&mut body, b"PROP", prop.as_slice());
        write_dff_chunk(&mut body, b"DSD ", &[0x5a; 705600]);

        let body = body.into_inner();

        let mut out = BufWriter::new();
        out.write_buf(b"FRM8");
        out.write_be_u64(body.len() as u64);
        out.write_buf(&body);
        out.into_inner()
    }

    #[test]
    fn verify_read_properties() {
        let buf = build_dff();
        let dff = DffFile::read(&buf, &ReadOptions::default()).unwrap();

        let props = dff.properties().unwrap();
        assert_eq!(props.sample_rate, 2_822_400);
        assert_eq!(props.channels, 2);
        assert_eq!(props.bits_per_sample, Some(1));
        // 705600 bytes * 8 bits / (2822400 Hz * 2 channels) = 1 second.
        assert!((props.duration_secs.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn verify_tag_append_updates_form_size() {
        let buf = build_dff();

        let mut dff = DffFile::read(&buf, &ReadOptions::default()).unwrap();
        dff.id3v2_mut().set_title("DSDIFF Title");

        let rendered = dff.render().unwrap();

        // The FRM8 size covers the appended ID3 chunk.
        let declared = u64::from_be_bytes(rendered[4..12].try_into().unwrap());
        assert_eq!(declared as usize, rendered.len() - 12);

        let reread = DffFile::read(&rendered, &ReadOptions::default()).unwrap();
        assert_eq!(reread.id3v2().unwrap().title(), Some("DSDIFF Title"));

        // The audio chunk is untouched.
        let audio = reread.chunks().iter().find(|c| c.id == *b"DSD ").unwrap();
        assert_eq!(audio.data, vec![0x5a; 705600]);
    }

    #[test]
    fn verify_bad_form_rejected() {
        assert!(DffFile::read(b"FRM8\x00\x00\x00\x00\x00\x00\x00\x04AIFF", &ReadOptions::default())
            .is_err());
        assert!(DffFile::read(b"RIFF", &ReadOptions::default()).is_err());
    }
}
