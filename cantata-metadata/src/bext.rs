// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Broadcast Wave Format `bext` chunk (EBU Tech 3285).

use cantata_core::errors::{truncated_error, Result};
use cantata_core::io::{BufReader, BufWriter, FiniteStream, ReadBytes};
use cantata_core::text;

/// The fixed-size portion of a `bext` chunk, up to and including the version field.
const BEXT_FIXED_LEN: usize = 256 + 32 + 32 + 10 + 8 + 8 + 2;

/// The length of the UMID field present in version 1 and later.
const UMID_LEN: usize = 64;

/// Version 1 also reserves loudness fields and padding after the UMID.
const V1_RESERVED_LEN: usize = 190;

/// A Broadcast Wave Format `bext` chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BextChunk {
    /// Free description of the sound sequence (up to 256 characters).
    pub description: String,
    /// Name of the originator (up to 32 characters).
    pub originator: String,
    /// Reference of the originator (up to 32 characters).
    pub originator_reference: String,
    /// Origination date, `yyyy-mm-dd` (10 characters).
    pub origination_date: String,
    /// Origination time, `hh:mm:ss` (8 characters).
    pub origination_time: String,
    /// First sample count since midnight, stored as two little-endian double words.
    pub time_reference: u64,
    /// The BWF version.
    pub version: u16,
    /// The SMPTE UMID. Present in version 1 and later; some tools emit version 0 files with a
    /// zeroed UMID region, which reads back as `None`.
    pub umid: Option<[u8; UMID_LEN]>,
    /// The coding history, a free text field filling the remainder of the chunk.
    pub coding_history: String,
}

impl BextChunk {
    /// Read a `bext` chunk payload.
    pub fn read(buf: &[u8]) -> Result<BextChunk> {
        if buf.len() < BEXT_FIXED_LEN {
            return truncated_error("bext: chunk shorter than the fixed fields");
        }

        let mut reader = BufReader::new(buf);

        let description = read_fixed_text(&mut reader, 256)?;
        let originator = read_fixed_text(&mut reader, 32)?;
        let originator_reference = read_fixed_text(&mut reader, 32)?;
        let origination_date = read_fixed_text(&mut reader, 10)?;
        let origination_time = read_fixed_text(&mut reader, 8)?;

        // The time reference is documented as two little-endian double words, low first.
        let time_reference_low = reader.read_u32()?;
        let time_reference_high = reader.read_u32()?;
        let time_reference = u64::from(time_reference_high) << 32 | u64::from(time_reference_low);

        let version = reader.read_u16()?;

        // The UMID field only exists in version 1 and later.
        let umid = if version >= 1 && reader.bytes_available() >= UMID_LEN as u64 {
            let mut umid = [0u8; UMID_LEN];
            reader.read_buf_exact(&mut umid)?;
            Some(umid)
        }
        else {
            None
        };

        // Version 1 reserves additional bytes between the UMID and the coding history.
        if version >= 1 {
            let reserved = (V1_RESERVED_LEN as u64).min(reader.bytes_available());
            reader.ignore_bytes(reserved)?;
        }

        // The remainder of the chunk is the coding history.
        let history_len = reader.bytes_available() as usize;
        let history_buf = reader.read_boxed_slice_exact(history_len)?;
        let end = history_buf.iter().position(|&b| b == 0).unwrap_or(history_buf.len());
        let coding_history = text::decode_latin1(&history_buf[..end]);

        Ok(BextChunk {
            description,
            originator,
            originator_reference,
            origination_date,
            origination_time,
            time_reference,
            version,
            umid,
            coding_history,
        })
    }

    /// Render the chunk payload.
    pub fn render(&self) -> Vec<u8> {
        let mut out = BufWriter::new();

        out.write_fixed_str(&self.description, 256);
        out.write_fixed_str(&self.originator, 32);
        out.write_fixed_str(&self.originator_reference, 32);
        out.write_fixed_str(&self.origination_date, 10);
        out.write_fixed_str(&self.origination_time, 8);
        out.write_u32(self.time_reference as u32);
        out.write_u32((self.time_reference >> 32) as u32);
        out.write_u16(self.version);

        if self.version >= 1 {
            match &self.umid {
                Some(umid) => out.write_buf(umid),
                None => out.write_zeros(UMID_LEN),
            }
            out.write_zeros(V1_RESERVED_LEN);
        }

        out.write_buf(&text::encode_latin1(&self.coding_history));

        out.into_inner()
    }

    /// The SMPTE UMID. Always `None` for version 0 chunks.
    pub fn umid(&self) -> Option<&[u8; UMID_LEN]> {
        self.umid.as_ref()
    }
}

fn read_fixed_text<B: ReadBytes>(reader: &mut B, len: usize) -> Result<String> {
    let buf = reader.read_boxed_slice_exact(len)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(text::decode_latin1(&buf[..end]).trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_v1_round_trip() {
        let chunk = BextChunk {
            description: "recorded off the desk".to_string(),
            originator: "Cantata".to_string(),
            originator_reference: "CANTATA-0001".to_string(),
            origination_date: "2024-03-01".to_string(),
            origination_time: "12:34:56".to_string(),
            time_reference: 0x0001_0002_0003_0004,
            version: 1,
            umid: Some([0xab; 64]),
            coding_history: "A=PCM,F=48000,W=24\r\n".to_string(),
        };

        let parsed = BextChunk::read(&chunk.render()).unwrap();
        assert_eq!(parsed, chunk);
    }

    #[test]
    fn verify_v0_has_no_umid() {
        let chunk = BextChunk { version: 0, ..Default::default() };

        let rendered = chunk.render();
        assert_eq!(rendered.len(), BEXT_FIXED_LEN);

        let parsed = BextChunk::read(&rendered).unwrap();
        assert_eq!(parsed.umid(), None);
    }

    #[test]
    fn verify_v1_zeroed_umid_reads_back_as_zeroed() {
        let chunk = BextChunk { version: 1, umid: None, ..Default::default() };

        let parsed = BextChunk::read(&chunk.render()).unwrap();

        // In a v1 chunk the UMID region exists even when zeroed.
        assert_eq!(parsed.umid(), Some(&[0u8; 64]));
    }

    #[test]
    fn verify_truncated_chunk_rejected() {
        assert!(BextChunk::read(&[0u8; 100]).is_err());
    }
}
