// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The RIFF `LIST INFO` tag.
//!
//! An INFO tag is a `LIST` chunk of type `INFO` whose sub-chunks each carry one null-terminated
//! text value keyed by a four character identifier (`INAM` for the title, `IART` for the
//! artist, and so on).

use cantata_core::errors::{invalid_field_error, Result};
use cantata_core::io::{BufReader, BufWriter, FiniteStream, ReadBytes};
use cantata_core::meta::{StandardTagKey, Tag, TagLike, Value, Visual};
use cantata_core::text;

use log::warn;

use crate::std_tag;

/// One INFO entry: a four character identifier and a text value.
#[derive(Clone, Debug, PartialEq)]
pub struct InfoEntry {
    /// The sub-chunk identifier.
    pub id: [u8; 4],
    /// The text value.
    pub value: String,
}

/// A RIFF `LIST INFO` tag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RiffInfo {
    entries: Vec<InfoEntry>,
}

impl RiffInfo {
    /// Create a new, empty, INFO tag.
    pub fn new() -> RiffInfo {
        RiffInfo::default()
    }

    /// Read an INFO tag from the payload of a `LIST` chunk, starting after the `INFO` type
    /// identifier.
    pub fn read(buf: &[u8]) -> Result<RiffInfo> {
        let mut reader = BufReader::new(buf);
        let mut info = RiffInfo::new();

        // Sub-chunks are aligned to 2-byte boundaries.
        while reader.bytes_available() >= 8 {
            let id = reader.read_quad_bytes()?;
            let len = reader.read_u32()? as u64;

            if len > reader.bytes_available() {
                return invalid_field_error("riff: info sub-chunk length exceeds list");
            }

            let value_buf = reader.read_boxed_slice_exact(len as usize)?;

            if reader.bytes_available() > 0 && len & 1 == 1 {
                reader.ignore_bytes(1)?;
            }

            if !id.iter().all(|b| b.is_ascii()) {
                warn!("riff: ignoring info sub-chunk with a non-ascii id");
                continue;
            }

            // The value is null-terminated text of unspecified encoding; decode as UTF-8 with
            // a Latin-1 fallback for foreign-encoded tags.
            let end = value_buf.iter().position(|&b| b == 0).unwrap_or(value_buf.len());
            let value = match std::str::from_utf8(&value_buf[..end]) {
                Ok(s) => s.to_string(),
                Err(_) => text::decode_latin1(&value_buf[..end]),
            };

            info.entries.push(InfoEntry { id, value });
        }

        Ok(info)
    }

    /// Render the tag as a complete `LIST` chunk, including the `LIST` header and `INFO` type.
    pub fn render(&self) -> Vec<u8> {
        let mut body = BufWriter::new();
        body.write_buf(b"INFO");

        for entry in &self.entries {
            // Values are stored null-terminated, and sub-chunks are padded to 2-byte
            // boundaries.
            let len = entry.value.len() + 1;
            body.write_buf(&entry.id);
            body.write_u32(len as u32);
            body.write_buf(entry.value.as_bytes());
            body.write_u8(0);
            body.align(2);
        }

        let body = body.into_inner();

        let mut out = BufWriter::with_capacity(8 + body.len());
        out.write_buf(b"LIST");
        out.write_u32(body.len() as u32);
        out.write_buf(&body);

        out.into_inner()
    }

    /// The entries in stored order.
    pub fn entries(&self) -> &[InfoEntry] {
        &self.entries
    }

    /// Gets the value for an identifier. Matching is case-insensitive.
    pub fn get_id(&self, id: [u8; 4]) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.id.eq_ignore_ascii_case(&id))
            .map(|entry| entry.value.as_str())
    }

    /// Sets the value for an identifier, replacing an existing entry. An empty value removes
    /// the entry.
    pub fn set_id(&mut self, id: [u8; 4], value: &str) {
        self.remove_id(id);

        if !value.is_empty() {
            self.entries.push(InfoEntry { id, value: value.to_string() });
        }
    }

    /// Removes all entries with the identifier.
    pub fn remove_id(&mut self, id: [u8; 4]) {
        self.entries.retain(|entry| !entry.id.eq_ignore_ascii_case(&id));
    }
}

impl TagLike for RiffInfo {
    fn get(&self, key: StandardTagKey) -> Option<Value> {
        let id = std_tag::riff_info_key(key)?;
        self.get_id(id.as_bytes().try_into().unwrap_or([0; 4])).map(Value::from)
    }

    fn set(&mut self, key: StandardTagKey, value: Value) {
        if let Some(id) = std_tag::riff_info_key(key) {
            if let Ok(id) = id.as_bytes().try_into() {
                self.set_id(id, &value.to_string());
            }
        }
    }

    fn remove(&mut self, key: StandardTagKey) {
        if let Some(id) = std_tag::riff_info_key(key) {
            if let Ok(id) = id.as_bytes().try_into() {
                self.remove_id(id);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn tags(&self) -> Vec<Tag> {
        self.entries
            .iter()
            .map(|entry| {
                let key = String::from_utf8_lossy(&entry.id).into_owned();
                Tag::new(
                    std_tag::riff_info_std_key(&key),
                    &key,
                    Value::from(entry.value.as_str()),
                )
            })
            .collect()
    }

    fn visuals(&self) -> Vec<Visual> {
        Vec::new()
    }

    fn add_visual(&mut self, _visual: Visual) {
        // INFO tags cannot carry pictures.
    }

    fn clear_visuals(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_round_trip() {
        let mut info = RiffInfo::new();
        info.set_id(*b"INAM", "Title");
        info.set_id(*b"IART", "Artist");
        // An odd-length value exercises the pad byte.
        info.set_id(*b"ICMT", "even");

        let rendered = info.render();

        assert_eq!(&rendered[0..4], b"LIST");
        assert_eq!(&rendered[8..12], b"INFO");

        // The rendered chunk length covers the INFO type and all padded sub-chunks.
        let declared = u32::from_le_bytes(rendered[4..8].try_into().unwrap()) as usize;
        assert_eq!(declared, rendered.len() - 8);

        let parsed = RiffInfo::read(&rendered[12..]).unwrap();
        assert_eq!(parsed, info);
    }

    #[test]
    fn verify_standard_keys() {
        let mut info = RiffInfo::new();
        info.set(StandardTagKey::TrackTitle, Value::from("Modified"));

        assert_eq!(info.get_id(*b"INAM"), Some("Modified"));
        assert_eq!(info.get(StandardTagKey::TrackTitle), Some(Value::from("Modified")));
    }

    #[test]
    fn verify_oversized_sub_chunk_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"INAM");
        buf.extend_from_slice(&0xffff_ff00u32.to_le_bytes());
        buf.extend_from_slice(b"xx");

        assert!(RiffInfo::read(&buf).is_err());
    }
}
