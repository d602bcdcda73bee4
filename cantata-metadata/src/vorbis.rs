// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A Vorbis Comment reader and writer.
//!
//! Vorbis Comments are stored as `KEY=VALUE` pairs where the key is a reduced ASCII-only
//! identifier and the value is a UTF-8 string. Keys are case-insensitive for lookup, but the
//! stored case and field order are preserved on write. Pictures are embedded under the
//! `METADATA_BLOCK_PICTURE` key as a base64-encoded FLAC PICTURE block.

use cantata_core::errors::{invalid_field_error, limit_error, Result};
use cantata_core::io::{BufReader, BufWriter, FiniteStream, ReadBytes};
use cantata_core::meta::{ReadOptions, StandardTagKey, Tag, TagLike, Value, Visual};
use cantata_core::text;

use log::warn;

use crate::picture;
use crate::std_tag;

/// The key under which a base64-encoded FLAC PICTURE block is embedded.
const METADATA_BLOCK_PICTURE: &str = "METADATA_BLOCK_PICTURE";

/// The vendor string written when none was read.
const DEFAULT_VENDOR: &str = "Cantata";

/// A single `KEY=VALUE` comment field.
#[derive(Clone, Debug, PartialEq)]
pub struct VorbisField {
    /// The field name, original case preserved.
    pub key: String,
    /// The field value.
    pub value: String,
}

/// A Vorbis Comment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VorbisComment {
    vendor: Option<String>,
    fields: Vec<VorbisField>,
}

impl VorbisComment {
    /// Create a new, empty, comment.
    pub fn new() -> VorbisComment {
        VorbisComment::default()
    }

    /// Read a Vorbis Comment.
    ///
    /// Every length field is validated against the bytes remaining before any allocation is
    /// attempted.
    pub fn read<B: ReadBytes + FiniteStream>(
        reader: &mut B,
        opts: &ReadOptions,
    ) -> Result<VorbisComment> {
        let tag_limit = opts.limit_tag_bytes.limit_or_default(ReadOptions::DEFAULT_TAG_BYTES);

        // Read the vendor string length in bytes.
        let vendor_len = reader.read_u32()? as u64;

        if vendor_len > reader.bytes_available() {
            return invalid_field_error("vorbis: vendor length exceeds input");
        }

        let vendor_buf = reader.read_boxed_slice_exact(vendor_len as usize)?;
        let vendor = String::from_utf8_lossy(&vendor_buf).into_owned();

        // Read the number of comment fields.
        let num_fields = reader.read_u32()? as u64;

        // Each field is atleast a 4-byte length.
        if num_fields * 4 > reader.bytes_available() {
            return invalid_field_error("vorbis: field count exceeds input");
        }

        let mut comment = VorbisComment { vendor: Some(vendor), fields: Vec::new() };

        let mut total_len = vendor_len;

        for _ in 0..num_fields {
            let field_len = reader.read_u32()? as u64;

            if field_len > reader.bytes_available() {
                return invalid_field_error("vorbis: field length exceeds input");
            }

            total_len += field_len;

            if let Some(limit) = tag_limit {
                if total_len > limit as u64 {
                    return limit_error("vorbis: comment size exceeds limit");
                }
            }

            let field_buf = reader.read_boxed_slice_exact(field_len as usize)?;

            // A field with no '=' separator is malformed, but not fatal to the comment.
            match parse_field(&field_buf) {
                Some(field) => comment.fields.push(field),
                None => warn!("vorbis: malformed comment field"),
            }
        }

        Ok(comment)
    }

    /// Read a Vorbis Comment trailed by a framing bit, as found in the Vorbis codec's comment
    /// header packet. The framing bit must be set.
    pub fn read_with_framing<B: ReadBytes + FiniteStream>(
        reader: &mut B,
        opts: &ReadOptions,
    ) -> Result<VorbisComment> {
        let comment = VorbisComment::read(reader, opts)?;

        if reader.read_u8()? & 0x01 == 0 {
            return invalid_field_error("vorbis: comment framing bit is not set");
        }

        Ok(comment)
    }

    /// Render the comment. The vendor string defaults when none was read.
    pub fn render(&self) -> Vec<u8> {
        let mut out = BufWriter::new();
        self.write(&mut out);
        out.into_inner()
    }

    /// Render the comment into the provided writer.
    pub fn write(&self, out: &mut BufWriter) {
        let vendor = self.vendor.as_deref().unwrap_or(DEFAULT_VENDOR);

        out.write_u32(vendor.len() as u32);
        out.write_buf(vendor.as_bytes());
        out.write_u32(self.fields.len() as u32);

        for field in &self.fields {
            let len = field.key.len() + 1 + field.value.len();
            out.write_u32(len as u32);
            out.write_buf(field.key.as_bytes());
            out.write_u8(b'=');
            out.write_buf(field.value.as_bytes());
        }
    }

    /// The vendor string, if one was read or set.
    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    /// Sets the vendor string.
    pub fn set_vendor(&mut self, vendor: &str) {
        self.vendor = Some(vendor.to_string());
    }

    /// The comment fields in stored order.
    pub fn fields(&self) -> &[VorbisField] {
        &self.fields
    }

    /// Gets the first value for a key. Lookup is case-insensitive.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.key.eq_ignore_ascii_case(key))
            .map(|field| field.value.as_str())
    }

    /// Gets all values for a key in stored order. Lookup is case-insensitive.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|field| field.key.eq_ignore_ascii_case(key))
            .map(|field| field.value.as_str())
            .collect()
    }

    /// Appends a field without replacing existing values for the key.
    ///
    /// The key must be printable ASCII excluding `=`.
    pub fn push(&mut self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() || !key.chars().all(text::is_key_char) {
            return invalid_field_error("vorbis: invalid characters in field name");
        }

        self.fields.push(VorbisField { key: key.to_string(), value: value.to_string() });
        Ok(())
    }

    /// Sets a key to a single value, replacing all existing values for the key. An empty value
    /// removes the key.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        self.remove_field(key);

        if !value.is_empty() {
            self.push(key, value)?;
        }

        Ok(())
    }

    /// Removes all values for a key. Matching is case-insensitive.
    pub fn remove_field(&mut self, key: &str) {
        self.fields.retain(|field| !field.key.eq_ignore_ascii_case(key));
    }

    /// The R128 track gain in dB, converted from the Q7.8 value stored under `R128_TRACK_GAIN`
    /// as used by Opus tags.
    pub fn r128_track_gain_db(&self) -> Option<f64> {
        self.get("R128_TRACK_GAIN")?.trim().parse::<i32>().ok().map(|q| f64::from(q) / 256.0)
    }

    /// Sets the R128 track gain from a dB value. The stored Q7.8 value is clamped to the signed
    /// 16-bit range.
    pub fn set_r128_track_gain_db(&mut self, db: f64) {
        let q78 = (db * 256.0).round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i32;
        // The key is a valid field name.
        let _ = self.set_field("R128_TRACK_GAIN", &q78.to_string());
    }

    /// The R128 album gain in dB, converted from the Q7.8 value stored under `R128_ALBUM_GAIN`.
    pub fn r128_album_gain_db(&self) -> Option<f64> {
        self.get("R128_ALBUM_GAIN")?.trim().parse::<i32>().ok().map(|q| f64::from(q) / 256.0)
    }

    /// Sets the R128 album gain from a dB value. The stored Q7.8 value is clamped to the signed
    /// 16-bit range.
    pub fn set_r128_album_gain_db(&mut self, db: f64) {
        let q78 = (db * 256.0).round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i32;
        let _ = self.set_field("R128_ALBUM_GAIN", &q78.to_string());
    }

    /// All embedded pictures, decoded from `METADATA_BLOCK_PICTURE` fields. Fields that fail to
    /// decode are skipped.
    pub fn pictures(&self) -> Vec<Visual> {
        self.pictures_with_options(&ReadOptions::default())
    }

    /// All embedded pictures, decoded with explicit limits.
    pub fn pictures_with_options(&self, opts: &ReadOptions) -> Vec<Visual> {
        self.fields
            .iter()
            .filter(|field| field.key.eq_ignore_ascii_case(METADATA_BLOCK_PICTURE))
            .filter_map(|field| {
                let data = match base64::decode(&field.value) {
                    Ok(data) => data,
                    Err(_) => {
                        warn!("vorbis: invalid base64 encoding of a picture block");
                        return None;
                    }
                };

                match picture::read_picture_block(&mut BufReader::new(&data), opts) {
                    Ok(visual) => Some(visual),
                    Err(err) => {
                        warn!("vorbis: invalid embedded picture block: {}", err);
                        None
                    }
                }
            })
            .collect()
    }

    /// Embeds a picture as a base64-encoded FLAC PICTURE block.
    pub fn add_picture(&mut self, visual: &Visual) {
        let block = picture::render_picture_block(visual);

        self.fields.push(VorbisField {
            key: METADATA_BLOCK_PICTURE.to_string(),
            value: base64::encode(&block),
        });
    }

    /// Removes all embedded pictures.
    pub fn remove_pictures(&mut self) {
        self.fields.retain(|field| !field.key.eq_ignore_ascii_case(METADATA_BLOCK_PICTURE));
    }
}

/// Split a comment field at the first `=` into a key and value. The key keeps only its
/// permitted ASCII characters.
fn parse_field(buf: &[u8]) -> Option<VorbisField> {
    let field = String::from_utf8_lossy(buf);

    let (key, value) = field.split_once('=')?;

    // The key should only contain printable ASCII with '=' excluded.
    let key: String = key.chars().filter(|&c| text::is_key_char(c)).collect();

    if key.is_empty() {
        return None;
    }

    Some(VorbisField { key, value: value.to_string() })
}

impl TagLike for VorbisComment {
    fn get(&self, key: StandardTagKey) -> Option<Value> {
        let name = std_tag::vorbis_key(key)?;
        self.get(name).map(Value::from)
    }

    fn set(&mut self, key: StandardTagKey, value: Value) {
        if let Some(name) = std_tag::vorbis_key(key) {
            // The canonical keys are all valid field names.
            let _ = self.set_field(name, &value.to_string());
        }
    }

    fn remove(&mut self, key: StandardTagKey) {
        if let Some(name) = std_tag::vorbis_key(key) {
            self.remove_field(name);
        }
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn tags(&self) -> Vec<Tag> {
        self.fields
            .iter()
            .filter(|field| !field.key.eq_ignore_ascii_case(METADATA_BLOCK_PICTURE))
            .map(|field| {
                Tag::new(
                    std_tag::vorbis_std_key(&field.key),
                    &field.key,
                    Value::from(field.value.as_str()),
                )
            })
            .collect()
    }

    fn visuals(&self) -> Vec<Visual> {
        self.pictures()
    }

    fn add_visual(&mut self, visual: Visual) {
        self.add_picture(&visual);
    }

    fn clear_visuals(&mut self) {
        self.remove_pictures();
    }
}

#[cfg(test)]
mod tests {
    use cantata_core::meta::PictureType;

    use super::*;

    fn parse(buf: &[u8]) -> Result<VorbisComment> {
        VorbisComment::read(&mut BufReader::new(buf), &ReadOptions::default())
    }

    #[test]
    fn verify_round_trip() {
        let mut comment = VorbisComment::new();
        comment.set_vendor("test vendor");
        comment.push("TITLE", "A Title").unwrap();
        comment.push("ARTIST", "First").unwrap();
        comment.push("ARTIST", "Second").unwrap();

        let parsed = parse(&comment.render()).unwrap();

        assert_eq!(parsed, comment);
        assert_eq!(parsed.get("title"), Some("A Title"));
        assert_eq!(parsed.get_all("Artist"), ["First", "Second"]);
    }

    #[test]
    fn verify_vendor_length_overflow() {
        // A vendor length of 0xffffffff with only 8 bytes of input must fail without
        // allocating.
        let buf = [0xff, 0xff, 0xff, 0xff, 0x41, 0x42, 0x43, 0x44];

        match parse(&buf) {
            Err(cantata_core::errors::Error::InvalidField(_)) => (),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn verify_field_count_overflow() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0xffff_ffffu32.to_le_bytes());

        assert!(parse(&buf).is_err());
    }

    #[test]
    fn verify_malformed_field_is_skipped() {
        let mut out = BufWriter::new();
        out.write_u32(0);
        out.write_u32(2);
        // No '=' separator.
        out.write_u32(7);
        out.write_buf(b"garbage");
        out.write_u32(9);
        out.write_buf(b"TITLE=abc");

        let parsed = parse(out.as_slice()).unwrap();
        assert_eq!(parsed.fields().len(), 1);
        assert_eq!(parsed.get("TITLE"), Some("abc"));
    }

    #[test]
    fn verify_invalid_key_rejected() {
        let mut comment = VorbisComment::new();
        assert!(comment.push("BAD=KEY", "x").is_err());
        assert!(comment.push("", "x").is_err());
        assert!(comment.push("NEW\nLINE", "x").is_err());
    }

    #[test]
    fn verify_r128_gain_conversions() {
        let mut comment = VorbisComment::new();

        comment.set_field("R128_TRACK_GAIN", "256").unwrap();
        assert_eq!(comment.r128_track_gain_db(), Some(1.0));

        comment.set_r128_track_gain_db(-2.25);
        assert_eq!(comment.get("R128_TRACK_GAIN"), Some("-576"));

        comment.set_r128_album_gain_db(500.0);
        assert_eq!(comment.get("R128_ALBUM_GAIN"), Some("32767"));
    }

    #[test]
    fn verify_picture_embedding() {
        let visual = Visual::front_cover("image/png", Box::new([1, 2, 3, 4]));

        let mut comment = VorbisComment::new();
        comment.add_picture(&visual);

        let parsed = parse(&comment.render()).unwrap();
        let pictures = parsed.pictures();

        assert_eq!(pictures.len(), 1);
        assert_eq!(pictures[0].media_type, "image/png");
        assert_eq!(pictures[0].picture_type, PictureType::FrontCover);
        assert_eq!(pictures[0].data.as_ref(), &[1, 2, 3, 4]);

        // Pictures are not enumerated as text tags.
        assert!(parsed.tags().is_empty());
    }

    #[test]
    fn verify_framing_bit() {
        let comment = VorbisComment::new();
        let mut rendered = comment.render();
        rendered.push(0x01);

        assert!(VorbisComment::read_with_framing(
            &mut BufReader::new(&rendered),
            &ReadOptions::default()
        )
        .is_ok());

        let last = rendered.len() - 1;
        rendered[last] = 0x00;

        assert!(VorbisComment::read_with_framing(
            &mut BufReader::new(&rendered),
            &ReadOptions::default()
        )
        .is_err());
    }
}
