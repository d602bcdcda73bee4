// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An APEv1 and APEv2 tag reader, and an APEv2 writer.
//!
//! The tag is a 32-byte header and footer pair bracketing an item list, appended to the end of
//! the stream (optionally before an ID3v1 tag). Keys are ASCII and case-insensitive for lookup;
//! stored case is preserved on write.

use cantata_core::errors::{
    encoding_error, invalid_field_error, invalid_magic_error, invalid_version_error, Result,
};
use cantata_core::io::{BufReader, BufWriter, ReadBytes};
use cantata_core::meta::{PictureType, StandardTagKey, Tag, TagLike, Value, Visual};

use bitflags::bitflags;
use log::warn;

use crate::std_tag;

/// The preamble of an APE tag header or footer.
const APE_PREAMBLE: &[u8; 8] = b"APETAGEX";

/// The encoded length of an APE tag header or footer.
pub const APE_HEADER_LEN: usize = 32;

/// APE item keys that may not be used because they collide with other structures.
const RESERVED_KEYS: &[&str] = &["ID3", "TAG", "OggS", "MP+"];

bitflags! {
    /// APEv2 tag-level flags, stored in both the header and the footer.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct TagFlags: u32 {
        /// The tag contains a header.
        const HAS_HEADER = 0x8000_0000;
        /// The tag contains no footer.
        const NO_FOOTER = 0x4000_0000;
        /// This block is the header, not the footer.
        const IS_HEADER = 0x2000_0000;
    }
}

bitflags! {
    /// APEv2 item-level flags. Bits 1 and 2 carry the value kind.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ItemFlags: u32 {
        /// The item is read-only.
        const READ_ONLY = 0x0000_0001;
    }
}

/// The APE tag version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ApeVersion {
    /// Version 1, maps to 1000.
    V1,
    /// Version 2, maps to 2000.
    V2,
}

/// The value of an APE tag item.
#[derive(Clone, Debug, PartialEq)]
pub enum ApeValue {
    /// A UTF-8 string.
    Text(String),
    /// Opaque binary data.
    Binary(Box<[u8]>),
    /// A UTF-8 locator (URL) of external information.
    Locator(String),
}

/// An APE tag item.
#[derive(Clone, Debug, PartialEq)]
pub struct ApeItem {
    /// The item key. Case is preserved; lookup is case-insensitive.
    pub key: String,
    /// The item is flagged read-only.
    pub read_only: bool,
    /// The item value.
    pub value: ApeValue,
}

/// An APE tag header or footer block.
struct ApeBlock {
    version: ApeVersion,
    /// The tag size excluding any header.
    size: u32,
    num_items: u32,
    flags: u32,
}

impl ApeBlock {
    fn read<B: ReadBytes>(reader: &mut B) -> Result<ApeBlock> {
        let mut preamble = [0; 8];
        reader.read_buf_exact(&mut preamble)?;

        if preamble != *APE_PREAMBLE {
            return invalid_magic_error("ape: invalid preamble");
        }

        // 1000 for APEv1, 2000 for APEv2, and so on...
        let version = match reader.read_u32()? {
            1000 => ApeVersion::V1,
            2000 => ApeVersion::V2,
            _ => return invalid_version_error("ape: unsupported version"),
        };

        let size = reader.read_u32()?;
        let num_items = reader.read_u32()?;
        let flags = reader.read_u32()?;
        let _reserved = reader.read_u64()?;

        // The size includes the footer itself.
        if (size as usize) < APE_HEADER_LEN {
            return invalid_field_error("ape: tag size smaller than the footer");
        }

        Ok(ApeBlock { version, size, num_items, flags })
    }
}

/// An APE tag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApeTag {
    items: Vec<ApeItem>,
}

impl ApeTag {
    /// Create a new, empty, tag.
    pub fn new() -> ApeTag {
        ApeTag::default()
    }

    /// Read an APE tag that ends at the end of the provided buffer.
    ///
    /// Returns the parsed tag and its total encoded length including the optional header, or
    /// `None` when the buffer does not end in an APE tag footer.
    pub fn read_from_tail(buf: &[u8]) -> Result<Option<(ApeTag, usize)>> {
        if buf.len() < APE_HEADER_LEN {
            return Ok(None);
        }

        let footer_start = buf.len() - APE_HEADER_LEN;

        if &buf[footer_start..footer_start + 8] != APE_PREAMBLE {
            return Ok(None);
        }

        let footer = ApeBlock::read(&mut BufReader::new(&buf[footer_start..]))?;

        // A footer must not claim to be a header.
        if footer.flags & TagFlags::IS_HEADER.bits() != 0 {
            return invalid_field_error("ape: footer flagged as a header");
        }

        let size = footer.size as usize;

        if size > buf.len() {
            return invalid_field_error("ape: tag size exceeds input");
        }

        // The items region sits between the optional header and the footer.
        let items_start = buf.len() - size;
        let items_buf = &buf[items_start..footer_start];

        let has_header = footer.flags & TagFlags::HAS_HEADER.bits() != 0;

        let mut total_len = size;

        if has_header {
            if items_start < APE_HEADER_LEN {
                return invalid_field_error("ape: no room for the tag header");
            }

            let header =
                ApeBlock::read(&mut BufReader::new(&buf[items_start - APE_HEADER_LEN..]))?;

            // All header and footer fields should match other than the `is_header` flag.
            if header.size != footer.size
                || header.num_items != footer.num_items
                || header.version != footer.version
            {
                return invalid_field_error("ape: header and footer mismatch");
            }

            total_len += APE_HEADER_LEN;
        }

        let mut reader = BufReader::new(items_buf);
        let mut tag = ApeTag::new();

        for _ in 0..footer.num_items {
            match read_item(&mut reader, footer.version) {
                Ok(item) => tag.items.push(item),
                Err(err) => {
                    // A malformed item terminates the item scan, the items read so far are
                    // retained.
                    warn!("ape: item scan terminated: {}", err);
                    break;
                }
            }
        }

        Ok(Some((tag, total_len)))
    }

    /// Render the tag as APEv2 with both a header and a footer.
    pub fn render(&self) -> Vec<u8> {
        let mut items = BufWriter::new();

        for item in &self.items {
            write_item(&mut items, item);
        }

        let items = items.into_inner();

        // The stored size excludes the header.
        let size = (items.len() + APE_HEADER_LEN) as u32;
        let num_items = self.items.len() as u32;

        let mut out = BufWriter::with_capacity(items.len() + 2 * APE_HEADER_LEN);

        let header_flags = TagFlags::HAS_HEADER | TagFlags::IS_HEADER;
        let footer_flags = TagFlags::HAS_HEADER;

        write_block(&mut out, size, num_items, header_flags.bits());
        out.write_buf(&items);
        write_block(&mut out, size, num_items, footer_flags.bits());

        out.into_inner()
    }

    /// The items in stored order.
    pub fn items(&self) -> &[ApeItem] {
        &self.items
    }

    /// Gets the item with the given key. Lookup is case-insensitive.
    pub fn item(&self, key: &str) -> Option<&ApeItem> {
        self.items.iter().find(|item| item.key.eq_ignore_ascii_case(key))
    }

    /// Gets the text value of the item with the given key.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.item(key)? {
            ApeItem { value: ApeValue::Text(text), .. } => Some(text),
            ApeItem { value: ApeValue::Locator(loc), .. } => Some(loc),
            _ => None,
        }
    }

    /// Adds or replaces an item. Replacement matches the key case-insensitively, but the new
    /// key's case is stored.
    pub fn set_item(&mut self, key: &str, value: ApeValue) -> Result<()> {
        validate_key(key)?;

        self.remove_item(key);
        self.items.push(ApeItem { key: key.to_string(), read_only: false, value });

        Ok(())
    }

    /// Sets a text item. An empty value removes the item.
    pub fn set_text(&mut self, key: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            self.remove_item(key);
            Ok(())
        }
        else {
            self.set_item(key, ApeValue::Text(value.to_string()))
        }
    }

    /// Removes all items with the given key. Matching is case-insensitive.
    pub fn remove_item(&mut self, key: &str) {
        self.items.retain(|item| !item.key.eq_ignore_ascii_case(key));
    }
}

/// Try to read and return an APE tag item.
fn read_item(reader: &mut BufReader<'_>, version: ApeVersion) -> Result<ApeItem> {
    // The length of the value in bytes.
    let len = reader.read_u32()? as usize;

    // Read flags. Item flags should be ignored when reading an APEv1 tag; the value type is
    // always text.
    let flags = match version {
        ApeVersion::V1 => {
            reader.read_u32()?;
            0
        }
        ApeVersion::V2 => reader.read_u32()?,
    };

    let key = read_key(reader)?;

    // Read the value.
    let value = match (flags >> 1) & 0x3 {
        // UTF-8
        0 => ApeValue::Text(read_utf8_value(reader, len)?),
        // Binary
        1 => ApeValue::Binary(reader.read_boxed_slice_exact(len)?),
        // Locator
        2 => ApeValue::Locator(read_utf8_value(reader, len)?),
        // Reserved
        3 => return invalid_field_error("ape: reserved item value type"),
        _ => unreachable!(),
    };

    let read_only = flags & ItemFlags::READ_ONLY.bits() != 0;

    Ok(ApeItem { key, read_only, value })
}

fn write_item(out: &mut BufWriter, item: &ApeItem) {
    let (kind, value): (u32, &[u8]) = match &item.value {
        ApeValue::Text(text) => (0, text.as_bytes()),
        ApeValue::Binary(data) => (1, data),
        ApeValue::Locator(loc) => (2, loc.as_bytes()),
    };

    let mut flags = kind << 1;

    if item.read_only {
        flags |= ItemFlags::READ_ONLY.bits();
    }

    out.write_u32(value.len() as u32);
    out.write_u32(flags);
    out.write_buf(item.key.as_bytes());
    out.write_u8(0);
    out.write_buf(value);
}

fn write_block(out: &mut BufWriter, size: u32, num_items: u32, flags: u32) {
    out.write_buf(APE_PREAMBLE);
    out.write_u32(2000);
    out.write_u32(size);
    out.write_u32(num_items);
    out.write_u32(flags);
    out.write_u64(0);
}

fn read_key(reader: &mut BufReader<'_>) -> Result<String> {
    let mut buf = Vec::new();

    loop {
        let byte = reader.read_u8()?;

        // Break at the null-terminator. Do not add it to the string buffer.
        if byte == 0 {
            break;
        }

        // Can only contain ASCII characters from 0x20 ' ' up to 0x7E '~'.
        if byte < 0x20 || byte > 0x7e {
            return invalid_field_error("ape: invalid character in item key");
        }

        buf.push(byte);
    }

    // Only printable ASCII characters were pushed onto the vector.
    Ok(String::from_utf8(buf).unwrap_or_default())
}

fn read_utf8_value(reader: &mut BufReader<'_>, len: usize) -> Result<String> {
    match String::from_utf8(reader.read_boxed_slice_exact(len)?.into_vec()) {
        Ok(value) => Ok(value),
        Err(_) => encoding_error("ape: item value is not utf-8"),
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.len() < 2 || key.len() > 255 {
        return invalid_field_error("ape: item key must be 2 to 255 characters");
    }

    if !key.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return invalid_field_error("ape: invalid character in item key");
    }

    if RESERVED_KEYS.iter().any(|reserved| key.eq_ignore_ascii_case(reserved)) {
        return invalid_field_error("ape: reserved item key");
    }

    Ok(())
}

// Cover art convention: binary items keyed "Cover Art (Front)" etc., whose value may begin with
// a null-terminated filename before the image data.

const COVER_ART_KEYS: &[(&str, PictureType)] = &[
    ("Cover Art (Front)", PictureType::FrontCover),
    ("Cover Art (Back)", PictureType::BackCover),
    ("Cover Art (Media)", PictureType::Media),
    ("Cover Art (Leaflet)", PictureType::Leaflet),
    ("Cover Art (Artist)", PictureType::Artist),
    ("Cover Art (Band)", PictureType::Band),
    ("Cover Art (Other)", PictureType::Other),
];

/// Detect the media type of an image buffer from its signature.
fn detect_media_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
        Some("image/png")
    }
    else if data.starts_with(&[0xff, 0xd8, 0xff]) {
        Some("image/jpeg")
    }
    else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    }
    else if data.starts_with(b"BM") {
        Some("image/bmp")
    }
    else {
        None
    }
}

fn cover_art_picture_type(key: &str) -> Option<PictureType> {
    COVER_ART_KEYS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|&(_, picture_type)| picture_type)
}

fn cover_art_key(picture_type: PictureType) -> &'static str {
    COVER_ART_KEYS
        .iter()
        .find(|&&(_, pt)| pt == picture_type)
        .map(|&(name, _)| name)
        .unwrap_or("Cover Art (Other)")
}

/// Interpret a cover art item value: an optional null-terminated filename followed by the image
/// data. Returns the image data and detected media type.
fn parse_cover_art(data: &[u8]) -> (&[u8], Option<&'static str>) {
    if let Some(media_type) = detect_media_type(data) {
        return (data, Some(media_type));
    }

    // The buffer may start with a null-terminated filename. Try to find an image after it.
    if let Some(pos) = data.iter().position(|&b| b == 0) {
        let rest = &data[pos + 1..];

        if let Some(media_type) = detect_media_type(rest) {
            return (rest, Some(media_type));
        }
    }

    (data, None)
}

impl TagLike for ApeTag {
    fn get(&self, key: StandardTagKey) -> Option<Value> {
        let name = std_tag::ape_key(key)?;
        self.text(name).map(Value::from)
    }

    fn set(&mut self, key: StandardTagKey, value: Value) {
        if let Some(name) = std_tag::ape_key(key) {
            // The canonical keys all pass key validation.
            let _ = self.set_text(name, &value.to_string());
        }
    }

    fn remove(&mut self, key: StandardTagKey) {
        if let Some(name) = std_tag::ape_key(key) {
            self.remove_item(name);
        }
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn tags(&self) -> Vec<Tag> {
        self.items
            .iter()
            .filter(|item| cover_art_picture_type(&item.key).is_none())
            .map(|item| {
                let value = match &item.value {
                    ApeValue::Text(text) => Value::from(text.as_str()),
                    ApeValue::Locator(loc) => Value::from(loc.as_str()),
                    ApeValue::Binary(data) => Value::Binary(data.clone()),
                };

                Tag::new(std_tag::ape_std_key(&item.key), &item.key, value)
            })
            .collect()
    }

    fn visuals(&self) -> Vec<Visual> {
        self.items
            .iter()
            .filter_map(|item| {
                let picture_type = cover_art_picture_type(&item.key)?;

                let data = match &item.value {
                    ApeValue::Binary(data) => data,
                    _ => return None,
                };

                let (image, media_type) = parse_cover_art(data);

                Some(Visual {
                    media_type: media_type.unwrap_or("application/octet-stream").to_string(),
                    picture_type,
                    description: String::new(),
                    dimensions: Default::default(),
                    bits_per_pixel: 0,
                    indexed_colors: 0,
                    data: Box::from(image),
                })
            })
            .collect()
    }

    fn add_visual(&mut self, visual: Visual) {
        let key = cover_art_key(visual.picture_type);

        // The conventional value layout is a null-terminated filename followed by the data.
        let extension = match visual.media_type.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            _ => "jpg",
        };

        let mut value = Vec::with_capacity(visual.data.len() + 16);
        value.extend_from_slice(format!("cover.{}", extension).as_bytes());
        value.push(0);
        value.extend_from_slice(&visual.data);

        let _ = self.set_item(key, ApeValue::Binary(value.into_boxed_slice()));
    }

    fn clear_visuals(&mut self) {
        self.items.retain(|item| cover_art_picture_type(&item.key).is_none());
    }
}
