// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The FLAC PICTURE block.
//!
//! This layout is used natively by FLAC metadata blocks and, base64-wrapped under the
//! `METADATA_BLOCK_PICTURE` key, inside Vorbis Comments.

use cantata_core::errors::{invalid_field_error, limit_error, Result};
use cantata_core::io::{BufWriter, FiniteStream, ReadBytes};
use cantata_core::meta::{PictureType, ReadOptions, Size, Visual};
use cantata_core::text::printable_ascii_to_string;

/// Read a FLAC PICTURE block into a visual.
pub fn read_picture_block<B: ReadBytes + FiniteStream>(
    reader: &mut B,
    opts: &ReadOptions,
) -> Result<Visual> {
    let type_enc = reader.read_be_u32()?;

    // An undefined picture type code falls back to Other.
    let picture_type = PictureType::from_code(type_enc).unwrap_or(PictureType::Other);

    // Read the media type. It must be printable ASCII.
    let media_type_len = reader.read_be_u32()? as usize;

    if media_type_len as u64 > reader.bytes_available() {
        return invalid_field_error("picture: media type length exceeds input");
    }

    let media_type_buf = reader.read_boxed_slice_exact(media_type_len)?;

    let media_type = match printable_ascii_to_string(&media_type_buf) {
        Some(s) => s,
        None => return invalid_field_error("picture: media type contains invalid characters"),
    };

    // Read the description. It is UTF-8.
    let desc_len = reader.read_be_u32()? as usize;

    if desc_len as u64 > reader.bytes_available() {
        return invalid_field_error("picture: description length exceeds input");
    }

    let desc_buf = reader.read_boxed_slice_exact(desc_len)?;
    let description = String::from_utf8_lossy(&desc_buf).into_owned();

    let width = reader.read_be_u32()?;
    let height = reader.read_be_u32()?;
    let bits_per_pixel = reader.read_be_u32()?;
    let indexed_colors = reader.read_be_u32()?;

    // Read the image data, applying the visual size limit before allocating.
    let data_len = reader.read_be_u32()? as usize;

    if data_len as u64 > reader.bytes_available() {
        return invalid_field_error("picture: data length exceeds input");
    }

    if let Some(limit) = opts.limit_visual_bytes.limit_or_default(ReadOptions::DEFAULT_VISUAL_BYTES)
    {
        if data_len > limit {
            return limit_error("picture: data size exceeds limit");
        }
    }

    let data = reader.read_boxed_slice_exact(data_len)?;

    Ok(Visual {
        media_type,
        picture_type,
        description,
        dimensions: Size { width, height },
        bits_per_pixel,
        indexed_colors,
        data,
    })
}

/// Render a visual as a FLAC PICTURE block.
pub fn write_picture_block(out: &mut BufWriter, visual: &Visual) {
    out.write_be_u32(visual.picture_type.to_code());
    out.write_be_u32(visual.media_type.len() as u32);
    out.write_buf(visual.media_type.as_bytes());
    out.write_be_u32(visual.description.len() as u32);
    out.write_buf(visual.description.as_bytes());
    out.write_be_u32(visual.dimensions.width);
    out.write_be_u32(visual.dimensions.height);
    out.write_be_u32(visual.bits_per_pixel);
    out.write_be_u32(visual.indexed_colors);
    out.write_be_u32(visual.data.len() as u32);
    out.write_buf(&visual.data);
}

/// Render a visual as a FLAC PICTURE block in a new buffer.
pub fn render_picture_block(visual: &Visual) -> Vec<u8> {
    let mut out = BufWriter::with_capacity(32 + visual.data.len());
    write_picture_block(&mut out, visual);
    out.into_inner()
}
