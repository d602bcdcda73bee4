// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OGG page parsing and emission.

use cantata_core::checksum::Crc32;
use cantata_core::errors::{
    invalid_field_error, invalid_magic_error, invalid_version_error, Error, Result,
};
use cantata_core::io::{BufReader, BufWriter, ReadBytes};

pub const OGG_PAGE_MARKER: [u8; 4] = *b"OggS";
pub const OGG_PAGE_HEADER_SIZE: usize = 27;

/// The maximum page body size: 255 segments of 255 bytes.
pub const OGG_PAGE_MAX_BODY_SIZE: usize = 255 * 255;

/// The parsed fixed portion of an OGG page header.
#[derive(Copy, Clone, Debug, Default)]
pub struct PageHeader {
    pub version: u8,
    pub absgp: u64,
    pub serial: u32,
    pub sequence: u32,
    pub crc: u32,
    pub n_segments: u8,
    pub is_continuation: bool,
    pub is_first_page: bool,
    pub is_last_page: bool,
}

impl PageHeader {
    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.is_continuation {
            flags |= 0x01;
        }
        if self.is_first_page {
            flags |= 0x02;
        }
        if self.is_last_page {
            flags |= 0x04;
        }
        flags
    }
}

/// Reads a `PageHeader` from the provided reader.
fn read_page_header<B: ReadBytes>(reader: &mut B) -> Result<PageHeader> {
    // The OggS marker should be present.
    let marker = reader.read_quad_bytes()?;

    if marker != OGG_PAGE_MARKER {
        return invalid_magic_error("ogg: missing ogg stream marker");
    }

    let version = reader.read_byte()?;

    // There is only one OGG version, and that is version 0.
    if version != 0 {
        return invalid_version_error("ogg: invalid ogg version");
    }

    let flags = reader.read_byte()?;

    // Only the first 3 least-significant bits are used for flags.
    if flags & 0xf8 != 0 {
        return invalid_field_error("ogg: invalid flag bits set");
    }

    let absgp = reader.read_u64()?;
    let serial = reader.read_u32()?;
    let sequence = reader.read_u32()?;
    let crc = reader.read_u32()?;
    let n_segments = reader.read_byte()?;

    Ok(PageHeader {
        version,
        absgp,
        serial,
        sequence,
        crc,
        n_segments,
        is_continuation: (flags & 0x01) != 0,
        is_first_page: (flags & 0x02) != 0,
        is_last_page: (flags & 0x04) != 0,
    })
}

/// An OGG page view referencing the buffer it was parsed from.
pub struct Page<'a> {
    /// The page header.
    pub header: PageHeader,
    /// The segment table: one lacing value per segment.
    pub segment_table: &'a [u8],
    /// The page body.
    pub body: &'a [u8],
}

impl<'a> Page<'a> {
    /// Parse one page from the start of the buffer. Returns the page and the number of bytes it
    /// occupies.
    ///
    /// When `validate_crc` is true, the page checksum is recomputed over the whole page (with
    /// the checksum field zeroed) and compared to the stored checksum.
    pub fn read(buf: &'a [u8], validate_crc: bool) -> Result<(Page<'a>, usize)> {
        let mut reader = BufReader::new(buf);

        let header = read_page_header(&mut reader)?;

        let segment_table = reader.read_buf_bytes_ref(usize::from(header.n_segments))?;

        let body_len: usize = segment_table.iter().map(|&lacing| usize::from(lacing)).sum();
        let body = reader.read_buf_bytes_ref(body_len)?;

        let total_len = OGG_PAGE_HEADER_SIZE + segment_table.len() + body.len();

        if validate_crc {
            let calculated = page_crc(&buf[..total_len]);

            if calculated != header.crc {
                return Err(Error::CrcMismatch { expected: header.crc, actual: calculated });
            }
        }

        Ok((Page { header, segment_table, body }, total_len))
    }

    /// Returns true when the final segment of this page continues into the next page.
    pub fn ends_with_open_packet(&self) -> bool {
        self.segment_table.last().map(|&lacing| lacing == 255).unwrap_or(false)
    }
}

/// Compute the checksum of a complete encoded page. The 4 checksum bytes within the page are
/// treated as zero.
pub fn page_crc(page: &[u8]) -> u32 {
    debug_assert!(page.len() >= OGG_PAGE_HEADER_SIZE);

    let mut crc32 = Crc32::new(0);

    crc32.process_buf_bytes(&page[..22]);
    crc32.process_buf_bytes(&[0u8; 4]);
    crc32.process_buf_bytes(&page[26..]);

    crc32.crc()
}

/// The header fields a caller chooses when emitting a page.
#[derive(Copy, Clone, Debug, Default)]
pub struct PageParams {
    pub absgp: u64,
    pub serial: u32,
    pub sequence: u32,
    pub is_continuation: bool,
    pub is_first_page: bool,
    pub is_last_page: bool,
}

/// Emit one page from a raw segment table and body. The checksum is computed and patched in.
pub fn write_page(out: &mut BufWriter, params: &PageParams, segment_table: &[u8], body: &[u8]) {
    debug_assert!(segment_table.len() <= 255);

    let header = PageHeader {
        version: 0,
        absgp: params.absgp,
        serial: params.serial,
        sequence: params.sequence,
        crc: 0,
        n_segments: segment_table.len() as u8,
        is_continuation: params.is_continuation,
        is_first_page: params.is_first_page,
        is_last_page: params.is_last_page,
    };

    let start = out.len();

    out.write_buf(&OGG_PAGE_MARKER);
    out.write_u8(0);
    out.write_u8(header.flags());
    out.write_u64(header.absgp);
    out.write_u32(header.serial);
    out.write_u32(header.sequence);
    out.write_u32(0);
    out.write_u8(header.n_segments);
    out.write_buf(segment_table);
    out.write_buf(body);

    let crc = page_crc(&out.as_slice()[start..]);
    out.patch_u32(start + 22, crc);
}

/// Emit a single page holding the provided packets, all of which complete on the page.
///
/// A packet whose length is an exact multiple of 255 receives a final zero-length segment. A
/// single packet larger than 65025 bytes cannot complete on one page; the caller must split it
/// across pages and manage the continuation flag.
pub fn render_page(params: &PageParams, packets: &[&[u8]]) -> Result<Vec<u8>> {
    let mut segment_table = Vec::new();
    let mut body = Vec::new();

    for packet in packets {
        let mut remaining = packet.len();

        loop {
            let lacing = remaining.min(255);
            segment_table.push(lacing as u8);
            remaining -= lacing;

            if lacing < 255 {
                break;
            }

            // An exact multiple of 255 terminates with a zero-length segment.
            if remaining == 0 {
                segment_table.push(0);
                break;
            }
        }

        body.extend_from_slice(packet);
    }

    if segment_table.len() > 255 {
        return invalid_field_error("ogg: packets do not fit a single page");
    }

    let mut out = BufWriter::with_capacity(OGG_PAGE_HEADER_SIZE + segment_table.len() + body.len());
    write_page(&mut out, params, &segment_table, &body);

    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_page_round_trip() {
        let params = PageParams {
            absgp: 0x1234_5678,
            serial: 0xdead_beef,
            sequence: 7,
            is_last_page: true,
            ..Default::default()
        };

        let rendered = render_page(&params, &[b"hello", b"world"]).unwrap();

        let (page, consumed) = Page::read(&rendered, true).unwrap();

        assert_eq!(consumed, rendered.len());
        assert_eq!(page.header.absgp, 0x1234_5678);
        assert_eq!(page.header.serial, 0xdead_beef);
        assert_eq!(page.header.sequence, 7);
        assert!(page.header.is_last_page);
        assert_eq!(page.segment_table, &[5, 5]);
        assert_eq!(page.body, b"helloworld");
    }

    #[test]
    fn verify_crc_validation() {
        let params = PageParams::default();
        let mut rendered = render_page(&params, &[b"data"]).unwrap();

        // Valid as rendered.
        assert!(Page::read(&rendered, true).is_ok());

        // Corrupt one body byte: rejected with validation, accepted without.
        let last = rendered.len() - 1;
        rendered[last] ^= 0xff;

        assert!(Page::read(&rendered, false).is_ok());
        match Page::read(&rendered, true) {
            Err(Error::CrcMismatch { .. }) => (),
            _ => panic!("expected crc mismatch"),
        }
    }

    #[test]
    fn verify_multiple_of_255_gets_zero_lacing() {
        let packet = vec![0xaa; 510];
        let rendered = render_page(&PageParams::default(), &[&packet]).unwrap();

        let (page, _) = Page::read(&rendered, true).unwrap();
        assert_eq!(page.segment_table, &[255, 255, 0]);
        assert!(!page.ends_with_open_packet());
    }

    #[test]
    fn verify_oversized_packet_rejected() {
        let packet = vec![0; OGG_PAGE_MAX_BODY_SIZE + 1];
        assert!(render_page(&PageParams::default(), &[&packet]).is_err());
    }

    #[test]
    fn verify_bad_version_rejected() {
        let mut rendered = render_page(&PageParams::default(), &[b"x"]).unwrap();
        rendered[4] = 1;

        match Page::read(&rendered, false) {
            Err(Error::InvalidVersion(_)) => (),
            _ => panic!("expected invalid version"),
        }
    }

    #[test]
    fn verify_truncated_body_rejected() {
        let rendered = render_page(&PageParams::default(), &[b"truncate me"]).unwrap();

        match Page::read(&rendered[..rendered.len() - 2], false) {
            Err(Error::Truncated(_)) => (),
            _ => panic!("expected truncation"),
        }
    }
}
