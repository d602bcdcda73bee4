// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The physical OGG stream: page sequencing, packet reassembly, and stream rewriting.

use cantata_core::errors::{
    invalid_field_error, limit_error, unsupported_error, Result,
};
use cantata_core::io::BufWriter;
use cantata_core::meta::ReadOptions;

use log::warn;

use crate::page::{write_page, Page, PageHeader, PageParams};

/// An OGG page that owns its bytes.
#[derive(Clone, Debug)]
pub struct OwnedPage {
    pub header: PageHeader,
    pub segment_table: Vec<u8>,
    pub body: Vec<u8>,
}

/// A physical OGG stream: the ordered pages of one logical bitstream.
#[derive(Clone, Debug)]
pub struct PhysicalStream {
    /// The serial number of the logical bitstream.
    pub serial: u32,
    /// All pages in stream order.
    pub pages: Vec<OwnedPage>,
}

impl PhysicalStream {
    /// Read all pages from the buffer.
    ///
    /// The first page must be well-formed and carry the begin-of-stream flag. Grouped (multiple
    /// concurrent logical bitstreams) files are not supported.
    pub fn read(buf: &[u8], opts: &ReadOptions) -> Result<PhysicalStream> {
        let mut pages = Vec::new();
        let mut pos = 0;
        let mut serial = None;

        while pos < buf.len() {
            let (page, consumed) = Page::read(&buf[pos..], opts.validate_crc)?;

            match serial {
                None => {
                    // The first page of the stream must be a begin-of-stream page.
                    if !page.header.is_first_page {
                        return invalid_field_error("ogg: first page is not a stream begin");
                    }

                    serial = Some(page.header.serial);
                }
                Some(serial) => {
                    if page.header.serial != serial {
                        return unsupported_error("ogg: grouped bitstreams are not supported");
                    }

                    if page.header.is_first_page {
                        return invalid_field_error("ogg: unexpected begin-of-stream page");
                    }
                }
            }

            pages.push(OwnedPage {
                header: page.header,
                segment_table: page.segment_table.to_vec(),
                body: page.body.to_vec(),
            });

            pos += consumed;
        }

        match serial {
            Some(serial) => Ok(PhysicalStream { serial, pages }),
            None => invalid_field_error("ogg: no pages in stream"),
        }
    }

    /// The granule position of the last page that states one.
    pub fn last_granule(&self) -> Option<u64> {
        // A granule of all ones marks a page with no finished packet.
        self.pages.iter().rev().map(|page| page.header.absgp).find(|&absgp| absgp != u64::MAX)
    }
}

/// A packet reassembled from one or more pages.
#[derive(Clone, Debug)]
pub struct Packet {
    /// The packet data.
    pub data: Vec<u8>,
    /// The index of the page on which the packet completed.
    pub page_index: usize,
}

/// Reassemble the packets of a physical stream.
///
/// A packet is complete when a segment's lacing value is less than 255; a page whose final
/// segment is 255 continues its last packet into the next page, which must carry the
/// continuation flag. An incomplete packet at the end of the stream is discarded with a
/// warning. The packet size and continuation page count are capped by the read options.
pub fn assemble_packets(stream: &PhysicalStream, opts: &ReadOptions) -> Result<Vec<Packet>> {
    let max_packet_bytes =
        opts.limit_packet_bytes.limit_or_default(ReadOptions::DEFAULT_PACKET_BYTES);
    let max_packet_pages =
        opts.limit_packet_pages.limit_or_default(ReadOptions::DEFAULT_PACKET_PAGES);

    let mut packets = Vec::new();

    let mut partial: Vec<u8> = Vec::new();
    let mut partial_pages = 0usize;

    for (page_index, page) in stream.pages.iter().enumerate() {
        if !partial.is_empty() || partial_pages > 0 {
            // A packet is continuing across the page boundary.
            if !page.header.is_continuation {
                warn!("ogg: expected a continuation page, dropping a partial packet");
                partial.clear();
                partial_pages = 0;
            }
            else {
                partial_pages += 1;

                if let Some(max) = max_packet_pages {
                    if partial_pages > max {
                        return limit_error("ogg: packet spans too many pages");
                    }
                }
            }
        }
        else if page.header.is_continuation {
            // A continuation with nothing to continue; skip the leading partial data.
            warn!("ogg: unexpected continuation page");
        }

        let mut offset = 0usize;

        for &lacing in &page.segment_table {
            let segment = &page.body[offset..offset + usize::from(lacing)];
            offset += usize::from(lacing);

            if let Some(max) = max_packet_bytes {
                if partial.len() + segment.len() > max {
                    return limit_error("ogg: packet exceeds maximum size");
                }
            }

            partial.extend_from_slice(segment);

            // A segment with a length < 255 indicates the end of a packet.
            if lacing < 255 {
                packets.push(Packet { data: std::mem::take(&mut partial), page_index });
                partial_pages = 0;
            }
        }
    }

    if !partial.is_empty() {
        warn!("ogg: dropping an incomplete packet at the end of the stream");
    }

    Ok(packets)
}

/// Emit a sequence of packets into as many pages as required, splitting packets that exceed one
/// page across continuation pages.
///
/// All emitted pages use the provided granule position. Returns the sequence number following
/// the last emitted page.
pub fn write_packets(
    out: &mut BufWriter,
    packets: &[Vec<u8>],
    serial: u32,
    mut sequence: u32,
    absgp: u64,
    first_is_bos: bool,
) -> u32 {
    let mut segment_table: Vec<u8> = Vec::new();
    let mut body: Vec<u8> = Vec::new();
    let mut continuing = false;

    let mut flush =
        |segment_table: &mut Vec<u8>, body: &mut Vec<u8>, continuing: bool, sequence: &mut u32| {
            let params = PageParams {
                absgp,
                serial,
                sequence: *sequence,
                is_continuation: continuing,
                is_first_page: first_is_bos && *sequence == 0,
                is_last_page: false,
            };

            write_page(out, &params, segment_table, body);

            segment_table.clear();
            body.clear();
            *sequence += 1;
        };

    for packet in packets {
        let mut remaining: &[u8] = packet;

        loop {
            let lacing = remaining.len().min(255);
            let (segment, rest) = remaining.split_at(lacing);

            segment_table.push(lacing as u8);
            body.extend_from_slice(segment);
            remaining = rest;

            // A full segment table forces a page flush; the packet continues on the next page.
            if segment_table.len() == 255 {
                let packet_open = lacing == 255;
                flush(&mut segment_table, &mut body, continuing, &mut sequence);
                continuing = packet_open;
            }

            if lacing < 255 {
                break;
            }

            // An exact multiple of 255 terminates with a zero-length segment.
            if remaining.is_empty() {
                segment_table.push(0);
                break;
            }
        }
    }

    if !segment_table.is_empty() {
        flush(&mut segment_table, &mut body, continuing, &mut sequence);
    }

    sequence
}

/// Re-emit a stream: freshly paged header packets followed by the original audio pages.
///
/// The emitted stream keeps the original serial, renumbers page sequences contiguously from
/// zero, recomputes every checksum, and marks end-of-stream on the final page only.
pub fn rewrite_stream(
    serial: u32,
    header_packet_groups: &[Vec<Vec<u8>>],
    audio_pages: &[OwnedPage],
) -> Vec<u8> {
    let mut out = BufWriter::new();
    let mut sequence = 0;

    // Each group of header packets starts a fresh page, as the mappings demand (the
    // identification header always has a page of its own).
    for (i, group) in header_packet_groups.iter().enumerate() {
        sequence = write_packets(&mut out, group, serial, sequence, 0, i == 0);
    }

    let last = audio_pages.len().saturating_sub(1);

    for (i, page) in audio_pages.iter().enumerate() {
        let params = PageParams {
            absgp: page.header.absgp,
            serial,
            sequence,
            is_continuation: page.header.is_continuation,
            is_first_page: false,
            is_last_page: i == last,
        };

        write_page(&mut out, &params, &page.segment_table, &page.body);
        sequence += 1;
    }

    out.into_inner()
}

/// Split the stream at the page on which the last header packet completes.
///
/// Returns the pages following that boundary. The header packets must not share their final
/// page with audio data.
pub fn audio_pages_after<'a>(
    stream: &'a PhysicalStream,
    packets: &[Packet],
    num_header_packets: usize,
) -> Result<&'a [OwnedPage]> {
    if packets.len() < num_header_packets {
        return invalid_field_error("ogg: missing header packets");
    }

    let boundary = packets[num_header_packets - 1].page_index;

    // The boundary page must not leak a packet into the audio pages.
    if stream.pages[boundary].segment_table.last().copied() == Some(255) {
        return unsupported_error("ogg: header packets share a page with audio data");
    }

    // Nor may an audio packet complete on the boundary page.
    if let Some(next) = packets.get(num_header_packets) {
        if next.page_index == boundary {
            return unsupported_error("ogg: header packets share a page with audio data");
        }
    }

    Ok(&stream.pages[boundary + 1..])
}

#[cfg(test)]
mod tests {
    use cantata_core::meta::Limit;

    use super::*;
    use crate::page::Page;

    fn build_stream(packet_groups: &[Vec<Vec<u8>>], audio_pages: &[OwnedPage]) -> Vec<u8> {
        rewrite_stream(0x4d5e6f70, packet_groups, audio_pages)
    }

    fn parse(buf: &[u8]) -> PhysicalStream {
        PhysicalStream::read(buf, &ReadOptions { validate_crc: true, ..Default::default() })
            .unwrap()
    }

    #[test]
    fn verify_packet_reassembly_small() {
        let buf = build_stream(
            &[vec![b"first".to_vec()], vec![b"second".to_vec(), b"third".to_vec()]],
            &[],
        );

        let stream = parse(&buf);
        let packets = assemble_packets(&stream, &ReadOptions::default()).unwrap();

        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].data, b"first");
        assert_eq!(packets[1].data, b"second");
        assert_eq!(packets[2].data, b"third");

        assert_eq!(packets[0].page_index, 0);
        assert_eq!(packets[1].page_index, 1);
        assert_eq!(packets[2].page_index, 1);
    }

    #[test]
    fn verify_multi_page_packet_reassembly() {
        // A 70000 byte packet spans two pages: the intermediate segment table ends in 255s.
        let big: Vec<u8> = (0..70000u32).map(|i| (i % 251) as u8).collect();

        let buf = build_stream(&[vec![big.clone()]], &[]);
        let stream = parse(&buf);

        assert!(stream.pages.len() >= 2);
        assert!(stream.pages[0].segment_table.iter().all(|&lacing| lacing == 255));
        assert!(stream.pages[1].header.is_continuation);

        let packets = assemble_packets(&stream, &ReadOptions::default()).unwrap();

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data, big);
    }

    #[test]
    fn verify_packet_size_cap() {
        let big = vec![0u8; 100_000];
        let buf = build_stream(&[vec![big]], &[]);
        let stream = parse(&buf);

        let opts =
            ReadOptions { limit_packet_bytes: Limit::Maximum(65_536), ..Default::default() };

        match assemble_packets(&stream, &opts) {
            Err(cantata_core::errors::Error::SizeLimit(_)) => (),
            _ => panic!("expected size limit"),
        }
    }

    #[test]
    fn verify_rewrite_renumbers_and_marks_eos() {
        // Three audio pages with arbitrary sequence numbers and a stray EOS in the middle.
        let audio_pages: Vec<OwnedPage> = (0..3)
            .map(|i| OwnedPage {
                header: PageHeader {
                    absgp: 1000 * (i + 1),
                    serial: 0x11112222,
                    sequence: 90 + i as u32,
                    is_last_page: i == 1,
                    ..Default::default()
                },
                segment_table: vec![4],
                body: vec![0xaa; 4],
            })
            .collect();

        let buf = build_stream(&[vec![b"ident".to_vec()]], &audio_pages);
        let stream = parse(&buf);

        // Page sequences are contiguous from zero.
        let sequences: Vec<u32> = stream.pages.iter().map(|p| p.header.sequence).collect();
        assert_eq!(sequences, [0, 1, 2, 3]);

        // Only the final page carries end-of-stream, and only the first carries
        // begin-of-stream.
        for (i, page) in stream.pages.iter().enumerate() {
            assert_eq!(page.header.is_last_page, i == 3);
            assert_eq!(page.header.is_first_page, i == 0);
        }
    }

    #[test]
    fn verify_rewritten_pages_validate_crc() {
        let buf = build_stream(&[vec![b"packet one".to_vec(), b"packet two".to_vec()]], &[]);

        // Page::read validates each page checksum.
        let mut pos = 0;
        while pos < buf.len() {
            let (_, consumed) = Page::read(&buf[pos..], true).unwrap();
            pos += consumed;
        }
    }

    #[test]
    fn verify_missing_bos_rejected() {
        let audio = OwnedPage {
            header: PageHeader::default(),
            segment_table: vec![1],
            body: vec![0],
        };

        let buf = rewrite_stream(1, &[], &[audio]);
        assert!(PhysicalStream::read(&buf, &ReadOptions::default()).is_err());
    }
}
