// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Syncsafe integers and the unsynchronisation scheme.

use cantata_core::errors::{invalid_field_error, Result};
use cantata_core::io::ReadBytes;

/// The exclusive upper bound of a 28-bit syncsafe integer.
pub const SYNCSAFE_U28_MAX: u32 = 1 << 28;

/// Read a syncsafe integer of at most 32 bits from the stream.
///
/// The stream is read in 7-bit increments, so a 28-bit value consumes 4 bytes and a 32-bit value
/// consumes 5.
pub fn read_syncsafe_leq32<B: ReadBytes>(reader: &mut B, bit_width: u8) -> Result<u32> {
    debug_assert!(bit_width <= 32);

    let mut result = 0u32;
    let mut bits_read = 0;

    while bits_read < bit_width {
        // Never read more bits than are left in the output width, else the shift underflows.
        let next_read = (bit_width - bits_read).min(7);
        bits_read += next_read;

        let mask = (1 << next_read) - 1;
        result |= u32::from(reader.read_u8()? & mask) << (bit_width - bits_read);
    }

    Ok(result)
}

/// Encode a value as a 4-byte, 28-bit, big-endian syncsafe integer. Values of 2^28 or greater
/// cannot be represented.
pub fn encode_syncsafe_u28(value: u32) -> Result<[u8; 4]> {
    if value >= SYNCSAFE_U28_MAX {
        return invalid_field_error("id3v2: value too large for a syncsafe integer");
    }

    Ok([
        ((value >> 21) & 0x7f) as u8,
        ((value >> 14) & 0x7f) as u8,
        ((value >> 7) & 0x7f) as u8,
        (value & 0x7f) as u8,
    ])
}

/// Decode a 4-byte, 28-bit, big-endian syncsafe integer. Fails if any byte has its high bit set.
pub fn decode_syncsafe_u28(bytes: [u8; 4]) -> Result<u32> {
    if bytes.iter().any(|&b| b & 0x80 != 0) {
        return invalid_field_error("id3v2: non-zero high bit in a syncsafe integer");
    }

    Ok(u32::from(bytes[0]) << 21
        | u32::from(bytes[1]) << 14
        | u32::from(bytes[2]) << 7
        | u32::from(bytes[3]))
}

/// Decode the unsynchronisation scheme in-place: a `0x00` byte following a `0xff` byte is
/// dropped. Returns the decoded prefix of the buffer.
pub fn decode_unsynchronisation(buf: &mut [u8]) -> &mut [u8] {
    let len = buf.len();
    let mut src = 0;
    let mut dst = 0;

    if len == 0 {
        return buf;
    }

    while src < len - 1 {
        buf[dst] = buf[src];
        dst += 1;
        src += 1;

        if buf[src - 1] == 0xff && buf[src] == 0x00 {
            src += 1;
        }
    }

    if src < len {
        buf[dst] = buf[src];
        dst += 1;
    }

    &mut buf[..dst]
}

/// Apply the unsynchronisation scheme: a `0x00` byte is inserted after every `0xff` byte that is
/// followed by a byte with its upper three bits set, a `0x00` byte, or nothing at all.
///
/// The output never contains a false MPEG synchronisation pattern and decodes back to the input
/// exactly.
pub fn encode_unsynchronisation(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut iter = src.iter().peekable();

    while let Some(&byte) = iter.next() {
        out.push(byte);

        if byte == 0xff {
            match iter.peek() {
                Some(&&next) if next == 0x00 || next & 0xe0 == 0xe0 => out.push(0x00),
                None => out.push(0x00),
                _ => (),
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cantata_core::io::BufReader;

    #[test]
    fn verify_read_syncsafe_leq32() {
        let mut stream = BufReader::new(&[3, 4, 80, 1]);
        assert_eq!(6367233, read_syncsafe_leq32(&mut stream, 28).unwrap());

        let mut stream = BufReader::new(&[3, 4, 80, 1, 15]);
        assert_eq!(101875743, read_syncsafe_leq32(&mut stream, 32).unwrap());
    }

    #[test]
    fn verify_syncsafe_u28_round_trip() {
        for value in [0, 1, 0x7f, 0x80, 0x3fff, 0x1fdecb, SYNCSAFE_U28_MAX - 1] {
            let encoded = encode_syncsafe_u28(value).unwrap();
            assert_eq!(decode_syncsafe_u28(encoded).unwrap(), value);
        }

        assert!(encode_syncsafe_u28(SYNCSAFE_U28_MAX).is_err());
        assert!(decode_syncsafe_u28([0x80, 0, 0, 0]).is_err());
    }

    #[test]
    fn verify_unsynchronisation_round_trip() {
        let cases: [&[u8]; 7] = [
            &[],
            &[0xff],
            &[0xff, 0x00],
            &[0xff, 0xe0, 0x12],
            &[0xff, 0xfb, 0x90, 0x11],
            &[0x00, 0xff, 0x00, 0xff],
            &[0xff, 0xff, 0xff],
        ];

        for case in cases {
            let mut encoded = encode_unsynchronisation(case);

            // The encoded form must not contain a false sync.
            for window in encoded.windows(2) {
                assert!(!(window[0] == 0xff && window[1] & 0xe0 == 0xe0));
            }

            assert_eq!(decode_unsynchronisation(&mut encoded), case);
        }
    }
}
