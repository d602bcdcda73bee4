// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `text` module implements the character encodings used by tag formats: ISO/IEC 8859-1
//! (Latin-1), UTF-8, and UTF-16 in its with-BOM, big-endian, and little-endian flavours.
//!
//! Decoders are lossy: undecodable sequences yield the Unicode replacement character rather than
//! an error so that one damaged field cannot poison an otherwise readable tag.

/// The UTF-16 byte-order-mark in big-endian order.
const BOM_BE: [u8; 2] = [0xfe, 0xff];
/// The UTF-16 byte-order-mark in little-endian order.
const BOM_LE: [u8; 2] = [0xff, 0xfe];

/// Decode a Latin-1 buffer into a string. Every byte maps to the Unicode code point of the same
/// value.
pub fn decode_latin1(buf: &[u8]) -> String {
    buf.iter().map(|&c| char::from(c)).collect()
}

/// Decode a UTF-8 buffer into a string, replacing invalid sequences.
pub fn decode_utf8_lossy(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf).into_owned()
}

/// Decode a UTF-16 buffer carrying an optional byte-order-mark. When the BOM is absent,
/// big-endian order is assumed as specified by ID3v2.
pub fn decode_utf16_bom(buf: &[u8]) -> String {
    if buf.len() >= 2 {
        if buf[0..2] == BOM_LE {
            return decode_utf16le(&buf[2..]);
        }
        if buf[0..2] == BOM_BE {
            return decode_utf16be(&buf[2..]);
        }
    }
    decode_utf16be(buf)
}

/// Decode a big-endian UTF-16 buffer into a string. A trailing odd byte is dropped.
pub fn decode_utf16be(buf: &[u8]) -> String {
    decode_utf16_units(buf.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])))
}

/// Decode a little-endian UTF-16 buffer into a string. A trailing odd byte is dropped.
pub fn decode_utf16le(buf: &[u8]) -> String {
    decode_utf16_units(buf.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])))
}

fn decode_utf16_units(units: impl Iterator<Item = u16>) -> String {
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Encode a string as Latin-1. Characters outside the Latin-1 range are substituted with `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars().map(|c| if (c as u32) <= 0xff { c as u8 } else { b'?' }).collect()
}

/// Encode a string as little-endian UTF-16 preceded by a byte-order-mark.
pub fn encode_utf16le_bom(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + 2 * text.len());
    buf.extend_from_slice(&BOM_LE);
    for unit in text.encode_utf16() {
        buf.extend_from_slice(&unit.to_le_bytes());
    }
    buf
}

/// Encode a string as big-endian UTF-16 without a byte-order-mark.
pub fn encode_utf16be(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 * text.len());
    for unit in text.encode_utf16() {
        buf.extend_from_slice(&unit.to_be_bytes());
    }
    buf
}

/// Returns true if a character is printable ASCII (0x20 through 0x7e) excluding `=`. This is the
/// character set permitted in Vorbis Comment field names.
pub fn is_key_char(c: char) -> bool {
    matches!(c, ' '..='<' | '>'..='~')
}

/// Converts a buffer to an ASCII string if every byte is printable ASCII. The string terminates
/// at the first null byte, if any.
pub fn printable_ascii_to_string(bytes: &[u8]) -> Option<String> {
    let mut result = String::with_capacity(bytes.len());

    for c in bytes {
        match c {
            0x00 => break,
            0x20..=0x7e => result.push(char::from(*c)),
            _ => return None,
        }
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_latin1_round_trip() {
        let text = "na\u{ef}ve caf\u{e9}";
        assert_eq!(decode_latin1(&encode_latin1(text)), text);
    }

    #[test]
    fn verify_latin1_substitution() {
        assert_eq!(encode_latin1("\u{4e16}\u{754c}"), b"??");
    }

    #[test]
    fn verify_utf16_bom_detection() {
        // Little-endian with BOM.
        assert_eq!(decode_utf16_bom(&[0xff, 0xfe, 0x41, 0x00]), "A");
        // Big-endian with BOM.
        assert_eq!(decode_utf16_bom(&[0xfe, 0xff, 0x00, 0x41]), "A");
        // No BOM defaults to big-endian.
        assert_eq!(decode_utf16_bom(&[0x00, 0x41]), "A");
    }

    #[test]
    fn verify_utf16le_bom_round_trip() {
        let text = "m\u{fc}nchen \u{4e16}\u{754c} \u{1f3b5}";
        assert_eq!(decode_utf16_bom(&encode_utf16le_bom(text)), text);
    }

    #[test]
    fn verify_utf16be_round_trip() {
        let text = "plain and \u{1d11e}";
        assert_eq!(decode_utf16be(&encode_utf16be(text)), text);
    }

    #[test]
    fn verify_unpaired_surrogate_is_replaced() {
        assert_eq!(decode_utf16be(&[0xd8, 0x00]), "\u{fffd}");
    }

    #[test]
    fn verify_key_chars() {
        assert!(is_key_char('A'));
        assert!(is_key_char(' '));
        assert!(is_key_char('~'));
        assert!(!is_key_char('='));
        assert!(!is_key_char('\u{7f}'));
        assert!(!is_key_char('\n'));
    }
}
