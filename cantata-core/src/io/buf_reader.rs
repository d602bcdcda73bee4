// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;

use crate::errors::{truncated_error, Result};

use super::{FiniteStream, ReadBytes};

/// A `BufReader` reads bytes from a byte buffer.
pub struct BufReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BufReader<'a> {
    /// Instantiate a new `BufReader` with a given byte buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        BufReader { buf, pos: 0 }
    }

    /// Scans up-to `scan_len` bytes from the stream until a byte pattern is matched on the
    /// specified byte alignment boundary. A reference to the scanned bytes including the matched
    /// pattern are returned. If the pattern is not matched within `scan_len` bytes, or the buffer
    /// is exhausted first, the scanned bytes are returned without a pattern.
    pub fn scan_bytes_aligned_ref(
        &mut self,
        pattern: &[u8],
        align: usize,
        scan_len: usize,
    ) -> Result<&'a [u8]> {
        // The pattern must be atleast one byte.
        debug_assert!(!pattern.is_empty());

        let start = self.pos;
        let remaining = self.buf.len() - start;
        let end = start + cmp::min(remaining, scan_len);

        // If the pattern is longer than the amount of bytes remaining, or the scan length is
        // shorter than the pattern, then the pattern will never match. Since unmatched patterns
        // return the scanned bytes, return those here.
        if remaining < pattern.len() || scan_len < pattern.len() {
            self.pos = end;
            return Ok(&self.buf[start..end]);
        }

        let mut i = start;
        let mut j = start + pattern.len();

        while j < end {
            if &self.buf[i..j] == pattern {
                break;
            }
            j += align;
            i += align;
        }

        self.pos = cmp::min(j, self.buf.len());
        Ok(&self.buf[start..self.pos])
    }

    /// Returns a reference to the next `len` bytes in the buffer and advances the stream.
    pub fn read_buf_bytes_ref(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.buf.len() - self.pos < len {
            return truncated_error("buffer underrun");
        }
        self.pos += len;
        Ok(&self.buf[self.pos - len..self.pos])
    }

    /// Returns a reference to the remaining bytes in the buffer and advances the stream to the
    /// end.
    pub fn read_buf_bytes_available_ref(&mut self) -> &'a [u8] {
        let pos = self.pos;
        self.pos = self.buf.len();
        &self.buf[pos..]
    }
}

impl ReadBytes for BufReader<'_> {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        if self.buf.len() - self.pos < 1 {
            return truncated_error("buffer underrun");
        }

        self.pos += 1;
        Ok(self.buf[self.pos - 1])
    }

    #[inline(always)]
    fn read_double_bytes(&mut self) -> Result<[u8; 2]> {
        if self.buf.len() - self.pos < 2 {
            return truncated_error("buffer underrun");
        }

        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + 2]);
        self.pos += 2;

        Ok(bytes)
    }

    #[inline(always)]
    fn read_triple_bytes(&mut self) -> Result<[u8; 3]> {
        if self.buf.len() - self.pos < 3 {
            return truncated_error("buffer underrun");
        }

        let mut bytes = [0u8; 3];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + 3]);
        self.pos += 3;

        Ok(bytes)
    }

    #[inline(always)]
    fn read_quad_bytes(&mut self) -> Result<[u8; 4]> {
        if self.buf.len() - self.pos < 4 {
            return truncated_error("buffer underrun");
        }

        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;

        Ok(bytes)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let len = buf.len();

        if self.buf.len() - self.pos < len {
            return truncated_error("buffer underrun");
        }

        buf.copy_from_slice(&self.buf[self.pos..self.pos + len]);
        self.pos += len;

        Ok(())
    }

    fn ignore_bytes(&mut self, count: u64) -> Result<()> {
        if ((self.buf.len() - self.pos) as u64) < count {
            return truncated_error("buffer underrun");
        }

        self.pos += count as usize;
        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.pos as u64
    }
}

impl FiniteStream for BufReader<'_> {
    #[inline(always)]
    fn byte_len(&self) -> u64 {
        self.buf.len() as u64
    }

    #[inline(always)]
    fn bytes_read(&self) -> u64 {
        self.pos as u64
    }

    #[inline(always)]
    fn bytes_available(&self) -> u64 {
        (self.buf.len() - self.pos) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_buf_reader_integers() {
        let mut reader = BufReader::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(reader.read_u16().unwrap(), 0x0201);
        assert_eq!(reader.read_be_u16().unwrap(), 0x0304);
        assert_eq!(reader.read_be_u24().unwrap(), 0x050607);
        assert_eq!(reader.read_u8().unwrap(), 0x08);
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn verify_buf_reader_underrun_is_truncated() {
        let mut reader = BufReader::new(&[0x01]);
        match reader.read_quad_bytes() {
            Err(crate::errors::Error::Truncated(_)) => (),
            _ => panic!("expected truncation"),
        }
    }

    #[test]
    fn verify_scan_bytes_aligned_ref() {
        // Byte-aligned scan for a null-terminator.
        let mut reader = BufReader::new(b"abc\0def");
        assert_eq!(reader.scan_bytes_aligned_ref(&[0], 1, 7).unwrap(), b"abc\0");
        assert_eq!(reader.read_buf_bytes_available_ref(), b"def");

        // Two-byte aligned scan for a UTF-16 null-terminator straddling an odd boundary.
        let mut reader = BufReader::new(&[0x41, 0x00, 0x00, 0x42, 0x00, 0x00, 0x00, 0x43]);
        assert_eq!(
            reader.scan_bytes_aligned_ref(&[0, 0], 2, 8).unwrap(),
            &[0x41, 0x00, 0x00, 0x42, 0x00, 0x00]
        );
    }
}
