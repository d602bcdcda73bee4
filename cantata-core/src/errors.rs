// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Cantata.
#[derive(Debug)]
pub enum Error {
    /// The input ended before the declared length of a structure.
    Truncated(&'static str),
    /// Required signature bytes did not match.
    InvalidMagic(&'static str),
    /// A version field was outside the accepted range.
    InvalidVersion(&'static str),
    /// A length, count, enumeration, or flag value violates the format.
    InvalidField(&'static str),
    /// Checksum validation was requested and failed.
    CrcMismatch {
        /// The checksum stored in the stream.
        expected: u32,
        /// The checksum computed over the stream.
        actual: u32,
    },
    /// A structure exceeds a configured safety limit. Limits are used to prevent
    /// denial-of-service attacks from malicious streams.
    SizeLimit(&'static str),
    /// A feature known to the format, but not implemented, was encountered.
    Unsupported(&'static str),
    /// Text bytes were not decodable in the declared encoding.
    Encoding(&'static str),
    /// An IO error occurred while reading or writing.
    IoError(io::Error),
    /// The file does not exist.
    NotFound,
    /// An asynchronous call was cancelled.
    Cancelled,
    /// A save-to-source operation was requested on a value with no source path.
    NoSource,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Truncated(msg) => write!(f, "input truncated: {}", msg),
            Error::InvalidMagic(msg) => write!(f, "invalid signature: {}", msg),
            Error::InvalidVersion(msg) => write!(f, "invalid version: {}", msg),
            Error::InvalidField(msg) => write!(f, "malformed field: {}", msg),
            Error::CrcMismatch { expected, actual } => {
                write!(f, "crc mismatch: expected {:#010x}, got {:#010x}", expected, actual)
            }
            Error::SizeLimit(constraint) => write!(f, "limit reached: {}", constraint),
            Error::Unsupported(feature) => write!(f, "unsupported feature: {}", feature),
            Error::Encoding(msg) => write!(f, "text encoding error: {}", msg),
            Error::IoError(err) => write!(f, "io error: {}", err),
            Error::NotFound => write!(f, "file not found"),
            Error::Cancelled => write!(f, "operation cancelled"),
            Error::NoSource => write!(f, "value has no source to save to"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound,
            io::ErrorKind::UnexpectedEof => Error::Truncated("unexpected end of stream"),
            _ => Error::IoError(err),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a truncation error.
pub fn truncated_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::Truncated(desc))
}

/// Convenience function to create an invalid signature error.
pub fn invalid_magic_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidMagic(desc))
}

/// Convenience function to create an invalid version error.
pub fn invalid_version_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidVersion(desc))
}

/// Convenience function to create a malformed field error.
pub fn invalid_field_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidField(desc))
}

/// Convenience function to create an unsupported feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}

/// Convenience function to create a limit error.
pub fn limit_error<T>(constraint: &'static str) -> Result<T> {
    Err(Error::SizeLimit(constraint))
}

/// Convenience function to create a text encoding error.
pub fn encoding_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::Encoding(desc))
}
