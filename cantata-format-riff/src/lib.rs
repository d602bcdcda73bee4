// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WAV and AIFF chunk graph tag reading and writing.
//!
//! Both containers are chunk graphs with 2-byte alignment padding; RIFF (`WAVE`) uses
//! little-endian chunk sizes, IFF (`AIFF`/`AIFC`) big-endian. Rewriting replaces tag-carrying
//! chunks and leaves every other chunk byte-for-byte where it was.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Cantata crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::manual_range_contains)]

pub mod aiff;
pub mod chunks;
pub mod wave;

pub use aiff::AiffFile;
pub use wave::WavFile;
