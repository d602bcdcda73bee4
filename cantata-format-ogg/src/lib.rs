// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OGG container tag reading and writing.
//!
//! The page and packet layers are codec-independent. Per-codec header parsing and comment
//! packet rewriting live in the [`mappings`] module, which exposes one file type per supported
//! mapping: Vorbis, Opus, and FLAC-in-OGG.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Cantata crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::manual_range_contains)]

pub mod mappings;
pub mod page;
pub mod physical;

pub use mappings::flac::OggFlacFile;
pub use mappings::opus::OggOpusFile;
pub use mappings::vorbis::OggVorbisFile;
