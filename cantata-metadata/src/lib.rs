// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! This crate implements codecs for the metadata formats carried by audio containers.
//!
//! # Standalone metadata formats
//!
//! A standalone metadata format is one that exists independent of the media container: ID3v1,
//! ID3v2, and APE tags. Each is implemented in its own module with a parser and, where writing
//! the format is supported, a renderer.
//!
//! # Embedded metadata formats
//!
//! An embedded metadata format only exists inside another structure: the Vorbis Comment (FLAC
//! metadata blocks, OGG header packets), the FLAC PICTURE block (natively, or base64-wrapped
//! inside a Vorbis Comment), the RIFF `LIST INFO` chunk, and the BWF `bext` chunk. The container
//! crates locate the enclosing structure and delegate the payload to this crate.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Cantata crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::manual_range_contains)]

pub mod ape;
pub mod bext;
pub mod id3v1;
pub mod id3v2;
pub mod picture;
pub mod riff_info;
pub mod vorbis;

mod std_tag;
