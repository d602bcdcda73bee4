// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DSD container tag reading and writing.
//!
//! DSF stores an ID3v2 tag at a 64-bit offset recorded in the file header; DFF (DSDIFF) stores
//! one in an appended `ID3 ` chunk by de-facto convention. Both rewrites keep the audio bytes
//! untouched and update the container's size and offset fields.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Cantata crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::manual_range_contains)]

pub mod dff;
pub mod dsf;

pub use dff::DffFile;
pub use dsf::DsfFile;
