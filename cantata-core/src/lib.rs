// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared structs, traits, and byte-level I/O for Project Cantata.
//!
//! This crate provides the foundation the format and metadata crates are built on: the error
//! taxonomy, readers and writers over in-memory byte buffers, the OGG CRC-32, the tag text
//! encodings, the format-independent metadata model, and the filesystem collaborator.
//!
//! It is not intended to be used directly; use the `cantata` crate instead.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Cantata crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::manual_range_contains)]

pub mod checksum;
pub mod errors;
pub mod io;
pub mod meta;
pub mod text;
pub mod vfs;
