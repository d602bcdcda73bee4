// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tag reading and writing for the APE-tag carrying formats: WavPack, Monkey's Audio, and
//! Musepack.
//!
//! All three store their tags appended to the audio stream: an APE tag, optionally followed by
//! an ID3v1 tag at the very end. The audio prefix is preserved verbatim on rewrite; only the
//! per-format header is probed for audio properties.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Cantata crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::manual_range_contains)]

pub mod mac;
pub mod musepack;
pub mod tail;
pub mod wavpack;

pub use mac::MonkeysAudioFile;
pub use musepack::MusepackFile;
pub use wavpack::WavPackFile;
