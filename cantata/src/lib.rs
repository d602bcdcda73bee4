// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Project Cantata is a pure Rust library for reading, editing, and writing audio file
//! metadata.
//!
//! It parses the tag structures carried by FLAC, OGG (Vorbis, Opus, and FLAC mappings), WAV,
//! AIFF, DSF, DFF, WavPack, Monkey's Audio, and Musepack files, exposes a unified editing
//! interface over them, and re-emits the whole byte stream with the audio payload and every
//! unrecognized structure preserved byte-for-byte.
//!
//! # Reading and editing
//!
//! ```no_run
//! use cantata::{TaggedFile, StandardTagKey, Value};
//! use cantata::vfs::StdFileSystem;
//!
//! # fn run() -> cantata::Result<()> {
//! let fs = StdFileSystem;
//!
//! let mut file = TaggedFile::open(&fs, "recording.flac", &Default::default())?;
//!
//! println!("was: {:?}", file.title());
//!
//! file.set_title("A Better Title");
//! file.set(StandardTagKey::MusicBrainzRecordingId, Value::from("4a2c3e19-..."));
//!
//! file.save(&fs)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Crate layout
//!
//! This crate is a facade. The codecs live in the per-concern crates: `cantata-core` (errors,
//! byte I/O, the metadata model), `cantata-metadata` (ID3v1/ID3v2/APE/Vorbis
//! Comment/INFO/bext), and one `cantata-format-*` crate per container family.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Cantata crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::manual_range_contains)]

mod file;
mod probe;

pub use file::{FormatFile, TaggedFile};
pub use probe::{detect, FileFormat};

pub use cantata_core::errors::{Error, Result};
pub use cantata_core::meta::{
    AudioProperties, Limit, PictureType, ReadOptions, Size, StandardTagKey, Tag, TagLike, Value,
    Visual,
};
pub use cantata_core::vfs;

pub mod core {
    //! Re-export of `cantata-core` for advanced use.
    pub use cantata_core::*;
}

pub mod meta {
    //! Re-export of the tag format codecs for advanced use.
    pub use cantata_metadata::*;
}

pub mod formats {
    //! Re-export of the container dispatchers for advanced use.
    pub use cantata_format_ape as ape;
    pub use cantata_format_dsd as dsd;
    pub use cantata_format_flac as flac;
    pub use cantata_format_ogg as ogg;
    pub use cantata_format_riff as riff;
}
