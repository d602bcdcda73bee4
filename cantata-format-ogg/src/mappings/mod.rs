// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-codec OGG mappings: header packet layouts and comment packet rewriting.

pub mod flac;
pub mod opus;
pub mod vorbis;
