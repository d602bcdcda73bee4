// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Trailing tag location shared by the APE-tag carrying formats.
//!
//! The layout at the end of a stream is: audio, an optional APE tag, then an optional ID3v1
//! tag in the final 128 bytes.

use cantata_core::errors::Result;
use cantata_core::meta::{StandardTagKey, TagLike, Value, Visual};

use cantata_metadata::ape::ApeTag;
use cantata_metadata::id3v1::{Id3v1Tag, ID3V1_TAG_LEN};

/// An audio stream with its trailing tags split off.
pub struct TaggedStream {
    /// The audio prefix, preserved verbatim.
    pub audio: Vec<u8>,
    /// The APE tag, if present.
    pub ape: Option<ApeTag>,
    /// The ID3v1 tag, if present.
    pub id3v1: Option<Id3v1Tag>,
}

impl TaggedStream {
    /// Split the trailing tags off a buffer.
    pub fn read(buf: &[u8]) -> Result<TaggedStream> {
        let mut end = buf.len();

        // An ID3v1 tag, when present, occupies the final 128 bytes.
        let id3v1 = Id3v1Tag::read_from_tail(&buf[..end]);

        if id3v1.is_some() {
            end -= ID3V1_TAG_LEN;
        }

        // An APE tag footer, when present, ends where the ID3v1 tag begins.
        let ape = match ApeTag::read_from_tail(&buf[..end])? {
            Some((tag, tag_len)) => {
                end -= tag_len;
                Some(tag)
            }
            None => None,
        };

        Ok(TaggedStream { audio: buf[..end].to_vec(), ape, id3v1 })
    }

    /// Render the stream: the audio prefix verbatim, then the present tags.
    ///
    /// An emptied tag is dropped rather than written as an empty shell.
    pub fn render(&self) -> Vec<u8> {
        let mut out = self.audio.clone();

        if let Some(ape) = &self.ape {
            if !ape.items().is_empty() {
                out.extend_from_slice(&ape.render());
            }
        }

        if let Some(id3v1) = &self.id3v1 {
            if !TagLike::is_empty(id3v1) {
                out.extend_from_slice(&id3v1.render());
            }
        }

        out
    }

    /// The APE tag, created empty when absent.
    pub fn ape_mut(&mut self) -> &mut ApeTag {
        self.ape.get_or_insert_with(ApeTag::new)
    }

    /// The ID3v1 tag, created empty when absent.
    pub fn id3v1_mut(&mut self) -> &mut Id3v1Tag {
        self.id3v1.get_or_insert_with(Id3v1Tag::new)
    }

    /// Write a value through to every present tag, so external readers see consistent values.
    pub fn set_all(&mut self, key: StandardTagKey, value: Value) {
        if let Some(ape) = &mut self.ape {
            ape.set(key, value.clone());
        }

        if let Some(id3v1) = &mut self.id3v1 {
            id3v1.set(key, value);
        }
    }

    /// Read a value with APE precedence, falling back to ID3v1.
    pub fn get(&self, key: StandardTagKey) -> Option<Value> {
        if let Some(ape) = &self.ape {
            if let Some(value) = ape.get(key) {
                return Some(value);
            }
        }

        self.id3v1.as_ref().and_then(|id3v1| id3v1.get(key))
    }

    /// The visuals of the APE tag. ID3v1 cannot carry any.
    pub fn visuals(&self) -> Vec<Visual> {
        self.ape.as_ref().map(|ape| ape.visuals()).unwrap_or_default()
    }
}
