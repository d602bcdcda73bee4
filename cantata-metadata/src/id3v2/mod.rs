// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An ID3v2 (versions 2.2 through 2.4) tag reader and writer.
//!
//! Reading accepts all three major versions. Writing emits ID3v2.4 by default, or ID3v2.3 on
//! request; ID3v2.2 is read-only.

use cantata_core::errors::{
    invalid_field_error, invalid_magic_error, invalid_version_error, limit_error,
    unsupported_error, Result,
};
use cantata_core::io::{BufReader, FiniteStream, ReadBytes};
use cantata_core::meta::{ReadOptions, StandardTagKey, Tag, TagLike, Value, Visual};

use bitflags::bitflags;
use lazy_static::lazy_static;
use log::{trace, warn};
use smallvec::SmallVec;

use std::collections::HashMap;

pub mod frames;
mod render;
pub mod unsync;

pub use frames::{Encoding, Frame, FrameId, FrameValue};
pub use render::{render, RenderOptions, Version};

use frames::{min_frame_size, read_id3v2p2_frame, read_id3v2p3_frame, read_id3v2p4_frame};
use frames::FrameResult;
use unsync::{decode_unsynchronisation, read_syncsafe_leq32};

/// The owner identifier used by MusicBrainz for recording identifiers in `UFID` frames.
const MUSICBRAINZ_UFID_OWNER: &str = "http://musicbrainz.org";

bitflags! {
    /// ID3v2 tag header flags. Flags were added sequentially each major version.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct TagFlags: u8 {
        /// The tag body is unsynchronised (all versions).
        const UNSYNCHRONISATION = 0x80;
        /// An extended header follows the header (ID3v2.3+).
        const EXTENDED_HEADER = 0x40;
        /// The tag is experimental (ID3v2.3+).
        const EXPERIMENTAL = 0x20;
        /// A footer trails the tag (ID3v2.4 only).
        const FOOTER = 0x10;
    }
}

/// The ID3v2 tag header.
#[derive(Debug)]
struct Header {
    major_version: u8,
    minor_version: u8,
    size: u32,
    unsynchronisation: bool,
    has_extended_header: bool,
    experimental: bool,
    has_footer: bool,
}

/// Read the header of an ID3v2 (versions 2.2+) tag.
fn read_id3v2_header<B: ReadBytes>(reader: &mut B) -> Result<Header> {
    let marker = reader.read_triple_bytes()?;

    if marker != *b"ID3" {
        return invalid_magic_error("id3v2: not an ID3v2 tag");
    }

    let major_version = reader.read_u8()?;
    let minor_version = reader.read_u8()?;
    let flags = reader.read_u8()?;
    let size = read_syncsafe_leq32(reader, 28)?;

    let mut header = Header {
        major_version,
        minor_version,
        size,
        unsynchronisation: false,
        has_extended_header: false,
        experimental: false,
        has_footer: false,
    };

    // Major and minor version numbers should never equal 0xff as per the specification.
    if major_version == 0xff || minor_version == 0xff {
        return invalid_version_error("id3v2: invalid version number(s)");
    }

    // Only versions 2.2.x through 2.4.x of the specification exist.
    if major_version < 2 || major_version > 4 {
        return invalid_version_error("id3v2: unsupported ID3v2 version");
    }

    // Version 2.2 of the standard specifies a compression flag bit, but does not specify a
    // compression standard. Future versions of the standard remove this feature and repurpose
    // this bit for other features. Since there is no way to know how to handle the remaining
    // tag data, return an unsupported error.
    if major_version == 2 && (flags & 0x40) != 0 {
        return unsupported_error("id3v2: ID3v2.2 compression is not supported");
    }

    // With the exception of the compression flag in version 2.2, flags were added sequentially
    // each major version. Check each bit sequentially as they appear in each version.
    if major_version >= 2 {
        header.unsynchronisation = flags & TagFlags::UNSYNCHRONISATION.bits() != 0;
    }

    if major_version >= 3 {
        header.has_extended_header = flags & TagFlags::EXTENDED_HEADER.bits() != 0;
        header.experimental = flags & TagFlags::EXPERIMENTAL.bits() != 0;
    }

    if major_version >= 4 {
        header.has_footer = flags & TagFlags::FOOTER.bits() != 0;
    }

    // Undefined flag bits must be zero.
    let defined = match major_version {
        2 => 0xc0,
        3 => 0xe0,
        _ => 0xf0,
    };

    if flags & !defined != 0 {
        return invalid_field_error("id3v2: undefined flag bits are set");
    }

    Ok(header)
}

/// Skip the extended header of an ID3v2.3 tag.
fn skip_id3v2p3_extended_header<B: ReadBytes>(reader: &mut B) -> Result<()> {
    // The size excludes the 4 size bytes themselves.
    let size = reader.read_be_u32()?;

    if !(size == 6 || size == 10) {
        return invalid_field_error("id3v2: invalid extended header size");
    }

    reader.ignore_bytes(u64::from(size))?;
    Ok(())
}

/// Skip the extended header of an ID3v2.4 tag.
fn skip_id3v2p4_extended_header<B: ReadBytes>(reader: &mut B) -> Result<()> {
    // The syncsafe size includes the 4 size bytes themselves.
    let size = read_syncsafe_leq32(reader, 28)?;

    if size < 6 {
        return invalid_field_error("id3v2: invalid extended header size");
    }

    reader.ignore_bytes(u64::from(size) - 4)?;
    Ok(())
}

/// An ID3v2 tag: an ordered sequence of typed frames.
///
/// Frame insertion order is preserved across a parse-render round trip. Duplicate frames are
/// permitted for the frame kinds that allow them (`UFID`, `APIC`, `COMM`, `USLT`, `TXXX`,
/// `WXXX`, `PRIV`, `POPM`, `RVA2`).
#[derive(Clone, Debug, Default)]
pub struct Id3v2Tag {
    /// The major version the tag was read from, or 0 for a tag created in memory.
    source_version: u8,
    frames: Vec<Frame>,
}

impl Id3v2Tag {
    /// Create a new, empty, tag.
    pub fn new() -> Id3v2Tag {
        Id3v2Tag::default()
    }

    /// Read a tag from a buffer starting with an ID3v2 header.
    ///
    /// A malformed frame is skipped and the scan continues; a frame whose declared size escapes
    /// the tag terminates the scan with the frames read so far. A malformed tag header is fatal.
    pub fn read(buf: &[u8], opts: &ReadOptions) -> Result<Id3v2Tag> {
        let mut reader = BufReader::new(buf);

        let header = read_id3v2_header(&mut reader)?;

        if let Some(limit) = opts.limit_tag_bytes.limit_or_default(ReadOptions::DEFAULT_TAG_BYTES)
        {
            if header.size as usize > limit {
                return limit_error("id3v2: tag size exceeds limit");
            }
        }

        trace!("id3v2: version 2.{}.{}, {} bytes", header.major_version, header.minor_version, header.size);

        let body_len = (header.size as usize).min(buf.len() - reader.pos() as usize);
        let body = reader.read_buf_bytes_ref(body_len)?;

        // If the unsynchronisation flag is set in the header, the entire tag body must be
        // decoded before any frame is read. ID3v2.4 frames may additionally be unsynchronised
        // individually, which is handled by the frame reader.
        let mut frames = Vec::new();

        if header.unsynchronisation {
            let mut decoded = body.to_vec();
            let decoded = decode_unsynchronisation(&mut decoded);

            read_id3v2_body(&mut BufReader::new(decoded), &header, &mut frames)?;
        }
        else {
            read_id3v2_body(&mut BufReader::new(body), &header, &mut frames)?;
        }

        Ok(Id3v2Tag { source_version: header.major_version, frames })
    }

    /// Gets the total encoded length in bytes of a tag starting at the beginning of the
    /// provided buffer: header, body, and footer if flagged. Fails if the buffer does not start
    /// with an ID3v2 header.
    pub fn total_len(buf: &[u8]) -> Result<usize> {
        let header = read_id3v2_header(&mut BufReader::new(buf))?;
        Ok(10 + header.size as usize + if header.has_footer { 10 } else { 0 })
    }

    /// The major version the tag was read from, or 0 for a tag created in memory.
    pub fn source_version(&self) -> u8 {
        self.source_version
    }

    /// Gets the frames in insertion order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Appends a frame.
    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Removes all frames with the given identifier.
    pub fn remove_frames(&mut self, id: [u8; 4]) {
        self.frames.retain(|frame| frame.id.as_bytes() != &id);
    }

    /// Render the tag as ID3v2.4 with default options.
    pub fn render_v24(&self) -> Result<Vec<u8>> {
        render(self, &RenderOptions::default())
    }

    // Generic frame accessors

    /// Gets the first value of the first text frame with the given identifier.
    pub fn text(&self, id: [u8; 4]) -> Option<&str> {
        self.frames.iter().find(|frame| frame.id.as_bytes() == &id).and_then(|frame| {
            match &frame.value {
                FrameValue::Text { values, .. } => values.first().map(|s| s.as_str()),
                _ => None,
            }
        })
    }

    /// Gets all values of the first text frame with the given identifier.
    ///
    /// ID3v2.4 multi-values are stored NUL-separated on the wire and returned as-is. For tags
    /// read from ID3v2.3, a single value containing `" / "` is split as a read-side
    /// convenience; the stored frame is not modified.
    pub fn text_values(&self, id: [u8; 4]) -> Vec<String> {
        let frame = self.frames.iter().find(|frame| frame.id.as_bytes() == &id);

        let values = match frame.map(|f| &f.value) {
            Some(FrameValue::Text { values, .. }) => values,
            _ => return Vec::new(),
        };

        if self.source_version == 3 && values.len() == 1 && values[0].contains(" / ") {
            return values[0].split(" / ").map(|s| s.to_string()).collect();
        }

        values.iter().cloned().collect()
    }

    /// Sets a text frame to a single value, replacing any frames with the same identifier. An
    /// empty value removes the frame.
    pub fn set_text(&mut self, id: [u8; 4], value: &str) {
        if value.is_empty() {
            self.remove_frames(id);
        }
        else {
            self.set_text_values(id, vec![value.to_string()]);
        }
    }

    /// Sets a text frame to the given values, replacing any frames with the same identifier.
    pub fn set_text_values(&mut self, id: [u8; 4], values: Vec<String>) {
        self.remove_frames(id);

        if !values.is_empty() {
            self.frames.push(Frame::new(
                id,
                FrameValue::Text { encoding: Encoding::Utf8, values: SmallVec::from_vec(values) },
            ));
        }
    }

    /// Gets the first value of the user text (`TXXX`) frame with the given description.
    /// Description matching is case-insensitive.
    pub fn user_text(&self, description: &str) -> Option<&str> {
        self.frames.iter().find_map(|frame| match &frame.value {
            FrameValue::UserText { description: desc, values, .. }
                if desc.eq_ignore_ascii_case(description) =>
            {
                values.first().map(|s| s.as_str())
            }
            _ => None,
        })
    }

    /// Sets the user text (`TXXX`) frame with the given description, replacing an existing
    /// frame with the same description. An empty value removes the frame.
    pub fn set_user_text(&mut self, description: &str, value: &str) {
        self.remove_user_text(description);

        if !value.is_empty() {
            self.frames.push(Frame::new(
                *b"TXXX",
                FrameValue::UserText {
                    encoding: Encoding::Utf8,
                    description: description.to_string(),
                    values: SmallVec::from_vec(vec![value.to_string()]),
                },
            ));
        }
    }

    /// Removes the user text (`TXXX`) frames with the given description.
    pub fn remove_user_text(&mut self, description: &str) {
        self.frames.retain(|frame| match &frame.value {
            FrameValue::UserText { description: desc, .. } => {
                !desc.eq_ignore_ascii_case(description)
            }
            _ => true,
        });
    }

    // Typed accessors

    /// The track title (`TIT2`).
    pub fn title(&self) -> Option<&str> {
        self.text(*b"TIT2")
    }

    pub fn set_title(&mut self, title: &str) {
        self.set_text(*b"TIT2", title);
    }

    /// The lead performer (`TPE1`).
    pub fn artist(&self) -> Option<&str> {
        self.text(*b"TPE1")
    }

    pub fn set_artist(&mut self, artist: &str) {
        self.set_text(*b"TPE1", artist);
    }

    /// The album title (`TALB`).
    pub fn album(&self) -> Option<&str> {
        self.text(*b"TALB")
    }

    pub fn set_album(&mut self, album: &str) {
        self.set_text(*b"TALB", album);
    }

    /// The album artist (`TPE2`).
    pub fn album_artist(&self) -> Option<&str> {
        self.text(*b"TPE2")
    }

    pub fn set_album_artist(&mut self, artist: &str) {
        self.set_text(*b"TPE2", artist);
    }

    /// The composer (`TCOM`).
    pub fn composer(&self) -> Option<&str> {
        self.text(*b"TCOM")
    }

    pub fn set_composer(&mut self, composer: &str) {
        self.set_text(*b"TCOM", composer);
    }

    /// The conductor (`TPE3`).
    pub fn conductor(&self) -> Option<&str> {
        self.text(*b"TPE3")
    }

    pub fn set_conductor(&mut self, conductor: &str) {
        self.set_text(*b"TPE3", conductor);
    }

    /// The recording date (`TDRC`), falling back to the year (`TYER`) for tags read from
    /// ID3v2.3 and earlier.
    pub fn date(&self) -> Option<&str> {
        self.text(*b"TDRC").or_else(|| self.text(*b"TYER"))
    }

    pub fn set_date(&mut self, date: &str) {
        self.remove_frames(*b"TYER");
        self.remove_frames(*b"TDAT");
        self.remove_frames(*b"TIME");
        self.set_text(*b"TDRC", date);
    }

    /// The content type (`TCON`) with ID3v1 genre references resolved.
    ///
    /// A value of the form `(NN)` or a bare index is translated through the ID3v1 genre table.
    pub fn genre(&self) -> Option<String> {
        let value = self.text(*b"TCON")?;
        Some(resolve_genre(value))
    }

    pub fn set_genre(&mut self, genre: &str) {
        self.set_text(*b"TCON", genre);
    }

    /// The track number, the `N` of a `N/M` (`TRCK`) value.
    pub fn track(&self) -> Option<u32> {
        split_of_n(self.text(*b"TRCK")?).0
    }

    /// The total number of tracks, the `M` of a `N/M` (`TRCK`) value.
    pub fn track_total(&self) -> Option<u32> {
        split_of_n(self.text(*b"TRCK")?).1
    }

    pub fn set_track(&mut self, track: Option<u32>, total: Option<u32>) {
        match join_of_n(track, total) {
            Some(value) => self.set_text(*b"TRCK", &value),
            None => self.remove_frames(*b"TRCK"),
        }
    }

    /// The disc number, the `N` of a `N/M` (`TPOS`) value.
    pub fn disc(&self) -> Option<u32> {
        split_of_n(self.text(*b"TPOS")?).0
    }

    /// The total number of discs, the `M` of a `N/M` (`TPOS`) value.
    pub fn disc_total(&self) -> Option<u32> {
        split_of_n(self.text(*b"TPOS")?).1
    }

    pub fn set_disc(&mut self, disc: Option<u32>, total: Option<u32>) {
        match join_of_n(disc, total) {
            Some(value) => self.set_text(*b"TPOS", &value),
            None => self.remove_frames(*b"TPOS"),
        }
    }

    /// The iTunes compilation flag (`TCMP`).
    pub fn compilation(&self) -> bool {
        self.text(*b"TCMP").map(|v| v == "1").unwrap_or(false)
    }

    pub fn set_compilation(&mut self, compilation: bool) {
        if compilation {
            self.set_text(*b"TCMP", "1");
        }
        else {
            self.remove_frames(*b"TCMP");
        }
    }

    /// The text of the first comment (`COMM`) frame.
    pub fn comment(&self) -> Option<&str> {
        self.frames.iter().find_map(|frame| match &frame.value {
            FrameValue::Comment { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.frames.retain(|frame| !matches!(frame.value, FrameValue::Comment { .. }));

        if !comment.is_empty() {
            self.frames.push(Frame::new(
                *b"COMM",
                FrameValue::Comment {
                    encoding: Encoding::Utf8,
                    language: *b"XXX",
                    description: String::new(),
                    text: comment.to_string(),
                },
            ));
        }
    }

    /// The text of the first lyrics (`USLT`) frame.
    pub fn lyrics(&self) -> Option<&str> {
        self.frames.iter().find_map(|frame| match &frame.value {
            FrameValue::Lyrics { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn set_lyrics(&mut self, lyrics: &str) {
        self.frames.retain(|frame| !matches!(frame.value, FrameValue::Lyrics { .. }));

        if !lyrics.is_empty() {
            self.frames.push(Frame::new(
                *b"USLT",
                FrameValue::Lyrics {
                    encoding: Encoding::Utf8,
                    language: *b"XXX",
                    description: String::new(),
                    text: lyrics.to_string(),
                },
            ));
        }
    }

    /// The play count (`PCNT`).
    pub fn play_counter(&self) -> Option<u64> {
        self.frames.iter().find_map(|frame| match frame.value {
            FrameValue::PlayCounter(count) => Some(count),
            _ => None,
        })
    }

    /// The rating of the first popularimeter (`POPM`) frame.
    pub fn rating(&self) -> Option<u8> {
        self.frames.iter().find_map(|frame| match frame.value {
            FrameValue::Popularimeter { rating, .. } => Some(rating),
            _ => None,
        })
    }

    // MusicBrainz and AcoustID identifiers

    /// The MusicBrainz recording identifier (`UFID` frame with the MusicBrainz owner).
    pub fn musicbrainz_recording_id(&self) -> Option<String> {
        self.frames.iter().find_map(|frame| match &frame.value {
            FrameValue::UniqueFileId { owner, identifier }
                if owner == MUSICBRAINZ_UFID_OWNER =>
            {
                Some(String::from_utf8_lossy(identifier).into_owned())
            }
            _ => None,
        })
    }

    pub fn set_musicbrainz_recording_id(&mut self, id: &str) {
        self.frames.retain(|frame| match &frame.value {
            FrameValue::UniqueFileId { owner, .. } => owner != MUSICBRAINZ_UFID_OWNER,
            _ => true,
        });

        if !id.is_empty() {
            self.frames.push(Frame::new(
                *b"UFID",
                FrameValue::UniqueFileId {
                    owner: MUSICBRAINZ_UFID_OWNER.to_string(),
                    identifier: Box::from(id.as_bytes()),
                },
            ));
        }
    }

    /// The MusicBrainz release identifier (`TXXX:MusicBrainz Album Id`).
    pub fn musicbrainz_album_id(&self) -> Option<&str> {
        self.user_text("MusicBrainz Album Id")
    }

    pub fn set_musicbrainz_album_id(&mut self, id: &str) {
        self.set_user_text("MusicBrainz Album Id", id);
    }

    /// The MusicBrainz artist identifier (`TXXX:MusicBrainz Artist Id`).
    pub fn musicbrainz_artist_id(&self) -> Option<&str> {
        self.user_text("MusicBrainz Artist Id")
    }

    pub fn set_musicbrainz_artist_id(&mut self, id: &str) {
        self.set_user_text("MusicBrainz Artist Id", id);
    }

    /// The AcoustID identifier (`TXXX:Acoustid Id`).
    pub fn acoustid_id(&self) -> Option<&str> {
        self.user_text("Acoustid Id")
    }

    pub fn set_acoustid_id(&mut self, id: &str) {
        self.set_user_text("Acoustid Id", id);
    }

    /// The AcoustID fingerprint (`TXXX:Acoustid Fingerprint`).
    pub fn acoustid_fingerprint(&self) -> Option<&str> {
        self.user_text("Acoustid Fingerprint")
    }

    pub fn set_acoustid_fingerprint(&mut self, fingerprint: &str) {
        self.set_user_text("Acoustid Fingerprint", fingerprint);
    }

    // ReplayGain and R128 loudness

    /// The ReplayGain track gain stored verbatim (`TXXX:REPLAYGAIN_TRACK_GAIN`), e.g.
    /// `"-6.50 dB"`.
    pub fn replay_gain_track_gain(&self) -> Option<&str> {
        self.user_text("REPLAYGAIN_TRACK_GAIN")
    }

    pub fn set_replay_gain_track_gain(&mut self, gain: &str) {
        self.set_user_text("REPLAYGAIN_TRACK_GAIN", gain);
    }

    /// The ReplayGain track peak stored verbatim (`TXXX:REPLAYGAIN_TRACK_PEAK`).
    pub fn replay_gain_track_peak(&self) -> Option<&str> {
        self.user_text("REPLAYGAIN_TRACK_PEAK")
    }

    pub fn set_replay_gain_track_peak(&mut self, peak: &str) {
        self.set_user_text("REPLAYGAIN_TRACK_PEAK", peak);
    }

    /// The ReplayGain album gain stored verbatim (`TXXX:REPLAYGAIN_ALBUM_GAIN`).
    pub fn replay_gain_album_gain(&self) -> Option<&str> {
        self.user_text("REPLAYGAIN_ALBUM_GAIN")
    }

    pub fn set_replay_gain_album_gain(&mut self, gain: &str) {
        self.set_user_text("REPLAYGAIN_ALBUM_GAIN", gain);
    }

    /// The R128 track gain as stored: a decimal integer string in Q7.8 fixed point
    /// (`TXXX:R128_TRACK_GAIN`).
    pub fn r128_track_gain(&self) -> Option<&str> {
        self.user_text("R128_TRACK_GAIN")
    }

    /// The R128 track gain in dB, converted from the stored Q7.8 value.
    pub fn r128_track_gain_db(&self) -> Option<f64> {
        self.r128_track_gain()?.trim().parse::<i32>().ok().map(|q| f64::from(q) / 256.0)
    }

    /// Sets the R128 track gain from a dB value. The stored Q7.8 value is clamped to the signed
    /// 16-bit range.
    pub fn set_r128_track_gain_db(&mut self, db: f64) {
        let q78 = clamp_q78(db);
        self.set_user_text("R128_TRACK_GAIN", &q78.to_string());
    }

    /// The R128 album gain as stored (`TXXX:R128_ALBUM_GAIN`).
    pub fn r128_album_gain(&self) -> Option<&str> {
        self.user_text("R128_ALBUM_GAIN")
    }

    /// The R128 album gain in dB, converted from the stored Q7.8 value.
    pub fn r128_album_gain_db(&self) -> Option<f64> {
        self.r128_album_gain()?.trim().parse::<i32>().ok().map(|q| f64::from(q) / 256.0)
    }

    /// Sets the R128 album gain from a dB value. The stored Q7.8 value is clamped to the signed
    /// 16-bit range.
    pub fn set_r128_album_gain_db(&mut self, db: f64) {
        let q78 = clamp_q78(db);
        self.set_user_text("R128_ALBUM_GAIN", &q78.to_string());
    }

    /// All attached pictures (`APIC` frames).
    pub fn pictures(&self) -> Vec<Visual> {
        self.frames
            .iter()
            .filter_map(|frame| match &frame.value {
                FrameValue::Picture { media_type, picture_type, description, data, .. } => {
                    Some(Visual {
                        media_type: media_type.clone(),
                        picture_type: *picture_type,
                        description: description.clone(),
                        dimensions: Default::default(),
                        bits_per_pixel: 0,
                        indexed_colors: 0,
                        data: data.clone(),
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Attaches a picture as an `APIC` frame.
    pub fn add_picture(&mut self, visual: Visual) {
        self.frames.push(Frame::new(
            *b"APIC",
            FrameValue::Picture {
                encoding: Encoding::Utf8,
                media_type: visual.media_type,
                picture_type: visual.picture_type,
                description: visual.description,
                data: visual.data,
            },
        ));
    }

    /// Removes all `APIC` frames.
    pub fn remove_pictures(&mut self) {
        self.frames.retain(|frame| !matches!(frame.value, FrameValue::Picture { .. }));
    }
}

fn read_id3v2_body<B: ReadBytes + FiniteStream>(
    reader: &mut B,
    header: &Header,
    frames: &mut Vec<Frame>,
) -> Result<()> {
    // If there is an extended header, skip it based on the major version of the tag.
    if header.has_extended_header {
        match header.major_version {
            3 => skip_id3v2p3_extended_header(reader)?,
            4 => skip_id3v2p4_extended_header(reader)?,
            _ => unreachable!(),
        }
    }

    let min_frame_size = min_frame_size(header.major_version);

    // Read frames until the padding is reached, or there are not enough bytes available in the
    // tag for another frame.
    while reader.bytes_available() >= min_frame_size {
        let frame = match header.major_version {
            2 => read_id3v2p2_frame(reader),
            3 => read_id3v2p3_frame(reader),
            4 => read_id3v2p4_frame(reader),
            _ => break,
        };

        match frame {
            Ok(FrameResult::Frame(frame)) => frames.push(frame),
            Ok(FrameResult::Skipped) => (),
            // The padding has been reached, don't parse any further.
            Ok(FrameResult::Padding) => break,
            // A frame that escapes the tag bounds terminates the scan. Frames read up-to this
            // point are retained.
            Err(err) => {
                warn!("id3v2: frame scan terminated: {}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Resolve ID3v1 genre references of the form `(NN)`, `(NN)Name`, or a bare index.
fn resolve_genre(value: &str) -> String {
    if let Some(rest) = value.strip_prefix('(') {
        if let Some((num, trailer)) = rest.split_once(')') {
            if let Ok(index) = num.parse::<u8>() {
                if !trailer.is_empty() {
                    return trailer.to_string();
                }
                if let Some(name) = crate::id3v1::genre_name(index) {
                    return name.to_string();
                }
            }
        }
    }
    else if let Ok(index) = value.parse::<u8>() {
        if let Some(name) = crate::id3v1::genre_name(index) {
            return name.to_string();
        }
    }

    value.to_string()
}

/// Split a `"N"` or `"N/M"` style value into its parts.
fn split_of_n(value: &str) -> (Option<u32>, Option<u32>) {
    match value.split_once('/') {
        Some((n, m)) => (n.trim().parse().ok(), m.trim().parse().ok()),
        None => (value.trim().parse().ok(), None),
    }
}

/// Join number and total back into a `"N"` or `"N/M"` style value.
fn join_of_n(n: Option<u32>, m: Option<u32>) -> Option<String> {
    match (n, m) {
        (Some(n), Some(m)) => Some(format!("{}/{}", n, m)),
        (Some(n), None) => Some(n.to_string()),
        (None, Some(m)) => Some(format!("0/{}", m)),
        (None, None) => None,
    }
}

/// Convert a dB value into Q7.8 fixed point, clamped to the signed 16-bit range.
fn clamp_q78(db: f64) -> i32 {
    let q = (db * 256.0).round();
    q.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i32
}

lazy_static! {
    /// Standard keys carried by plain text frames.
    static ref TEXT_FRAME_KEYS: HashMap<StandardTagKey, [u8; 4]> = {
        let mut m = HashMap::new();
        m.insert(StandardTagKey::TrackTitle, *b"TIT2");
        m.insert(StandardTagKey::Artist, *b"TPE1");
        m.insert(StandardTagKey::Album, *b"TALB");
        m.insert(StandardTagKey::AlbumArtist, *b"TPE2");
        m.insert(StandardTagKey::Composer, *b"TCOM");
        m.insert(StandardTagKey::Conductor, *b"TPE3");
        m.insert(StandardTagKey::Remixer, *b"TPE4");
        m.insert(StandardTagKey::Lyricist, *b"TEXT");
        m.insert(StandardTagKey::ContentGroup, *b"TIT1");
        m.insert(StandardTagKey::TrackSubtitle, *b"TIT3");
        m.insert(StandardTagKey::DiscSubtitle, *b"TSST");
        m.insert(StandardTagKey::Bpm, *b"TBPM");
        m.insert(StandardTagKey::Copyright, *b"TCOP");
        m.insert(StandardTagKey::EncodedBy, *b"TENC");
        m.insert(StandardTagKey::Encoder, *b"TSSE");
        m.insert(StandardTagKey::Label, *b"TPUB");
        m.insert(StandardTagKey::IdentIsrc, *b"TSRC");
        m.insert(StandardTagKey::Language, *b"TLAN");
        m.insert(StandardTagKey::MediaFormat, *b"TMED");
        m.insert(StandardTagKey::Mood, *b"TMOO");
        m.insert(StandardTagKey::Date, *b"TDRC");
        m.insert(StandardTagKey::OriginalDate, *b"TDOR");
        m.insert(StandardTagKey::OriginalAlbum, *b"TOAL");
        m.insert(StandardTagKey::OriginalArtist, *b"TOPE");
        m.insert(StandardTagKey::OriginalWriter, *b"TOLY");
        m.insert(StandardTagKey::OriginalFile, *b"TOFN");
        m.insert(StandardTagKey::Owner, *b"TOWN");
        m.insert(StandardTagKey::Genre, *b"TCON");
        m.insert(StandardTagKey::Compilation, *b"TCMP");
        m.insert(StandardTagKey::SortTrackTitle, *b"TSOT");
        m.insert(StandardTagKey::SortArtist, *b"TSOP");
        m.insert(StandardTagKey::SortAlbum, *b"TSOA");
        m.insert(StandardTagKey::SortAlbumArtist, *b"TSO2");
        m.insert(StandardTagKey::SortComposer, *b"TSOC");
        m
    };

    /// Standard keys carried by `TXXX` frames, keyed by description.
    static ref USER_TEXT_KEYS: Vec<(&'static str, StandardTagKey)> = vec![
        ("MusicBrainz Album Id", StandardTagKey::MusicBrainzAlbumId),
        ("MusicBrainz Artist Id", StandardTagKey::MusicBrainzArtistId),
        ("MusicBrainz Album Artist Id", StandardTagKey::MusicBrainzAlbumArtistId),
        ("MusicBrainz Release Group Id", StandardTagKey::MusicBrainzReleaseGroupId),
        ("MusicBrainz Release Track Id", StandardTagKey::MusicBrainzReleaseTrackId),
        ("MusicBrainz Work Id", StandardTagKey::MusicBrainzWorkId),
        ("MusicBrainz Disc Id", StandardTagKey::MusicBrainzDiscId),
        ("Acoustid Id", StandardTagKey::AcoustidId),
        ("Acoustid Fingerprint", StandardTagKey::AcoustidFingerprint),
        ("REPLAYGAIN_TRACK_GAIN", StandardTagKey::ReplayGainTrackGain),
        ("REPLAYGAIN_TRACK_PEAK", StandardTagKey::ReplayGainTrackPeak),
        ("REPLAYGAIN_ALBUM_GAIN", StandardTagKey::ReplayGainAlbumGain),
        ("REPLAYGAIN_ALBUM_PEAK", StandardTagKey::ReplayGainAlbumPeak),
        ("ASIN", StandardTagKey::IdentAsin),
        ("BARCODE", StandardTagKey::IdentBarcode),
        ("CATALOGNUMBER", StandardTagKey::IdentCatalogNumber),
        ("LICENSE", StandardTagKey::License),
    ];

    /// Standard keys carried by URL frames.
    static ref URL_FRAME_KEYS: HashMap<StandardTagKey, [u8; 4]> = {
        let mut m = HashMap::new();
        m.insert(StandardTagKey::UrlOfficial, *b"WOAF");
        m.insert(StandardTagKey::UrlArtist, *b"WOAR");
        m.insert(StandardTagKey::UrlSource, *b"WOAS");
        m.insert(StandardTagKey::UrlCopyright, *b"WCOP");
        m.insert(StandardTagKey::UrlLabel, *b"WPUB");
        m
    };
}

fn user_text_std_key(description: &str) -> Option<StandardTagKey> {
    USER_TEXT_KEYS
        .iter()
        .find(|(desc, _)| desc.eq_ignore_ascii_case(description))
        .map(|&(_, std)| std)
}

fn user_text_description(std: StandardTagKey) -> Option<&'static str> {
    USER_TEXT_KEYS.iter().find(|&&(_, key)| key == std).map(|&(desc, _)| desc)
}

fn text_frame_std_key(id: &[u8; 4]) -> Option<StandardTagKey> {
    TEXT_FRAME_KEYS.iter().find(|&(_, fid)| fid == id).map(|(&std, _)| std)
}

fn url_frame_std_key(id: &[u8; 4]) -> Option<StandardTagKey> {
    URL_FRAME_KEYS.iter().find(|&(_, fid)| fid == id).map(|(&std, _)| std)
}

impl TagLike for Id3v2Tag {
    fn get(&self, key: StandardTagKey) -> Option<Value> {
        match key {
            StandardTagKey::TrackNumber => return self.track().map(Value::from),
            StandardTagKey::TrackTotal => return self.track_total().map(Value::from),
            StandardTagKey::DiscNumber => return self.disc().map(Value::from),
            StandardTagKey::DiscTotal => return self.disc_total().map(Value::from),
            StandardTagKey::Comment => return self.comment().map(Value::from),
            StandardTagKey::Lyrics => return self.lyrics().map(Value::from),
            StandardTagKey::Genre => return self.genre().map(Value::from),
            StandardTagKey::Compilation => {
                return if self.compilation() { Some(Value::Boolean(true)) } else { None }
            }
            StandardTagKey::PlayCounter => return self.play_counter().map(Value::from),
            StandardTagKey::Rating => return self.rating().map(Value::from),
            StandardTagKey::MusicBrainzRecordingId => {
                return self.musicbrainz_recording_id().map(Value::from)
            }
            StandardTagKey::Date => return self.date().map(Value::from),
            _ => (),
        }

        if let Some(&id) = TEXT_FRAME_KEYS.get(&key) {
            return self.text(id).map(Value::from);
        }

        if let Some(desc) = user_text_description(key) {
            return self.user_text(desc).map(Value::from);
        }

        if let Some(&id) = URL_FRAME_KEYS.get(&key) {
            return self.frames.iter().find(|frame| frame.id.as_bytes() == &id).and_then(
                |frame| match &frame.value {
                    FrameValue::Url(url) => Some(Value::from(url.as_str())),
                    _ => None,
                },
            );
        }

        None
    }

    fn set(&mut self, key: StandardTagKey, value: Value) {
        let text = value.to_string();

        match key {
            StandardTagKey::TrackNumber => {
                let total = self.track_total();
                self.set_track(text.parse().ok(), total);
                return;
            }
            StandardTagKey::TrackTotal => {
                let track = self.track();
                self.set_track(track, text.parse().ok());
                return;
            }
            StandardTagKey::DiscNumber => {
                let total = self.disc_total();
                self.set_disc(text.parse().ok(), total);
                return;
            }
            StandardTagKey::DiscTotal => {
                let disc = self.disc();
                self.set_disc(disc, text.parse().ok());
                return;
            }
            StandardTagKey::Comment => {
                self.set_comment(&text);
                return;
            }
            StandardTagKey::Lyrics => {
                self.set_lyrics(&text);
                return;
            }
            StandardTagKey::Compilation => {
                self.set_compilation(matches!(value, Value::Boolean(true)) || text == "1");
                return;
            }
            StandardTagKey::MusicBrainzRecordingId => {
                self.set_musicbrainz_recording_id(&text);
                return;
            }
            StandardTagKey::Date => {
                self.set_date(&text);
                return;
            }
            _ => (),
        }

        if let Some(&id) = TEXT_FRAME_KEYS.get(&key) {
            self.set_text(id, &text);
        }
        else if let Some(desc) = user_text_description(key) {
            self.set_user_text(desc, &text);
        }
        else if let Some(&id) = URL_FRAME_KEYS.get(&key) {
            self.remove_frames(id);
            if !text.is_empty() {
                self.frames.push(Frame::new(id, FrameValue::Url(text)));
            }
        }
    }

    fn remove(&mut self, key: StandardTagKey) {
        match key {
            StandardTagKey::Comment => {
                self.frames.retain(|frame| !matches!(frame.value, FrameValue::Comment { .. }));
            }
            StandardTagKey::Lyrics => {
                self.frames.retain(|frame| !matches!(frame.value, FrameValue::Lyrics { .. }));
            }
            StandardTagKey::MusicBrainzRecordingId => self.set_musicbrainz_recording_id(""),
            StandardTagKey::TrackNumber | StandardTagKey::TrackTotal => {
                self.remove_frames(*b"TRCK")
            }
            StandardTagKey::DiscNumber | StandardTagKey::DiscTotal => {
                self.remove_frames(*b"TPOS")
            }
            _ => {
                if let Some(&id) = TEXT_FRAME_KEYS.get(&key) {
                    self.remove_frames(id);
                }
                else if let Some(desc) = user_text_description(key) {
                    self.remove_user_text(desc);
                }
                else if let Some(&id) = URL_FRAME_KEYS.get(&key) {
                    self.remove_frames(id);
                }
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn tags(&self) -> Vec<Tag> {
        let mut tags = Vec::with_capacity(self.frames.len());

        for frame in &self.frames {
            let id = frame.id.as_bytes();

            match &frame.value {
                FrameValue::Text { values, .. } => {
                    let std_key = text_frame_std_key(id);
                    for value in values {
                        tags.push(Tag::new(std_key, frame.id.as_str(), Value::from(value.as_str())));
                    }
                }
                FrameValue::UserText { description, values, .. } => {
                    let std_key = user_text_std_key(description);
                    let key = format!("TXXX:{}", description);
                    for value in values {
                        tags.push(Tag::new(std_key, &key, Value::from(value.as_str())));
                    }
                }
                FrameValue::Url(url) => {
                    tags.push(Tag::new(
                        url_frame_std_key(id),
                        frame.id.as_str(),
                        Value::from(url.as_str()),
                    ));
                }
                FrameValue::UserUrl { description, url, .. } => {
                    let key = format!("WXXX:{}", description);
                    tags.push(Tag::new(Some(StandardTagKey::Url), &key, Value::from(url.as_str())));
                }
                FrameValue::Comment { text, .. } => {
                    tags.push(Tag::new(
                        Some(StandardTagKey::Comment),
                        frame.id.as_str(),
                        Value::from(text.as_str()),
                    ));
                }
                FrameValue::Lyrics { text, .. } => {
                    tags.push(Tag::new(
                        Some(StandardTagKey::Lyrics),
                        frame.id.as_str(),
                        Value::from(text.as_str()),
                    ));
                }
                FrameValue::UniqueFileId { owner, identifier } => {
                    let key = format!("UFID:{}", owner);
                    let std_key = if owner == MUSICBRAINZ_UFID_OWNER {
                        Some(StandardTagKey::MusicBrainzRecordingId)
                    }
                    else {
                        None
                    };
                    tags.push(Tag::new(std_key, &key, Value::Binary(identifier.clone())));
                }
                FrameValue::InvolvedPeople { pairs, .. } => {
                    for (role, person) in pairs {
                        let key = format!("{}:{}", frame.id.as_str(), role);
                        tags.push(Tag::new(None, &key, Value::from(person.as_str())));
                    }
                }
                FrameValue::PlayCounter(count) => {
                    tags.push(Tag::new(
                        Some(StandardTagKey::PlayCounter),
                        frame.id.as_str(),
                        Value::from(*count),
                    ));
                }
                FrameValue::Popularimeter { email, rating, .. } => {
                    let key = format!("POPM:{}", email);
                    tags.push(Tag::new(Some(StandardTagKey::Rating), &key, Value::from(*rating)));
                }
                FrameValue::Private { owner, data } => {
                    let key = format!("PRIV:{}", owner);
                    tags.push(Tag::new(None, &key, Value::Binary(data.clone())));
                }
                FrameValue::Picture { .. } => (),
                FrameValue::RelativeVolume { identification, .. } => {
                    tags.push(Tag::new(
                        None,
                        &format!("RVA2:{}", identification),
                        Value::Flag,
                    ));
                }
                FrameValue::Unknown(data) => {
                    tags.push(Tag::new(None, frame.id.as_str(), Value::Binary(data.clone())));
                }
            }
        }

        tags
    }

    fn visuals(&self) -> Vec<Visual> {
        self.pictures()
    }

    fn add_visual(&mut self, visual: Visual) {
        self.add_picture(visual);
    }

    fn clear_visuals(&mut self) {
        self.remove_pictures();
    }
}

#[cfg(test)]
mod tests {
    use cantata_core::errors::Error;

    use super::*;

    #[test]
    fn verify_minimal_empty_tag() {
        // A valid ID3v2.4 header with a zero tag size.
        let buf = [0x49, 0x44, 0x33, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

        let tag = Id3v2Tag::read(&buf, &Default::default()).unwrap();
        assert_eq!(tag.source_version(), 4);
        assert!(tag.frames().is_empty());
    }

    #[test]
    fn verify_header_validation() {
        // Bad magic.
        let buf = [0x58, 0x44, 0x33, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            Id3v2Tag::read(&buf, &Default::default()),
            Err(Error::InvalidMagic(_))
        ));

        // Unsupported major version.
        let buf = [0x49, 0x44, 0x33, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            Id3v2Tag::read(&buf, &Default::default()),
            Err(Error::InvalidVersion(_))
        ));

        // 0xff minor version.
        let buf = [0x49, 0x44, 0x33, 0x04, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            Id3v2Tag::read(&buf, &Default::default()),
            Err(Error::InvalidVersion(_))
        ));
    }

    #[test]
    fn verify_tag_size_limit() {
        use cantata_core::meta::Limit;

        let buf = [0x49, 0x44, 0x33, 0x04, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00];

        let opts = ReadOptions { limit_tag_bytes: Limit::Maximum(64), ..Default::default() };
        assert!(matches!(Id3v2Tag::read(&buf, &opts), Err(Error::SizeLimit(_))));
    }

    #[test]
    fn verify_r128_conversions() {
        let mut tag = Id3v2Tag::new();

        tag.set_user_text("R128_TRACK_GAIN", "256");
        assert_eq!(tag.r128_track_gain_db(), Some(1.0));

        tag.set_r128_track_gain_db(1.5);
        assert_eq!(tag.r128_track_gain(), Some("384"));

        tag.set_r128_track_gain_db(200.0);
        assert_eq!(tag.r128_track_gain(), Some("32767"));

        tag.set_r128_track_gain_db(-200.0);
        assert_eq!(tag.r128_track_gain(), Some("-32768"));
    }

    #[test]
    fn verify_track_of_total() {
        let mut tag = Id3v2Tag::new();

        tag.set_track(Some(3), Some(12));
        assert_eq!(tag.text(*b"TRCK"), Some("3/12"));
        assert_eq!(tag.track(), Some(3));
        assert_eq!(tag.track_total(), Some(12));

        tag.set_track(Some(4), None);
        assert_eq!(tag.text(*b"TRCK"), Some("4"));
        assert_eq!(tag.track_total(), None);
    }

    #[test]
    fn verify_genre_resolution() {
        let mut tag = Id3v2Tag::new();

        tag.set_genre("(13)");
        assert_eq!(tag.genre().as_deref(), Some("Pop"));

        tag.set_genre("17");
        assert_eq!(tag.genre().as_deref(), Some("Rock"));

        tag.set_genre("(255)");
        assert_eq!(tag.genre().as_deref(), Some("(255)"));

        tag.set_genre("Shoegaze");
        assert_eq!(tag.genre().as_deref(), Some("Shoegaze"));
    }

    #[test]
    fn verify_standard_key_routing() {
        let mut tag = Id3v2Tag::new();

        tag.set(StandardTagKey::TrackTitle, Value::from("Title"));
        tag.set(StandardTagKey::MusicBrainzAlbumId, Value::from("mbid-1234"));

        assert_eq!(tag.title(), Some("Title"));
        assert_eq!(tag.user_text("MusicBrainz Album Id"), Some("mbid-1234"));
        assert_eq!(tag.get(StandardTagKey::TrackTitle), Some(Value::from("Title")));

        tag.remove(StandardTagKey::TrackTitle);
        assert_eq!(tag.title(), None);
    }
}
