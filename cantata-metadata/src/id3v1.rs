// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An ID3v1 tag reader and writer.
//!
//! The 128-byte `TAG` block trails the audio stream. The v1.1 convention is honoured: when the
//! second-last byte of the comment field is zero, the last byte is the track number.

use cantata_core::errors::{invalid_magic_error, truncated_error, Result};
use cantata_core::io::BufWriter;
use cantata_core::meta::{StandardTagKey, Tag, TagLike, Value, Visual};
use cantata_core::text;

/// The encoded length of an ID3v1 tag.
pub const ID3V1_TAG_LEN: usize = 128;

/// The ID3v1 genre list: the 80 standard genres followed by the Winamp extensions.
const GENRES: &[&str] = &[
    "Blues",
    "Classic Rock",
    "Country",
    "Dance",
    "Disco",
    "Funk",
    "Grunge",
    "Hip-Hop",
    "Jazz",
    "Metal",
    "New Age",
    "Oldies",
    "Other",
    "Pop",
    "R&B",
    "Rap",
    "Reggae",
    "Rock",
    "Techno",
    "Industrial",
    "Alternative",
    "Ska",
    "Death Metal",
    "Pranks",
    "Soundtrack",
    "Euro-Techno",
    "Ambient",
    "Trip-Hop",
    "Vocal",
    "Jazz+Funk",
    "Fusion",
    "Trance",
    "Classical",
    "Instrumental",
    "Acid",
    "House",
    "Game",
    "Sound Clip",
    "Gospel",
    "Noise",
    "Alternative Rock",
    "Bass",
    "Soul",
    "Punk",
    "Space",
    "Meditative",
    "Instrumental Pop",
    "Instrumental Rock",
    "Ethnic",
    "Gothic",
    "Darkwave",
    "Techno-Industrial",
    "Electronic",
    "Pop-Folk",
    "Eurodance",
    "Dream",
    "Southern Rock",
    "Comedy",
    "Cult",
    "Gangsta",
    "Top 40",
    "Christian Rap",
    "Pop/Funk",
    "Jungle",
    "Native American",
    "Cabaret",
    "New Wave",
    "Psychedelic",
    "Rave",
    "Showtunes",
    "Trailer",
    "Lo-Fi",
    "Tribal",
    "Acid Punk",
    "Acid Jazz",
    "Polka",
    "Retro",
    "Musical",
    "Rock & Roll",
    "Hard Rock",
    // Winamp extensions.
    "Folk",
    "Folk-Rock",
    "National Folk",
    "Swing",
    "Fast Fusion",
    "Bebob",
    "Latin",
    "Revival",
    "Celtic",
    "Bluegrass",
    "Avantgarde",
    "Gothic Rock",
    "Progressive Rock",
    "Psychedelic Rock",
    "Symphonic Rock",
    "Slow Rock",
    "Big Band",
    "Chorus",
    "Easy Listening",
    "Acoustic",
    "Humour",
    "Speech",
    "Chanson",
    "Opera",
    "Chamber Music",
    "Sonata",
    "Symphony",
    "Booty Bass",
    "Primus",
    "Porn Groove",
    "Satire",
    "Slow Jam",
    "Club",
    "Tango",
    "Samba",
    "Folklore",
    "Ballad",
    "Power Ballad",
    "Rhythmic Soul",
    "Freestyle",
    "Duet",
    "Punk Rock",
    "Drum Solo",
    "A Cappella",
    "Euro-House",
    "Dance Hall",
    "Goa",
    "Drum & Bass",
    "Club-House",
    "Hardcore",
    "Terror",
    "Indie",
    "BritPop",
    "Negerpunk",
    "Polsk Punk",
    "Beat",
    "Christian Gangsta Rap",
    "Heavy Metal",
    "Black Metal",
    "Crossover",
    "Contemporary Christian",
    "Christian Rock",
    "Merengue",
    "Salsa",
    "Thrash Metal",
    "Anime",
    "Jpop",
    "Synthpop",
];

/// Gets the genre name for an ID3v1 genre index, if the index is defined.
pub fn genre_name(index: u8) -> Option<&'static str> {
    GENRES.get(usize::from(index)).copied()
}

/// Gets the ID3v1 genre index for a genre name, matched case-insensitively.
pub fn genre_index(name: &str) -> Option<u8> {
    GENRES.iter().position(|&genre| genre.eq_ignore_ascii_case(name)).map(|idx| idx as u8)
}

/// An ID3v1 tag.
///
/// All text fields are fixed-length Latin-1 on the wire and truncated on write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Id3v1Tag {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub comment: Option<String>,
    pub track: Option<u8>,
    /// The genre index into the ID3v1 genre table.
    pub genre_index: Option<u8>,
}

impl Id3v1Tag {
    /// Create a new, empty, tag.
    pub fn new() -> Id3v1Tag {
        Id3v1Tag::default()
    }

    /// Read a tag from a 128-byte `TAG` block.
    pub fn read(buf: &[u8]) -> Result<Id3v1Tag> {
        if buf.len() < ID3V1_TAG_LEN {
            return truncated_error("id3v1: tag must be 128 bytes");
        }

        if &buf[0..3] != b"TAG" {
            return invalid_magic_error("id3v1: not an ID3v1 tag");
        }

        let buf = &buf[3..ID3V1_TAG_LEN];

        let mut tag = Id3v1Tag {
            title: decode_fixed_field(&buf[0..30]),
            artist: decode_fixed_field(&buf[30..60]),
            album: decode_fixed_field(&buf[60..90]),
            year: decode_fixed_field(&buf[90..94]),
            comment: None,
            track: None,
            genre_index: None,
        };

        // If the second-last byte of the comment field is 0, then the last byte of the comment
        // field is the track number (the ID3v1.1 convention).
        if buf[122] == 0 {
            if buf[123] != 0 {
                tag.track = Some(buf[123]);
            }
            tag.comment = decode_fixed_field(&buf[94..122]);
        }
        else {
            tag.comment = decode_fixed_field(&buf[94..124]);
        }

        // 0xff means no genre.
        if buf[124] != 0xff {
            tag.genre_index = Some(buf[124]);
        }

        Ok(tag)
    }

    /// Locate and read a tag from the last 128 bytes of a buffer. Returns `None` when no tag is
    /// present.
    pub fn read_from_tail(buf: &[u8]) -> Option<Id3v1Tag> {
        if buf.len() < ID3V1_TAG_LEN {
            return None;
        }

        Id3v1Tag::read(&buf[buf.len() - ID3V1_TAG_LEN..]).ok()
    }

    /// Render the tag as a 128-byte `TAG` block.
    pub fn render(&self) -> Vec<u8> {
        let mut out = BufWriter::with_capacity(ID3V1_TAG_LEN);

        out.write_buf(b"TAG");
        write_fixed_field(&mut out, self.title.as_deref(), 30);
        write_fixed_field(&mut out, self.artist.as_deref(), 30);
        write_fixed_field(&mut out, self.album.as_deref(), 30);
        write_fixed_field(&mut out, self.year.as_deref(), 4);

        if let Some(track) = self.track {
            // ID3v1.1: 28-byte comment, a zero byte, then the track number.
            write_fixed_field(&mut out, self.comment.as_deref(), 28);
            out.write_u8(0);
            out.write_u8(track);
        }
        else {
            write_fixed_field(&mut out, self.comment.as_deref(), 30);
        }

        out.write_u8(self.genre_index.unwrap_or(0xff));

        out.into_inner()
    }

    /// The genre name, resolved through the genre table.
    pub fn genre(&self) -> Option<&'static str> {
        self.genre_index.and_then(genre_name)
    }
}

fn decode_fixed_field(buf: &[u8]) -> Option<String> {
    // ID3v1 does not specify an encoding; assume ISO-8859-1 such that all character codes are
    // valid. The field ends at the first null or the end of its fixed size.
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let decoded = text::decode_latin1(&buf[..end]);
    let trimmed = decoded.trim_end();

    if trimmed.is_empty() {
        None
    }
    else {
        Some(trimmed.to_string())
    }
}

fn write_fixed_field(out: &mut BufWriter, value: Option<&str>, len: usize) {
    let encoded = value.map(text::encode_latin1).unwrap_or_default();
    let n = encoded.len().min(len);
    out.write_buf(&encoded[..n]);
    out.write_zeros(len - n);
}

impl TagLike for Id3v1Tag {
    fn get(&self, key: StandardTagKey) -> Option<Value> {
        match key {
            StandardTagKey::TrackTitle => self.title.as_deref().map(Value::from),
            StandardTagKey::Artist => self.artist.as_deref().map(Value::from),
            StandardTagKey::Album => self.album.as_deref().map(Value::from),
            StandardTagKey::Date => self.year.as_deref().map(Value::from),
            StandardTagKey::Comment => self.comment.as_deref().map(Value::from),
            StandardTagKey::TrackNumber => self.track.map(Value::from),
            StandardTagKey::Genre => self.genre().map(Value::from),
            _ => None,
        }
    }

    fn set(&mut self, key: StandardTagKey, value: Value) {
        let text = value.to_string();
        let field = if text.is_empty() { None } else { Some(text.clone()) };

        match key {
            StandardTagKey::TrackTitle => self.title = field,
            StandardTagKey::Artist => self.artist = field,
            StandardTagKey::Album => self.album = field,
            StandardTagKey::Date => {
                // Only a 4 character year fits the wire format.
                self.year = field.map(|y| y.chars().take(4).collect());
            }
            StandardTagKey::Comment => self.comment = field,
            StandardTagKey::TrackNumber => self.track = text.parse().ok(),
            StandardTagKey::Genre => self.genre_index = genre_index(&text),
            _ => (),
        }
    }

    fn remove(&mut self, key: StandardTagKey) {
        match key {
            StandardTagKey::TrackTitle => self.title = None,
            StandardTagKey::Artist => self.artist = None,
            StandardTagKey::Album => self.album = None,
            StandardTagKey::Date => self.year = None,
            StandardTagKey::Comment => self.comment = None,
            StandardTagKey::TrackNumber => self.track = None,
            StandardTagKey::Genre => self.genre_index = None,
            _ => (),
        }
    }

    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.year.is_none()
            && self.comment.is_none()
            && self.track.is_none()
            && self.genre_index.is_none()
    }

    fn tags(&self) -> Vec<Tag> {
        let mut tags = Vec::new();

        let mut push = |std_key, key: &str, value: Option<&str>| {
            if let Some(value) = value {
                tags.push(Tag::new(Some(std_key), key, Value::from(value)));
            }
        };

        push(StandardTagKey::TrackTitle, "TITLE", self.title.as_deref());
        push(StandardTagKey::Artist, "ARTIST", self.artist.as_deref());
        push(StandardTagKey::Album, "ALBUM", self.album.as_deref());
        push(StandardTagKey::Date, "YEAR", self.year.as_deref());
        push(StandardTagKey::Comment, "COMMENT", self.comment.as_deref());

        if let Some(track) = self.track {
            tags.push(Tag::new(Some(StandardTagKey::TrackNumber), "TRACK", Value::from(track)));
        }

        if let Some(genre) = self.genre() {
            tags.push(Tag::new(Some(StandardTagKey::Genre), "GENRE", Value::from(genre)));
        }

        tags
    }

    fn visuals(&self) -> Vec<Visual> {
        Vec::new()
    }

    fn add_visual(&mut self, _visual: Visual) {
        // ID3v1 cannot carry pictures.
    }

    fn clear_visuals(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_round_trip() {
        let tag = Id3v1Tag {
            title: Some("Some Title".to_string()),
            artist: Some("Some Artist".to_string()),
            album: Some("Some Album".to_string()),
            year: Some("1999".to_string()),
            comment: Some("a comment".to_string()),
            track: Some(7),
            genre_index: Some(17),
        };

        let rendered = tag.render();
        assert_eq!(rendered.len(), ID3V1_TAG_LEN);

        let parsed = Id3v1Tag::read(&rendered).unwrap();
        assert_eq!(parsed, tag);
        assert_eq!(parsed.genre(), Some("Rock"));
    }

    #[test]
    fn verify_v1_0_comment_uses_full_field() {
        let tag = Id3v1Tag {
            comment: Some("123456789012345678901234567890".to_string()),
            ..Default::default()
        };

        let rendered = tag.render();
        let parsed = Id3v1Tag::read(&rendered).unwrap();

        assert_eq!(parsed.comment.as_deref(), Some("123456789012345678901234567890"));
        assert_eq!(parsed.track, None);
    }

    #[test]
    fn verify_bad_marker_rejected() {
        let buf = [0u8; ID3V1_TAG_LEN];
        assert!(Id3v1Tag::read(&buf).is_err());
    }

    #[test]
    fn verify_field_truncation() {
        let mut tag = Id3v1Tag::new();
        tag.title = Some("x".repeat(40));

        let parsed = Id3v1Tag::read(&tag.render()).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("x".repeat(30).as_str()));
    }

    #[test]
    fn verify_genre_lookup() {
        assert_eq!(genre_name(13), Some("Pop"));
        assert_eq!(genre_name(79), Some("Hard Rock"));
        assert_eq!(genre_name(147), Some("Synthpop"));
        assert_eq!(genre_name(200), None);
        assert_eq!(genre_index("rock"), Some(17));
    }
}
