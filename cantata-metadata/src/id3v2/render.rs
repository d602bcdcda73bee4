// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ID3v2 tag rendering.

use cantata_core::errors::Result;
use cantata_core::io::BufWriter;
use cantata_core::text;

use log::warn;
use smallvec::SmallVec;

use super::frames::{Encoding, Frame, FrameValue};
use super::unsync::{encode_syncsafe_u28, encode_unsynchronisation};
use super::{Id3v2Tag, TagFlags};

/// The ID3v2 versions that can be written. ID3v2.2 is read-only.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Version {
    /// ID3v2.3: big-endian frame sizes, Latin-1 and UTF-16 text only, slash-joined
    /// multi-values.
    V23,
    /// ID3v2.4: syncsafe frame sizes, all four text encodings, NUL-separated multi-values.
    #[default]
    V24,
}

impl Version {
    fn major(self) -> u8 {
        match self {
            Version::V23 => 3,
            Version::V24 => 4,
        }
    }
}

/// Options controlling tag rendering.
#[derive(Copy, Clone, Default)]
pub struct RenderOptions {
    /// The ID3v2 version to emit.
    pub version: Version,
    /// Apply unsynchronisation to the rendered frame area. Off by default.
    pub unsynchronise: bool,
    /// The number of padding bytes appended after the last frame.
    pub padding: usize,
}

/// Render a tag to bytes.
///
/// Frames are rendered in insertion order. Frames that cannot be expressed in the target
/// version are translated where an equivalent exists (the ID3v2.4 timestamp frames and the
/// ID3v2.3 date triplet convert into one another), and dropped with a warning otherwise.
pub fn render(tag: &Id3v2Tag, opts: &RenderOptions) -> Result<Vec<u8>> {
    let frames = convert_frames(tag.frames(), opts.version);

    let mut body = BufWriter::new();

    for frame in &frames {
        render_frame(&mut body, frame, opts.version)?;
    }

    body.write_zeros(opts.padding);

    let mut body = body.into_inner();
    let mut flags = 0u8;

    if opts.unsynchronise {
        body = encode_unsynchronisation(&body);
        flags |= TagFlags::UNSYNCHRONISATION.bits();
    }

    let mut out = BufWriter::with_capacity(10 + body.len());
    out.write_buf(b"ID3");
    out.write_u8(opts.version.major());
    out.write_u8(0);
    out.write_u8(flags);
    out.write_buf(&encode_syncsafe_u28(body.len() as u32)?);
    out.write_buf(&body);

    Ok(out.into_inner())
}

/// Render one frame: identifier, version-specific size, zeroed flags, and the body.
fn render_frame(out: &mut BufWriter, frame: &Frame, version: Version) -> Result<()> {
    let body = render_frame_body(frame, version);

    if body.is_empty() {
        // A frame must be atleast 1 byte as per the specification.
        warn!("id3v2: '{}' not written because it is empty", frame.id);
        return Ok(());
    }

    out.write_buf(frame.id.as_bytes());

    match version {
        Version::V23 => out.write_be_u32(body.len() as u32),
        Version::V24 => out.write_buf(&encode_syncsafe_u28(body.len() as u32)?),
    }

    // Frame flags: none of the flagged features are used on write.
    out.write_be_u16(0);
    out.write_buf(&body);

    Ok(())
}

fn render_frame_body(frame: &Frame, version: Version) -> Vec<u8> {
    let mut body = BufWriter::new();

    match &frame.value {
        FrameValue::Text { encoding, values } => {
            let encoding = effective_encoding(*encoding, version);
            body.write_u8(encoding.code());
            write_joined_values(&mut body, values, encoding, version);
        }
        FrameValue::UserText { encoding, description, values } => {
            let encoding = effective_encoding(*encoding, version);
            body.write_u8(encoding.code());
            write_terminated(&mut body, description, encoding);
            write_joined_values(&mut body, values, encoding, version);
        }
        FrameValue::Url(url) => {
            body.write_buf(&text::encode_latin1(url));
        }
        FrameValue::UserUrl { encoding, description, url } => {
            let encoding = effective_encoding(*encoding, version);
            body.write_u8(encoding.code());
            write_terminated(&mut body, description, encoding);
            body.write_buf(&text::encode_latin1(url));
        }
        FrameValue::Comment { encoding, language, description, text }
        | FrameValue::Lyrics { encoding, language, description, text } => {
            let encoding = effective_encoding(*encoding, version);
            body.write_u8(encoding.code());
            body.write_buf(language);
            write_terminated(&mut body, description, encoding);
            body.write_buf(&encode_text(text, encoding));
        }
        FrameValue::Picture { encoding, media_type, picture_type, description, data } => {
            let encoding = effective_encoding(*encoding, version);
            body.write_u8(encoding.code());
            body.write_buf(&text::encode_latin1(media_type));
            body.write_u8(0);
            body.write_u8(picture_type.to_code() as u8);
            write_terminated(&mut body, description, encoding);
            body.write_buf(data);
        }
        FrameValue::UniqueFileId { owner, identifier } => {
            body.write_buf(&text::encode_latin1(owner));
            body.write_u8(0);
            body.write_buf(identifier);
        }
        FrameValue::InvolvedPeople { encoding, pairs } => {
            let encoding = effective_encoding(*encoding, version);
            body.write_u8(encoding.code());
            for (role, person) in pairs {
                write_terminated(&mut body, role, encoding);
                write_terminated(&mut body, person, encoding);
            }
        }
        FrameValue::PlayCounter(count) => {
            // The counter is a minimum of 32 bits, extended when the count demands it.
            if *count > u64::from(u32::MAX) {
                body.write_be_u64(*count);
            }
            else {
                body.write_be_u32(*count as u32);
            }
        }
        FrameValue::Popularimeter { email, rating, play_count } => {
            body.write_buf(&text::encode_latin1(email));
            body.write_u8(0);
            body.write_u8(*rating);
            match play_count {
                Some(count) if *count > u64::from(u32::MAX) => body.write_be_u64(*count),
                Some(count) => body.write_be_u32(*count as u32),
                None => (),
            }
        }
        FrameValue::Private { owner, data } => {
            body.write_buf(&text::encode_latin1(owner));
            body.write_u8(0);
            body.write_buf(data);
        }
        FrameValue::RelativeVolume { identification, channels } => {
            body.write_buf(&text::encode_latin1(identification));
            body.write_u8(0);
            for channel in channels {
                body.write_u8(channel.channel_type);
                body.write_be_i16(channel.adjustment);
                body.write_u8(channel.peak_bits);
                body.write_buf(&channel.peak);
            }
        }
        FrameValue::Unknown(data) => {
            body.write_buf(data);
        }
    }

    body.into_inner()
}

/// ID3v2.3 only defines the Latin-1 and UTF-16 with BOM encodings. The ID3v2.4 additions
/// downgrade to UTF-16 with BOM, which can carry any text.
fn effective_encoding(encoding: Encoding, version: Version) -> Encoding {
    match (version, encoding) {
        (Version::V23, Encoding::Utf8) | (Version::V23, Encoding::Utf16Be) => Encoding::Utf16,
        (_, encoding) => encoding,
    }
}

/// Encode a string in the given encoding without a terminator. UTF-16 with BOM is emitted
/// little-endian with a `FF FE` byte-order-mark.
fn encode_text(s: &str, encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Latin1 => text::encode_latin1(s),
        Encoding::Utf8 => s.as_bytes().to_vec(),
        Encoding::Utf16 => text::encode_utf16le_bom(s),
        Encoding::Utf16Be => text::encode_utf16be(s),
    }
}

/// Encode a string followed by its encoding-appropriate terminator.
fn write_terminated(out: &mut BufWriter, s: &str, encoding: Encoding) {
    out.write_buf(&encode_text(s, encoding));

    match encoding {
        Encoding::Latin1 | Encoding::Utf8 => out.write_u8(0),
        Encoding::Utf16 | Encoding::Utf16Be => out.write_be_u16(0),
    }
}

/// Write a text frame value list: NUL-separated for ID3v2.4, slash-joined into a single string
/// for ID3v2.3.
fn write_joined_values(
    out: &mut BufWriter,
    values: &SmallVec<[String; 1]>,
    encoding: Encoding,
    version: Version,
) {
    match version {
        Version::V24 => {
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    match encoding {
                        Encoding::Latin1 | Encoding::Utf8 => out.write_u8(0),
                        Encoding::Utf16 | Encoding::Utf16Be => out.write_be_u16(0),
                    }
                }
                out.write_buf(&encode_text(value, encoding));
            }
        }
        Version::V23 => {
            let joined = values.join(" / ");
            out.write_buf(&encode_text(&joined, encoding));
        }
    }
}

/// Convert frames for the target version.
fn convert_frames(frames: &[Frame], version: Version) -> Vec<Frame> {
    match version {
        Version::V24 => upgrade_frames(frames),
        Version::V23 => downgrade_frames(frames),
    }
}

fn frame_text(frames: &[Frame], id: [u8; 4]) -> Option<String> {
    frames.iter().find(|f| f.id.as_bytes() == &id).and_then(|f| match &f.value {
        FrameValue::Text { values, .. } => values.first().cloned(),
        _ => None,
    })
}

/// Reconstruct ID3v2.4 timestamp frames from the ID3v2.3 date triplet, and translate `TORY`.
fn upgrade_frames(frames: &[Frame]) -> Vec<Frame> {
    let has_tdrc = frames.iter().any(|f| f.id.as_bytes() == b"TDRC");

    let mut out = Vec::with_capacity(frames.len());

    // Build a TDRC timestamp from TYER, and refine it with TDAT (DDMM) and TIME (HHMM).
    let tdrc = if has_tdrc {
        None
    }
    else {
        frame_text(frames, *b"TYER").and_then(|year| {
            if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }

            let mut timestamp = year;

            if let Some(date) = frame_text(frames, *b"TDAT") {
                if date.len() == 4 && date.bytes().all(|b| b.is_ascii_digit()) {
                    timestamp.push_str(&format!("-{}-{}", &date[2..4], &date[0..2]));

                    if let Some(time) = frame_text(frames, *b"TIME") {
                        if time.len() == 4 && time.bytes().all(|b| b.is_ascii_digit()) {
                            timestamp.push_str(&format!("T{}:{}", &time[0..2], &time[2..4]));
                        }
                    }
                }
            }

            Some(Frame::text(*b"TDRC", &timestamp))
        })
    };

    for frame in frames {
        match frame.id.as_bytes() {
            b"TYER" | b"TDAT" | b"TIME" if tdrc.is_some() => (),
            b"TORY" => {
                if let FrameValue::Text { values, .. } = &frame.value {
                    if let Some(year) = values.first() {
                        out.push(Frame::text(*b"TDOR", year));
                    }
                }
            }
            _ => out.push(frame.clone()),
        }
    }

    if let Some(tdrc) = tdrc {
        out.push(tdrc);
    }

    out
}

/// Translate the ID3v2.4 timestamp frames into the ID3v2.3 date triplet, and drop frames with
/// no ID3v2.3 equivalent.
fn downgrade_frames(frames: &[Frame]) -> Vec<Frame> {
    let mut out = Vec::with_capacity(frames.len());

    for frame in frames {
        match frame.id.as_bytes() {
            b"TDRC" => {
                if let Some(timestamp) = frame_text(frames, *b"TDRC").filter(|t| t.is_ascii()) {
                    // "YYYY[-MM[-DD[THH[:MM]]]]"
                    let year = &timestamp[..timestamp.len().min(4)];

                    if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) {
                        out.push(Frame::text(*b"TYER", year));

                        if timestamp.len() >= 10 {
                            let (month, day) = (&timestamp[5..7], &timestamp[8..10]);
                            out.push(Frame::text(*b"TDAT", &format!("{}{}", day, month)));
                        }

                        if timestamp.len() >= 16 {
                            let (hour, minute) = (&timestamp[11..13], &timestamp[14..16]);
                            out.push(Frame::text(*b"TIME", &format!("{}{}", hour, minute)));
                        }
                    }
                }
            }
            b"TDOR" => {
                if let FrameValue::Text { values, .. } = &frame.value {
                    if let Some(date) = values.first().filter(|d| d.is_ascii()) {
                        let year = &date[..date.len().min(4)];
                        if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) {
                            out.push(Frame::text(*b"TORY", year));
                        }
                    }
                }
            }
            // ID3v2.4-only frames with no translation.
            b"TMOO" | b"TSOA" | b"TSOP" | b"TSOT" | b"TSO2" | b"TSOC" | b"TDRL" | b"TDEN"
            | b"TDTG" | b"TSST" | b"TMCL" => {
                warn!("id3v2: '{}' dropped, no ID3v2.3 equivalent", frame.id);
            }
            // The involved people list identifier differs between versions.
            b"TIPL" => out.push(Frame { id: super::FrameId::new(*b"IPLS"), value: frame.value.clone() }),
            _ => out.push(frame.clone()),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use cantata_core::meta::ReadOptions;

    use super::super::frames::FrameValue;
    use super::super::Id3v2Tag;
    use super::*;

    fn round_trip(tag: &Id3v2Tag, opts: &RenderOptions) -> Id3v2Tag {
        let rendered = render(tag, opts).unwrap();
        Id3v2Tag::read(&rendered, &ReadOptions::default()).unwrap()
    }

    #[test]
    fn verify_empty_tag_renders_minimal_header() {
        let tag = Id3v2Tag::new();
        let rendered = render(&tag, &RenderOptions::default()).unwrap();

        assert_eq!(rendered, [0x49, 0x44, 0x33, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn verify_v24_round_trip() {
        let mut tag = Id3v2Tag::new();
        tag.set_title("T\u{ed}tulo");
        tag.set_artist("Artist");
        tag.set_text_values(*b"TPE1", vec!["A".to_string(), "B".to_string()]);
        tag.set_comment("a comment");
        tag.set_musicbrainz_recording_id("11873f5e-6099-4b2e-9f32-e24564f83eb9");
        tag.set_user_text("CATALOGNUMBER", "CAT-1");

        let parsed = round_trip(&tag, &RenderOptions::default());

        assert_eq!(parsed.title(), Some("T\u{ed}tulo"));
        assert_eq!(parsed.text_values(*b"TPE1"), ["A".to_string(), "B".to_string()]);
        assert_eq!(parsed.comment(), Some("a comment"));
        assert_eq!(
            parsed.musicbrainz_recording_id().as_deref(),
            Some("11873f5e-6099-4b2e-9f32-e24564f83eb9")
        );
        assert_eq!(parsed.user_text("CATALOGNUMBER"), Some("CAT-1"));
    }

    #[test]
    fn verify_v23_slash_joins_multi_values() {
        let mut tag = Id3v2Tag::new();
        tag.set_text_values(*b"TPE1", vec!["A".to_string(), "B".to_string()]);

        let opts = RenderOptions { version: Version::V23, ..Default::default() };
        let parsed = round_trip(&tag, &opts);

        // On the wire there is a single slash-joined value, which the multi-value getter
        // re-splits for tags read from ID3v2.3.
        assert_eq!(parsed.text(*b"TPE1"), Some("A / B"));
        assert_eq!(parsed.text_values(*b"TPE1"), ["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn verify_v23_date_triplet_conversion() {
        let mut tag = Id3v2Tag::new();
        tag.set_date("2001-07-14T09:30");

        let opts = RenderOptions { version: Version::V23, ..Default::default() };
        let parsed = round_trip(&tag, &opts);

        assert_eq!(parsed.text(*b"TYER"), Some("2001"));
        assert_eq!(parsed.text(*b"TDAT"), Some("1407"));
        assert_eq!(parsed.text(*b"TIME"), Some("0930"));
        assert_eq!(parsed.date(), Some("2001"));

        // And back up: the triplet reconstructs the timestamp.
        let parsed = round_trip(&parsed, &RenderOptions::default());
        assert_eq!(parsed.text(*b"TDRC"), Some("2001-07-14T09:30"));
        assert_eq!(parsed.text(*b"TYER"), None);
    }

    #[test]
    fn verify_unsynchronised_render() {
        let mut tag = Id3v2Tag::new();
        tag.push_frame(Frame::new(
            *b"PRIV",
            FrameValue::Private {
                owner: "test".to_string(),
                data: Box::new([0xff, 0xe1, 0xff, 0x00, 0x12]),
            },
        ));

        let opts = RenderOptions { unsynchronise: true, ..Default::default() };
        let rendered = render(&tag, &opts).unwrap();

        // The unsynchronisation flag must be set.
        assert_eq!(rendered[5] & 0x80, 0x80);

        // No false sync may remain in the tag body.
        for window in rendered[10..].windows(2) {
            assert!(!(window[0] == 0xff && window[1] & 0xe0 == 0xe0));
        }

        let parsed = Id3v2Tag::read(&rendered, &ReadOptions::default()).unwrap();
        match &parsed.frames()[0].value {
            FrameValue::Private { data, .. } => {
                assert_eq!(data.as_ref(), &[0xff, 0xe1, 0xff, 0x00, 0x12])
            }
            other => panic!("unexpected frame value {:?}", other),
        }
    }

    #[test]
    fn verify_utf16_render() {
        let mut tag = Id3v2Tag::new();
        tag.push_frame(Frame::new(
            *b"TIT2",
            FrameValue::Text {
                encoding: Encoding::Utf16,
                values: smallvec::smallvec!["\u{4e16}\u{754c}".to_string()],
            },
        ));

        for version in [Version::V23, Version::V24] {
            let opts = RenderOptions { version, ..Default::default() };
            let parsed = round_trip(&tag, &opts);
            assert_eq!(parsed.title(), Some("\u{4e16}\u{754c}"));
        }
    }

    #[test]
    fn verify_padding() {
        let tag = Id3v2Tag::new();
        let opts = RenderOptions { padding: 64, ..Default::default() };
        let rendered = render(&tag, &opts).unwrap();

        assert_eq!(rendered.len(), 10 + 64);
        assert!(rendered[10..].iter().all(|&b| b == 0));

        let parsed = Id3v2Tag::read(&rendered, &ReadOptions::default()).unwrap();
        assert!(parsed.frames().is_empty());
    }
}
