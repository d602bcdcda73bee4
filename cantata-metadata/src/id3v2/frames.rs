// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ID3v2 frame model and frame readers.

use std::collections::HashMap;
use std::fmt;
use std::str;

use cantata_core::errors::{invalid_field_error, Result};
use cantata_core::io::{BufReader, FiniteStream, ReadBytes};
use cantata_core::meta::PictureType;
use cantata_core::text;

use lazy_static::lazy_static;
use log::warn;
use smallvec::SmallVec;

use super::unsync::{decode_unsynchronisation, read_syncsafe_leq32};

/// Enumeration of valid encodings for text fields in ID3v2 tags.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// ISO-8859-1 (aka Latin-1), terminated with 0x00.
    Latin1,
    /// UTF-16 (or UCS-2) with a byte-order-mark (BOM), terminated with 0x00 0x00. If the BOM is
    /// missing, big-endian encoding is assumed.
    Utf16,
    /// UTF-16 big-endian without a byte-order-mark, terminated with 0x00 0x00. ID3v2.4 only.
    Utf16Be,
    /// UTF-8, terminated with 0x00. ID3v2.4 only.
    Utf8,
}

impl Encoding {
    /// Gets the encoding for an encoding indicator byte.
    pub fn parse(encoding: u8) -> Option<Encoding> {
        match encoding {
            0 => Some(Encoding::Latin1),
            1 => Some(Encoding::Utf16),
            2 => Some(Encoding::Utf16Be),
            3 => Some(Encoding::Utf8),
            _ => None,
        }
    }

    /// Gets the encoding indicator byte.
    pub fn code(self) -> u8 {
        match self {
            Encoding::Latin1 => 0,
            Encoding::Utf16 => 1,
            Encoding::Utf16Be => 2,
            Encoding::Utf8 => 3,
        }
    }
}

/// A 4 character ID3v2.3/ID3v2.4 frame identifier.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct FrameId([u8; 4]);

impl FrameId {
    /// Create a frame identifier from its 4 bytes.
    ///
    /// The bytes must be uppercase letters or digits.
    pub fn new(id: [u8; 4]) -> FrameId {
        debug_assert!(validate_frame_id(&id));
        FrameId(id)
    }

    /// Gets the identifier bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Gets the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        // Only ASCII letters and digits are valid in a frame identifier.
        str::from_utf8(&self.0).expect("ascii only")
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({})", self.as_str())
    }
}

/// One adjustment channel of a relative volume adjustment (`RVA2`) frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RelativeVolumeChannel {
    /// The channel the adjustment applies to.
    pub channel_type: u8,
    /// The volume adjustment in 1/512ths of a dB.
    pub adjustment: i16,
    /// The number of bits used to represent the peak volume.
    pub peak_bits: u8,
    /// The peak volume, `(peak_bits + 7) / 8` bytes.
    pub peak: Box<[u8]>,
}

/// The body of a parsed ID3v2 frame.
///
/// Frame polymorphism is a closed sum with one arm per implemented frame kind. Frames of any
/// other kind are carried verbatim by the `Unknown` arm so that they survive a rewrite.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameValue {
    /// A text information frame (`T000`-`TZZZ`, excluding `TXXX`).
    Text { encoding: Encoding, values: SmallVec<[String; 1]> },
    /// A user defined text information frame (`TXXX`).
    UserText { encoding: Encoding, description: String, values: SmallVec<[String; 1]> },
    /// A URL link frame (`W000`-`WZZZ`, excluding `WXXX`).
    Url(String),
    /// A user defined URL link frame (`WXXX`).
    UserUrl { encoding: Encoding, description: String, url: String },
    /// A comment frame (`COMM`).
    Comment { encoding: Encoding, language: [u8; 3], description: String, text: String },
    /// An unsynchronised lyrics frame (`USLT`).
    Lyrics { encoding: Encoding, language: [u8; 3], description: String, text: String },
    /// An attached picture frame (`APIC`).
    Picture {
        encoding: Encoding,
        media_type: String,
        picture_type: PictureType,
        description: String,
        data: Box<[u8]>,
    },
    /// A unique file identifier frame (`UFID`).
    UniqueFileId { owner: String, identifier: Box<[u8]> },
    /// An involved people or musician credits list frame (`TIPL`, `TMCL`, `IPLS`).
    InvolvedPeople { encoding: Encoding, pairs: Vec<(String, String)> },
    /// A play counter frame (`PCNT`).
    PlayCounter(u64),
    /// A popularimeter frame (`POPM`).
    Popularimeter { email: String, rating: u8, play_count: Option<u64> },
    /// A private frame (`PRIV`).
    Private { owner: String, data: Box<[u8]> },
    /// A relative volume adjustment frame (`RVA2`).
    RelativeVolume { identification: String, channels: Vec<RelativeVolumeChannel> },
    /// Any other frame, carried verbatim.
    Unknown(Box<[u8]>),
}

/// An ID3v2 frame: a 4 character identifier and a typed body.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// The frame identifier, in its ID3v2.3/ID3v2.4 spelling.
    pub id: FrameId,
    /// The frame body.
    pub value: FrameValue,
}

impl Frame {
    /// Create a new frame.
    pub fn new(id: [u8; 4], value: FrameValue) -> Frame {
        Frame { id: FrameId::new(id), value }
    }

    /// Create a text frame holding a single value.
    pub fn text(id: [u8; 4], value: &str) -> Frame {
        Frame::new(
            id,
            FrameValue::Text { encoding: Encoding::Utf8, values: SmallVec::from_vec(vec![value.to_string()]) },
        )
    }
}

/// The result of parsing a frame.
pub enum FrameResult {
    /// The frame was skipped for some reason, but the scan may continue.
    Skipped,
    /// Padding was encountered instead of a frame. The remainder of the tag may be skipped.
    Padding,
    /// A frame was parsed.
    Frame(Frame),
}

/// Gets the minimum frame size for a major version of ID3v2.
pub fn min_frame_size(major_version: u8) -> u64 {
    match major_version {
        2 => 6,
        3 | 4 => 10,
        _ => unreachable!("id3v2: unexpected version"),
    }
}

/// Validates that a frame id only contains uppercase letters (A-Z), and digits (0-9).
fn validate_frame_id(id: &[u8]) -> bool {
    id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

lazy_static! {
    static ref LEGACY_FRAME_MAP: HashMap<&'static [u8; 3], &'static [u8; 4]> = {
        let mut m = HashMap::new();
        m.insert(b"BUF", b"RBUF");
        m.insert(b"CNT", b"PCNT");
        m.insert(b"COM", b"COMM");
        m.insert(b"ETC", b"ETCO");
        m.insert(b"GEO", b"GEOB");
        m.insert(b"IPL", b"IPLS");
        m.insert(b"MCI", b"MCDI");
        m.insert(b"PIC", b"APIC");
        m.insert(b"POP", b"POPM");
        m.insert(b"REV", b"RVRB");
        m.insert(b"SLT", b"SYLT");
        m.insert(b"STC", b"SYTC");
        m.insert(b"TAL", b"TALB");
        m.insert(b"TBP", b"TBPM");
        m.insert(b"TCM", b"TCOM");
        m.insert(b"TCO", b"TCON");
        m.insert(b"TCP", b"TCMP");
        m.insert(b"TCR", b"TCOP");
        m.insert(b"TDA", b"TDAT");
        m.insert(b"TDY", b"TDLY");
        m.insert(b"TEN", b"TENC");
        m.insert(b"TFT", b"TFLT");
        m.insert(b"TIM", b"TIME");
        m.insert(b"TKE", b"TKEY");
        m.insert(b"TLA", b"TLAN");
        m.insert(b"TLE", b"TLEN");
        m.insert(b"TMT", b"TMED");
        m.insert(b"TOA", b"TOPE");
        m.insert(b"TOF", b"TOFN");
        m.insert(b"TOL", b"TOLY");
        m.insert(b"TOR", b"TORY");
        m.insert(b"TOT", b"TOAL");
        m.insert(b"TP1", b"TPE1");
        m.insert(b"TP2", b"TPE2");
        m.insert(b"TP3", b"TPE3");
        m.insert(b"TP4", b"TPE4");
        m.insert(b"TPA", b"TPOS");
        m.insert(b"TPB", b"TPUB");
        m.insert(b"TRC", b"TSRC");
        m.insert(b"TRD", b"TRDA");
        m.insert(b"TRK", b"TRCK");
        m.insert(b"TS2", b"TSO2");
        m.insert(b"TSA", b"TSOA");
        m.insert(b"TSC", b"TSOC");
        m.insert(b"TSP", b"TSOP");
        m.insert(b"TSS", b"TSSE");
        m.insert(b"TST", b"TSOT");
        m.insert(b"TT1", b"TIT1");
        m.insert(b"TT2", b"TIT2");
        m.insert(b"TT3", b"TIT3");
        m.insert(b"TXT", b"TEXT");
        m.insert(b"TXX", b"TXXX");
        m.insert(b"TYE", b"TYER");
        m.insert(b"UFI", b"UFID");
        m.insert(b"ULT", b"USLT");
        m.insert(b"WAF", b"WOAF");
        m.insert(b"WAR", b"WOAR");
        m.insert(b"WAS", b"WOAS");
        m.insert(b"WCM", b"WCOM");
        m.insert(b"WCP", b"WCOP");
        m.insert(b"WPB", b"WPUB");
        m.insert(b"WXX", b"WXXX");
        m
    };
}

/// Read an ID3v2.2 frame.
pub fn read_id3v2p2_frame<B: ReadBytes>(reader: &mut B) -> Result<FrameResult> {
    let id = reader.read_triple_bytes()?;

    // Check if the frame id contains valid characters. If it does not, then assume the rest of
    // the tag is padding.
    if !validate_frame_id(&id) {
        // As per the specification, padding should be all 0s, but there are some tags which
        // don't obey the specification.
        if id != [0, 0, 0] {
            warn!("id3v2: padding bytes not zero");
        }

        return Ok(FrameResult::Padding);
    }

    let size = u64::from(reader.read_be_u24()?);

    // A frame must be atleast 1 byte as per the specification.
    if size == 0 {
        warn!("id3v2: '{}' skipped because it has a size of 0", String::from_utf8_lossy(&id));
        return Ok(FrameResult::Skipped);
    }

    let data = reader.read_boxed_slice_exact(size as usize)?;

    // Translate the legacy 3 character identifier into its modern 4 character equivalent. A
    // frame with no equivalent cannot be carried forward since its identity would be lost on
    // rewrite.
    let modern_id = match LEGACY_FRAME_MAP.get(&id) {
        Some(modern_id) => **modern_id,
        None => {
            warn!("id3v2: no modern equivalent for '{}'", String::from_utf8_lossy(&id));
            return Ok(FrameResult::Skipped);
        }
    };

    // An error while reading the frame body is not fatal.
    match parse_frame_body(modern_id, &id, &data, 2) {
        Ok(value) => Ok(FrameResult::Frame(Frame::new(modern_id, value))),
        Err(err) => {
            warn!("id3v2: {}", err);
            Ok(FrameResult::Skipped)
        }
    }
}

/// Read an ID3v2.3 frame.
pub fn read_id3v2p3_frame<B: ReadBytes>(reader: &mut B) -> Result<FrameResult> {
    let id = reader.read_quad_bytes()?;

    if !validate_frame_id(&id) {
        if id != [0, 0, 0, 0] {
            warn!("id3v2: padding bytes not zero");
        }

        return Ok(FrameResult::Padding);
    }

    let size = reader.read_be_u32()?;
    let flags = reader.read_be_u16()?;

    // Frame-specific flags that are important for reading.
    let is_compressed = flags & 0x80 != 0;
    let is_encrypted = flags & 0x40 != 0;
    let is_grouped = flags & 0x20 != 0;

    // When some flags are set, the frame header is extended with additional fields. Calculate
    // the size of these fields.
    let flag_data_size = if is_compressed { 4 } else { 0 } // 4-byte decompressed size.
        + if is_encrypted { 1 } else { 0 } // 1-byte encryption ID.
        + if is_grouped { 1 } else { 0 }; // 1-byte group ID.

    // If the frame size is too small for the extended header, there is a fatal framing error.
    if size < flag_data_size {
        return invalid_field_error("id3v2: the frame is too small");
    }

    let data_size = size - flag_data_size;

    reader.ignore_bytes(u64::from(flag_data_size))?;

    // Compression and encryption are vendor- or registration-specific. The frame body cannot be
    // interpreted, so the frame is skipped.
    if is_compressed || is_encrypted {
        reader.ignore_bytes(u64::from(data_size))?;

        warn!(
            "id3v2: '{}' skipped because compressed and encrypted frames are not supported",
            String::from_utf8_lossy(&id)
        );
        return Ok(FrameResult::Skipped);
    }

    // A zero-length frame body is not allowed, but can be skipped.
    if data_size == 0 {
        warn!("id3v2: '{}' skipped because it has a size of 0", String::from_utf8_lossy(&id));
        return Ok(FrameResult::Skipped);
    }

    let data = reader.read_boxed_slice_exact(data_size as usize)?;

    // An error while reading the frame body is not fatal.
    match parse_frame_body(id, &id, &data, 3) {
        Ok(value) => Ok(FrameResult::Frame(Frame::new(id, value))),
        Err(err) => {
            warn!("id3v2: {}", err);
            Ok(FrameResult::Skipped)
        }
    }
}

/// Read an ID3v2.4 frame.
pub fn read_id3v2p4_frame<B: ReadBytes + FiniteStream>(reader: &mut B) -> Result<FrameResult> {
    let id = reader.read_quad_bytes()?;

    if !validate_frame_id(&id) {
        if id != [0, 0, 0, 0] {
            warn!("id3v2: padding bytes not zero");
        }

        return Ok(FrameResult::Padding);
    }

    let size = read_syncsafe_leq32(reader, 28)?;
    let flags = reader.read_be_u16()?;

    // Frame-specific flags that are important for reading.
    let is_grouped = flags & 0x40 != 0;
    let is_compressed = flags & 0x08 != 0;
    let is_encrypted = flags & 0x04 != 0;
    let is_unsynchronised = flags & 0x02 != 0;
    let has_indicated_size = flags & 0x01 != 0;

    // When some flags are set, the frame header is extended with additional fields. Calculate
    // the size of these fields.
    let flag_data_size = if is_grouped { 1 } else { 0 } // 1-byte group ID.
        + if is_encrypted { 1 } else { 0 } // 1-byte encryption ID.
        + if has_indicated_size { 4 } else { 0 }; // 4-byte data length indicator.

    // If the frame size is too small for the extended header, there is a fatal framing error.
    if size < flag_data_size {
        return invalid_field_error("id3v2: the frame is too small");
    }

    let data_size = size - flag_data_size;

    reader.ignore_bytes(u64::from(flag_data_size))?;

    if is_compressed || is_encrypted {
        reader.ignore_bytes(u64::from(data_size))?;

        warn!(
            "id3v2: '{}' skipped because compressed and encrypted frames are not supported",
            String::from_utf8_lossy(&id)
        );
        return Ok(FrameResult::Skipped);
    }

    if data_size == 0 {
        warn!("id3v2: '{}' skipped because it has a size of 0", String::from_utf8_lossy(&id));
        return Ok(FrameResult::Skipped);
    }

    let mut data = reader.read_boxed_slice_exact(data_size as usize)?;

    // The frame body may be individually unsynchronised. Decode it in-place before parsing.
    let result = if is_unsynchronised {
        let unsync_data = decode_unsynchronisation(&mut data);
        parse_frame_body(id, &id, unsync_data, 4)
    }
    else {
        parse_frame_body(id, &id, &data, 4)
    };

    // An error while reading the frame body is not fatal.
    match result {
        Ok(value) => Ok(FrameResult::Frame(Frame::new(id, value))),
        Err(err) => {
            warn!("id3v2: {}", err);
            Ok(FrameResult::Skipped)
        }
    }
}

/// Parse a frame body into a typed frame value.
///
/// `id` is the modern 4 character identifier used for dispatch, `orig_id` is the identifier as
/// written in the tag (3 characters for ID3v2.2 frames), and `major_version` is the major
/// version of the tag containing the frame.
fn parse_frame_body(
    id: [u8; 4],
    orig_id: &[u8],
    data: &[u8],
    major_version: u8,
) -> Result<FrameValue> {
    let mut reader = BufReader::new(data);

    let value = match &id {
        b"TXXX" => read_user_text_frame(&mut reader)?,
        b"TIPL" | b"TMCL" | b"IPLS" => read_involved_people_frame(&mut reader)?,
        b"WXXX" => read_user_url_frame(&mut reader)?,
        b"COMM" => read_comment_frame(&mut reader, false)?,
        b"USLT" => read_comment_frame(&mut reader, true)?,
        b"APIC" => read_picture_frame(&mut reader, orig_id.len() == 3)?,
        b"UFID" => read_unique_file_id_frame(&mut reader)?,
        b"PCNT" => FrameValue::PlayCounter(read_play_counter_required(&mut reader)?),
        b"POPM" => read_popularimeter_frame(&mut reader)?,
        b"PRIV" => read_private_frame(&mut reader)?,
        b"RVA2" => read_relative_volume_frame(&mut reader)?,
        // NUL-separated multi-values exist in ID3v2.4 text frames only.
        [b'T', ..] => read_text_frame(&mut reader, major_version < 4)?,
        [b'W', ..] => FrameValue::Url(read_string(&mut reader, Encoding::Latin1)?),
        _ => FrameValue::Unknown(Box::from(data)),
    };

    Ok(value)
}

// Primitive value readers
//------------------------

/// Read and validate an encoding indicator.
fn read_encoding(reader: &mut BufReader<'_>) -> Result<Encoding> {
    match Encoding::parse(reader.read_byte()?) {
        Some(encoding) => Ok(encoding),
        _ => invalid_field_error("id3v2: invalid text encoding"),
    }
}

/// Read an ISO-639-2 language code. ID3v2 specifies 3 alphabetic characters, but some taggers
/// write arbitrary bytes, so the code is carried as read.
fn read_lang_code(reader: &mut BufReader<'_>) -> Result<[u8; 3]> {
    reader.read_triple_bytes()
}

/// Read a null-terminated string of the specified encoding from the stream. If the stream ends
/// before the null-terminator is reached, all the bytes up-to that point are interpreted as the
/// string.
fn read_string(reader: &mut BufReader<'_>, encoding: Encoding) -> Result<String> {
    let max_len = reader.bytes_available() as usize;

    let buf = match encoding {
        Encoding::Latin1 | Encoding::Utf8 => {
            // Byte aligned encodings. The null-terminator is 1 byte.
            let buf = reader.scan_bytes_aligned_ref(&[0x00], 1, max_len)?;
            // Trim the trailing null-terminator, if present.
            match buf.last() {
                Some(b'\0') => &buf[..buf.len() - 1],
                _ => buf,
            }
        }
        Encoding::Utf16 | Encoding::Utf16Be => {
            // Two-byte aligned encodings. The null-terminator is 2 bytes.
            let buf = reader.scan_bytes_aligned_ref(&[0x00, 0x00], 2, max_len)?;
            // Trim the trailing null-terminator, if present.
            match buf.last_chunk::<2>() {
                Some(b"\0\0") => &buf[..buf.len() - 2],
                _ => buf,
            }
        }
    };

    Ok(decode_string_buf(buf, encoding))
}

/// Decodes a slice of bytes containing encoded text into a string.
fn decode_string_buf(buf: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Latin1 => text::decode_latin1(buf),
        Encoding::Utf8 => text::decode_utf8_lossy(buf),
        Encoding::Utf16 => text::decode_utf16_bom(buf),
        Encoding::Utf16Be => text::decode_utf16be(buf),
    }
}

/// Reads a list of strings where each string is null-terminated.
fn read_string_list(
    reader: &mut BufReader<'_>,
    encoding: Encoding,
) -> Result<SmallVec<[String; 1]>> {
    let mut items: SmallVec<[String; 1]> = Default::default();

    // Read the first string. If the reader is empty, this will push an empty string.
    items.push(read_string(reader, encoding)?);

    // Read additional strings.
    while reader.bytes_available() > 0 {
        items.push(read_string(reader, encoding)?);
    }

    Ok(items)
}

/// Read the remainder of the buffer as a variably sized play counter.
///
/// The counter is stored as an N-byte big-endian integer. Values wider than 64 bits are not
/// supported.
fn read_play_counter(reader: &mut BufReader<'_>) -> Result<Option<u64>> {
    let len = reader.bytes_available() as usize;

    // A length of 0 indicates no play counter.
    if len == 0 {
        return Ok(None);
    }

    if len > 8 {
        return invalid_field_error("id3v2: play counters greater-than 64 bits are not supported");
    }

    let mut buf = [0u8; 8];
    reader.read_buf_exact(&mut buf[8 - len..])?;

    Ok(Some(u64::from_be_bytes(buf)))
}

fn read_play_counter_required(reader: &mut BufReader<'_>) -> Result<u64> {
    match read_play_counter(reader)? {
        Some(count) => Ok(count),
        _ => invalid_field_error("id3v2: missing play counter"),
    }
}

// Frame body readers
//-------------------

/// Reads all text frames except for `TXXX`.
///
/// ID3v2.4 text frames may carry multiple NUL-separated values. For earlier versions, and the
/// handful of frames ID3v2.4 dropped, the body is a single string.
fn read_text_frame(reader: &mut BufReader<'_>, single_value: bool) -> Result<FrameValue> {
    let encoding = read_encoding(reader)?;

    let values = if single_value {
        let mut values: SmallVec<[String; 1]> = Default::default();
        values.push(read_string(reader, encoding)?);
        values
    }
    else {
        read_string_list(reader, encoding)?
    };

    Ok(FrameValue::Text { encoding, values })
}

/// Reads a `TXXX` (user defined) text frame.
fn read_user_text_frame(reader: &mut BufReader<'_>) -> Result<FrameValue> {
    let encoding = read_encoding(reader)?;
    let description = read_string(reader, encoding)?;
    let values = read_string_list(reader, encoding)?;

    Ok(FrameValue::UserText { encoding, description, values })
}

/// Reads a `WXXX` (user defined) URL frame.
fn read_user_url_frame(reader: &mut BufReader<'_>) -> Result<FrameValue> {
    let encoding = read_encoding(reader)?;
    let description = read_string(reader, encoding)?;
    // The URL itself is always ISO-8859-1.
    let url = read_string(reader, Encoding::Latin1)?;

    Ok(FrameValue::UserUrl { encoding, description, url })
}

/// Reads a `COMM` (comment) or `USLT` (lyrics) frame. The two share a wire layout.
fn read_comment_frame(reader: &mut BufReader<'_>, is_lyrics: bool) -> Result<FrameValue> {
    let encoding = read_encoding(reader)?;
    let language = read_lang_code(reader)?;
    let description = read_string(reader, encoding)?;
    let text = read_string(reader, encoding)?;

    Ok(if is_lyrics {
        FrameValue::Lyrics { encoding, language, description, text }
    }
    else {
        FrameValue::Comment { encoding, language, description, text }
    })
}

/// Reads an `APIC` (attached picture) frame, or its legacy `PIC` form.
fn read_picture_frame(reader: &mut BufReader<'_>, legacy: bool) -> Result<FrameValue> {
    let encoding = read_encoding(reader)?;

    let media_type = if legacy {
        // Legacy PIC frames use a 3 character image format identifier.
        match &reader.read_triple_bytes()? {
            b"JPG" => "image/jpeg".to_string(),
            b"PNG" => "image/png".to_string(),
            b"BMP" => "image/bmp".to_string(),
            b"GIF" => "image/gif".to_string(),
            other => format!("image/{}", text::decode_latin1(other).to_ascii_lowercase()),
        }
    }
    else {
        // APIC frames use a null-terminated ISO-8859-1 media-type string.
        read_string(reader, Encoding::Latin1)?
    };

    // An undefined picture type code falls back to Other rather than failing the frame.
    let picture_type =
        PictureType::from_code(u32::from(reader.read_u8()?)).unwrap_or(PictureType::Other);

    let description = read_string(reader, encoding)?;

    // The remainder of the frame is the image data.
    let data = Box::from(reader.read_buf_bytes_available_ref());

    Ok(FrameValue::Picture { encoding, media_type, picture_type, description, data })
}

/// Reads a `UFID` (unique file identifier) frame.
fn read_unique_file_id_frame(reader: &mut BufReader<'_>) -> Result<FrameValue> {
    let owner = read_string(reader, Encoding::Latin1)?;
    let identifier = reader.read_buf_bytes_available_ref();

    // 64-bytes is the limit of the identifier.
    if identifier.len() > 64 {
        return invalid_field_error("id3v2: ufid identifier exceeds 64 bytes");
    }

    Ok(FrameValue::UniqueFileId { owner, identifier: Box::from(identifier) })
}

/// Reads a `TIPL`, `TMCL`, or `IPLS` (involved people) frame.
///
/// The body is a list of (role, person) string pairs. A trailing role with no person is dropped.
fn read_involved_people_frame(reader: &mut BufReader<'_>) -> Result<FrameValue> {
    let encoding = read_encoding(reader)?;

    let mut pairs = Vec::new();

    while reader.bytes_available() > 0 {
        let role = read_string(reader, encoding)?;

        if reader.bytes_available() == 0 {
            if !role.is_empty() {
                warn!("id3v2: dangling role in an involved people frame");
            }
            break;
        }

        let person = read_string(reader, encoding)?;
        pairs.push((role, person));
    }

    Ok(FrameValue::InvolvedPeople { encoding, pairs })
}

/// Reads a `POPM` (popularimeter) frame.
fn read_popularimeter_frame(reader: &mut BufReader<'_>) -> Result<FrameValue> {
    let email = read_string(reader, Encoding::Latin1)?;
    let rating = reader.read_u8()?;
    let play_count = read_play_counter(reader)?;

    Ok(FrameValue::Popularimeter { email, rating, play_count })
}

/// Reads a `PRIV` (private) frame.
fn read_private_frame(reader: &mut BufReader<'_>) -> Result<FrameValue> {
    let owner = read_string(reader, Encoding::Latin1)?;
    let data = Box::from(reader.read_buf_bytes_available_ref());

    Ok(FrameValue::Private { owner, data })
}

/// Reads an `RVA2` (relative volume adjustment) frame.
fn read_relative_volume_frame(reader: &mut BufReader<'_>) -> Result<FrameValue> {
    let identification = read_string(reader, Encoding::Latin1)?;

    let mut channels = Vec::new();

    // Each adjustment is atleast a channel type, a 16-bit adjustment, and a peak width.
    while reader.bytes_available() >= 4 {
        let channel_type = reader.read_u8()?;
        let adjustment = reader.read_be_i16()?;
        let peak_bits = reader.read_u8()?;
        let peak = reader.read_boxed_slice_exact(usize::from(peak_bits).div_ceil(8))?;

        channels.push(RelativeVolumeChannel { channel_type, adjustment, peak_bits, peak });
    }

    Ok(FrameValue::RelativeVolume { identification, channels })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_read_encoding() {
        assert!(read_encoding(&mut BufReader::new(&[])).is_err());
        assert_eq!(read_encoding(&mut BufReader::new(&[0])).unwrap(), Encoding::Latin1);
        assert_eq!(read_encoding(&mut BufReader::new(&[1])).unwrap(), Encoding::Utf16);
        assert_eq!(read_encoding(&mut BufReader::new(&[2])).unwrap(), Encoding::Utf16Be);
        assert_eq!(read_encoding(&mut BufReader::new(&[3])).unwrap(), Encoding::Utf8);
        assert!(read_encoding(&mut BufReader::new(&[4])).is_err());
    }

    #[test]
    fn verify_read_string() {
        // Non-terminated string.
        assert_eq!(
            read_string(&mut BufReader::new(b"Hello! 123!"), Encoding::Utf8).unwrap(),
            "Hello! 123!"
        );
        // Null-terminated string.
        assert_eq!(
            read_string(&mut BufReader::new(b"Terminated.\0"), Encoding::Utf8).unwrap(),
            "Terminated."
        );
        // UTF-16 with a little-endian BOM.
        assert_eq!(
            read_string(&mut BufReader::new(&[0xff, 0xfe, 0x41, 0x00, 0x00, 0x00]), Encoding::Utf16)
                .unwrap(),
            "A"
        );
    }

    #[test]
    fn verify_read_play_counter() {
        assert_eq!(read_play_counter(&mut BufReader::new(&[])).unwrap(), None);
        assert_eq!(read_play_counter(&mut BufReader::new(&[7])).unwrap(), Some(7));
        assert_eq!(
            read_play_counter(&mut BufReader::new(&[0, 0, 0, 9])).unwrap(),
            Some(9)
        );
        assert_eq!(
            read_play_counter(&mut BufReader::new(&u64::MAX.to_be_bytes())).unwrap(),
            Some(u64::MAX)
        );
        assert!(read_play_counter(&mut BufReader::new(&[0; 9])).is_err());
    }

    #[test]
    fn verify_text_frame_multi_value() {
        // encoding 3 (UTF-8) with two NUL separated values.
        let body = b"\x03first\0second";
        match parse_frame_body(*b"TPE1", b"TPE1", body, 4).unwrap() {
            FrameValue::Text { values, .. } => {
                assert_eq!(values.as_slice(), ["first".to_string(), "second".to_string()]);
            }
            _ => panic!("expected text frame"),
        }
    }

    #[test]
    fn verify_comment_frame() {
        let body = b"\x00engdesc\0the comment";
        match parse_frame_body(*b"COMM", b"COMM", body, 4).unwrap() {
            FrameValue::Comment { language, description, text, .. } => {
                assert_eq!(&language, b"eng");
                assert_eq!(description, "desc");
                assert_eq!(text, "the comment");
            }
            _ => panic!("expected comment frame"),
        }
    }

    #[test]
    fn verify_picture_frame() {
        let body = b"\x00image/png\0\x03front\0\x89PNG";
        match parse_frame_body(*b"APIC", b"APIC", body, 4).unwrap() {
            FrameValue::Picture { media_type, picture_type, description, data, .. } => {
                assert_eq!(media_type, "image/png");
                assert_eq!(picture_type, PictureType::FrontCover);
                assert_eq!(description, "front");
                assert_eq!(data.as_ref(), b"\x89PNG");
            }
            _ => panic!("expected picture frame"),
        }
    }

    #[test]
    fn verify_unknown_frame_is_verbatim() {
        let body = &[0x01, 0x02, 0x03];
        match parse_frame_body(*b"MCDI", b"MCDI", body, 4).unwrap() {
            FrameValue::Unknown(data) => assert_eq!(data.as_ref(), body),
            _ => panic!("expected unknown frame"),
        }
    }
}
