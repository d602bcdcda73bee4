// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `meta` module defines the format-independent metadata model, read limits, and the common
//! tag editing interface implemented by every tag format.

use std::fmt;

/// Limit defines how a parser should handle resource allocation when the amount of that resource
/// to be allocated is dictated by the untrusted stream. Limits are used to prevent
/// denial-of-service attacks whereby the stream requests the parser to allocate large amounts of
/// a resource, usually memory. A limit will place an upper-bound on this allocation at the risk
/// of breaking potentially valid streams.
#[derive(Copy, Clone)]
pub enum Limit {
    /// Do not impose any limit.
    None,
    /// Use the (reasonable) default specified by the parser.
    Default,
    /// Specify the upper limit of the resource. Units are use-case specific.
    Maximum(usize),
}

impl Limit {
    /// Gets the numeric limit, or the default value. If there is no limit, None is returned.
    pub fn limit_or_default(&self, default: usize) -> Option<usize> {
        match self {
            Limit::None => None,
            Limit::Default => Some(default),
            Limit::Maximum(max) => Some(*max),
        }
    }
}

/// `ReadOptions` is a common set of options that all file and tag readers use.
#[derive(Copy, Clone)]
pub struct ReadOptions {
    /// Validate the CRC of checksummed structures (OGG pages) while reading, and fail the read
    /// on mismatch. When false, stored checksums are ignored.
    pub validate_crc: bool,

    /// The maximum size in bytes of a metadata tag. The default is 256 MiB.
    pub limit_tag_bytes: Limit,

    /// The maximum size in bytes of an embedded picture. The default is 64 MiB.
    pub limit_visual_bytes: Limit,

    /// The maximum assembled size in bytes of a single OGG packet. The default is 16 MiB.
    pub limit_packet_bytes: Limit,

    /// The maximum number of continuation pages a single OGG packet may span. The default is 50.
    pub limit_packet_pages: Limit,
}

impl ReadOptions {
    pub const DEFAULT_TAG_BYTES: usize = 256 * 1024 * 1024;
    pub const DEFAULT_VISUAL_BYTES: usize = 64 * 1024 * 1024;
    pub const DEFAULT_PACKET_BYTES: usize = 16 * 1024 * 1024;
    pub const DEFAULT_PACKET_PAGES: usize = 50;
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            validate_crc: false,
            limit_tag_bytes: Limit::Default,
            limit_visual_bytes: Limit::Default,
            limit_packet_bytes: Limit::Default,
            limit_packet_pages: Limit::Default,
        }
    }
}

/// `StandardTagKey` is an enumeration providing standardized keys for common tag types.
/// A tag reader may assign a `StandardTagKey` to a `Tag` if the tag's key is generally accepted
/// to map to a specific usage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StandardTagKey {
    AcoustidFingerprint,
    AcoustidId,
    Album,
    AlbumArtist,
    Arranger,
    Artist,
    Bpm,
    Comment,
    Compilation,
    Composer,
    Conductor,
    ContentGroup,
    Copyright,
    Date,
    Description,
    DiscNumber,
    DiscSubtitle,
    DiscTotal,
    EncodedBy,
    Encoder,
    EncoderSettings,
    Engineer,
    Genre,
    IdentAsin,
    IdentBarcode,
    IdentCatalogNumber,
    IdentIsrc,
    Label,
    Language,
    License,
    Lyricist,
    Lyrics,
    MediaFormat,
    MixDj,
    MixEngineer,
    Mood,
    MusicBrainzAlbumArtistId,
    MusicBrainzAlbumId,
    MusicBrainzArtistId,
    MusicBrainzDiscId,
    MusicBrainzRecordingId,
    MusicBrainzReleaseGroupId,
    MusicBrainzReleaseTrackId,
    MusicBrainzWorkId,
    OriginalAlbum,
    OriginalArtist,
    OriginalDate,
    OriginalFile,
    OriginalWriter,
    Owner,
    Performer,
    PlayCounter,
    Producer,
    Rating,
    ReleaseCountry,
    Remixer,
    ReplayGainAlbumGain,
    ReplayGainAlbumPeak,
    ReplayGainTrackGain,
    ReplayGainTrackPeak,
    SortAlbum,
    SortAlbumArtist,
    SortArtist,
    SortComposer,
    SortTrackTitle,
    TrackNumber,
    TrackSubtitle,
    TrackTitle,
    TrackTotal,
    Url,
    UrlArtist,
    UrlCopyright,
    UrlLabel,
    UrlOfficial,
    UrlSource,
    Version,
    Writer,
}

/// A `Tag` value.
///
/// Note: The data types in this enumeration are a generalization. Depending on the particular
/// tag format, the actual data type a specific tag may have a lesser width or encoding than the
/// data type in this enumeration.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A binary buffer.
    Binary(Box<[u8]>),
    /// A boolean value.
    Boolean(bool),
    /// A flag or indicator. A flag carries no data, but the presence of the tag has an implicit
    /// meaning.
    Flag,
    /// A floating point number.
    Float(f64),
    /// A signed integer.
    SignedInt(i64),
    /// A string. This is also the catch-all type for tags with unconventional data types.
    String(String),
    /// An unsigned integer.
    UnsignedInt(u64),
}

macro_rules! impl_from_for_value {
    ($value:ident, $from:ty, $conv:expr) => {
        impl From<$from> for Value {
            fn from($value: $from) -> Self {
                $conv
            }
        }
    };
}

impl_from_for_value!(v, &[u8], Value::Binary(Box::from(v)));
impl_from_for_value!(v, bool, Value::Boolean(v));
impl_from_for_value!(v, f64, Value::Float(v));
impl_from_for_value!(v, i64, Value::SignedInt(v));
impl_from_for_value!(v, u8, Value::UnsignedInt(u64::from(v)));
impl_from_for_value!(v, u16, Value::UnsignedInt(u64::from(v)));
impl_from_for_value!(v, u32, Value::UnsignedInt(u64::from(v)));
impl_from_for_value!(v, u64, Value::UnsignedInt(v));
impl_from_for_value!(v, &str, Value::String(String::from(v)));
impl_from_for_value!(v, String, Value::String(v));

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Binary(buf) => write!(f, "<{} bytes>", buf.len()),
            Value::Boolean(boolean) => fmt::Display::fmt(boolean, f),
            Value::Flag => write!(f, "<flag>"),
            Value::Float(float) => fmt::Display::fmt(float, f),
            Value::SignedInt(int) => fmt::Display::fmt(int, f),
            Value::String(string) => fmt::Display::fmt(string, f),
            Value::UnsignedInt(uint) => fmt::Display::fmt(uint, f),
        }
    }
}

/// A `Tag` encapsulates a key-value pair of metadata.
#[derive(Clone, Debug)]
pub struct Tag {
    /// If the `Tag`'s key string is commonly associated with a typical type, meaning, or
    /// purpose, then if recognized a `StandardTagKey` will be assigned to this `Tag`.
    ///
    /// This is a best effort guess since not all metadata formats have a well defined or
    /// specified tag mapping. However, it is recommended that consumers prefer `std_key` over
    /// `key`, if provided.
    pub std_key: Option<StandardTagKey>,
    /// A key string indicating the type, meaning, or purpose of the `Tag`s value.
    ///
    /// Note: The meaning of `key` is dependant on the underlying metadata format.
    pub key: String,
    /// The value of the `Tag`.
    pub value: Value,
}

impl Tag {
    /// Create a new `Tag`.
    pub fn new(std_key: Option<StandardTagKey>, key: &str, value: Value) -> Tag {
        Tag { std_key, key: key.to_string(), value }
    }

    /// Returns true if the `Tag`'s key string was recognized and a `StandardTagKey` was
    /// assigned, otherwise false is returned.
    pub fn is_known(&self) -> bool {
        self.std_key.is_some()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.std_key {
            Some(std_key) => {
                write!(f, "{{ std_key={:?}, key=\"{}\", value={} }}", std_key, self.key, self.value)
            }
            None => write!(f, "{{ key=\"{}\", value={} }}", self.key, self.value),
        }
    }
}

/// A 2 dimensional (width and height) size type.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Size {
    /// The width in pixels.
    pub width: u32,
    /// The height in pixels.
    pub height: u32,
}

/// The usage of an attached picture.
///
/// These are the picture types standardized by the ID3v2 APIC frame and reused verbatim by the
/// FLAC PICTURE block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PictureType {
    Other,
    FileIcon,
    OtherIcon,
    FrontCover,
    BackCover,
    Leaflet,
    Media,
    LeadArtist,
    Artist,
    Conductor,
    Band,
    Composer,
    Lyricist,
    RecordingLocation,
    DuringRecording,
    DuringPerformance,
    ScreenCapture,
    BrightColoredFish,
    Illustration,
    BandLogo,
    PublisherLogo,
}

impl PictureType {
    /// Gets the picture type for an APIC/PICTURE type code, if the code is defined.
    pub fn from_code(code: u32) -> Option<PictureType> {
        match code {
            0 => Some(PictureType::Other),
            1 => Some(PictureType::FileIcon),
            2 => Some(PictureType::OtherIcon),
            3 => Some(PictureType::FrontCover),
            4 => Some(PictureType::BackCover),
            5 => Some(PictureType::Leaflet),
            6 => Some(PictureType::Media),
            7 => Some(PictureType::LeadArtist),
            8 => Some(PictureType::Artist),
            9 => Some(PictureType::Conductor),
            10 => Some(PictureType::Band),
            11 => Some(PictureType::Composer),
            12 => Some(PictureType::Lyricist),
            13 => Some(PictureType::RecordingLocation),
            14 => Some(PictureType::DuringRecording),
            15 => Some(PictureType::DuringPerformance),
            16 => Some(PictureType::ScreenCapture),
            17 => Some(PictureType::BrightColoredFish),
            18 => Some(PictureType::Illustration),
            19 => Some(PictureType::BandLogo),
            20 => Some(PictureType::PublisherLogo),
            _ => None,
        }
    }

    /// Gets the APIC/PICTURE type code for the picture type.
    pub fn to_code(self) -> u32 {
        match self {
            PictureType::Other => 0,
            PictureType::FileIcon => 1,
            PictureType::OtherIcon => 2,
            PictureType::FrontCover => 3,
            PictureType::BackCover => 4,
            PictureType::Leaflet => 5,
            PictureType::Media => 6,
            PictureType::LeadArtist => 7,
            PictureType::Artist => 8,
            PictureType::Conductor => 9,
            PictureType::Band => 10,
            PictureType::Composer => 11,
            PictureType::Lyricist => 12,
            PictureType::RecordingLocation => 13,
            PictureType::DuringRecording => 14,
            PictureType::DuringPerformance => 15,
            PictureType::ScreenCapture => 16,
            PictureType::BrightColoredFish => 17,
            PictureType::Illustration => 18,
            PictureType::BandLogo => 19,
            PictureType::PublisherLogo => 20,
        }
    }
}

/// A `Visual` is an attached 2 dimensional graphic such as cover art.
///
/// The fields mirror the FLAC PICTURE block so that a visual survives a read-render round trip
/// losslessly in every format that can carry one.
#[derive(Clone, Debug, PartialEq)]
pub struct Visual {
    /// The Media Type (MIME Type) used to encode the `Visual`.
    pub media_type: String,
    /// The usage of the `Visual`.
    pub picture_type: PictureType,
    /// A textual description of the `Visual`.
    pub description: String,
    /// The dimensions of the `Visual` as stated by the metadata. May be zero.
    pub dimensions: Size,
    /// The number of bits-per-pixel of the unencoded image as stated by the metadata.
    pub bits_per_pixel: u32,
    /// For indexed-colour formats, the number of colours in the palette, 0 otherwise.
    pub indexed_colors: u32,
    /// The data of the `Visual`, encoded as per `media_type`.
    pub data: Box<[u8]>,
}

impl Visual {
    /// Create a front-cover visual from encoded image data with a media type.
    pub fn front_cover(media_type: &str, data: Box<[u8]>) -> Visual {
        Visual {
            media_type: media_type.to_string(),
            picture_type: PictureType::FrontCover,
            description: String::new(),
            dimensions: Size::default(),
            bits_per_pixel: 0,
            indexed_colors: 0,
            data,
        }
    }
}

/// The technical properties of the audio stream a container carries.
///
/// These come from container metadata, not from decoding the audio, and are absent when the
/// container states nothing usable (for example a zero sample rate).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AudioProperties {
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The number of audio channels.
    pub channels: u32,
    /// The number of bits per sample, if stated.
    pub bits_per_sample: Option<u32>,
    /// The duration of the stream in seconds, if it can be derived.
    pub duration_secs: Option<f64>,
}

/// `TagLike` is the common editing interface implemented by every tag format.
///
/// Getters and setters address fields through [`StandardTagKey`]; each implementation maps the
/// key onto its native field naming. Setting a key a format cannot represent is a no-op.
pub trait TagLike {
    /// Gets the first value for the given standard key.
    fn get(&self, key: StandardTagKey) -> Option<Value>;

    /// Sets the value for the given standard key, replacing all existing values of that key.
    fn set(&mut self, key: StandardTagKey, value: Value);

    /// Removes all values for the given standard key.
    fn remove(&mut self, key: StandardTagKey);

    /// Returns true if the tag holds no fields and no visuals.
    fn is_empty(&self) -> bool;

    /// Enumerates all fields as generic `Tag`s in stored order.
    fn tags(&self) -> Vec<Tag>;

    /// Enumerates all attached visuals.
    fn visuals(&self) -> Vec<Visual>;

    /// Attaches a visual.
    fn add_visual(&mut self, visual: Visual);

    /// Removes all attached visuals.
    fn clear_visuals(&mut self);

    /// Gets the first value for the given standard key as a string.
    fn get_str(&self, key: StandardTagKey) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}
