// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mappings between format-native field keys and [`StandardTagKey`].
//!
//! Each format has a read map (many aliases, case-insensitive) and a write key (the single
//! canonical spelling emitted when a standard key is set through the editing interface).

use std::collections::HashMap;

use lazy_static::lazy_static;

use cantata_core::meta::StandardTagKey;

// Vorbis Comment field names. The read side accepts the aliases commonly found in the wild; the
// write side always emits the first entry carrying a given standard key.
const VORBIS_KEYS: &[(&str, StandardTagKey)] = &[
    ("TITLE", StandardTagKey::TrackTitle),
    ("ARTIST", StandardTagKey::Artist),
    ("ALBUM", StandardTagKey::Album),
    ("ALBUMARTIST", StandardTagKey::AlbumArtist),
    ("ALBUM ARTIST", StandardTagKey::AlbumArtist),
    ("TRACKNUMBER", StandardTagKey::TrackNumber),
    ("TRACKTOTAL", StandardTagKey::TrackTotal),
    ("TOTALTRACKS", StandardTagKey::TrackTotal),
    ("DISCNUMBER", StandardTagKey::DiscNumber),
    ("DISCTOTAL", StandardTagKey::DiscTotal),
    ("TOTALDISCS", StandardTagKey::DiscTotal),
    ("DATE", StandardTagKey::Date),
    ("YEAR", StandardTagKey::Date),
    ("ORIGINALDATE", StandardTagKey::OriginalDate),
    ("GENRE", StandardTagKey::Genre),
    ("COMPOSER", StandardTagKey::Composer),
    ("CONDUCTOR", StandardTagKey::Conductor),
    ("COMMENT", StandardTagKey::Comment),
    ("DESCRIPTION", StandardTagKey::Description),
    ("COMPILATION", StandardTagKey::Compilation),
    ("LYRICS", StandardTagKey::Lyrics),
    ("UNSYNCEDLYRICS", StandardTagKey::Lyrics),
    ("LYRICIST", StandardTagKey::Lyricist),
    ("WRITER", StandardTagKey::Writer),
    ("ARRANGER", StandardTagKey::Arranger),
    ("ENGINEER", StandardTagKey::Engineer),
    ("PRODUCER", StandardTagKey::Producer),
    ("REMIXER", StandardTagKey::Remixer),
    ("MIXER", StandardTagKey::MixEngineer),
    ("DJMIXER", StandardTagKey::MixDj),
    ("PERFORMER", StandardTagKey::Performer),
    ("BPM", StandardTagKey::Bpm),
    ("MOOD", StandardTagKey::Mood),
    ("COPYRIGHT", StandardTagKey::Copyright),
    ("LICENSE", StandardTagKey::License),
    ("LABEL", StandardTagKey::Label),
    ("ORGANIZATION", StandardTagKey::Label),
    ("PUBLISHER", StandardTagKey::Label),
    ("CATALOGNUMBER", StandardTagKey::IdentCatalogNumber),
    ("BARCODE", StandardTagKey::IdentBarcode),
    ("ASIN", StandardTagKey::IdentAsin),
    ("ISRC", StandardTagKey::IdentIsrc),
    ("LANGUAGE", StandardTagKey::Language),
    ("MEDIA", StandardTagKey::MediaFormat),
    ("ENCODEDBY", StandardTagKey::EncodedBy),
    ("ENCODED-BY", StandardTagKey::EncodedBy),
    ("ENCODER", StandardTagKey::Encoder),
    ("ENCODERSETTINGS", StandardTagKey::EncoderSettings),
    ("GROUPING", StandardTagKey::ContentGroup),
    ("SUBTITLE", StandardTagKey::TrackSubtitle),
    ("DISCSUBTITLE", StandardTagKey::DiscSubtitle),
    ("VERSION", StandardTagKey::Version),
    ("RATING", StandardTagKey::Rating),
    ("RELEASECOUNTRY", StandardTagKey::ReleaseCountry),
    ("TITLESORT", StandardTagKey::SortTrackTitle),
    ("ARTISTSORT", StandardTagKey::SortArtist),
    ("ALBUMSORT", StandardTagKey::SortAlbum),
    ("ALBUMARTISTSORT", StandardTagKey::SortAlbumArtist),
    ("COMPOSERSORT", StandardTagKey::SortComposer),
    ("MUSICBRAINZ_TRACKID", StandardTagKey::MusicBrainzRecordingId),
    ("MUSICBRAINZ_ALBUMID", StandardTagKey::MusicBrainzAlbumId),
    ("MUSICBRAINZ_ARTISTID", StandardTagKey::MusicBrainzArtistId),
    ("MUSICBRAINZ_ALBUMARTISTID", StandardTagKey::MusicBrainzAlbumArtistId),
    ("MUSICBRAINZ_RELEASEGROUPID", StandardTagKey::MusicBrainzReleaseGroupId),
    ("MUSICBRAINZ_RELEASETRACKID", StandardTagKey::MusicBrainzReleaseTrackId),
    ("MUSICBRAINZ_WORKID", StandardTagKey::MusicBrainzWorkId),
    ("MUSICBRAINZ_DISCID", StandardTagKey::MusicBrainzDiscId),
    ("ACOUSTID_ID", StandardTagKey::AcoustidId),
    ("ACOUSTID_FINGERPRINT", StandardTagKey::AcoustidFingerprint),
    ("REPLAYGAIN_TRACK_GAIN", StandardTagKey::ReplayGainTrackGain),
    ("REPLAYGAIN_TRACK_PEAK", StandardTagKey::ReplayGainTrackPeak),
    ("REPLAYGAIN_ALBUM_GAIN", StandardTagKey::ReplayGainAlbumGain),
    ("REPLAYGAIN_ALBUM_PEAK", StandardTagKey::ReplayGainAlbumPeak),
];

// APE item keys. APE convention capitalizes common keys and uses the Picard spellings for
// identifier keys.
const APE_KEYS: &[(&str, StandardTagKey)] = &[
    ("Title", StandardTagKey::TrackTitle),
    ("Artist", StandardTagKey::Artist),
    ("Album", StandardTagKey::Album),
    ("Album Artist", StandardTagKey::AlbumArtist),
    ("AlbumArtist", StandardTagKey::AlbumArtist),
    ("Track", StandardTagKey::TrackNumber),
    ("Disc", StandardTagKey::DiscNumber),
    ("Year", StandardTagKey::Date),
    ("Genre", StandardTagKey::Genre),
    ("Composer", StandardTagKey::Composer),
    ("Conductor", StandardTagKey::Conductor),
    ("Comment", StandardTagKey::Comment),
    ("Compilation", StandardTagKey::Compilation),
    ("Lyrics", StandardTagKey::Lyrics),
    ("Lyricist", StandardTagKey::Lyricist),
    ("Writer", StandardTagKey::Writer),
    ("Arranger", StandardTagKey::Arranger),
    ("Engineer", StandardTagKey::Engineer),
    ("Producer", StandardTagKey::Producer),
    ("Mixer", StandardTagKey::MixEngineer),
    ("DJMixer", StandardTagKey::MixDj),
    ("Performer", StandardTagKey::Performer),
    ("BPM", StandardTagKey::Bpm),
    ("Mood", StandardTagKey::Mood),
    ("Copyright", StandardTagKey::Copyright),
    ("Label", StandardTagKey::Label),
    ("Publisher", StandardTagKey::Label),
    ("CatalogNumber", StandardTagKey::IdentCatalogNumber),
    ("Catalog", StandardTagKey::IdentCatalogNumber),
    ("Barcode", StandardTagKey::IdentBarcode),
    ("ASIN", StandardTagKey::IdentAsin),
    ("ISRC", StandardTagKey::IdentIsrc),
    ("Language", StandardTagKey::Language),
    ("Media", StandardTagKey::MediaFormat),
    ("EncodedBy", StandardTagKey::EncodedBy),
    ("Encoder", StandardTagKey::Encoder),
    ("Grouping", StandardTagKey::ContentGroup),
    ("Subtitle", StandardTagKey::TrackSubtitle),
    ("DiscSubtitle", StandardTagKey::DiscSubtitle),
    ("TitleSort", StandardTagKey::SortTrackTitle),
    ("ArtistSort", StandardTagKey::SortArtist),
    ("AlbumSort", StandardTagKey::SortAlbum),
    ("AlbumArtistSort", StandardTagKey::SortAlbumArtist),
    ("ComposerSort", StandardTagKey::SortComposer),
    ("MUSICBRAINZ_TRACKID", StandardTagKey::MusicBrainzRecordingId),
    ("MUSICBRAINZ_ALBUMID", StandardTagKey::MusicBrainzAlbumId),
    ("MUSICBRAINZ_ARTISTID", StandardTagKey::MusicBrainzArtistId),
    ("MUSICBRAINZ_ALBUMARTISTID", StandardTagKey::MusicBrainzAlbumArtistId),
    ("MUSICBRAINZ_RELEASEGROUPID", StandardTagKey::MusicBrainzReleaseGroupId),
    ("MUSICBRAINZ_RELEASETRACKID", StandardTagKey::MusicBrainzReleaseTrackId),
    ("MUSICBRAINZ_WORKID", StandardTagKey::MusicBrainzWorkId),
    ("ACOUSTID_ID", StandardTagKey::AcoustidId),
    ("ACOUSTID_FINGERPRINT", StandardTagKey::AcoustidFingerprint),
    ("replaygain_track_gain", StandardTagKey::ReplayGainTrackGain),
    ("replaygain_track_peak", StandardTagKey::ReplayGainTrackPeak),
    ("replaygain_album_gain", StandardTagKey::ReplayGainAlbumGain),
    ("replaygain_album_peak", StandardTagKey::ReplayGainAlbumPeak),
];

// RIFF INFO sub-chunk identifiers.
const RIFF_INFO_KEYS: &[(&str, StandardTagKey)] = &[
    ("INAM", StandardTagKey::TrackTitle),
    ("TITL", StandardTagKey::TrackTitle),
    ("IART", StandardTagKey::Artist),
    ("IPRD", StandardTagKey::Album),
    ("ICMT", StandardTagKey::Comment),
    ("CMNT", StandardTagKey::Comment),
    ("COMM", StandardTagKey::Comment),
    ("ICRD", StandardTagKey::Date),
    ("YEAR", StandardTagKey::Date),
    ("IGNR", StandardTagKey::Genre),
    ("GENR", StandardTagKey::Genre),
    ("ISGN", StandardTagKey::Genre),
    ("ITRK", StandardTagKey::TrackNumber),
    ("TRCK", StandardTagKey::TrackNumber),
    ("IPRT", StandardTagKey::TrackNumber),
    ("PRT1", StandardTagKey::TrackNumber),
    ("PRT2", StandardTagKey::TrackTotal),
    ("IFRM", StandardTagKey::TrackTotal),
    ("IMUS", StandardTagKey::Composer),
    ("IWRI", StandardTagKey::Writer),
    ("IENG", StandardTagKey::Engineer),
    ("IPRO", StandardTagKey::Producer),
    ("ICOP", StandardTagKey::Copyright),
    ("ISFT", StandardTagKey::Encoder),
    ("IENC", StandardTagKey::EncodedBy),
    ("ITCH", StandardTagKey::EncodedBy),
    ("ILNG", StandardTagKey::Language),
    ("LANG", StandardTagKey::Language),
    ("ISRF", StandardTagKey::MediaFormat),
    ("TORG", StandardTagKey::Label),
    ("TVER", StandardTagKey::Version),
    ("IRTD", StandardTagKey::Rating),
    ("AGES", StandardTagKey::Rating),
];

lazy_static! {
    static ref VORBIS_READ_MAP: HashMap<String, StandardTagKey> = build_read_map(VORBIS_KEYS);
    static ref VORBIS_WRITE_MAP: HashMap<StandardTagKey, &'static str> =
        build_write_map(VORBIS_KEYS);
    static ref APE_READ_MAP: HashMap<String, StandardTagKey> = build_read_map(APE_KEYS);
    static ref APE_WRITE_MAP: HashMap<StandardTagKey, &'static str> = build_write_map(APE_KEYS);
    static ref RIFF_INFO_READ_MAP: HashMap<String, StandardTagKey> =
        build_read_map(RIFF_INFO_KEYS);
    static ref RIFF_INFO_WRITE_MAP: HashMap<StandardTagKey, &'static str> =
        build_write_map(RIFF_INFO_KEYS);
}

fn build_read_map(pairs: &[(&str, StandardTagKey)]) -> HashMap<String, StandardTagKey> {
    pairs.iter().map(|&(key, std)| (key.to_ascii_lowercase(), std)).collect()
}

fn build_write_map(
    pairs: &'static [(&'static str, StandardTagKey)],
) -> HashMap<StandardTagKey, &'static str> {
    let mut map = HashMap::new();
    // First spelling for a standard key wins.
    for &(key, std) in pairs {
        map.entry(std).or_insert(key);
    }
    map
}

/// Map a Vorbis Comment field name to a standard key.
pub fn vorbis_std_key(key: &str) -> Option<StandardTagKey> {
    VORBIS_READ_MAP.get(key.to_ascii_lowercase().as_str()).copied()
}

/// Get the canonical Vorbis Comment field name for a standard key.
pub fn vorbis_key(std: StandardTagKey) -> Option<&'static str> {
    VORBIS_WRITE_MAP.get(&std).copied()
}

/// Map an APE item key to a standard key.
pub fn ape_std_key(key: &str) -> Option<StandardTagKey> {
    APE_READ_MAP.get(key.to_ascii_lowercase().as_str()).copied()
}

/// Get the canonical APE item key for a standard key.
pub fn ape_key(std: StandardTagKey) -> Option<&'static str> {
    APE_WRITE_MAP.get(&std).copied()
}

/// Map a RIFF INFO sub-chunk identifier to a standard key.
pub fn riff_info_std_key(key: &str) -> Option<StandardTagKey> {
    RIFF_INFO_READ_MAP.get(key.to_ascii_lowercase().as_str()).copied()
}

/// Get the canonical RIFF INFO sub-chunk identifier for a standard key.
pub fn riff_info_key(std: StandardTagKey) -> Option<&'static str> {
    RIFF_INFO_WRITE_MAP.get(&std).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_lookup_is_case_insensitive() {
        assert_eq!(vorbis_std_key("tItLe"), Some(StandardTagKey::TrackTitle));
        assert_eq!(ape_std_key("ALBUM ARTIST"), Some(StandardTagKey::AlbumArtist));
        assert_eq!(riff_info_std_key("inam"), Some(StandardTagKey::TrackTitle));
    }

    #[test]
    fn verify_canonical_write_keys() {
        assert_eq!(vorbis_key(StandardTagKey::TrackTitle), Some("TITLE"));
        assert_eq!(vorbis_key(StandardTagKey::MusicBrainzRecordingId), Some("MUSICBRAINZ_TRACKID"));
        assert_eq!(ape_key(StandardTagKey::TrackTitle), Some("Title"));
        assert_eq!(riff_info_key(StandardTagKey::TrackTitle), Some("INAM"));
    }
}
