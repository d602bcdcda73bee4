// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Container format detection by magic bytes.
//!
//! Detection is an explicit match on signature bytes. OGG needs one extra step: the mapping is
//! identified from the first packet of the first page.

use cantata_format_ogg::page::Page;

/// The container formats the library understands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileFormat {
    /// Native FLAC.
    Flac,
    /// Vorbis in OGG.
    OggVorbis,
    /// Opus in OGG.
    OggOpus,
    /// FLAC in OGG.
    OggFlac,
    /// RIFF/WAVE.
    Wav,
    /// AIFF or AIFC.
    Aiff,
    /// DSD Stream File.
    Dsf,
    /// DSDIFF.
    Dff,
    /// WavPack.
    WavPack,
    /// Monkey's Audio.
    MonkeysAudio,
    /// Musepack (SV7 or SV8).
    Musepack,
}

/// Detect the container format of a byte stream. Returns `None` when no known signature
/// matches.
pub fn detect(buf: &[u8]) -> Option<FileFormat> {
    if buf.len() < 12 {
        return None;
    }

    let marker = [buf[0], buf[1], buf[2], buf[3]];

    match &marker {
        b"fLaC" => Some(FileFormat::Flac),
        b"OggS" => detect_ogg_mapping(buf),
        b"RIFF" if &buf[8..12] == b"WAVE" => Some(FileFormat::Wav),
        b"FORM" if &buf[8..12] == b"AIFF" || &buf[8..12] == b"AIFC" => Some(FileFormat::Aiff),
        b"DSD " => Some(FileFormat::Dsf),
        b"FRM8" => Some(FileFormat::Dff),
        b"wvpk" => Some(FileFormat::WavPack),
        b"MAC " => Some(FileFormat::MonkeysAudio),
        b"MPCK" => Some(FileFormat::Musepack),
        [b'M', b'P', b'+', _] => Some(FileFormat::Musepack),
        _ => None,
    }
}

/// Identify the OGG mapping from the signature of the first packet.
fn detect_ogg_mapping(buf: &[u8]) -> Option<FileFormat> {
    let (page, _) = Page::read(buf, false).ok()?;

    let first_len = usize::from(*page.segment_table.first()?);
    let packet = &page.body[..first_len.min(page.body.len())];

    if packet.len() >= 7 && packet[0] == 0x01 && &packet[1..7] == b"vorbis" {
        Some(FileFormat::OggVorbis)
    }
    else if packet.len() >= 8 && &packet[0..8] == b"OpusHead" {
        Some(FileFormat::OggOpus)
    }
    else if packet.len() >= 5 && packet[0] == 0x7f && &packet[1..5] == b"FLAC" {
        Some(FileFormat::OggFlac)
    }
    else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_magic_detection() {
        assert_eq!(detect(b"fLaC\x00\x00\x00\x22........"), Some(FileFormat::Flac));
        assert_eq!(detect(b"RIFF\x24\x00\x00\x00WAVEfmt "), Some(FileFormat::Wav));
        assert_eq!(detect(b"FORM\x00\x00\x00\x24AIFFCOMM"), Some(FileFormat::Aiff));
        assert_eq!(detect(b"FORM\x00\x00\x00\x24AIFCCOMM"), Some(FileFormat::Aiff));
        assert_eq!(detect(b"DSD \x1c\x00\x00\x00\x00\x00\x00\x00"), Some(FileFormat::Dsf));
        assert_eq!(detect(b"FRM8\x00\x00\x00\x00\x00\x00\x00\x10"), Some(FileFormat::Dff));
        assert_eq!(detect(b"wvpk\x00\x00\x00\x00\x10\x04\x00\x00"), Some(FileFormat::WavPack));
        assert_eq!(detect(b"MAC \x96\x0f\x00\x00\x00\x00\x00\x00"), Some(FileFormat::MonkeysAudio));
        assert_eq!(detect(b"MP+\x17\x00\x00\x00\x00\x00\x00\x00\x00"), Some(FileFormat::Musepack));
        assert_eq!(detect(b"MPCK\x00\x00\x00\x00\x00\x00\x00\x00"), Some(FileFormat::Musepack));
        assert_eq!(detect(b"ID3\x04\x00\x00\x00\x00\x00\x00\x00\x00"), None);
        assert_eq!(detect(b"RIFF\x24\x00\x00\x00AVI LIST"), None);
    }
}
