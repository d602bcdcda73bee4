// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross-format round-trip tests through the facade.

use cantata::formats::flac::{block_type, write_block, StreamInfo};
use cantata::formats::ogg::physical::rewrite_stream;
use cantata::meta::vorbis::VorbisComment;
use cantata::{
    detect, Error, FileFormat, ReadOptions, StandardTagKey, TaggedFile, Value, Visual,
};

use cantata::core::io::BufWriter;

/// Build a minimal FLAC file: marker, STREAMINFO, padding, and fake audio frames.
fn build_flac() -> Vec<u8> {
    let info = StreamInfo {
        min_block_size: 4096,
        max_block_size: 4096,
        min_frame_size: 0,
        max_frame_size: 0,
        sample_rate: 44100,
        channels: 2,
        bits_per_sample: 16,
        total_samples: 44100,
        md5: [0; 16],
    };

    let mut out = BufWriter::new();
    out.write_buf(b"fLaC");
    write_block(&mut out, block_type::STREAM_INFO, &info.render(), false).unwrap();
    write_block(&mut out, block_type::PADDING, &[0; 128], true).unwrap();
    out.write_buf(b"fake flac frames");
    out.into_inner()
}

/// Build a minimal OGG Vorbis file with the given comment.
fn build_ogg_vorbis(comment: &VorbisComment) -> Vec<u8> {
    // Identification header: type, signature, version, channels, rate, bitrates, blocksizes,
    // framing.
    let mut ident = BufWriter::new();
    ident.write_u8(0x01);
    ident.write_buf(b"vorbis");
    ident.write_u32(0);
    ident.write_u8(2);
    ident.write_u32(44100);
    ident.write_u32(0);
    ident.write_u32(128_000);
    ident.write_u32(0);
    ident.write_u8(0xb8);
    ident.write_u8(0x01);

    let mut comment_packet = BufWriter::new();
    comment_packet.write_u8(0x03);
    comment_packet.write_buf(b"vorbis");
    comment.write(&mut comment_packet);
    comment_packet.write_u8(0x01);

    let mut setup = BufWriter::new();
    setup.write_u8(0x05);
    setup.write_buf(b"vorbis");
    setup.write_buf(&[0x11; 16]);

    use cantata::formats::ogg::page::PageHeader;
    use cantata::formats::ogg::physical::OwnedPage;

    let audio = OwnedPage {
        header: PageHeader { absgp: 44100, is_last_page: true, ..Default::default() },
        segment_table: vec![4],
        body: vec![9, 9, 9, 9],
    };

    rewrite_stream(
        0x6d5a3b1c,
        &[
            vec![ident.into_inner()],
            vec![comment_packet.into_inner(), setup.into_inner()],
        ],
        &[audio],
    )
}

#[test]
fn verify_flac_cross_tagger_keys() {
    let mut file = TaggedFile::read(&build_flac(), &ReadOptions::default()).unwrap();
    assert_eq!(file.format(), FileFormat::Flac);

    file.set_title("A Title");
    file.set_artist("An Artist");
    file.set_album("An Album");
    file.set(
        StandardTagKey::MusicBrainzRecordingId,
        Value::from("11873f5e-6099-4b2e-9f32-e24564f83eb9"),
    );
    file.set(
        StandardTagKey::MusicBrainzAlbumId,
        Value::from("0ba7ed6c-54fe-4ecd-a1fa-f6f25bbd4bc5"),
    );

    let rendered = file.render().unwrap();

    let reread = TaggedFile::read(&rendered, &ReadOptions::default()).unwrap();
    assert_eq!(reread.title().as_deref(), Some("A Title"));

    // The rendered Vorbis Comment carries the canonical keys, matched case-insensitively.
    let keys: Vec<String> = reread.tags().iter().map(|tag| tag.key.to_uppercase()).collect();

    for expected in ["TITLE", "ARTIST", "ALBUM", "MUSICBRAINZ_TRACKID", "MUSICBRAINZ_ALBUMID"] {
        assert!(keys.iter().any(|key| key == expected), "missing key {}", expected);
    }
}

#[test]
fn verify_flac_audio_preserved_through_edits() {
    let original = build_flac();

    let mut file = TaggedFile::read(&original, &ReadOptions::default()).unwrap();
    file.set_title("edited");
    file.add_visual(Visual::front_cover("image/png", Box::new([1, 2, 3, 4, 5])));

    let rendered = file.render().unwrap();

    // The audio bytes trail both streams, byte-for-byte.
    assert!(rendered.ends_with(b"fake flac frames"));

    let reread = TaggedFile::read(&rendered, &ReadOptions::default()).unwrap();
    assert_eq!(reread.visuals().len(), 1);
    assert_eq!(reread.visuals()[0].data.as_ref(), &[1, 2, 3, 4, 5]);
}

#[test]
fn verify_ogg_crc_validation_gate() {
    let buf = build_ogg_vorbis(&VorbisComment::new());

    // Zero the CRC field of the first page.
    let mut zeroed = buf.clone();
    zeroed[22..26].copy_from_slice(&[0; 4]);

    // Without validation the file reads fine; with validation the mismatch is fatal.
    assert!(TaggedFile::read(&zeroed, &ReadOptions::default()).is_ok());

    let opts = ReadOptions { validate_crc: true, ..Default::default() };
    match TaggedFile::read(&zeroed, &opts) {
        Err(Error::CrcMismatch { .. }) => (),
        _ => panic!("expected crc mismatch"),
    }

    // With the stored checksums intact both modes succeed.
    assert!(TaggedFile::read(&buf, &opts).is_ok());
}

#[test]
fn verify_ogg_multi_page_comment_packet() {
    // A comment field large enough that its packet must span pages.
    let big_value: String =
        std::iter::repeat("cantata ").take(70_000 / 8).collect::<String>();

    let mut comment = VorbisComment::new();
    comment.push("DESCRIPTION", &big_value).unwrap();

    let buf = build_ogg_vorbis(&comment);
    assert_eq!(detect(&buf), Some(FileFormat::OggVorbis));

    let file = TaggedFile::read(&buf, &ReadOptions::default()).unwrap();
    assert_eq!(file.get_str(StandardTagKey::Description).as_deref(), Some(big_value.as_str()));

    // And the rewritten stream still reassembles to the same value.
    let reread = TaggedFile::read(&file.render().unwrap(), &ReadOptions::default()).unwrap();
    assert_eq!(reread.get_str(StandardTagKey::Description).as_deref(), Some(big_value.as_str()));
}

#[test]
fn verify_ogg_vorbis_properties() {
    let file =
        TaggedFile::read(&build_ogg_vorbis(&VorbisComment::new()), &ReadOptions::default())
            .unwrap();

    let props = file.properties().unwrap();
    assert_eq!(props.sample_rate, 44100);
    assert_eq!(props.channels, 2);
    assert!((props.duration_secs.unwrap() - 1.0).abs() < 1e-9);
}

#[test]
fn verify_unrecognized_container_rejected() {
    match TaggedFile::read(&[0x00; 64], &ReadOptions::default()) {
        Err(Error::InvalidMagic(_)) => (),
        _ => panic!("expected invalid magic"),
    }
}

#[test]
fn verify_save_without_source_is_no_source() {
    use cantata::vfs::StdFileSystem;

    let file = TaggedFile::read(&build_flac(), &ReadOptions::default()).unwrap();

    match file.save(&StdFileSystem) {
        Err(Error::NoSource) => (),
        _ => panic!("expected no source"),
    }
}
