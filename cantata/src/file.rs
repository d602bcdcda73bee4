// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The unified tag facade.
//!
//! A [`TaggedFile`] wraps a parsed container and exposes format-independent accessors. Reads
//! delegate to the highest-priority tag the container carries (ID3v2 before RIFF INFO for WAV,
//! APE before ID3v1 for the APE carriers, the Vorbis Comment for the Xiph containers); writes
//! go through to every tag kind present so external readers see consistent values.

use std::path::{Path, PathBuf};

use cantata_core::errors::{invalid_magic_error, Error, Result};
use cantata_core::meta::{
    AudioProperties, ReadOptions, StandardTagKey, Tag, TagLike, Value, Visual,
};
use cantata_core::vfs::FileSystem;

use cantata_format_ape::{MonkeysAudioFile, MusepackFile, WavPackFile};
use cantata_format_dsd::{DffFile, DsfFile};
use cantata_format_flac::FlacFile;
use cantata_format_ogg::{OggFlacFile, OggOpusFile, OggVorbisFile};
use cantata_format_riff::{AiffFile, WavFile};

use crate::probe::{detect, FileFormat};

/// A parsed container of any supported format.
pub enum FormatFile {
    Flac(FlacFile),
    OggVorbis(OggVorbisFile),
    OggOpus(OggOpusFile),
    OggFlac(OggFlacFile),
    Wav(WavFile),
    Aiff(AiffFile),
    Dsf(DsfFile),
    Dff(DffFile),
    WavPack(WavPackFile),
    MonkeysAudio(MonkeysAudioFile),
    Musepack(MusepackFile),
}

/// An audio file with unified metadata access.
pub struct TaggedFile {
    format: FileFormat,
    file: FormatFile,
    source: Option<PathBuf>,
}

impl TaggedFile {
    /// Probe and read a file from a buffer.
    pub fn read(buf: &[u8], opts: &ReadOptions) -> Result<TaggedFile> {
        let format = match detect(buf) {
            Some(format) => format,
            None => return invalid_magic_error("cantata: unrecognized container format"),
        };

        let file = match format {
            FileFormat::Flac => FormatFile::Flac(FlacFile::read(buf, opts)?),
            FileFormat::OggVorbis => FormatFile::OggVorbis(OggVorbisFile::read(buf, opts)?),
            FileFormat::OggOpus => FormatFile::OggOpus(OggOpusFile::read(buf, opts)?),
            FileFormat::OggFlac => FormatFile::OggFlac(OggFlacFile::read(buf, opts)?),
            FileFormat::Wav => FormatFile::Wav(WavFile::read(buf, opts)?),
            FileFormat::Aiff => FormatFile::Aiff(AiffFile::read(buf, opts)?),
            FileFormat::Dsf => FormatFile::Dsf(DsfFile::read(buf, opts)?),
            FileFormat::Dff => FormatFile::Dff(DffFile::read(buf, opts)?),
            FileFormat::WavPack => FormatFile::WavPack(WavPackFile::read(buf, opts)?),
            FileFormat::MonkeysAudio => {
                FormatFile::MonkeysAudio(MonkeysAudioFile::read(buf, opts)?)
            }
            FileFormat::Musepack => FormatFile::Musepack(MusepackFile::read(buf, opts)?),
        };

        Ok(TaggedFile { format, file, source: None })
    }

    /// Read a file through the filesystem collaborator, remembering the path for
    /// [`TaggedFile::save`].
    pub fn open<P: AsRef<Path>>(
        fs: &dyn FileSystem,
        path: P,
        opts: &ReadOptions,
    ) -> Result<TaggedFile> {
        let buf = fs.read(path.as_ref())?;

        let mut file = TaggedFile::read(&buf, opts)?;
        file.source = Some(path.as_ref().to_path_buf());

        Ok(file)
    }

    /// The detected container format.
    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// The parsed container.
    pub fn file(&self) -> &FormatFile {
        &self.file
    }

    /// The parsed container, mutable for format-specific editing.
    pub fn file_mut(&mut self) -> &mut FormatFile {
        &mut self.file
    }

    /// The path the file was opened from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The audio properties stated by the container.
    pub fn properties(&self) -> Option<AudioProperties> {
        match &self.file {
            FormatFile::Flac(file) => file.properties(),
            FormatFile::OggVorbis(file) => file.properties(),
            FormatFile::OggOpus(file) => file.properties(),
            FormatFile::OggFlac(file) => file.properties(),
            FormatFile::Wav(file) => file.properties(),
            FormatFile::Aiff(file) => file.properties(),
            FormatFile::Dsf(file) => file.properties(),
            FormatFile::Dff(file) => file.properties(),
            FormatFile::WavPack(file) => file.properties(),
            FormatFile::MonkeysAudio(file) => file.properties(),
            FormatFile::Musepack(file) => file.properties(),
        }
    }

    /// Render the whole byte stream with edits applied and the audio untouched.
    pub fn render(&self) -> Result<Vec<u8>> {
        match &self.file {
            FormatFile::Flac(file) => file.render(),
            FormatFile::OggVorbis(file) => Ok(file.render()),
            FormatFile::OggOpus(file) => Ok(file.render()),
            FormatFile::OggFlac(file) => file.render(),
            FormatFile::Wav(file) => file.render(),
            FormatFile::Aiff(file) => file.render(),
            FormatFile::Dsf(file) => file.render(),
            FormatFile::Dff(file) => file.render(),
            FormatFile::WavPack(file) => Ok(file.render()),
            FormatFile::MonkeysAudio(file) => Ok(file.render()),
            FormatFile::Musepack(file) => Ok(file.render()),
        }
    }

    /// Render and write back to the path the file was opened from.
    pub fn save(&self, fs: &dyn FileSystem) -> Result<()> {
        let path = match &self.source {
            Some(path) => path.clone(),
            None => return Err(Error::NoSource),
        };

        self.save_to(fs, path)
    }

    /// Render and write to the given path.
    pub fn save_to<P: AsRef<Path>>(&self, fs: &dyn FileSystem, path: P) -> Result<()> {
        let rendered = self.render()?;
        fs.write(path.as_ref(), &rendered)
    }

    /// Gets the first value for the given standard key from the highest-priority tag that
    /// carries it.
    pub fn get(&self, key: StandardTagKey) -> Option<Value> {
        match &self.file {
            FormatFile::Flac(file) => {
                file.vorbis_comment().and_then(|c| TagLike::get(c, key))
            }
            FormatFile::OggVorbis(file) => TagLike::get(file.comment(), key),
            FormatFile::OggOpus(file) => TagLike::get(file.comment(), key),
            FormatFile::OggFlac(file) => {
                file.comment().and_then(|c| TagLike::get(c, key))
            }
            FormatFile::Wav(file) => file
                .id3v2()
                .and_then(|tag| tag.get(key))
                .or_else(|| file.info().and_then(|info| info.get(key))),
            FormatFile::Aiff(file) => file.id3v2().and_then(|tag| tag.get(key)),
            FormatFile::Dsf(file) => file.id3v2().and_then(|tag| tag.get(key)),
            FormatFile::Dff(file) => file.id3v2().and_then(|tag| tag.get(key)),
            FormatFile::WavPack(file) => file.tags().get(key),
            FormatFile::MonkeysAudio(file) => file.tags().get(key),
            FormatFile::Musepack(file) => file.tags().get(key),
        }
    }

    /// Gets the first value for the given standard key as a string.
    pub fn get_str(&self, key: StandardTagKey) -> Option<String> {
        self.get(key).map(|value| value.to_string())
    }

    /// Sets a value, writing through to every tag kind the file carries. When the file carries
    /// no tag yet, the format's primary tag is created.
    pub fn set(&mut self, key: StandardTagKey, value: Value) {
        match &mut self.file {
            FormatFile::Flac(file) => file.vorbis_comment_mut().set(key, value),
            FormatFile::OggVorbis(file) => file.comment_mut().set(key, value),
            FormatFile::OggOpus(file) => file.comment_mut().set(key, value),
            FormatFile::OggFlac(file) => file.comment_mut().set(key, value),
            FormatFile::Wav(file) => {
                let has_id3 = file.id3v2().is_some();
                let has_info = file.info().is_some();

                if has_info {
                    file.info_mut().set(key, value.clone());
                }

                if has_id3 || !has_info {
                    file.id3v2_mut().set(key, value);
                }
            }
            FormatFile::Aiff(file) => file.id3v2_mut().set(key, value),
            FormatFile::Dsf(file) => file.id3v2_mut().set(key, value),
            FormatFile::Dff(file) => file.id3v2_mut().set(key, value),
            FormatFile::WavPack(file) => set_carrier(file.tags_mut(), key, value),
            FormatFile::MonkeysAudio(file) => set_carrier(file.tags_mut(), key, value),
            FormatFile::Musepack(file) => set_carrier(file.tags_mut(), key, value),
        }
    }

    /// Removes a key from every tag kind the file carries.
    pub fn remove(&mut self, key: StandardTagKey) {
        match &mut self.file {
            FormatFile::Flac(file) => file.vorbis_comment_mut().remove(key),
            FormatFile::OggVorbis(file) => file.comment_mut().remove(key),
            FormatFile::OggOpus(file) => file.comment_mut().remove(key),
            FormatFile::OggFlac(file) => file.comment_mut().remove(key),
            FormatFile::Wav(file) => {
                if file.info().is_some() {
                    file.info_mut().remove(key);
                }
                if file.id3v2().is_some() {
                    file.id3v2_mut().remove(key);
                }
            }
            FormatFile::Aiff(file) => {
                if file.id3v2().is_some() {
                    file.id3v2_mut().remove(key);
                }
            }
            FormatFile::Dsf(file) => {
                if file.id3v2().is_some() {
                    file.id3v2_mut().remove(key);
                }
            }
            FormatFile::Dff(file) => {
                if file.id3v2().is_some() {
                    file.id3v2_mut().remove(key);
                }
            }
            FormatFile::WavPack(file) => remove_carrier(file.tags_mut(), key),
            FormatFile::MonkeysAudio(file) => remove_carrier(file.tags_mut(), key),
            FormatFile::Musepack(file) => remove_carrier(file.tags_mut(), key),
        }
    }

    /// Enumerates the fields of every tag the file carries, highest priority first.
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags = Vec::new();

        match &self.file {
            FormatFile::Flac(file) => {
                if let Some(comment) = file.vorbis_comment() {
                    tags.extend(comment.tags());
                }
            }
            FormatFile::OggVorbis(file) => tags.extend(file.comment().tags()),
            FormatFile::OggOpus(file) => tags.extend(file.comment().tags()),
            FormatFile::OggFlac(file) => {
                if let Some(comment) = file.comment() {
                    tags.extend(comment.tags());
                }
            }
            FormatFile::Wav(file) => {
                if let Some(tag) = file.id3v2() {
                    tags.extend(tag.tags());
                }
                if let Some(info) = file.info() {
                    tags.extend(info.tags());
                }
            }
            FormatFile::Aiff(file) => {
                if let Some(tag) = file.id3v2() {
                    tags.extend(tag.tags());
                }
            }
            FormatFile::Dsf(file) => {
                if let Some(tag) = file.id3v2() {
                    tags.extend(tag.tags());
                }
            }
            FormatFile::Dff(file) => {
                if let Some(tag) = file.id3v2() {
                    tags.extend(tag.tags());
                }
            }
            FormatFile::WavPack(file) => tags.extend(carrier_tags(file.tags())),
            FormatFile::MonkeysAudio(file) => tags.extend(carrier_tags(file.tags())),
            FormatFile::Musepack(file) => tags.extend(carrier_tags(file.tags())),
        }

        tags
    }

    /// The attached pictures.
    pub fn visuals(&self) -> Vec<Visual> {
        match &self.file {
            FormatFile::Flac(file) => {
                let mut visuals = file.pictures();
                if let Some(comment) = file.vorbis_comment() {
                    visuals.extend(comment.pictures());
                }
                visuals
            }
            FormatFile::OggVorbis(file) => file.comment().pictures(),
            FormatFile::OggOpus(file) => file.comment().pictures(),
            FormatFile::OggFlac(file) => {
                let mut visuals = file.pictures();
                if let Some(comment) = file.comment() {
                    visuals.extend(comment.pictures());
                }
                visuals
            }
            FormatFile::Wav(file) => {
                file.id3v2().map(|tag| tag.pictures()).unwrap_or_default()
            }
            FormatFile::Aiff(file) => {
                file.id3v2().map(|tag| tag.pictures()).unwrap_or_default()
            }
            FormatFile::Dsf(file) => file.id3v2().map(|tag| tag.pictures()).unwrap_or_default(),
            FormatFile::Dff(file) => file.id3v2().map(|tag| tag.pictures()).unwrap_or_default(),
            FormatFile::WavPack(file) => file.tags().visuals(),
            FormatFile::MonkeysAudio(file) => file.tags().visuals(),
            FormatFile::Musepack(file) => file.tags().visuals(),
        }
    }

    /// Attaches a picture in the format's native representation.
    pub fn add_visual(&mut self, visual: Visual) {
        match &mut self.file {
            FormatFile::Flac(file) => file.add_picture(visual),
            FormatFile::OggVorbis(file) => file.comment_mut().add_picture(&visual),
            FormatFile::OggOpus(file) => file.comment_mut().add_picture(&visual),
            FormatFile::OggFlac(file) => file.comment_mut().add_picture(&visual),
            FormatFile::Wav(file) => file.id3v2_mut().add_picture(visual),
            FormatFile::Aiff(file) => file.id3v2_mut().add_picture(visual),
            FormatFile::Dsf(file) => file.id3v2_mut().add_picture(visual),
            FormatFile::Dff(file) => file.id3v2_mut().add_picture(visual),
            FormatFile::WavPack(file) => file.tags_mut().ape_mut().add_visual(visual),
            FormatFile::MonkeysAudio(file) => file.tags_mut().ape_mut().add_visual(visual),
            FormatFile::Musepack(file) => file.tags_mut().ape_mut().add_visual(visual),
        }
    }

    // Convenience accessors for the most common fields.

    pub fn title(&self) -> Option<String> {
        self.get_str(StandardTagKey::TrackTitle)
    }

    pub fn set_title(&mut self, title: &str) {
        self.set(StandardTagKey::TrackTitle, Value::from(title));
    }

    pub fn artist(&self) -> Option<String> {
        self.get_str(StandardTagKey::Artist)
    }

    pub fn set_artist(&mut self, artist: &str) {
        self.set(StandardTagKey::Artist, Value::from(artist));
    }

    pub fn album(&self) -> Option<String> {
        self.get_str(StandardTagKey::Album)
    }

    pub fn set_album(&mut self, album: &str) {
        self.set(StandardTagKey::Album, Value::from(album));
    }

    pub fn genre(&self) -> Option<String> {
        self.get_str(StandardTagKey::Genre)
    }

    pub fn set_genre(&mut self, genre: &str) {
        self.set(StandardTagKey::Genre, Value::from(genre));
    }

    pub fn track(&self) -> Option<u32> {
        self.get_str(StandardTagKey::TrackNumber)?.parse().ok()
    }

    pub fn set_track(&mut self, track: u32) {
        self.set(StandardTagKey::TrackNumber, Value::from(track));
    }
}

fn set_carrier(
    stream: &mut cantata_format_ape::tail::TaggedStream,
    key: StandardTagKey,
    value: Value,
) {
    // Create the primary tag if the stream carries none at all.
    if stream.ape.is_none() && stream.id3v1.is_none() {
        stream.ape_mut();
    }

    stream.set_all(key, value);
}

fn remove_carrier(stream: &mut cantata_format_ape::tail::TaggedStream, key: StandardTagKey) {
    if let Some(ape) = &mut stream.ape {
        ape.remove(key);
    }

    if let Some(id3v1) = &mut stream.id3v1 {
        id3v1.remove(key);
    }
}

fn carrier_tags(stream: &cantata_format_ape::tail::TaggedStream) -> Vec<Tag> {
    let mut tags = Vec::new();

    if let Some(ape) = &stream.ape {
        tags.extend(ape.tags());
    }

    if let Some(id3v1) = &stream.id3v1 {
        tags.extend(id3v1.tags());
    }

    tags
}

#[cfg(feature = "async")]
mod aio {
    //! Asynchronous open and save conveniences.

    use std::path::Path;

    use cantata_core::errors::{Error, Result};
    use cantata_core::meta::ReadOptions;
    use cantata_core::vfs::aio::{AsyncFileSystem, CancellationToken};

    use super::TaggedFile;

    impl TaggedFile {
        /// Read a file through the asynchronous filesystem collaborator. Parsing itself is
        /// synchronous; only the I/O suspends.
        pub async fn open_async<P: AsRef<Path>>(
            fs: &dyn AsyncFileSystem,
            path: P,
            opts: &ReadOptions,
            token: &CancellationToken,
        ) -> Result<TaggedFile> {
            let buf = fs.read(path.as_ref(), token).await?;

            let mut file = TaggedFile::read(&buf, opts)?;
            file.source = Some(path.as_ref().to_path_buf());

            Ok(file)
        }

        /// Render and write back to the path the file was opened from.
        pub async fn save_async(
            &self,
            fs: &dyn AsyncFileSystem,
            token: &CancellationToken,
        ) -> Result<()> {
            let path = match &self.source {
                Some(path) => path.clone(),
                None => return Err(Error::NoSource),
            };

            let rendered = self.render()?;
            fs.write(&path, &rendered, token).await
        }
    }
}
