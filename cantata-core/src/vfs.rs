// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `vfs` module defines the filesystem collaborator contract.
//!
//! The library never seeks: a file is read into a buffer in one operation and written back in
//! one operation. Writers are encouraged, but not required, to implement atomic replacement
//! (write-to-temp-then-rename).

use std::fs;
use std::path::Path;

use crate::errors::Result;

/// A `FileSystem` provides whole-file reads and writes for the library.
pub trait FileSystem {
    /// Returns true if a file exists at the given path.
    fn exists(&self, path: &Path) -> bool;

    /// Reads the entire file at the given path into a buffer.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Writes a buffer to the given path, replacing any existing file.
    fn write(&self, path: &Path, data: &[u8]) -> Result<()>;
}

/// The standard library implementation of [`FileSystem`].
#[derive(Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        Ok(fs::write(path, data)?)
    }
}

#[cfg(feature = "async")]
pub mod aio {
    //! Asynchronous counterpart of the filesystem collaborator.
    //!
    //! These wrappers are tail-async: only the I/O call suspends, parsing and rendering remain
    //! synchronous over complete buffers. Every call observes a cancellation token; a token that
    //! is already cancelled on entry returns [`Error::Cancelled`](crate::errors::Error) without
    //! touching storage, and a cancellation that lands mid-I/O discards the partial buffer.

    use std::path::Path;

    use async_trait::async_trait;

    pub use tokio_util::sync::CancellationToken;

    use crate::errors::{Error, Result};

    /// An `AsyncFileSystem` provides cancellable whole-file reads and writes.
    #[async_trait]
    pub trait AsyncFileSystem {
        /// Returns true if a file exists at the given path.
        async fn exists(&self, path: &Path, token: &CancellationToken) -> Result<bool>;

        /// Reads the entire file at the given path into a buffer.
        async fn read(&self, path: &Path, token: &CancellationToken) -> Result<Vec<u8>>;

        /// Writes a buffer to the given path, replacing any existing file.
        async fn write(&self, path: &Path, data: &[u8], token: &CancellationToken) -> Result<()>;
    }

    /// The tokio implementation of [`AsyncFileSystem`].
    #[derive(Default)]
    pub struct TokioFileSystem;

    #[async_trait]
    impl AsyncFileSystem for TokioFileSystem {
        async fn exists(&self, path: &Path, token: &CancellationToken) -> Result<bool> {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            Ok(tokio::fs::try_exists(path).await.unwrap_or(false))
        }

        async fn read(&self, path: &Path, token: &CancellationToken) -> Result<Vec<u8>> {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled),
                result = tokio::fs::read(path) => Ok(result?),
            }
        }

        async fn write(&self, path: &Path, data: &[u8], token: &CancellationToken) -> Result<()> {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled),
                result = tokio::fs::write(path, data) => Ok(result?),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn verify_cancelled_on_entry() {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();

            rt.block_on(async {
                let fs = TokioFileSystem;
                let token = CancellationToken::new();
                token.cancel();

                match fs.read(Path::new("/nonexistent"), &token).await {
                    Err(Error::Cancelled) => (),
                    _ => panic!("expected cancellation"),
                }

                match fs.write(Path::new("/nonexistent"), &[], &token).await {
                    Err(Error::Cancelled) => (),
                    _ => panic!("expected cancellation"),
                }
            });
        }
    }
}
