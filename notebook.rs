//! Note operations on a notebook directory.
//!
//! This module provides [`Notebook`], the interface the UI layer uses to
//! create, read, list and delete notes. Every path goes through
//! [`crate::path_guard`], identifiers come from [`crate::note_namer`], and
//! content is sealed by [`crate::note_cipher`].
//!
//! ## Concurrency
//!
//! One session per notebook. Allocation reads the directory once, so a
//! single process never hands out an identifier twice, but two processes
//! sharing a directory are not coordinated. Note files are created with
//! `create_new`, so such a collision fails instead of overwriting.

use crate::credential_store::{create_private_dir, discard_partial};
use crate::error::NoteError;
use crate::note_cipher;
use crate::note_namer::{self, NoteId};
use crate::path_guard::{self, VerifiedFile};
use crate::secret::Secret;
use std::io;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct Notebook {
    dir: String,
}

impl Notebook {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Encrypts `plaintext` into the lowest free identifier and returns it.
    pub async fn create_note(&self, secret: &Secret, plaintext: &str) -> Result<NoteId, NoteError> {
        self.ensure_dir().await?;
        let id = note_namer::next_identifier(&self.dir).await?;
        let path = path_guard::build_path(&self.dir, &id.file_name())?;
        debug!(note = id.get(), size = plaintext.len(), "encrypting note");

        let (iv, ciphertext) = note_cipher::encrypt(plaintext.as_bytes(), secret);
        let contents = note_cipher::encode_note_file(&iv, &ciphertext);

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = match options.open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                warn!(note = id.get(), dir = %self.dir, "note name taken after allocation; another process may be using this notebook");
                return Err(NoteError::Io(e));
            }
            Err(e) => return Err(NoteError::Io(e)),
        };

        let written = async {
            file.write_all(&contents).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            error!(note = id.get(), error = %e, "note write incomplete, removing partial file");
            drop(file);
            discard_partial(&path).await;
            return Err(NoteError::Io(e));
        }

        info!(note = id.get(), plaintext_size = plaintext.len(), file_size = contents.len(), "note created");
        Ok(id)
    }

    /// Decrypts note `id`.
    pub async fn read_note(&self, secret: &Secret, id: NoteId) -> Result<String, NoteError> {
        let path = path_guard::build_path(&self.dir, &id.file_name())?;
        let VerifiedFile { mut file, metadata } = path_guard::open_verified(&path)
            .await
            .map_err(|e| NoteError::from_open(id, e))?;

        let expected = metadata.len();
        if expected < note_cipher::MIN_NOTE_FILE_LEN as u64 {
            error!(note = id.get(), size = expected, "note file too short");
            return Err(NoteError::Corrupt(id));
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data).await?;
        if data.len() as u64 != expected {
            error!(note = id.get(), expected, read = data.len(), "note changed size while reading");
            return Err(NoteError::Corrupt(id));
        }

        let plaintext = note_cipher::split_note_file(&data)
            .and_then(|(iv, ciphertext)| note_cipher::decrypt(&iv, ciphertext, secret))
            .map_err(|_| {
                error!(note = id.get(), "note failed to decrypt");
                NoteError::Corrupt(id)
            })?;
        let text = String::from_utf8(plaintext).map_err(|_| {
            error!(note = id.get(), "decrypted note is not UTF-8");
            NoteError::Corrupt(id)
        })?;

        info!(note = id.get(), size = text.len(), "note decrypted");
        Ok(text)
    }

    /// Identifiers of every note, ascending.
    pub async fn list_notes(&self) -> Result<Vec<NoteId>, NoteError> {
        let mut ids = note_namer::list_identifiers(&self.dir).await?;
        ids.sort_unstable();
        debug!(dir = %self.dir, count = ids.len(), "listed notes");
        Ok(ids)
    }

    /// Unlinks note `id`. The entry is re-checked right before removal; the
    /// content is not overwritten.
    pub async fn delete_note(&self, id: NoteId) -> Result<(), NoteError> {
        let path = path_guard::build_path(&self.dir, &id.file_name())?;
        let verified = path_guard::open_verified(&path)
            .await
            .map_err(|e| NoteError::from_open(id, e))?;
        drop(verified);

        fs::remove_file(&path).await?;
        info!(note = id.get(), "note deleted");
        Ok(())
    }

    /// Creates the notebook directory (mode 0700) if it does not exist.
    async fn ensure_dir(&self) -> Result<(), NoteError> {
        let dir = Path::new(&self.dir);
        match fs::symlink_metadata(dir).await {
            Ok(meta) if meta.is_dir() => {
                warn_if_shared(&self.dir, &meta);
                Ok(())
            }
            Ok(_) => Err(NoteError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a directory", self.dir),
            ))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(dir = %self.dir, "creating notebook directory");
                create_private_dir(dir).await?;
                Ok(())
            }
            Err(e) => Err(NoteError::Io(e)),
        }
    }
}

#[cfg(unix)]
fn warn_if_shared(dir: &str, meta: &std::fs::Metadata) {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        warn!(dir, mode = %format!("{mode:o}"), "notebook directory is accessible to other users");
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_dir: &str, _meta: &std::fs::Metadata) {}
