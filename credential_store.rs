//! Password verification record.
//!
//! This module provides [`CredentialStore`], which persists a
//! [`CredentialRecord`] the first time a vault is unlocked and loads it on
//! every run after that.
//!
//! ## Record format
//!
//! ```text
//! [salt:8][verification_hash:32]    verification_hash = SHA-256(password || salt)
//! ```
//!
//! The file is exactly 40 bytes, created with mode 0600. Anything else found
//! at the path is treated as corruption.

use crate::error::CredentialError;
use rand_core::{OsRng, RngCore};
use sha2::digest::generic_array::GenericArray;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

pub const SALT_LEN: usize = 8;
pub const HASH_LEN: usize = 32;
pub const RECORD_LEN: usize = SALT_LEN + HASH_LEN;

/// Salt and salted hash of the vault password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    salt: [u8; SALT_LEN],
    verification_hash: [u8; HASH_LEN],
}

impl CredentialRecord {
    /// A record for `password` under a freshly generated salt.
    pub fn new(password: &str) -> Self {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        Self::with_salt(password, salt)
    }

    pub fn with_salt(password: &str, salt: [u8; SALT_LEN]) -> Self {
        Self {
            salt,
            verification_hash: *salted_hash(password, &salt),
        }
    }

    pub fn verification_hash(&self) -> &[u8; HASH_LEN] {
        &self.verification_hash
    }

    /// Checks `password` against the record. The comparison visits every
    /// byte regardless of where the first mismatch is.
    pub fn verify(&self, password: &str) -> bool {
        let candidate = salted_hash(password, &self.salt);
        // `candidate` is wiped when it drops.
        candidate[..].ct_eq(&self.verification_hash[..]).into()
    }

    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[..SALT_LEN].copy_from_slice(&self.salt);
        out[SALT_LEN..].copy_from_slice(&self.verification_hash);
        out
    }

    pub fn from_bytes(bytes: &[u8; RECORD_LEN]) -> Self {
        let mut salt = [0u8; SALT_LEN];
        let mut verification_hash = [0u8; HASH_LEN];
        salt.copy_from_slice(&bytes[..SALT_LEN]);
        verification_hash.copy_from_slice(&bytes[SALT_LEN..]);
        Self {
            salt,
            verification_hash,
        }
    }
}

fn salted_hash(password: &str, salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; HASH_LEN]> {
    let mut out = Zeroizing::new([0u8; HASH_LEN]);
    Sha256::new()
        .chain_update(password.as_bytes())
        .chain_update(salt)
        .finalize_into(GenericArray::from_mut_slice(&mut out[..]));
    out
}

/// Owns the credential file at a fixed path.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> Result<bool, CredentialError> {
        fs::try_exists(&self.path)
            .await
            .map_err(|e| CredentialError::io(&self.path, e))
    }

    /// Loads the record, or creates one for `password` if none exists yet.
    pub async fn load_or_create(&self, password: &str) -> Result<CredentialRecord, CredentialError> {
        match self.load().await {
            Err(CredentialError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                match self.create(password).await {
                    // Another process created it first; use theirs.
                    Err(CredentialError::Io { source, .. })
                        if source.kind() == io::ErrorKind::AlreadyExists =>
                    {
                        warn!(path = %self.path.display(), "credential store appeared concurrently, loading it");
                        self.load().await
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Reads exactly one record. A file of any other length is corrupt.
    pub async fn load(&self) -> Result<CredentialRecord, CredentialError> {
        let mut file = fs::File::open(&self.path)
            .await
            .map_err(|e| CredentialError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "loading credential store");

        let len = file
            .metadata()
            .await
            .map_err(|e| CredentialError::corrupt(&self.path, format!("stat failed: {e}")))?
            .len();
        if len != RECORD_LEN as u64 {
            error!(path = %self.path.display(), found_bytes = len, "credential store has wrong size");
            return Err(CredentialError::corrupt(
                &self.path,
                format!("expected {RECORD_LEN} bytes, found {len}"),
            ));
        }

        let mut bytes = [0u8; RECORD_LEN];
        file.read_exact(&mut bytes).await.map_err(|e| {
            error!(path = %self.path.display(), error = %e, "short or failed credential read");
            CredentialError::corrupt(&self.path, format!("read failed: {e}"))
        })?;
        Ok(CredentialRecord::from_bytes(&bytes))
    }

    /// Writes a new record for `password`. Never overwrites an existing file.
    pub async fn create(&self, password: &str) -> Result<CredentialRecord, CredentialError> {
        info!(path = %self.path.display(), "creating credential store");
        let record = CredentialRecord::new(password);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_private_dir(parent)
                .await
                .map_err(|e| CredentialError::io(parent, e))?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options
            .open(&self.path)
            .await
            .map_err(|e| CredentialError::io(&self.path, e))?;

        let written = async {
            file.write_all(&record.to_bytes()).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            error!(path = %self.path.display(), error = %e, "credential write incomplete");
            drop(file);
            discard_partial(&self.path).await;
            return Err(CredentialError::io(&self.path, e));
        }

        Ok(record)
    }
}

/// `mkdir -p` with mode 0700 for the directories it creates.
pub(crate) async fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await
}

/// Removes what a failed write left at `path`. A removal failure is logged,
/// never returned, so the write error stays the one reported.
pub(crate) async fn discard_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not remove partial file; delete it by hand")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn verify_accepts_only_the_exact_password() {
        let password = "correct horse battery staple";
        let record = CredentialRecord::new(password);
        assert!(record.verify(password));

        // Every single-character substitution, plus truncation and extension.
        for (i, c) in password.char_indices() {
            let replacement = if c == 'x' { 'y' } else { 'x' };
            let mut variant = password.to_string();
            variant.replace_range(i..i + c.len_utf8(), &replacement.to_string());
            assert!(!record.verify(&variant), "accepted {variant:?}");
        }
        assert!(!record.verify(&password[..password.len() - 1]));
        assert!(!record.verify(&format!("{password}!")));
        assert!(!record.verify(""));
    }

    #[test]
    fn hash_is_over_password_then_salt() {
        let salt = [1, 2, 3, 4, 5, 6, 7, 8];
        let record = CredentialRecord::with_salt("pw", salt);
        let mut hasher = Sha256::new();
        hasher.update(b"pw");
        hasher.update(salt);
        let expected: [u8; HASH_LEN] = hasher.finalize().into();
        assert_eq!(record.verification_hash(), &expected);
    }

    #[test]
    fn salt_changes_the_hash() {
        let a = CredentialRecord::with_salt("pw", [0; SALT_LEN]);
        let b = CredentialRecord::with_salt("pw", [1; SALT_LEN]);
        assert_ne!(a.verification_hash(), b.verification_hash());
    }

    #[test]
    fn record_layout_is_salt_then_hash() {
        let record = CredentialRecord::with_salt("pw", [9; SALT_LEN]);
        let bytes = record.to_bytes();
        assert_eq!(&bytes[..SALT_LEN], &[9; SALT_LEN]);
        assert_eq!(&bytes[SALT_LEN..], record.verification_hash());
        assert_eq!(CredentialRecord::from_bytes(&bytes), record);
    }

    #[tokio::test]
    async fn load_or_create_persists_then_reloads() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path().join(".login"));
        assert!(!store.exists().await.unwrap());

        let created = store.load_or_create("pw").await.unwrap();
        assert!(store.exists().await.unwrap());
        assert_eq!(std::fs::metadata(store.path()).unwrap().len(), RECORD_LEN as u64);

        // A second run must not regenerate the salt, whatever password is offered.
        let loaded = store.load_or_create("something else").await.unwrap();
        assert_eq!(loaded, created);
        assert!(loaded.verify("pw"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn created_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path().join(".login"));
        store.create("pw").await.unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[tokio::test]
    async fn create_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path().join(".login"));
        store.create("pw").await.unwrap();
        let err = store.create("pw").await.unwrap_err();
        assert!(matches!(err, CredentialError::Io { source, .. } if source.kind() == io::ErrorKind::AlreadyExists));
    }

    #[tokio::test]
    async fn wrong_sized_store_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".login");
        let store = CredentialStore::new(&path);

        for len in [0usize, 8, RECORD_LEN - 1, RECORD_LEN + 1] {
            std::fs::write(&path, vec![0u8; len]).unwrap();
            let err = store.load_or_create("pw").await.unwrap_err();
            assert!(matches!(err, CredentialError::Corrupt { .. }), "len {len}");
        }
    }

    #[tokio::test]
    async fn creates_missing_parent_directory() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path().join("vault").join(".login"));
        store.load_or_create("pw").await.unwrap();
        assert!(store.exists().await.unwrap());
    }

    #[test]
    fn salted_hash_returns_zeroizing_buffer() {
        let salt = [7; SALT_LEN];
        let candidate: Zeroizing<[u8; HASH_LEN]> = salted_hash("pw", &salt);
        assert_eq!(&*candidate, CredentialRecord::with_salt("pw", salt).verification_hash());
    }

    #[tokio::test]
    async fn discard_partial_removes_leftovers() {
        let tmp = TempDir::new().unwrap();
        let partial = tmp.path().join(".3");
        std::fs::write(&partial, b"half").unwrap();
        discard_partial(&partial).await;
        assert!(!partial.exists());

        // Already gone: nothing to do.
        discard_partial(&partial).await;

        // Removal fails (a directory): logged, not raised.
        let dir = tmp.path().join("sub");
        std::fs::create_dir(&dir).unwrap();
        discard_partial(&dir).await;
        assert!(dir.exists());
    }
}
