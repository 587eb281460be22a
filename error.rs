//! Error taxonomy for the vault.
//!
//! Every fallible operation returns one of these typed errors. Integrity
//! problems ([`NoteError::Corrupt`], [`PathError::TargetReplaced`]) are kept
//! apart from conditions the operator can simply correct
//! ([`NoteError::NotFound`], [`NoteError::Exhausted`]).

use crate::note_namer::{NoteId, MAX_NOTES};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures building or opening a path inside the vault.
#[derive(Debug, Error)]
pub enum PathError {
    /// The combined path would exceed the platform limit (or overflowed).
    #[error("path too long: {dir}/{name} exceeds {limit} bytes")]
    TooLong {
        dir: String,
        name: String,
        limit: usize,
    },

    /// A directory or filename component that must never reach a syscall.
    #[error("unsafe path component: {0:?}")]
    UnsafeComponent(String),

    /// The directory entry is a symlink, directory or other special file.
    #[error("{} is not a regular file", .0.display())]
    NotRegularFile(PathBuf),

    /// The object opened is not the object that was checked before opening.
    #[error("{} was replaced between check and open", .0.display())]
    TargetReplaced(PathBuf),
}

/// Result of a guarded open: either the guard refused or the OS did.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Guard(#[from] PathError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The only decryption failure. Deliberately carries no detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecryptError {
    #[error("ciphertext is corrupt")]
    Corrupt,
}

/// Failures reading or writing the password verification record.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Fatal: the operator must delete the credential file and recreate the vault.
    #[error("credential store {} is corrupt ({reason}); delete it and recreate the vault", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("credential store {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CredentialError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Unlock failures.
///
/// A wrong password and a corrupt store print the same message so the
/// outcome of an attempt reveals nothing about the stored record. Use
/// [`AuthError::reason`] to tell them apart in logs.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication failed")]
    InvalidPassword,

    #[error("authentication failed")]
    CorruptStore(#[source] CredentialError),

    #[error("credential store unavailable: {0}")]
    Unavailable(#[source] CredentialError),
}

impl AuthError {
    /// Internal reason tag, for logging only.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidPassword => "invalid password",
            Self::CorruptStore(_) => "corrupt credential store",
            Self::Unavailable(_) => "credential store unavailable",
        }
    }
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Corrupt { .. } => Self::CorruptStore(err),
            CredentialError::Io { .. } => Self::Unavailable(err),
        }
    }
}

/// Errors from note operations.
#[derive(Debug, Error)]
pub enum NoteError {
    #[error("note {0} not found")]
    NotFound(NoteId),

    #[error("note {0} is corrupt; delete it")]
    Corrupt(NoteId),

    #[error("notebook is full ({} notes)", MAX_NOTES)]
    Exhausted,

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("notebook I/O error: {0}")]
    Io(#[from] io::Error),
}

impl NoteError {
    /// The stored data can no longer be trusted and the operator should act on it.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::Corrupt(_)
                | Self::Path(PathError::TargetReplaced(_))
                | Self::Path(PathError::NotRegularFile(_))
        )
    }

    /// The operator can correct the condition (pick another note, delete one).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Exhausted)
    }

    /// Maps a guarded-open failure for note `id`.
    pub(crate) fn from_open(id: NoteId, err: OpenError) -> Self {
        match err {
            OpenError::Io(e) if e.kind() == io::ErrorKind::NotFound => Self::NotFound(id),
            OpenError::Io(e) => Self::Io(e),
            OpenError::Guard(g) => Self::Path(g),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_share_one_message() {
        let wrong = AuthError::InvalidPassword;
        let corrupt = AuthError::from(CredentialError::corrupt(".login", "short read"));
        assert_eq!(wrong.to_string(), corrupt.to_string());
        assert_ne!(wrong.reason(), corrupt.reason());
    }

    #[test]
    fn note_error_classification() {
        let id = NoteId::new(3).unwrap();
        assert!(NoteError::NotFound(id).is_recoverable());
        assert!(NoteError::Exhausted.is_recoverable());
        assert!(NoteError::Corrupt(id).is_integrity_failure());
        assert!(NoteError::Path(PathError::TargetReplaced(".3".into())).is_integrity_failure());
        assert!(!NoteError::Corrupt(id).is_recoverable());
    }

    #[test]
    fn missing_file_on_open_is_not_found() {
        let id = NoteId::new(7).unwrap();
        let err = NoteError::from_open(id, OpenError::Io(io::ErrorKind::NotFound.into()));
        assert!(matches!(err, NoteError::NotFound(n) if n == id));
    }
}
