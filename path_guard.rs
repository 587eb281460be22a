//! Checked path construction and race-aware opening.
//!
//! [`build_path`] joins a directory and a single filename component with
//! every length addition checked, and refuses inputs that could escape the
//! directory before any syscall sees them. [`open_verified`] opens a file with
//! `O_NOFOLLOW | O_NONBLOCK` and confirms, via `fstat` on the opened
//! descriptor, that it is the same inode that was `lstat`ed just before. A
//! directory entry swapped in between surfaces as
//! [`PathError::TargetReplaced`].

use crate::error::{OpenError, PathError};
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tokio::fs::{self, File};
use tracing::{debug, error};

/// Platform path limit in bytes, terminator included.
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub const PATH_MAX: usize = 1024;
#[cfg(windows)]
pub const PATH_MAX: usize = 260;
#[cfg(not(any(target_os = "macos", target_os = "ios", windows)))]
pub const PATH_MAX: usize = 4096;

/// Joins `dir` and `name` into a path no longer than [`PATH_MAX`].
///
/// `name` must be one filename component: non-empty, not `.` or `..`, and
/// free of separators and NUL bytes. A separator is only inserted when `dir`
/// does not already end in one.
pub fn build_path(dir: &str, name: &str) -> Result<PathBuf, PathError> {
    if dir.is_empty() || dir.contains('\0') {
        return Err(PathError::UnsafeComponent(dir.to_string()));
    }
    if !is_single_component(name) {
        return Err(PathError::UnsafeComponent(name.to_string()));
    }

    let needs_separator = !dir.ends_with(MAIN_SEPARATOR) && !dir.ends_with('/');
    let total = match checked_path_len(dir.len(), needs_separator, name.len()) {
        Some(total) if total <= PATH_MAX => total,
        _ => {
            return Err(PathError::TooLong {
                dir: dir.to_string(),
                name: name.to_string(),
                limit: PATH_MAX,
            })
        }
    };

    let mut joined = String::with_capacity(total);
    joined.push_str(dir);
    if needs_separator {
        joined.push(MAIN_SEPARATOR);
    }
    joined.push_str(name);
    Ok(PathBuf::from(joined))
}

/// `dir_len + separator + name_len + terminator`, or `None` on overflow.
fn checked_path_len(dir_len: usize, needs_separator: bool, name_len: usize) -> Option<usize> {
    dir_len
        .checked_add(usize::from(needs_separator))?
        .checked_add(name_len)?
        .checked_add(1)
}

fn is_single_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\0'])
        && !(cfg!(windows) && name.contains('\\'))
}

/// An open file together with the `fstat` taken from its descriptor.
#[derive(Debug)]
pub struct VerifiedFile {
    pub file: File,
    pub metadata: Metadata,
}

/// Opens `path` read-only, refusing anything but a regular file and failing
/// with [`PathError::TargetReplaced`] if the entry changed between the check
/// and the open.
pub async fn open_verified(path: &Path) -> Result<VerifiedFile, OpenError> {
    let before = fs::symlink_metadata(path).await?;
    if !before.file_type().is_file() {
        error!(path = %path.display(), "refusing to open non-regular file");
        return Err(PathError::NotRegularFile(path.to_path_buf()).into());
    }
    open_checked(path, &before).await
}

/// Second half of [`open_verified`]: opens `path` without following a
/// symlink or blocking on a FIFO, then matches the descriptor against
/// `before`.
async fn open_checked(path: &Path, before: &Metadata) -> Result<VerifiedFile, OpenError> {
    let file = match open_no_follow(path).await {
        Ok(file) => file,
        // The entry was a regular file a moment ago.
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            error!(path = %path.display(), "file vanished between check and open");
            return Err(PathError::TargetReplaced(path.to_path_buf()).into());
        }
        Err(e) if is_symlink_refusal(&e) => {
            error!(path = %path.display(), "symlink swapped in between check and open");
            return Err(PathError::TargetReplaced(path.to_path_buf()).into());
        }
        Err(e) => return Err(e.into()),
    };

    let after = file.metadata().await?;
    ensure_same_file(path, before, &after)?;
    debug!(path = %path.display(), size = after.len(), "opened verified file");
    Ok(VerifiedFile {
        file,
        metadata: after,
    })
}

// O_NONBLOCK keeps a FIFO from stalling the open; it has no effect on
// reads from a regular file.
#[cfg(unix)]
async fn open_no_follow(path: &Path) -> io::Result<File> {
    fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW | libc::O_NONBLOCK)
        .open(path)
        .await
}

#[cfg(not(unix))]
async fn open_no_follow(path: &Path) -> io::Result<File> {
    File::open(path).await
}

#[cfg(unix)]
fn is_symlink_refusal(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::ELOOP)
}

#[cfg(not(unix))]
fn is_symlink_refusal(_e: &io::Error) -> bool {
    false
}

/// Fails unless `before` and `after` describe the same filesystem object.
pub fn ensure_same_file(path: &Path, before: &Metadata, after: &Metadata) -> Result<(), PathError> {
    if after.file_type().is_file() && same_object(before, after) {
        Ok(())
    } else {
        error!(path = %path.display(), "opened object differs from the checked one");
        Err(PathError::TargetReplaced(path.to_path_buf()))
    }
}

#[cfg(unix)]
fn same_object(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

// No inode numbers through std here; compare what is observable.
#[cfg(not(unix))]
fn same_object(a: &Metadata, b: &Metadata) -> bool {
    a.len() == b.len() && a.modified().ok() == b.modified().ok()
}
