//! Note naming, enumeration and identifier allocation.
//!
//! A note file is named `.` followed by its identifier in decimal with no
//! leading zero (`.1`, `.42`). Names carry nothing but the number, so a
//! directory listing says nothing about what the notes contain.
//!
//! Allocation always fills the lowest free identifier first and is computed
//! from a single directory enumeration.

use crate::error::NoteError;
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::str::FromStr;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Highest identifier a notebook can hold.
pub const MAX_NOTES: u32 = 99;

/// A note identifier in `[1, MAX_NOTES]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteId(u32);

impl NoteId {
    pub fn new(n: u32) -> Option<Self> {
        (1..=MAX_NOTES).contains(&n).then_some(Self(n))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// The on-disk filename, e.g. `.7`.
    pub fn file_name(self) -> String {
        format!(".{}", self.0)
    }

    /// Parses a directory entry name. `None` for anything that is not a
    /// note name or whose number is out of range.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if !is_note_name(name) {
            return None;
        }
        name[1..].parse::<u32>().ok().and_then(Self::new)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for NoteId {
    type Error = ParseNoteIdError;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        Self::new(n).ok_or(ParseNoteIdError::OutOfRange)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseNoteIdError {
    #[error("note numbers are plain decimal numerals")]
    NotNumeric,
    #[error("note numbers run from 1 to {}", MAX_NOTES)]
    OutOfRange,
}

/// Parses operator input such as `"7\n"`.
impl FromStr for NoteId {
    type Err = ParseNoteIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseNoteIdError::NotNumeric);
        }
        if digits.starts_with('0') {
            return Err(ParseNoteIdError::OutOfRange);
        }
        digits
            .parse::<u32>()
            .ok()
            .and_then(Self::new)
            .ok_or(ParseNoteIdError::OutOfRange)
    }
}

/// True iff `s` is `"." digit_nonzero digit*`.
pub fn is_note_name(s: &str) -> bool {
    match s.as_bytes() {
        [b'.', first, rest @ ..] => {
            (b'1'..=b'9').contains(first) && rest.iter().all(u8::is_ascii_digit)
        }
        _ => false,
    }
}

/// Every valid note identifier in `dir`, in directory enumeration order.
///
/// A missing directory holds no notes. Any other read failure is returned.
pub async fn list_identifiers(dir: &str) -> io::Result<Vec<NoteId>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir, "notebook directory does not exist yet");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        match name.to_str().and_then(NoteId::from_file_name) {
            Some(id) => ids.push(id),
            None => debug!(dir, entry = ?name, "skipping non-note entry"),
        }
    }
    Ok(ids)
}

/// Lowest identifier not present in `dir`.
pub async fn next_identifier(dir: &str) -> Result<NoteId, NoteError> {
    let existing = list_identifiers(dir).await?;
    let id = first_free(existing).ok_or(NoteError::Exhausted)?;
    debug!(dir, id = id.get(), "allocated note identifier");
    Ok(id)
}

/// First gap in the sorted identifier set, else `count + 1`, else `None`
/// once all `MAX_NOTES` identifiers are taken.
pub fn first_free(existing: impl IntoIterator<Item = NoteId>) -> Option<NoteId> {
    let taken: BTreeSet<u32> = existing.into_iter().map(NoteId::get).collect();
    let count = taken.len() as u32;

    for (expected, actual) in (1..=count).zip(taken.iter().copied()) {
        if expected != actual {
            return NoteId::new(expected);
        }
    }
    if count < MAX_NOTES {
        NoteId::new(count + 1)
    } else {
        None
    }
}
