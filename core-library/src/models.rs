//! Domain models for the local catalog

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::error::{LibraryError, Result};

/// Scheme prefix of every locator produced by this crate.
pub const LOCATOR_SCHEME: &str = "subsonic";

// ============================================================================
// Locator
// ============================================================================

/// Stable key of a stored entry: `subsonic://{host}/{remote_id}`.
///
/// The host makes locators unique across configured servers; the remote id
/// makes them stable across re-syncs, so the same song always maps to the
/// same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(host: &str, remote_id: &str) -> Self {
        Self(format!("{}://{}/{}", LOCATOR_SCHEME, host, remote_id))
    }

    /// Parse a stored locator string, checking the scheme and id.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |message: &str| LibraryError::InvalidInput {
            field: "locator".to_string(),
            message: format!("{}: '{}'", message, value),
        };

        let rest = value
            .strip_prefix(LOCATOR_SCHEME)
            .and_then(|rest| rest.strip_prefix("://"))
            .ok_or_else(|| invalid("unexpected scheme"))?;

        match rest.rsplit_once('/') {
            Some((host, id)) if !host.is_empty() && !id.is_empty() => Ok(Self(value.to_string())),
            _ => Err(invalid("expected host and id")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Remote id component (everything after the last `/`).
    pub fn remote_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// LocalEntry
// ============================================================================

/// A single settable metadata field of a [`LocalEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryField {
    Title(String),
    Artist(String),
    Album(String),
    Year(i64),
    TrackNumber(i64),
    Genre(String),
    /// Duration in seconds
    Duration(i64),
    /// File size in bytes
    FileSize(i64),
}

impl EntryField {
    pub fn name(&self) -> &'static str {
        match self {
            EntryField::Title(_) => "title",
            EntryField::Artist(_) => "artist",
            EntryField::Album(_) => "album",
            EntryField::Year(_) => "year",
            EntryField::TrackNumber(_) => "track_number",
            EntryField::Genre(_) => "genre",
            EntryField::Duration(_) => "duration_secs",
            EntryField::FileSize(_) => "file_size",
        }
    }
}

/// A song stored in the local catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LocalEntry {
    pub locator: Locator,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i64>,
    pub track_number: Option<i64>,
    pub genre: Option<String>,
    pub duration_secs: Option<i64>,
    pub file_size: Option<i64>,
    /// Unix seconds of the first commit
    pub created_at: i64,
    /// Unix seconds of the latest commit
    pub updated_at: i64,
}

impl LocalEntry {
    /// Create an unsaved entry with no metadata.
    pub fn new(locator: Locator, now: i64) -> Self {
        Self {
            locator,
            title: None,
            artist: None,
            album: None,
            year: None,
            track_number: None,
            genre: None,
            duration_secs: None,
            file_size: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set(&mut self, field: EntryField) {
        match field {
            EntryField::Title(v) => self.title = Some(v),
            EntryField::Artist(v) => self.artist = Some(v),
            EntryField::Album(v) => self.album = Some(v),
            EntryField::Year(v) => self.year = Some(v),
            EntryField::TrackNumber(v) => self.track_number = Some(v),
            EntryField::Genre(v) => self.genre = Some(v),
            EntryField::Duration(v) => self.duration_secs = Some(v),
            EntryField::FileSize(v) => self.file_size = Some(v),
        }
    }

    pub fn touch(&mut self, now: i64) {
        self.updated_at = now;
    }

    /// Validate entry data before it is written.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.locator.as_str().is_empty() {
            return Err("Entry locator cannot be empty".to_string());
        }

        if let Some(track_number) = self.track_number {
            if track_number <= 0 {
                return Err(format!("Track number {} must be positive", track_number));
            }
        }

        if self.duration_secs.is_some_and(|d| d < 0) {
            return Err("Duration cannot be negative".to_string());
        }

        if self.file_size.is_some_and(|s| s < 0) {
            return Err("File size cannot be negative".to_string());
        }

        if self.updated_at < self.created_at {
            return Err("updated_at precedes created_at".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_format() {
        let locator = Locator::new("music.example.com", "7f3a");
        assert_eq!(locator.as_str(), "subsonic://music.example.com/7f3a");
        assert_eq!(locator.remote_id(), "7f3a");
    }

    #[test]
    fn test_locator_parse() {
        let parsed = Locator::parse("subsonic://10.0.0.2:4040/991").unwrap();
        assert_eq!(parsed, Locator::new("10.0.0.2:4040", "991"));

        assert!(Locator::parse("file:///music/song.mp3").is_err());
        assert!(Locator::parse("subsonic://host/").is_err());
        assert!(Locator::parse("subsonic:///12").is_err());
    }

    #[test]
    fn test_entry_set_fields() {
        let mut entry = LocalEntry::new(Locator::new("h", "1"), 100);
        entry.set(EntryField::Title("One More Time".to_string()));
        entry.set(EntryField::Year(2000));
        entry.set(EntryField::Duration(320));

        assert_eq!(entry.title.as_deref(), Some("One More Time"));
        assert_eq!(entry.year, Some(2000));
        assert_eq!(entry.duration_secs, Some(320));
        assert_eq!(entry.genre, None);
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_entry_validation() {
        let mut entry = LocalEntry::new(Locator::new("h", "1"), 100);
        entry.set(EntryField::TrackNumber(0));
        assert!(entry.validate().is_err());

        let mut entry = LocalEntry::new(Locator::new("h", "1"), 100);
        entry.set(EntryField::FileSize(-1));
        assert!(entry.validate().is_err());
    }
}
