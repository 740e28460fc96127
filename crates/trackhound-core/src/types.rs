//! Shared types used across the Trackhound application.

use crate::error::TrackhoundError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype for extension identifiers.
///
/// The identity of an extension is the name of the unit it was loaded from
/// (the file stem for on-disk extensions). It must be non-empty and must not
/// contain path separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExtensionId(String);

impl ExtensionId {
    /// Create a new `ExtensionId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains path separators.
    pub fn new(id: impl Into<String>) -> Result<Self, TrackhoundError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), TrackhoundError> {
        let reason = if id.trim().is_empty() {
            "must not be empty"
        } else if id.contains('/') || id.contains('\\') || id.contains("..") {
            "must not contain path separators"
        } else {
            return Ok(());
        };

        Err(TrackhoundError::InvalidId {
            id: id.to_string(),
            reason,
        })
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ExtensionId {
    type Error = TrackhoundError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExtensionId> for String {
    fn from(id: ExtensionId) -> Self {
        id.0
    }
}

/// Placeholder for a track without a name.
pub const UNKNOWN_NAME: &str = "Unknown Name";
/// Placeholder for a track without an artist.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
/// Placeholder for a track without an album.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
/// Placeholder for a track without a genre.
pub const UNKNOWN_GENRE: &str = "Unknown Genre";

/// One discovered track.
///
/// Built inside an extension's entry point and immutable once emitted. Any
/// descriptive field left unset falls back to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    name: String,
    artist: String,
    album: String,
    genre: String,
    media_url: String,
    cover_url: Option<String>,
}

impl ResultItem {
    /// Start building a result item for the given playable URL.
    #[must_use]
    pub fn builder(media_url: impl Into<String>) -> ResultItemBuilder {
        ResultItemBuilder {
            media_url: media_url.into(),
            ..ResultItemBuilder::default()
        }
    }

    /// Track name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary artist (possibly a comma-separated list).
    #[must_use]
    pub fn artist(&self) -> &str {
        &self.artist
    }

    /// Collection or album the track belongs to.
    #[must_use]
    pub fn album(&self) -> &str {
        &self.album
    }

    /// Category or genre.
    #[must_use]
    pub fn genre(&self) -> &str {
        &self.genre
    }

    /// Playable media URL.
    #[must_use]
    pub fn media_url(&self) -> &str {
        &self.media_url
    }

    /// Cover art URL, if the source provides one.
    #[must_use]
    pub fn cover_url(&self) -> Option<&str> {
        self.cover_url.as_deref()
    }
}

impl Default for ResultItem {
    fn default() -> Self {
        ResultItemBuilder::default().build()
    }
}

/// Builder for [`ResultItem`].
#[derive(Debug, Clone, Default)]
pub struct ResultItemBuilder {
    name: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    media_url: String,
    cover_url: Option<String>,
}

impl ResultItemBuilder {
    /// Set the track name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = non_blank(name.into());
        self
    }

    /// Set the artist.
    #[must_use]
    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = non_blank(artist.into());
        self
    }

    /// Set the album.
    #[must_use]
    pub fn album(mut self, album: impl Into<String>) -> Self {
        self.album = non_blank(album.into());
        self
    }

    /// Set the genre.
    #[must_use]
    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = non_blank(genre.into());
        self
    }

    /// Set the cover art URL.
    #[must_use]
    pub fn cover_url(mut self, cover_url: impl Into<String>) -> Self {
        self.cover_url = non_blank(cover_url.into());
        self
    }

    /// Finish the item, filling placeholders for unset fields.
    #[must_use]
    pub fn build(self) -> ResultItem {
        ResultItem {
            name: self.name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            artist: self.artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            album: self.album.unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            genre: self.genre.unwrap_or_else(|| UNKNOWN_GENRE.to_string()),
            media_url: self.media_url,
            cover_url: self.cover_url,
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
