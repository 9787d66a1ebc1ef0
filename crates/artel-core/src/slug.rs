//! Slug-based content addressing for catalog entities.
//!
//! Every entity is addressed by a slug derived from its human-readable title:
//! case-folded, punctuation stripped, nothing else. Derivation is
//! deterministic so republishing the same title can never mint a second
//! address. A track inside an album lives under `"<album-slug>/<track-slug>"`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Reduce a human-readable name to its slug: lowercase ASCII alphanumerics
/// only.
pub fn slugify(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Stable identifier for an artist, unique across the network namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtistId(String);

impl ArtistId {
    /// Derive from an artist's display name.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(CoreError::InvalidSlug(format!(
                "artist name {:?} reduces to an empty slug",
                name
            )));
        }
        Ok(Self(slug))
    }

    /// Accept an identifier that is already in slug form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !is_slug(s) {
            return Err(CoreError::InvalidSlug(format!(
                "{:?} is not a valid artist id",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for an album, unique within its artist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumId(String);

impl AlbumId {
    /// Derive from an album title.
    pub fn from_title(title: &str) -> Result<Self, CoreError> {
        let slug = slugify(title);
        if slug.is_empty() {
            return Err(CoreError::InvalidSlug(format!(
                "album title {:?} reduces to an empty slug",
                title
            )));
        }
        Ok(Self(slug))
    }

    /// Accept an identifier that is already in slug form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !is_slug(s) {
            return Err(CoreError::InvalidSlug(format!(
                "{:?} is not a valid album id",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a track, unique within its artist.
///
/// A singleton track is a bare slug; a track in an album is
/// `"<album-slug>/<track-slug>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Derive for a singleton track from its title.
    pub fn from_title(title: &str) -> Result<Self, CoreError> {
        let slug = slugify(title);
        if slug.is_empty() {
            return Err(CoreError::InvalidSlug(format!(
                "track title {:?} reduces to an empty slug",
                title
            )));
        }
        Ok(Self(slug))
    }

    /// Derive for a track grouped under an album.
    pub fn in_album(album: &AlbumId, title: &str) -> Result<Self, CoreError> {
        let leaf = Self::from_title(title)?;
        Ok(Self(format!("{}/{}", album.as_str(), leaf.0)))
    }

    /// Accept an identifier that is already in slug form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let valid = match s.split_once('/') {
            Some((album, leaf)) => is_slug(album) && is_slug(leaf),
            None => is_slug(s),
        };
        if !valid {
            return Err(CoreError::InvalidSlug(format!(
                "{:?} is not a valid track id",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// The album slug this track is filed under, if any.
    pub fn album_part(&self) -> Option<&str> {
        self.0.split_once('/').map(|(album, _)| album)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
