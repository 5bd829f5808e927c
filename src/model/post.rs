//! Post record definitions
//!
//! A `PostRecord` is built once per post per page fetch and never mutated
//! afterwards. Records are keyed by `PostId`; two records with the same id are
//! the same post even if their content differs.

use chrono::{DateTime, Local, TimeZone};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;

/// Opaque post identifier, stable across pages
///
/// The JSON API sends ids as 64-bit integers (and as `id_string`), the XML API
/// as attribute text; both normalise to the decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for PostId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared type of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PostType {
    Photo,
    Text,
    Video,
    Link,
    Audio,
    Quote,
    Chat,
    Answer,
    Unknown,
}

impl PostType {
    /// Maps the API's `type` field to a post type
    ///
    /// Both dialects are accepted: the XML API calls text posts `regular` and
    /// chat posts `conversation`. Anything unrecognised becomes `Unknown`.
    pub fn from_api_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "photo" => Self::Photo,
            "text" | "regular" => Self::Text,
            "video" => Self::Video,
            "link" => Self::Link,
            "audio" => Self::Audio,
            "quote" => Self::Quote,
            "chat" | "conversation" => Self::Chat,
            "answer" => Self::Answer,
            _ => Self::Unknown,
        }
    }

    /// Canonical name, also used as the database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Text => "text",
            Self::Video => "video",
            Self::Link => "link",
            Self::Audio => "audio",
            Self::Quote => "quote",
            Self::Chat => "chat",
            Self::Answer => "answer",
            Self::Unknown => "unknown",
        }
    }

    /// Returns all post types
    pub fn all() -> [Self; 9] {
        [
            Self::Photo,
            Self::Text,
            Self::Video,
            Self::Link,
            Self::Audio,
            Self::Quote,
            Self::Chat,
            Self::Answer,
            Self::Unknown,
        ]
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preferred photo resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSize {
    /// Full resolution upload
    #[default]
    Original,
    /// 1280px wide
    Large,
    /// 500px wide
    Medium,
    /// 250px wide
    Small,
    /// 100px wide
    Thumbnail,
    /// 75px square
    Square,
}

impl ImageSize {
    /// Width of the alternate size this preference selects, None for the original
    pub fn preferred_width(&self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::Large => Some(1280),
            Self::Medium => Some(500),
            Self::Small => Some(250),
            Self::Thumbnail => Some(100),
            Self::Square => Some(75),
        }
    }
}

/// One resolution of one photo
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhotoVariant {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Typed representation of one post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: PostId,
    pub post_type: PostType,
    /// Publication time in local calendar time
    pub timestamp: DateTime<Local>,
    pub tags: BTreeSet<String>,
    /// Selected variant per photo, in payload order; only set for photo posts
    pub photo_variants: Option<Vec<PhotoVariant>>,
}

/// Converts a Unix timestamp (seconds) to local time
///
/// Out-of-range values fall back to the epoch rather than failing the post.
pub fn local_time_from_epoch(seconds: i64) -> DateTime<Local> {
    Local
        .timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_else(epoch)
}

/// The Unix epoch in local time; the default for missing timestamps
pub fn epoch() -> DateTime<Local> {
    DateTime::<chrono::Utc>::UNIX_EPOCH.with_timezone(&Local)
}
