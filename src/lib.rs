//! Tumbl-Tally: blog post-history crawler and tag census
//!
//! This crate walks the full post history of a hosted blog through its paginated
//! read API (JSON v2 or XML v1), classifies every post into a typed record, and
//! folds the results into blog-level statistics and a tag index.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Tumbl-Tally operations
#[derive(Debug, Error)]
pub enum TallyError {
    /// The probe or bootstrap query rejected the blog URL
    #[error("Source is not a readable blog: {url} ({reason})")]
    SourceInvalid { url: String, reason: String },

    #[error("Fetch failed for {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Response rejected: {0}")]
    ParseRejected(#[from] crawler::ParseError),

    #[error("Post skipped: {0}")]
    ClassificationSkipped(#[from] crawler::ClassifyError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Tumbl-Tally operations
pub type Result<T> = std::result::Result<T, TallyError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEngine, CrawlSession};
pub use model::{BlogDescriptor, ImageSize, PostRecord, PostType};
pub use state::CrawlStatus;
pub use crate::url::{extract_domain, normalize_blog_url};
