//! Storage traits and error types
//!
//! This module defines the trait interface for snapshot backends and
//! associated error types.

use crate::model::{BlogDescriptor, PostType};
use crate::state::CrawlStatus;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt snapshot for {url}: {reason}")]
    Corrupt { url: String, reason: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Summary row for one stored blog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub blog_url: String,
    pub title: String,
    pub status: CrawlStatus,
    pub config_hash: String,
    pub saved_at: String,
    pub declared_total_posts: u64,
    pub stored_posts: u64,
}

/// Trait for snapshot backend implementations
///
/// A snapshot is the blog descriptor with all of its posts plus the status
/// the crawl ended in. Saving a blog replaces its previous snapshot.
pub trait SnapshotStore {
    /// Stores `blog` and its posts, replacing any earlier snapshot
    fn save_snapshot(
        &mut self,
        blog: &BlogDescriptor,
        status: CrawlStatus,
        config_hash: &str,
    ) -> StorageResult<()>;

    /// Loads a stored blog with its posts
    ///
    /// # Returns
    ///
    /// `None` if nothing is stored for `blog_url`
    fn load_snapshot(&self, blog_url: &str) -> StorageResult<Option<BlogDescriptor>>;

    /// Summary of the stored snapshot for `blog_url`
    fn snapshot_info(&self, blog_url: &str) -> StorageResult<Option<SnapshotRecord>>;

    /// Summaries of every stored blog, ordered by URL
    fn list_snapshots(&self) -> StorageResult<Vec<SnapshotRecord>>;

    /// Stored posts per type
    fn count_posts_by_type(&self, blog_url: &str) -> StorageResult<BTreeMap<PostType, u64>>;

    /// The `limit` most used tags, most frequent first
    fn top_tags(&self, blog_url: &str, limit: usize) -> StorageResult<Vec<(String, u64)>>;

    /// Number of distinct tags stored for `blog_url`
    fn count_unique_tags(&self, blog_url: &str) -> StorageResult<u64>;
}
