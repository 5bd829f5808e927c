//! Storage module for persisting crawl snapshots
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Saving a crawled blog with its posts, tags and photo variants
//! - Loading a stored blog back into a descriptor
//! - Aggregate queries for statistics (posts per type, tag counts)

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{SnapshotRecord, SnapshotStore, StorageError, StorageResult};

use crate::crawler::CrawlReport;
use crate::state::CrawlStatus;
use crate::TallyError;
use std::path::Path;

/// Initializes or opens a snapshot database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(TallyError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, TallyError> {
    SqliteStorage::new(path)
}

/// Stores the outcome of one crawl
///
/// A blog that could not be resolved has nothing worth keeping, so an
/// `InvalidSource` report leaves any earlier snapshot in place.
///
/// # Returns
///
/// `true` if a snapshot was written
pub fn save_report(
    store: &mut dyn SnapshotStore,
    report: &CrawlReport,
    config_hash: &str,
) -> StorageResult<bool> {
    if report.status == CrawlStatus::InvalidSource {
        tracing::warn!(
            "{} could not be resolved; keeping any stored snapshot",
            report.blog.url
        );
        return Ok(false);
    }

    store.save_snapshot(&report.blog, report.status, config_hash)?;
    Ok(true)
}
