//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the SnapshotStore trait.

use crate::model::{local_time_from_epoch, BlogDescriptor, PhotoVariant, PostId, PostRecord, PostType};
use crate::state::CrawlStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{SnapshotRecord, SnapshotStore, StorageError, StorageResult};
use crate::TallyError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(TallyError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, TallyError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, TallyError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

const SNAPSHOT_COLUMNS: &str = "b.url, b.title, b.status, b.config_hash, b.saved_at, \
     b.declared_total_posts, (SELECT COUNT(*) FROM posts p WHERE p.blog_url = b.url)";

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<(SnapshotRecord, String)> {
    let status: String = row.get(2)?;
    Ok((
        SnapshotRecord {
            blog_url: row.get(0)?,
            title: row.get(1)?,
            status: CrawlStatus::default(),
            config_hash: row.get(3)?,
            saved_at: row.get(4)?,
            declared_total_posts: row.get::<_, i64>(5)? as u64,
            stored_posts: row.get::<_, i64>(6)? as u64,
        },
        status,
    ))
}

fn with_status((mut record, status): (SnapshotRecord, String)) -> StorageResult<SnapshotRecord> {
    record.status = CrawlStatus::from_db_string(&status).ok_or_else(|| StorageError::Corrupt {
        url: record.blog_url.clone(),
        reason: format!("unknown status {}", status),
    })?;
    Ok(record)
}

impl SnapshotStore for SqliteStorage {
    fn save_snapshot(
        &mut self,
        blog: &BlogDescriptor,
        status: CrawlStatus,
        config_hash: &str,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        for table in ["photo_variants", "post_tags", "posts"] {
            tx.execute(
                &format!("DELETE FROM {} WHERE blog_url = ?1", table),
                params![blog.url],
            )?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO blogs (url, name, title, description, is_adult_content,
                asks_enabled, anonymous_asks_enabled, last_updated, declared_total_posts,
                blog_total_posts, status, config_hash, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                blog.url,
                blog.name,
                blog.title,
                blog.description,
                blog.is_adult_content,
                blog.asks_enabled,
                blog.anonymous_asks_enabled,
                blog.last_updated.map(|t| t.timestamp()),
                blog.declared_total_posts as i64,
                blog.blog_total_posts.map(|n| n as i64),
                status.to_db_string(),
                config_hash,
                Utc::now().to_rfc3339(),
            ],
        )?;

        {
            let mut insert_post = tx.prepare(
                "INSERT INTO posts (blog_url, id, post_type, timestamp) VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut insert_tag =
                tx.prepare("INSERT INTO post_tags (blog_url, post_id, tag) VALUES (?1, ?2, ?3)")?;
            let mut insert_variant = tx.prepare(
                "INSERT INTO photo_variants (blog_url, post_id, position, url, width, height)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for post in blog.posts() {
                let id = post.id.as_str();
                insert_post.execute(params![
                    blog.url,
                    id,
                    post.post_type.as_str(),
                    post.timestamp.timestamp()
                ])?;

                for tag in &post.tags {
                    insert_tag.execute(params![blog.url, id, tag])?;
                }

                for (position, variant) in post.photo_variants.iter().flatten().enumerate() {
                    insert_variant.execute(params![
                        blog.url,
                        id,
                        position as i64,
                        variant.url,
                        variant.width,
                        variant.height
                    ])?;
                }
            }
        }

        tx.commit()?;

        tracing::debug!("Saved snapshot of {} ({} posts)", blog.url, blog.post_count());
        Ok(())
    }

    fn load_snapshot(&self, blog_url: &str) -> StorageResult<Option<BlogDescriptor>> {
        let blog = self
            .conn
            .query_row(
                "SELECT url, name, title, description, is_adult_content, asks_enabled,
                        anonymous_asks_enabled, last_updated, declared_total_posts, blog_total_posts
                 FROM blogs WHERE url = ?1",
                params![blog_url],
                |row| {
                    let mut blog = BlogDescriptor::new(row.get::<_, String>(0)?);
                    blog.name = row.get(1)?;
                    blog.title = row.get(2)?;
                    blog.description = row.get(3)?;
                    blog.is_adult_content = row.get(4)?;
                    blog.asks_enabled = row.get(5)?;
                    blog.anonymous_asks_enabled = row.get(6)?;
                    blog.last_updated = row.get::<_, Option<i64>>(7)?.map(local_time_from_epoch);
                    blog.declared_total_posts = row.get::<_, i64>(8)? as u64;
                    blog.blog_total_posts = row.get::<_, Option<i64>>(9)?.map(|n| n as u64);
                    Ok(blog)
                },
            )
            .optional()?;

        let Some(mut blog) = blog else {
            return Ok(None);
        };

        let mut tags: HashMap<String, BTreeSet<String>> = HashMap::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT post_id, tag FROM post_tags WHERE blog_url = ?1")?;
            let rows = stmt.query_map(params![blog_url], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (post_id, tag) = row?;
                tags.entry(post_id).or_default().insert(tag);
            }
        }

        let mut variants: HashMap<String, Vec<PhotoVariant>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT post_id, url, width, height FROM photo_variants
                 WHERE blog_url = ?1 ORDER BY post_id, position",
            )?;
            let rows = stmt.query_map(params![blog_url], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    PhotoVariant {
                        url: row.get(1)?,
                        width: row.get(2)?,
                        height: row.get(3)?,
                    },
                ))
            })?;
            for row in rows {
                let (post_id, variant) = row?;
                variants.entry(post_id).or_default().push(variant);
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id, post_type, timestamp FROM posts WHERE blog_url = ?1")?;
        let rows = stmt.query_map(params![blog_url], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        for row in rows {
            let (id, post_type, timestamp) = row?;
            let post_type = PostType::from_api_str(&post_type);
            let photo_variants = match post_type {
                PostType::Photo => Some(variants.remove(&id).unwrap_or_default()),
                _ => None,
            };

            blog.insert_post(PostRecord {
                tags: tags.remove(&id).unwrap_or_default(),
                id: PostId::new(id),
                post_type,
                timestamp: local_time_from_epoch(timestamp),
                photo_variants,
            });
        }

        Ok(Some(blog))
    }

    fn snapshot_info(&self, blog_url: &str) -> StorageResult<Option<SnapshotRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM blogs b WHERE b.url = ?1", SNAPSHOT_COLUMNS),
                params![blog_url],
                snapshot_from_row,
            )
            .optional()?;

        row.map(with_status).transpose()
    }

    fn list_snapshots(&self) -> StorageResult<Vec<SnapshotRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM blogs b ORDER BY b.url", SNAPSHOT_COLUMNS))?;

        let rows = stmt.query_map([], snapshot_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(with_status(row?)?);
        }
        Ok(records)
    }

    fn count_posts_by_type(&self, blog_url: &str) -> StorageResult<BTreeMap<PostType, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT post_type, COUNT(*) FROM posts WHERE blog_url = ?1 GROUP BY post_type",
        )?;

        let rows = stmt.query_map(params![blog_url], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (post_type, count) = row?;
            *counts.entry(PostType::from_api_str(&post_type)).or_insert(0) += count as u64;
        }
        Ok(counts)
    }

    fn top_tags(&self, blog_url: &str, limit: usize) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT tag, COUNT(*) AS uses FROM post_tags WHERE blog_url = ?1
             GROUP BY tag ORDER BY uses DESC, tag ASC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![blog_url, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let tags = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn count_unique_tags(&self, blog_url: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT tag) FROM post_tags WHERE blog_url = ?1",
            params![blog_url],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
