//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the snapshot database.
//! Every table is keyed by blog URL so several blogs share one file.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per blog: identity, flags, and how the last crawl ended
CREATE TABLE IF NOT EXISTS blogs (
    url TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    is_adult_content INTEGER NOT NULL DEFAULT 0,
    asks_enabled INTEGER NOT NULL DEFAULT 0,
    anonymous_asks_enabled INTEGER NOT NULL DEFAULT 0,
    last_updated INTEGER,
    declared_total_posts INTEGER NOT NULL DEFAULT 0,
    blog_total_posts INTEGER,
    status TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    saved_at TEXT NOT NULL
);

-- Classified posts
CREATE TABLE IF NOT EXISTS posts (
    blog_url TEXT NOT NULL,
    id TEXT NOT NULL,
    post_type TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    PRIMARY KEY (blog_url, id)
);

CREATE INDEX IF NOT EXISTS idx_posts_type ON posts(blog_url, post_type);

-- Tags per post
CREATE TABLE IF NOT EXISTS post_tags (
    blog_url TEXT NOT NULL,
    post_id TEXT NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (blog_url, post_id, tag)
);

CREATE INDEX IF NOT EXISTS idx_post_tags_tag ON post_tags(blog_url, tag);

-- Selected photo variant per photo, in payload order
CREATE TABLE IF NOT EXISTS photo_variants (
    blog_url TEXT NOT NULL,
    post_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    PRIMARY KEY (blog_url, post_id, position)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
