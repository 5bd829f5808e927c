use crate::model::post::{PostId, PostRecord};
use chrono::{DateTime, Local};
use std::collections::HashMap;

/// One target blog: identity, declared size, and the posts crawled so far
///
/// Owned by the caller; during an active crawl only the engine mutates it.
#[derive(Debug, Clone, Default)]
pub struct BlogDescriptor {
    pub url: String,
    pub name: String,
    pub title: String,
    pub description: String,

    pub is_adult_content: bool,
    pub asks_enabled: bool,
    pub anonymous_asks_enabled: bool,

    pub last_updated: Option<DateTime<Local>>,

    /// Post count the API reported at bootstrap; bounds the crawl loop
    pub declared_total_posts: u64,

    /// Post count carried on the blog object itself, when present
    pub blog_total_posts: Option<u64>,

    posts: HashMap<PostId, PostRecord>,
}

impl BlogDescriptor {
    /// Creates an otherwise empty descriptor for a blog URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Adds a post, replacing any earlier record with the same id
    ///
    /// Returns true if the id was not yet present.
    pub fn insert_post(&mut self, post: PostRecord) -> bool {
        self.posts.insert(post.id.clone(), post).is_none()
    }

    pub fn get_post(&self, id: &PostId) -> Option<&PostRecord> {
        self.posts.get(id)
    }

    pub fn posts(&self) -> impl Iterator<Item = &PostRecord> {
        self.posts.values()
    }

    /// Posts ordered by id, for stable output
    pub fn sorted_posts(&self) -> Vec<&PostRecord> {
        let mut posts: Vec<_> = self.posts.values().collect();
        posts.sort_by(|a, b| a.id.cmp(&b.id));
        posts
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    /// Drops all accumulated posts, e.g. between two crawl passes
    pub fn clear_posts(&mut self) {
        self.posts.clear();
    }
}
