//! Blog statistics
//!
//! This module builds per-blog statistics either from a finished crawl or from
//! a stored snapshot, and renders them to stdout.

use crate::crawler::CrawlReport;
use crate::model::{BlogDescriptor, PostType};
use crate::state::CrawlStatus;
use crate::storage::SnapshotStore;
use std::collections::{BTreeMap, HashMap};

/// Number of tags listed by default
pub const DEFAULT_TOP_TAGS: usize = 10;

/// Blog statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogStatistics {
    pub blog_url: String,
    pub title: String,

    /// How the crawl ended, if known
    pub status: Option<CrawlStatus>,

    /// Post count the API reported at bootstrap
    pub declared_total_posts: u64,

    /// Distinct posts held for the blog
    pub stored_posts: u64,

    /// Posts per type
    pub posts_by_type: BTreeMap<PostType, u64>,

    /// Distinct tags across all posts
    pub unique_tags: u64,

    /// Most used tags, most frequent first
    pub top_tags: Vec<(String, u64)>,
}

impl BlogStatistics {
    /// Statistics for a finished crawl
    ///
    /// Type counts come from the session counters, which count every
    /// classified record including ones later replaced by a duplicate id.
    pub fn from_report(report: &CrawlReport, top: usize) -> Self {
        Self {
            status: Some(report.status),
            posts_by_type: report.type_counters.clone(),
            unique_tags: report.tag_index.len() as u64,
            ..Self::from_blog(&report.blog, top)
        }
    }

    /// Statistics computed directly from a blog's stored posts
    pub fn from_blog(blog: &BlogDescriptor, top: usize) -> Self {
        let mut posts_by_type = BTreeMap::new();
        for post in blog.posts() {
            *posts_by_type.entry(post.post_type).or_insert(0) += 1;
        }

        let frequencies = tag_frequencies(blog);

        Self {
            blog_url: blog.url.clone(),
            title: blog.title.clone(),
            status: None,
            declared_total_posts: blog.declared_total_posts,
            stored_posts: blog.post_count() as u64,
            posts_by_type,
            unique_tags: frequencies.len() as u64,
            top_tags: frequencies.into_iter().take(top).collect(),
        }
    }
}

/// Tags with their number of posts, most frequent first, ties by name
pub fn tag_frequencies(blog: &BlogDescriptor) -> Vec<(String, u64)> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for post in blog.posts() {
        for tag in &post.tags {
            *counts.entry(tag.as_str()).or_insert(0) += 1;
        }
    }

    let mut frequencies: Vec<(String, u64)> = counts
        .into_iter()
        .map(|(tag, count)| (tag.to_string(), count))
        .collect();
    frequencies.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    frequencies
}

/// Loads statistics for a stored blog
///
/// # Arguments
///
/// * `storage` - The snapshot store to query
/// * `blog_url` - Normalised blog URL the snapshot was saved under
/// * `top` - Number of top tags to include
///
/// # Returns
///
/// * `Ok(Some(BlogStatistics))` - Statistics for the stored snapshot
/// * `Ok(None)` - Nothing stored for this blog
/// * `Err(TallyError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn SnapshotStore,
    blog_url: &str,
    top: usize,
) -> crate::Result<Option<BlogStatistics>> {
    let Some(info) = storage.snapshot_info(blog_url)? else {
        return Ok(None);
    };

    Ok(Some(BlogStatistics {
        blog_url: info.blog_url,
        title: info.title,
        status: Some(info.status),
        declared_total_posts: info.declared_total_posts,
        stored_posts: info.stored_posts,
        posts_by_type: storage.count_posts_by_type(blog_url)?,
        unique_tags: storage.count_unique_tags(blog_url)?,
        top_tags: storage.top_tags(blog_url, top)?,
    }))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &BlogStatistics) {
    println!("=== Blog Statistics ===\n");

    println!("Overview:");
    println!("  Blog: {}", stats.blog_url);
    if !stats.title.is_empty() {
        println!("  Title: {}", stats.title);
    }
    if let Some(status) = stats.status {
        println!("  Crawl status: {}", status);
    }
    println!("  Declared posts: {}", stats.declared_total_posts);
    println!("  Posts collected: {}", stats.stored_posts);
    println!("  Unique tags: {}", stats.unique_tags);
    println!();

    let total: u64 = stats.posts_by_type.values().sum();
    println!("Posts by Type:");
    for post_type in PostType::all() {
        let count = stats.posts_by_type.get(&post_type).copied().unwrap_or(0);
        if count == 0 && post_type == PostType::Unknown {
            continue;
        }
        let percentage = if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", post_type, count, percentage);
    }
    println!();

    if !stats.top_tags.is_empty() {
        println!("Top Tags ({}):", stats.top_tags.len());
        for (tag, count) in &stats.top_tags {
            println!("  #{}: {}", tag, count);
        }
        println!();
    }

    let coverage = if stats.declared_total_posts > 0 {
        (stats.stored_posts as f64 / stats.declared_total_posts as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Coverage: {:.1}% ({} / {} declared posts)",
        coverage, stats.stored_posts, stats.declared_total_posts
    );
}
