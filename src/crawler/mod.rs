//! Crawler module for blog post-history walks
//!
//! This module contains the core crawling logic, including:
//! - Fetching query documents over HTTP
//! - Validating JSON and XML responses
//! - Classifying posts into typed records
//! - Paging through the history and aggregating tags and type counts

mod classifier;
mod engine;
mod fetcher;
mod parser;
mod session;

pub use classifier::{classify_post, ClassifyError};
pub use engine::CrawlEngine;
pub use fetcher::{build_http_client, DocumentFetcher, FetchResult, HttpFetcher};
pub use parser::{parse_response, BlogInfo, ParseError, RawPost, ResponseEnvelope, XmlPhoto, XmlPost};
pub use session::{CancelHandle, CrawlSession, PageOutcome, ProgressSnapshot};

use crate::model::{BlogDescriptor, PostType};
use crate::state::CrawlStatus;
use crate::url::{display_blog_url, normalize_blog_url};
use std::collections::{BTreeMap, BTreeSet};

/// Everything one crawl produced
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub blog: BlogDescriptor,
    pub status: CrawlStatus,
    pub progress: ProgressSnapshot,
    pub tag_index: BTreeSet<String>,
    pub type_counters: BTreeMap<PostType, u64>,
}

impl CrawlReport {
    fn from_session(blog: BlogDescriptor, session: &CrawlSession) -> Self {
        Self {
            status: session.status(),
            progress: session.progress(),
            tag_index: session.tag_index(),
            type_counters: session.type_counters(),
            blog,
        }
    }
}

/// Resolves a blog and crawls it to a terminal status
///
/// This is the main entry point for a crawl. It will:
/// 1. Bootstrap the blog descriptor from a one-post probe
/// 2. Page through the post history
/// 3. Collect the session's aggregates into a report
///
/// A blog that fails the probe yields `InvalidSource` and no page fetches.
/// Cancelling `cancel` stops the crawl at the next page boundary; the report
/// then holds the partial results.
pub async fn crawl(engine: &CrawlEngine, blog_url: &str, cancel: CancelHandle) -> CrawlReport {
    match engine.bootstrap(blog_url).await {
        Ok(mut blog) => {
            let session = engine.new_session_with(&blog, cancel);
            engine.run(&session, &mut blog).await;
            CrawlReport::from_session(blog, &session)
        }
        Err(e) => {
            tracing::warn!("{}", e);
            let url = normalize_blog_url(blog_url)
                .map(|url| display_blog_url(&url))
                .unwrap_or_else(|_| blog_url.trim().to_string());
            let blog = BlogDescriptor::new(url);
            let session = engine.new_session_with(&blog, cancel);
            session.set_status(CrawlStatus::InvalidSource);
            CrawlReport::from_session(blog, &session)
        }
    }
}
