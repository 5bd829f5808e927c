//! Crawl engine - bootstrap and pagination loop
//!
//! The engine resolves a blog through a one-post probe query, then pages
//! through `start_offset..total_target`, classifying every post and folding
//! each page into the session and the blog descriptor.
//!
//! With `max_concurrent_pages > 1` a window of consecutive pages is fetched
//! and classified concurrently. Pages are still folded one at a time in
//! ascending offset order, and a failed page ends the crawl before any later
//! page of its window is folded.

use crate::config::{ApiConfig, ApiMode, Config, CrawlConfig};
use crate::crawler::classifier::classify_post;
use crate::crawler::fetcher::{DocumentFetcher, HttpFetcher};
use crate::crawler::parser::{parse_response, ResponseEnvelope};
use crate::crawler::session::{CancelHandle, CrawlSession, PageOutcome};
use crate::model::{local_time_from_epoch, BlogDescriptor, ImageSize};
use crate::state::CrawlStatus;
use crate::url::{build_probe_url, build_query_url, display_blog_url, extract_domain, normalize_blog_url};
use crate::TallyError;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Drives bootstrap and crawl runs against one remote API
pub struct CrawlEngine {
    fetcher: Arc<dyn DocumentFetcher>,
    api: ApiConfig,
    options: CrawlConfig,
}

impl CrawlEngine {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, api: ApiConfig, options: CrawlConfig) -> Self {
        Self {
            fetcher,
            api,
            options,
        }
    }

    /// Builds an engine backed by the reqwest fetcher
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let fetcher = HttpFetcher::new(&config.user_agent)?;
        Ok(Self::new(
            Arc::new(fetcher),
            config.api.clone(),
            config.crawl.clone(),
        ))
    }

    pub fn mode(&self) -> ApiMode {
        self.api.mode
    }

    pub fn options(&self) -> &CrawlConfig {
        &self.options
    }

    /// Returns true if the blog answers a one-post query with a valid document
    pub async fn probe(&self, blog_url: &str) -> bool {
        match self.resolve(blog_url).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Probe failed for {}: {}", blog_url, e);
                false
            }
        }
    }

    /// Resolves a blog and fills its descriptor from the probe response
    ///
    /// Any failure (bad URL, transport, rejected document) is reported as
    /// `SourceInvalid`. No post pages are fetched here.
    pub async fn bootstrap(&self, blog_url: &str) -> crate::Result<BlogDescriptor> {
        let invalid = |reason: String| TallyError::SourceInvalid {
            url: blog_url.to_string(),
            reason,
        };

        let (url, envelope) = self.resolve(blog_url).await.map_err(|e| invalid(e.to_string()))?;

        let info = envelope
            .blog
            .as_ref()
            .ok_or_else(|| invalid("response carries no blog metadata".to_string()))?;

        let mut blog = BlogDescriptor::new(url);
        blog.name = info.name.clone();
        blog.title = info.title.clone();
        blog.description = info.description.clone();
        blog.is_adult_content = info.is_nsfw;
        blog.asks_enabled = info.ask;
        blog.anonymous_asks_enabled = info.ask_anon;
        blog.last_updated = info.updated.map(local_time_from_epoch);
        blog.blog_total_posts = info.posts;
        blog.declared_total_posts = envelope.declared_total();

        tracing::info!(
            "Resolved blog {} ({}): {} posts declared",
            blog.url,
            blog.title,
            blog.declared_total_posts
        );

        Ok(blog)
    }

    /// Creates a fresh session sized for `blog`
    pub fn new_session(&self, blog: &BlogDescriptor) -> CrawlSession {
        self.new_session_with(blog, CancelHandle::new())
    }

    /// Creates a fresh session that observes an existing cancel handle
    pub fn new_session_with(&self, blog: &BlogDescriptor, cancel: CancelHandle) -> CrawlSession {
        CrawlSession::with_cancel_handle(
            self.api.mode,
            blog.declared_total_posts,
            self.options.start_offset,
            self.options.max_posts,
            cancel,
        )
    }

    /// Runs the pagination loop to a terminal status
    ///
    /// Records are added to `blog`; tags and per-type counters accumulate in
    /// the session. A session runs once: calling this on a session that has
    /// already left `Idle` returns its current status without fetching.
    pub async fn run(&self, session: &CrawlSession, blog: &mut BlogDescriptor) -> CrawlStatus {
        if session.status() != CrawlStatus::Idle {
            tracing::warn!("Session already in state {}, not running again", session.status());
            return session.status();
        }

        let domain = match normalize_blog_url(&blog.url)
            .ok()
            .and_then(|url| extract_domain(&url))
        {
            Some(domain) => domain,
            None => {
                tracing::warn!("Cannot derive a blog domain from {}", blog.url);
                session.set_status(CrawlStatus::InvalidSource);
                return CrawlStatus::InvalidSource;
            }
        };

        session.set_status(CrawlStatus::Crawling);

        if session.total_target() == 0 {
            tracing::warn!("{} declares no posts, nothing to crawl", blog.url);
        } else {
            tracing::info!(
                "Crawling {} from offset {} to {} ({} posts per page)",
                blog.url,
                session.start_offset(),
                session.total_target(),
                session.page_size()
            );
        }

        let window = self.options.max_concurrent_pages.max(1) as usize;

        loop {
            if session.is_cancelled() {
                tracing::info!("Crawl of {} cancelled", blog.url);
                break;
            }

            let offsets = session.pending_offsets(window);
            if offsets.is_empty() {
                break;
            }

            for (offset, outcome) in self.fetch_window(&domain, &offsets).await {
                match outcome {
                    Ok(page) => {
                        tracing::debug!(
                            "Page at offset {}: {} posts, {} skipped",
                            offset,
                            page.records.len(),
                            page.skipped
                        );
                        session.fold_page(blog, page);
                    }
                    Err(e) => {
                        tracing::warn!("Page at offset {} failed: {}", offset, e);
                        session.set_status(CrawlStatus::UnableToDownload);
                        return CrawlStatus::UnableToDownload;
                    }
                }
            }

            let progress = session.progress();
            tracing::info!(
                "Progress: {}/{} posts ({}%)",
                progress.parsed_count,
                progress.total_target,
                progress.percent_complete
            );
        }

        session.set_status(CrawlStatus::Completed);
        CrawlStatus::Completed
    }

    /// Normalises the blog URL and fetches the probe document
    async fn resolve(&self, blog_url: &str) -> Result<(String, ResponseEnvelope), TallyError> {
        let url = normalize_blog_url(blog_url)?;
        let domain = extract_domain(&url).ok_or(crate::UrlError::MissingDomain)?;
        let query = build_probe_url(&self.api, &domain, self.options.post_type)?;

        let body = self.fetcher.fetch(query.as_str()).await.into_body(query.as_str())?;
        let envelope = parse_response(&body, self.api.mode)?;

        Ok((display_blog_url(&url), envelope))
    }

    /// Fetches and classifies the pages at `offsets`
    ///
    /// Results come back in ascending offset order regardless of completion
    /// order.
    async fn fetch_window(
        &self,
        domain: &str,
        offsets: &[u64],
    ) -> Vec<(u64, Result<PageOutcome, TallyError>)> {
        let mode = self.api.mode;
        let image_size = self.options.image_size;
        let limit = mode.page_size();

        let mut queries = Vec::with_capacity(offsets.len());
        for &offset in offsets {
            let query = build_query_url(&self.api, domain, self.options.post_type, offset, limit)
                .map(|url| url.to_string())
                .map_err(TallyError::from);
            queries.push((offset, query));
        }

        if let [(offset, query)] = queries.as_slice() {
            let outcome = match query {
                Ok(query) => fetch_page(self.fetcher.as_ref(), query, mode, image_size).await,
                Err(e) => Err(TallyError::FetchFailed {
                    url: domain.to_string(),
                    message: e.to_string(),
                }),
            };
            return vec![(*offset, outcome)];
        }

        let mut slots: Vec<Option<Result<PageOutcome, TallyError>>> =
            (0..queries.len()).map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (index, (_, query)) in queries.iter().enumerate() {
            match query {
                Ok(query) => {
                    let fetcher = Arc::clone(&self.fetcher);
                    let query = query.clone();
                    tasks.spawn(async move {
                        (index, fetch_page(fetcher.as_ref(), &query, mode, image_size).await)
                    });
                }
                Err(e) => {
                    slots[index] = Some(Err(TallyError::FetchFailed {
                        url: domain.to_string(),
                        message: e.to_string(),
                    }));
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => tracing::error!("Page task failed: {}", e),
            }
        }

        queries
            .into_iter()
            .zip(slots)
            .map(|((offset, _), slot)| {
                let outcome = slot.unwrap_or_else(|| {
                    Err(TallyError::FetchFailed {
                        url: domain.to_string(),
                        message: format!("page task at offset {} did not finish", offset),
                    })
                });
                (offset, outcome)
            })
            .collect()
    }
}

/// Fetches, validates and classifies one page
///
/// Posts that fail classification are counted and skipped; the page itself
/// still succeeds.
async fn fetch_page(
    fetcher: &dyn DocumentFetcher,
    query: &str,
    mode: ApiMode,
    image_size: ImageSize,
) -> Result<PageOutcome, TallyError> {
    let body = fetcher.fetch(query).await.into_body(query)?;
    let envelope = parse_response(&body, mode)?;

    let mut outcome = PageOutcome::default();
    for raw in &envelope.posts {
        match classify_post(raw, image_size) {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                tracing::debug!("{}", TallyError::ClassificationSkipped(e));
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PostTypeFilter;
    use crate::crawler::fetcher::FetchResult;
    use crate::model::PostType;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers from a script keyed by the `offset`/`limit` query pairs
    #[derive(Default)]
    struct ScriptedFetcher {
        pages: Mutex<HashMap<(u64, u32), FetchResult>>,
        calls: AtomicUsize,
        requested: Mutex<Vec<u64>>,
        cancel_after: Mutex<Option<(usize, CancelHandle)>>,
    }

    impl ScriptedFetcher {
        fn with_page(self, offset: u64, limit: u32, result: FetchResult) -> Self {
            self.pages
                .lock()
                .unwrap()
                .insert((offset, limit), result);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> FetchResult {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            let parsed = url::Url::parse(url).unwrap();
            let pairs: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
            let offset: u64 = pairs["offset"].parse().unwrap();
            let limit: u32 = pairs["limit"].parse().unwrap();
            if limit > 1 {
                self.requested.lock().unwrap().push(offset);
            }

            if let Some((after, handle)) = self.cancel_after.lock().unwrap().as_ref() {
                if n >= *after {
                    handle.cancel();
                }
            }

            self.pages
                .lock()
                .unwrap()
                .get(&(offset, limit))
                .cloned()
                .unwrap_or(FetchResult::HttpError { status_code: 404 })
        }
    }

    fn ok(body: String) -> FetchResult {
        FetchResult::Success {
            status_code: 200,
            body,
        }
    }

    fn json_page(total: u64, ids: std::ops::Range<u64>, post_type: &str) -> String {
        let posts: Vec<serde_json::Value> = ids
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "type": post_type,
                    "timestamp": 1_400_000_000 + id,
                    "tags": [format!("tag{}", id % 3)]
                })
            })
            .collect();

        serde_json::json!({
            "meta": {"status": 200, "msg": "OK"},
            "response": {
                "blog": {"name": "demo", "title": "Demo", "posts": total, "ask": true},
                "posts": posts,
                "total_posts": total
            }
        })
        .to_string()
    }

    fn engine(fetcher: Arc<ScriptedFetcher>, options: CrawlConfig) -> CrawlEngine {
        let api = ApiConfig {
            mode: ApiMode::Json,
            api_key: "KEY".to_string(),
            endpoint: Some("http://api.test".to_string()),
        };
        CrawlEngine::new(fetcher, api, options)
    }

    fn three_page_fetcher() -> ScriptedFetcher {
        ScriptedFetcher::default()
            .with_page(0, 1, ok(json_page(45, 0..1, "text")))
            .with_page(0, 20, ok(json_page(45, 0..20, "text")))
            .with_page(20, 20, ok(json_page(45, 20..40, "photo")))
            .with_page(40, 20, ok(json_page(45, 40..45, "quote")))
    }

    #[tokio::test]
    async fn test_bootstrap_fills_descriptor() {
        let fetcher = Arc::new(three_page_fetcher());
        let engine = engine(fetcher.clone(), CrawlConfig::default());

        let blog = engine.bootstrap("demo.example.com").await.unwrap();

        assert_eq!(blog.url, "https://demo.example.com");
        assert_eq!(blog.name, "demo");
        assert!(blog.asks_enabled);
        assert_eq!(blog.declared_total_posts, 45);
        assert_eq!(blog.post_count(), 0);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_unknown_blog() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let engine = engine(fetcher.clone(), CrawlConfig::default());

        let result = engine.bootstrap("missing.example.com").await;
        assert!(matches!(result, Err(TallyError::SourceInvalid { .. })));
        assert!(!engine.probe("missing.example.com").await);
    }

    #[tokio::test]
    async fn test_full_crawl_sequential() {
        let fetcher = Arc::new(three_page_fetcher());
        let engine = engine(fetcher.clone(), CrawlConfig::default());

        let mut blog = engine.bootstrap("demo.example.com").await.unwrap();
        let session = engine.new_session(&blog);
        let status = engine.run(&session, &mut blog).await;

        assert_eq!(status, CrawlStatus::Completed);
        assert_eq!(blog.post_count(), 45);
        assert_eq!(*fetcher.requested.lock().unwrap(), vec![0, 20, 40]);

        let progress = session.progress();
        assert_eq!(progress.parsed_count, 45);
        assert_eq!(progress.percent_complete, 100);
        assert_eq!(progress.pages_fetched, 3);

        let counters = session.type_counters();
        assert_eq!(counters.get(&PostType::Text), Some(&20));
        assert_eq!(counters.get(&PostType::Photo), Some(&20));
        assert_eq!(counters.get(&PostType::Quote), Some(&5));
        assert_eq!(session.tag_index().len(), 3);
    }

    #[tokio::test]
    async fn test_full_crawl_concurrent_matches_sequential() {
        let fetcher = Arc::new(three_page_fetcher());
        let options = CrawlConfig {
            max_concurrent_pages: 4,
            ..Default::default()
        };
        let engine = engine(fetcher.clone(), options);

        let mut blog = engine.bootstrap("demo.example.com").await.unwrap();
        let session = engine.new_session(&blog);
        let status = engine.run(&session, &mut blog).await;

        assert_eq!(status, CrawlStatus::Completed);
        assert_eq!(blog.post_count(), 45);
        assert_eq!(session.progress().offset, 60);
        assert_eq!(session.type_counters().values().sum::<u64>(), 45);
    }

    #[tokio::test]
    async fn test_zero_declared_total_completes_without_pages() {
        let fetcher = Arc::new(
            ScriptedFetcher::default().with_page(0, 1, ok(json_page(0, 0..0, "text"))),
        );
        let engine = engine(fetcher.clone(), CrawlConfig::default());

        let mut blog = engine.bootstrap("demo.example.com").await.unwrap();
        let session = engine.new_session(&blog);
        let status = engine.run(&session, &mut blog).await;

        assert_eq!(status, CrawlStatus::Completed);
        assert_eq!(session.progress().percent_complete, 0);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_mid_crawl_keeps_partial_results() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .with_page(0, 1, ok(json_page(45, 0..1, "text")))
                .with_page(0, 20, ok(json_page(45, 0..20, "text")))
                .with_page(20, 20, FetchResult::HttpError { status_code: 500 })
                .with_page(40, 20, ok(json_page(45, 40..45, "text"))),
        );
        let engine = engine(fetcher.clone(), CrawlConfig::default());

        let mut blog = engine.bootstrap("demo.example.com").await.unwrap();
        let session = engine.new_session(&blog);
        let status = engine.run(&session, &mut blog).await;

        assert_eq!(status, CrawlStatus::UnableToDownload);
        assert_eq!(blog.post_count(), 20);
        assert_eq!(session.progress().parsed_count, 20);
        assert_eq!(*fetcher.requested.lock().unwrap(), vec![0, 20]);
    }

    #[tokio::test]
    async fn test_failure_in_window_stops_later_pages() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .with_page(0, 1, ok(json_page(45, 0..1, "text")))
                .with_page(0, 20, ok(json_page(45, 0..20, "text")))
                .with_page(20, 20, ok("<html>maintenance</html>".to_string()))
                .with_page(40, 20, ok(json_page(45, 40..45, "text"))),
        );
        let options = CrawlConfig {
            max_concurrent_pages: 3,
            ..Default::default()
        };
        let engine = engine(fetcher.clone(), options);

        let mut blog = engine.bootstrap("demo.example.com").await.unwrap();
        let session = engine.new_session(&blog);
        let status = engine.run(&session, &mut blog).await;

        assert_eq!(status, CrawlStatus::UnableToDownload);
        // Page at 40 was fetched but never folded
        assert_eq!(blog.post_count(), 20);
        assert_eq!(session.progress().offset, 20);
    }

    #[tokio::test]
    async fn test_cancel_during_second_page() {
        let fetcher = Arc::new(three_page_fetcher());
        let engine = engine(fetcher.clone(), CrawlConfig::default());

        let mut blog = engine.bootstrap("demo.example.com").await.unwrap();
        let session = engine.new_session(&blog);
        // Probe is call 1, page 0 is call 2, page 20 is call 3
        *fetcher.cancel_after.lock().unwrap() = Some((3, session.cancel_handle()));

        let status = engine.run(&session, &mut blog).await;

        assert_eq!(status, CrawlStatus::Completed);
        assert_eq!(blog.post_count(), 40);
        assert_eq!(*fetcher.requested.lock().unwrap(), vec![0, 20]);
        assert!(session.progress().percent_complete < 100);
    }

    #[tokio::test]
    async fn test_cancel_before_run_fetches_nothing() {
        let fetcher = Arc::new(three_page_fetcher());
        let engine = engine(fetcher.clone(), CrawlConfig::default());

        let mut blog = engine.bootstrap("demo.example.com").await.unwrap();
        let session = engine.new_session(&blog);
        session.cancel();

        let status = engine.run(&session, &mut blog).await;
        assert_eq!(status, CrawlStatus::Completed);
        assert_eq!(blog.post_count(), 0);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_page_does_not_stall() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .with_page(0, 1, ok(json_page(40, 0..1, "text")))
                .with_page(0, 20, ok(json_page(40, 0..0, "text")))
                .with_page(20, 20, ok(json_page(40, 20..40, "text"))),
        );
        let engine = engine(fetcher.clone(), CrawlConfig::default());

        let mut blog = engine.bootstrap("demo.example.com").await.unwrap();
        let session = engine.new_session(&blog);
        let status = engine.run(&session, &mut blog).await;

        assert_eq!(status, CrawlStatus::Completed);
        assert_eq!(blog.post_count(), 20);
        assert_eq!(session.progress().percent_complete, 50);
    }

    #[tokio::test]
    async fn test_unclassifiable_post_is_skipped() {
        let mut page: serde_json::Value =
            serde_json::from_str(&json_page(20, 0..20, "text")).unwrap();
        page["response"]["posts"][3] = serde_json::json!({"type": "text", "tags": ["lost"]});

        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .with_page(0, 1, ok(json_page(20, 0..1, "text")))
                .with_page(0, 20, ok(page.to_string())),
        );
        let engine = engine(fetcher.clone(), CrawlConfig::default());

        let mut blog = engine.bootstrap("demo.example.com").await.unwrap();
        let session = engine.new_session(&blog);
        let status = engine.run(&session, &mut blog).await;

        assert_eq!(status, CrawlStatus::Completed);
        assert_eq!(blog.post_count(), 19);
        let progress = session.progress();
        assert_eq!(progress.skipped_posts, 1);
        assert_eq!(progress.parsed_count, 19);
        assert!(!session.tag_index().contains("lost"));
    }

    #[tokio::test]
    async fn test_max_posts_and_start_offset() {
        let fetcher = Arc::new(three_page_fetcher());
        let options = CrawlConfig {
            start_offset: 20,
            max_posts: 40,
            ..Default::default()
        };
        let engine = engine(fetcher.clone(), options);

        let mut blog = engine.bootstrap("demo.example.com").await.unwrap();
        let session = engine.new_session(&blog);
        engine.run(&session, &mut blog).await;

        assert_eq!(*fetcher.requested.lock().unwrap(), vec![20]);
        assert_eq!(blog.post_count(), 20);
    }

    #[tokio::test]
    async fn test_session_runs_once() {
        let fetcher = Arc::new(three_page_fetcher());
        let engine = engine(fetcher.clone(), CrawlConfig::default());

        let mut blog = engine.bootstrap("demo.example.com").await.unwrap();
        let session = engine.new_session(&blog);
        engine.run(&session, &mut blog).await;
        let calls = fetcher.calls();

        assert_eq!(engine.run(&session, &mut blog).await, CrawlStatus::Completed);
        assert_eq!(fetcher.calls(), calls);
    }

    #[tokio::test]
    async fn test_photo_filter_in_queries() {
        #[derive(Default)]
        struct Recorder(Mutex<Vec<String>>);

        #[async_trait]
        impl DocumentFetcher for Recorder {
            async fn fetch(&self, url: &str) -> FetchResult {
                self.0.lock().unwrap().push(url.to_string());
                FetchResult::HttpError { status_code: 404 }
            }
        }

        let recorder = Arc::new(Recorder::default());
        let api = ApiConfig {
            mode: ApiMode::Json,
            api_key: "KEY".to_string(),
            endpoint: Some("http://api.test".to_string()),
        };
        let options = CrawlConfig {
            post_type: PostTypeFilter::Photo,
            ..Default::default()
        };
        let engine = CrawlEngine::new(recorder.clone(), api, options);

        assert!(!engine.probe("demo.example.com").await);
        let urls = recorder.0.lock().unwrap();
        assert!(urls[0].contains("/posts/photo?"));
    }
}
