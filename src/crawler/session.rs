//! Crawl session state
//!
//! A `CrawlSession` holds everything one crawl run mutates: the next offset,
//! the parsed count, the tag index and the per-type counters. All of it lives
//! behind one mutex, so a page's records are folded in a single critical
//! section and observers never see a half-applied page.
//!
//! Cancellation is a separate atomic flag, readable without the lock.

use crate::config::ApiMode;
use crate::model::{BlogDescriptor, PostRecord, PostType};
use crate::state::CrawlStatus;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle that requests cancellation of a running crawl
///
/// Cancellation is cooperative: the engine checks the flag before each page
/// (or window of pages) and stops before starting the next one.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Point-in-time view of a session's progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub status: CrawlStatus,
    /// Offset of the next page to request
    pub offset: u64,
    pub parsed_count: u64,
    pub total_target: u64,
    /// 0..=100
    pub percent_complete: u8,
    pub pages_fetched: u64,
    /// Posts that could not be classified
    pub skipped_posts: u64,
}

/// Records classified from one fetched page
#[derive(Debug, Clone, Default)]
pub struct PageOutcome {
    pub records: Vec<PostRecord>,
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    status: CrawlStatus,
    offset: u64,
    parsed_count: u64,
    percent_complete: u8,
    pages_fetched: u64,
    skipped_posts: u64,
    tag_index: BTreeSet<String>,
    type_counters: BTreeMap<PostType, u64>,
}

/// State of one crawl run against one blog
#[derive(Debug)]
pub struct CrawlSession {
    mode: ApiMode,
    page_size: u32,
    start_offset: u64,
    total_target: u64,
    cancel: CancelHandle,
    state: Mutex<SessionState>,
}

impl CrawlSession {
    /// Creates a session for a blog declaring `declared_total` posts
    ///
    /// The crawl covers offsets `start_offset..total_target`, where the target
    /// is the declared total capped by `max_posts` (0 means no cap).
    pub fn new(mode: ApiMode, declared_total: u64, start_offset: u64, max_posts: u64) -> Self {
        Self::with_cancel_handle(mode, declared_total, start_offset, max_posts, CancelHandle::new())
    }

    /// Like `new`, but observing an existing cancel handle
    pub fn with_cancel_handle(
        mode: ApiMode,
        declared_total: u64,
        start_offset: u64,
        max_posts: u64,
        cancel: CancelHandle,
    ) -> Self {
        let total_target = if max_posts > 0 {
            declared_total.min(max_posts)
        } else {
            declared_total
        };

        Self {
            mode,
            page_size: mode.page_size(),
            start_offset,
            total_target,
            cancel,
            state: Mutex::new(SessionState {
                offset: start_offset,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> ApiMode {
        self.mode
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    pub fn total_target(&self) -> u64 {
        self.total_target
    }

    /// Requests cancellation; safe to call from any thread
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn status(&self) -> CrawlStatus {
        self.lock().status
    }

    /// Moves to `status`; invalid transitions are logged and ignored
    pub(crate) fn set_status(&self, status: CrawlStatus) -> bool {
        let mut state = self.lock();
        if state.status == status {
            return true;
        }
        if !state.status.can_transition_to(status) {
            tracing::warn!(from = %state.status, to = %status, "ignoring invalid status transition");
            return false;
        }
        state.status = status;
        true
    }

    pub fn progress(&self) -> ProgressSnapshot {
        let state = self.lock();
        ProgressSnapshot {
            status: state.status,
            offset: state.offset,
            parsed_count: state.parsed_count,
            total_target: self.total_target,
            percent_complete: state.percent_complete,
            pages_fetched: state.pages_fetched,
            skipped_posts: state.skipped_posts,
        }
    }

    /// Every tag seen so far
    pub fn tag_index(&self) -> BTreeSet<String> {
        self.lock().tag_index.clone()
    }

    /// Posts seen so far, per type
    pub fn type_counters(&self) -> BTreeMap<PostType, u64> {
        self.lock().type_counters.clone()
    }

    /// Offsets of the next pages to request, at most `window` of them
    pub(crate) fn pending_offsets(&self, window: usize) -> Vec<u64> {
        let offset = self.lock().offset;
        let step = u64::from(self.page_size);

        (0..window as u64)
            .map(|i| offset + i * step)
            .take_while(|o| *o < self.total_target)
            .collect()
    }

    /// Folds one page into the session and the blog
    ///
    /// Runs as one critical section: tags, counters, stored posts, parsed
    /// count and offset all advance together.
    pub(crate) fn fold_page(&self, blog: &mut BlogDescriptor, page: PageOutcome) {
        let mut state = self.lock();

        let fetched = page.records.len() as u64;
        for record in page.records {
            state.tag_index.extend(record.tags.iter().cloned());
            *state.type_counters.entry(record.post_type).or_insert(0) += 1;
            blog.insert_post(record);
        }

        state.parsed_count = (state.parsed_count + fetched).min(self.total_target);
        state.percent_complete = percent(state.parsed_count, self.total_target);
        state.offset += u64::from(self.page_size);
        state.pages_fetched += 1;
        state.skipped_posts += page.skipped;
    }
}

fn percent(parsed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (parsed.min(total) * 100 / total) as u8
}
