//! State module for tracking crawl progress
//!
//! - `CrawlStatus`: the aggregate state machine of one crawl session

mod crawl_status;

pub use crawl_status::CrawlStatus;
