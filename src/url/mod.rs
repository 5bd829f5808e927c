//! URL handling module for Tumbl-Tally
//!
//! This module provides blog URL normalization, domain extraction, and the
//! pure query-URL builder for both API dialects.

mod domain;
mod normalize;
mod query;

pub use domain::extract_domain;
pub use normalize::{display_blog_url, normalize_blog_url};
pub use query::{build_probe_url, build_query_url, DEFAULT_JSON_ENDPOINT};
