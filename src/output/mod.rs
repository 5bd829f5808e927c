//! Output module for blog statistics
//!
//! This module handles:
//! - Computing per-type post counts and tag frequencies
//! - Reading the same statistics back from a stored snapshot
//! - Rendering them to the console

pub mod stats;

pub use stats::{
    load_statistics, print_statistics, tag_frequencies, BlogStatistics, DEFAULT_TOP_TAGS,
};
