/// Crawl status definitions
///
/// A session moves `Idle -> Crawling -> {Completed, UnableToDownload, InvalidSource}`.
/// Per-page progress is not exposed as a state, only these aggregate ones.
use std::fmt;

/// Aggregate status of one crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlStatus {
    /// Session created, no query issued yet
    #[default]
    Idle,

    /// Pagination loop running
    Crawling,

    // ===== Terminal States =====
    /// A page could not be fetched or was rejected; partial results kept
    UnableToDownload,

    /// Probe or bootstrap rejected the blog URL; no pages fetched
    InvalidSource,

    /// Loop finished (or was cancelled) without a page failure
    Completed,
}

impl CrawlStatus {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Idle | Self::Crawling)
    }

    /// Returns true if this represents a failed crawl
    pub fn is_error(&self) -> bool {
        matches!(self, Self::UnableToDownload | Self::InvalidSource)
    }

    /// Whether moving from `self` to `next` follows the state machine
    pub fn can_transition_to(&self, next: CrawlStatus) -> bool {
        match (self, next) {
            (Self::Idle, Self::Crawling) => true,
            (Self::Idle, Self::InvalidSource) => true,
            (Self::Crawling, next) => next.is_terminal() && next != Self::InvalidSource,
            _ => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Crawling => "crawling",
            Self::UnableToDownload => "unable_to_download",
            Self::InvalidSource => "invalid_source",
            Self::Completed => "completed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "crawling" => Some(Self::Crawling),
            "unable_to_download" => Some(Self::UnableToDownload),
            "invalid_source" => Some(Self::InvalidSource),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Idle,
            Self::Crawling,
            Self::UnableToDownload,
            Self::InvalidSource,
            Self::Completed,
        ]
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
