use crate::model::{ImageSize, PostType};
use serde::Deserialize;

/// Main configuration structure for Tumbl-Tally
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Remote API selection
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Query/parsing dialect
    pub mode: ApiMode,

    /// Consumer key sent with every JSON-mode query
    #[serde(rename = "api-key", default)]
    pub api_key: String,

    /// Overrides the API base URL (defaults depend on the mode)
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Read API dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    /// v2 JSON API, 20 posts per page
    Json,
    /// v1 XML read API, 50 posts per page
    Xml,
}

impl ApiMode {
    /// Number of posts the remote API returns per page in this mode
    pub fn page_size(&self) -> u32 {
        match self {
            Self::Json => 20,
            Self::Xml => 50,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }
}

/// Which posts the remote query requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostTypeFilter {
    #[default]
    All,
    Photo,
    Text,
    Quote,
    Link,
    Chat,
    Audio,
    Video,
    Answer,
}

impl PostTypeFilter {
    /// The post type this filter narrows to, or None for `All`
    pub fn post_type(&self) -> Option<PostType> {
        match self {
            Self::All => None,
            Self::Photo => Some(PostType::Photo),
            Self::Text => Some(PostType::Text),
            Self::Quote => Some(PostType::Quote),
            Self::Link => Some(PostType::Link),
            Self::Chat => Some(PostType::Chat),
            Self::Audio => Some(PostType::Audio),
            Self::Video => Some(PostType::Video),
            Self::Answer => Some(PostType::Answer),
        }
    }
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// First page offset to query
    #[serde(rename = "start-offset", default)]
    pub start_offset: u64,

    /// Upper bound on posts to crawl (0 = use the declared total)
    #[serde(rename = "max-posts", default)]
    pub max_posts: u64,

    #[serde(rename = "post-type", default)]
    pub post_type: PostTypeFilter,

    #[serde(rename = "image-size", default)]
    pub image_size: ImageSize,

    /// Number of pages fetched at once (1 = strictly sequential)
    #[serde(rename = "max-concurrent-pages", default = "default_concurrent_pages")]
    pub max_concurrent_pages: u32,
}

fn default_concurrent_pages() -> u32 {
    1
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_offset: 0,
            max_posts: 0,
            post_type: PostTypeFilter::All,
            image_size: ImageSize::Original,
            max_concurrent_pages: default_concurrent_pages(),
        }
    }
}

/// How requests identify themselves to the blog API
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// Page describing who runs this instance
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite snapshot database
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./tally.db".to_string(),
        }
    }
}
