//! Response parser for both API dialects
//!
//! Turns one fetched document into a validated `ResponseEnvelope`:
//! - JSON (v2): accepted only when `meta.status` is 200
//! - XML (v1): accepted when the markup has a `<tumblr>` root
//!
//! Any rejection is a `ParseError`; callers treat it exactly like a page that
//! could not be downloaded. Individual posts are kept raw here and typed later
//! by the classifier, so one odd post cannot reject a whole page.

use crate::config::ApiMode;
use scraper::{ElementRef, Html, Selector};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

/// Status code the JSON API uses for an accepted request
pub const API_STATUS_OK: u64 = 200;

/// Reasons a fetched document is rejected
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty document")]
    Empty,

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("API status {status}: {message}")]
    StatusNotOk { status: u64, message: String },

    #[error("required field missing: {0}")]
    MissingField(&'static str),

    #[error("no <tumblr> root element")]
    UnrecognizedRoot,
}

/// Blog metadata carried by a response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlogInfo {
    pub name: String,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    /// Post count on the blog object
    pub posts: Option<u64>,
    /// Last update as a Unix timestamp
    pub updated: Option<i64>,
    pub is_nsfw: bool,
    pub ask: bool,
    pub ask_anon: bool,
}

/// One post as delivered by the API, not yet classified
#[derive(Debug, Clone, PartialEq)]
pub enum RawPost {
    Json(serde_json::Value),
    Xml(XmlPost),
}

/// Fields lifted from one `<post>` element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlPost {
    pub id: Option<String>,
    pub post_type: Option<String>,
    pub unix_timestamp: Option<i64>,
    pub tags: Vec<String>,
    pub photos: Vec<XmlPhoto>,
}

/// One photo of an XML photo post; `sizes` holds `(max-width, url)` pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlPhoto {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sizes: Vec<(u32, String)>,
}

/// Validated wrapper around one fetched document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseEnvelope {
    pub blog: Option<BlogInfo>,
    /// Top-level total post count, when the API sends one
    pub total_posts: Option<u64>,
    pub posts: Vec<RawPost>,
}

impl ResponseEnvelope {
    /// Declared total: the top-level count, else the blog object's count, else 0
    pub fn declared_total(&self) -> u64 {
        self.total_posts
            .or_else(|| self.blog.as_ref().and_then(|b| b.posts))
            .unwrap_or(0)
    }
}

/// Parses a fetched document in the dialect of `mode`
pub fn parse_response(body: &str, mode: ApiMode) -> Result<ResponseEnvelope, ParseError> {
    if body.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    match mode {
        ApiMode::Json => parse_json(body),
        ApiMode::Xml => parse_xml(body),
    }
}

// ===== JSON (v2) =====

#[derive(Deserialize)]
struct JsonDocument {
    meta: JsonMeta,
    #[serde(default)]
    response: serde_json::Value,
}

#[derive(Deserialize)]
struct JsonMeta {
    #[serde(deserialize_with = "lenient_u64")]
    status: u64,
    #[serde(default)]
    msg: String,
}

#[derive(Deserialize)]
struct JsonResponse {
    #[serde(default)]
    blog: Option<JsonBlog>,
    #[serde(default)]
    posts: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    total_posts: Option<u64>,
}

#[derive(Deserialize)]
struct JsonBlog {
    #[serde(default)]
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    posts: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    updated: Option<i64>,
    #[serde(default)]
    is_nsfw: bool,
    #[serde(default)]
    ask: bool,
    #[serde(default)]
    ask_anon: bool,
}

fn parse_json(body: &str) -> Result<ResponseEnvelope, ParseError> {
    let document: JsonDocument =
        serde_json::from_str(body).map_err(|e| ParseError::Malformed(e.to_string()))?;

    if document.meta.status != API_STATUS_OK {
        return Err(ParseError::StatusNotOk {
            status: document.meta.status,
            message: document.meta.msg,
        });
    }

    if document.response.is_null() {
        return Err(ParseError::MissingField("response"));
    }

    let response: JsonResponse = serde_json::from_value(document.response)
        .map_err(|e| ParseError::Malformed(format!("response: {}", e)))?;

    let blog = response.blog.map(|b| BlogInfo {
        name: b.name,
        title: b.title,
        description: b.description,
        url: b.url,
        posts: b.posts,
        updated: b.updated,
        is_nsfw: b.is_nsfw,
        ask: b.ask,
        ask_anon: b.ask_anon,
    });

    Ok(ResponseEnvelope {
        blog,
        total_posts: response.total_posts,
        posts: response.posts.into_iter().map(RawPost::Json).collect(),
    })
}

/// Numbers that the API sometimes sends as strings
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl NumberOrString {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Unsigned(n) => i64::try_from(*n).ok(),
            Self::Signed(n) => Some(*n),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            other => other.as_i64().and_then(|n| u64::try_from(n).ok()),
        }
    }
}

pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = NumberOrString::deserialize(deserializer)?;
    value
        .as_u64()
        .ok_or_else(|| de::Error::custom("expected an unsigned integer"))
}

pub(crate) fn lenient_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<NumberOrString>::deserialize(deserializer)?.and_then(|v| v.as_u64()))
}

pub(crate) fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<NumberOrString>::deserialize(deserializer)?.and_then(|v| v.as_i64()))
}

// ===== XML (v1) =====

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Malformed(format!("selector {}: {:?}", css, e)))
}

fn parse_xml(body: &str) -> Result<ResponseEnvelope, ParseError> {
    if !body.trim_start().starts_with('<') {
        return Err(ParseError::Malformed("not a markup document".to_string()));
    }

    let document = Html::parse_document(body);

    let root = document
        .select(&selector("tumblr")?)
        .next()
        .ok_or(ParseError::UnrecognizedRoot)?;

    let blog = root
        .select(&selector("tumblelog")?)
        .next()
        .map(|tumblelog| BlogInfo {
            name: attr_string(tumblelog, "name"),
            title: attr_string(tumblelog, "title"),
            description: own_text(tumblelog),
            url: tumblelog
                .value()
                .attr("cname")
                .map(|cname| format!("https://{}", cname)),
            ..Default::default()
        });

    let total_posts = root
        .select(&selector("posts")?)
        .next()
        .and_then(|posts| attr_parse::<u64>(posts, "total"));

    let post_selector = selector("posts post")?;
    let tag_selector = selector("tag")?;
    let photoset_selector = selector("photoset photo")?;
    let photo_url_selector = selector("photo-url")?;

    let posts = root
        .select(&post_selector)
        .map(|post| {
            let tags = post
                .select(&tag_selector)
                .map(|t| t.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();

            let photoset: Vec<XmlPhoto> = post
                .select(&photoset_selector)
                .map(|photo| XmlPhoto {
                    width: attr_parse(photo, "width"),
                    height: attr_parse(photo, "height"),
                    sizes: photo_sizes(photo, &photo_url_selector),
                })
                .collect();

            let photos = if !photoset.is_empty() {
                photoset
            } else {
                let sizes = photo_sizes(post, &photo_url_selector);
                if sizes.is_empty() {
                    Vec::new()
                } else {
                    vec![XmlPhoto {
                        width: attr_parse(post, "width"),
                        height: attr_parse(post, "height"),
                        sizes,
                    }]
                }
            };

            RawPost::Xml(XmlPost {
                id: post.value().attr("id").map(str::to_string),
                post_type: post.value().attr("type").map(str::to_string),
                unix_timestamp: attr_parse(post, "unix-timestamp"),
                tags,
                photos,
            })
        })
        .collect();

    Ok(ResponseEnvelope {
        blog,
        total_posts,
        posts,
    })
}

fn photo_sizes(element: ElementRef<'_>, photo_url_selector: &Selector) -> Vec<(u32, String)> {
    element
        .select(photo_url_selector)
        .filter_map(|el| {
            let max_width = attr_parse::<u32>(el, "max-width")?;
            let url = el.text().collect::<String>().trim().to_string();
            (!url.is_empty()).then_some((max_width, url))
        })
        .collect()
}

fn attr_string(element: ElementRef<'_>, name: &str) -> String {
    element.value().attr(name).unwrap_or_default().to_string()
}

fn attr_parse<T: std::str::FromStr>(element: ElementRef<'_>, name: &str) -> Option<T> {
    element.value().attr(name)?.trim().parse().ok()
}

/// Text nodes directly under an element, ignoring nested elements
fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
        .collect::<String>()
        .trim()
        .to_string()
}
