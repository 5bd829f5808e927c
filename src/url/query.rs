use crate::config::{ApiConfig, ApiMode, PostTypeFilter};
use crate::model::PostType;
use crate::UrlError;
use url::Url;

/// Default base of the v2 JSON API
pub const DEFAULT_JSON_ENDPOINT: &str = "https://api.tumblr.com";

/// Builds the query URL for one page of posts
///
/// Pure and deterministic: the same inputs always produce the same URL.
///
/// | Mode | Shape |
/// |------|-------|
/// | Json | `{endpoint}/v2/blog/{domain}/posts[/{type}]?api_key=..&offset=..&limit=..` |
/// | Xml  | `{endpoint or https://domain}/api/read?start=..&num=..[&type=..]` |
///
/// # Arguments
///
/// * `api` - Mode, key, and optional endpoint override
/// * `domain` - Blog host, e.g. `staff.example.com`
/// * `filter` - Post type narrowing
/// * `offset` - Index of the first post on the page
/// * `limit` - Posts per page
pub fn build_query_url(
    api: &ApiConfig,
    domain: &str,
    filter: PostTypeFilter,
    offset: u64,
    limit: u32,
) -> Result<Url, UrlError> {
    match api.mode {
        ApiMode::Json => {
            let base = api.endpoint.as_deref().unwrap_or(DEFAULT_JSON_ENDPOINT);
            let mut url = Url::parse(base).map_err(|e| UrlError::Parse(e.to_string()))?;
            {
                let mut segments = url
                    .path_segments_mut()
                    .map_err(|_| UrlError::Malformed(format!("cannot extend {}", base)))?;
                segments.pop_if_empty().extend(["v2", "blog", domain, "posts"]);
                if let Some(post_type) = filter.post_type() {
                    segments.push(json_type_name(post_type));
                }
            }
            url.query_pairs_mut()
                .clear()
                .append_pair("api_key", &api.api_key)
                .append_pair("offset", &offset.to_string())
                .append_pair("limit", &limit.to_string());
            Ok(url)
        }
        ApiMode::Xml => {
            let base = match &api.endpoint {
                Some(endpoint) => endpoint.clone(),
                None => format!("https://{}", domain),
            };
            let mut url = Url::parse(&base).map_err(|e| UrlError::Parse(e.to_string()))?;
            url.path_segments_mut()
                .map_err(|_| UrlError::Malformed(format!("cannot extend {}", base)))?
                .pop_if_empty()
                .extend(["api", "read"]);
            {
                let mut query = url.query_pairs_mut();
                query
                    .clear()
                    .append_pair("start", &offset.to_string())
                    .append_pair("num", &limit.to_string());
                if let Some(post_type) = filter.post_type() {
                    query.append_pair("type", xml_type_name(post_type));
                }
            }
            Ok(url)
        }
    }
}

/// Builds the one-post, page-zero query used for metadata and existence checks
pub fn build_probe_url(
    api: &ApiConfig,
    domain: &str,
    filter: PostTypeFilter,
) -> Result<Url, UrlError> {
    build_query_url(api, domain, filter, 0, 1)
}

fn json_type_name(post_type: PostType) -> &'static str {
    post_type.as_str()
}

fn xml_type_name(post_type: PostType) -> &'static str {
    match post_type {
        PostType::Text => "regular",
        PostType::Chat => "conversation",
        other => other.as_str(),
    }
}
