use crate::UrlError;
use url::Url;

/// Normalizes a user-supplied blog address
///
/// # Normalization Steps
///
/// 1. Trim whitespace; prepend `https://` when no scheme is given
/// 2. Parse the URL; reject if malformed or not HTTP(S)
/// 3. Lowercase the host
/// 4. Drop path, query, and fragment (a blog is identified by its host)
///
/// # Examples
///
/// ```
/// use tumbl_tally::url::normalize_blog_url;
///
/// let url = normalize_blog_url("Staff.Example.com/post/123/").unwrap();
/// assert_eq!(url.as_str(), "https://staff.example.com/");
/// ```
pub fn normalize_blog_url(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Parse("empty blog URL".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(UrlError::MissingDomain)?
        .to_lowercase();

    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Renders a normalized blog URL without the trailing slash
pub fn display_blog_url(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}
