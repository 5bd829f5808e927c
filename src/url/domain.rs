use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// The domain is what both API dialects use to address a blog.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use tumbl_tally::url::extract_domain;
///
/// let url = Url::parse("https://staff.example.com/post/1").unwrap();
/// assert_eq!(extract_domain(&url), Some("staff.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
