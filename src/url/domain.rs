use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Returns
///
/// * `Some(String)` - The lowercase domain/host
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use product_scout::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Nykaa.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.nykaa.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Strips a leading "www." so a storefront and its bare host share one scope
pub fn scope_base(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
