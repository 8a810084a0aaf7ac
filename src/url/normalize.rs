use crate::config::NormalizerConfig;
use crate::url::domain::{extract_domain, scope_base};
use crate::url::matcher::matches_wildcard;
use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Canonicalizes a URL
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything that is not HTTP(S)
/// 3. Lowercase the host, drop credentials and default ports
/// 4. Normalize path:
///    - Remove dot segments and empty segments
///    - Remove trailing slash (except for root /)
/// 5. Remove fragment (everything after #)
/// 6. Remove tracking query parameters (and, with an allow-list, every
///    parameter not on it)
/// 7. Sort remaining query parameters
/// 8. Remove empty query string (trailing ?)
///
/// The output is a fixed point: normalizing it again returns the same URL.
///
/// # Examples
///
/// ```
/// use product_scout::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.COM/page/?b=2&a=1#top").unwrap();
/// assert_eq!(url.as_str(), "https://www.example.com/page?a=1&b=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize(url, &[])
}

fn canonicalize(mut url: Url, query_allow_list: &[String]) -> Result<Url, UrlError> {
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

    url.set_username("")
        .and_then(|_| url.set_password(None))
        .map_err(|_| UrlError::Malformed("Cannot strip credentials".to_string()))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url, query_allow_list);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url, allow_list: &[String]) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .filter(|(key, _)| allow_list.is_empty() || allow_list.iter().any(|k| k == key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

/// Scope-aware normalizer for one domain session
///
/// A URL is accepted when it canonicalizes cleanly, does not point at a static
/// asset, and its host is the seed host, one of its subdomains, or an
/// explicitly allowed pattern. A leading `www.` on the seed host is ignored
/// when computing scope so `www.shop.example` and `shop.example` share one.
#[derive(Debug, Clone)]
pub struct Normalizer {
    scope_base: String,
    allowed: Vec<String>,
    query_allow_list: Vec<String>,
    skip_extensions: Vec<String>,
}

impl Normalizer {
    /// Creates a normalizer scoped to the seed's host
    pub fn for_seed(seed: &Url, allowed_domains: &[String], config: &NormalizerConfig) -> Self {
        let host = extract_domain(seed).unwrap_or_default();
        Self {
            scope_base: scope_base(&host).to_string(),
            allowed: allowed_domains.iter().map(|d| d.to_lowercase()).collect(),
            query_allow_list: config.query_allow_list.clone(),
            skip_extensions: config
                .skip_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Resolves `raw_url` against `base_url` and canonicalizes it
    ///
    /// # Returns
    ///
    /// * `Ok(Url)` - The canonical in-scope URL
    /// * `Err(UrlError)` - The URL is malformed, non-HTTP(S), a static asset,
    ///   or outside the session scope
    pub fn normalize(&self, raw_url: &str, base_url: Option<&Url>) -> Result<Url, UrlError> {
        let raw_url = raw_url.trim();
        let parsed = match base_url {
            Some(base) => base.join(raw_url),
            None => Url::parse(raw_url),
        }
        .map_err(|e| UrlError::Parse(format!("{}: {}", raw_url, e)))?;

        let url = canonicalize(parsed, &self.query_allow_list)?;

        if self.is_static_asset(&url) {
            return Err(UrlError::StaticAsset(url.to_string()));
        }

        let host = url.host_str().unwrap_or_default();
        if !self.in_scope(host) {
            return Err(UrlError::OutOfScope(host.to_string()));
        }

        Ok(url)
    }

    /// Returns true if the host belongs to this session's crawl scope
    pub fn in_scope(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        if host == self.scope_base || host.ends_with(&format!(".{}", self.scope_base)) {
            return true;
        }
        self.allowed
            .iter()
            .any(|pattern| matches_wildcard(pattern, &host))
    }

    fn is_static_asset(&self, url: &Url) -> bool {
        let last = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("");
        match last.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_lowercase();
                self.skip_extensions.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }
}
