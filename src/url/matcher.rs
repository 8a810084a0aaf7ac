/// Checks if a domain matches a site pattern
///
/// Two pattern forms are supported:
/// 1. Exact: "nykaa.com" matches only "nykaa.com"
/// 2. Wildcard: "*.nykaa.com" matches "nykaa.com" and any subdomain of it
///
/// # Examples
///
/// ```
/// use product_scout::url::matches_wildcard;
///
/// assert!(matches_wildcard("nykaa.com", "nykaa.com"));
/// assert!(!matches_wildcard("nykaa.com", "www.nykaa.com"));
/// assert!(matches_wildcard("*.nykaa.com", "www.nykaa.com"));
/// assert!(matches_wildcard("*.nykaa.com", "nykaa.com"));
/// assert!(!matches_wildcard("*.nykaa.com", "notnykaa.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Length of the registrable suffix shared by `pattern` and `candidate`
///
/// Used to pick the most specific site binding: "www.tatacliq.com" is served
/// by a binding for "tatacliq.com" unless "www.tatacliq.com" is registered
/// itself. Leading "*." and "www." are ignored on the pattern side.
///
/// # Returns
///
/// * `Some(len)` - The candidate is the pattern's base or one of its subdomains
/// * `None` - The pattern does not cover the candidate
pub fn suffix_match_len(pattern: &str, candidate: &str) -> Option<usize> {
    let base = pattern.strip_prefix("*.").unwrap_or(pattern);
    let base = base.strip_prefix("www.").unwrap_or(base);

    if base.is_empty() {
        return None;
    }

    if candidate == base || candidate.ends_with(&format!(".{}", base)) {
        Some(base.len())
    } else {
        None
    }
}
