use dashmap::DashSet;
use url::Url;

/// Set of normalized URLs already scheduled in one domain session
///
/// Membership is tested and recorded in a single step, so two tasks racing on
/// the same URL can never both see it as new.
#[derive(Debug, Default)]
pub struct SeenSet {
    urls: DashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the URL as seen
    ///
    /// # Returns
    ///
    /// * `true` - The URL was new and is now recorded
    /// * `false` - The URL had already been recorded
    pub fn check_and_mark(&self, url: &Url) -> bool {
        self.urls.insert(url.as_str().to_string())
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.urls.contains(url.as_str())
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
