//! Robots.txt parser implementation
//!
//! Allow/disallow matching is delegated to the robotstxt crate; the
//! `Crawl-delay` extension is parsed here since the crate ignores it.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Parsed robots.txt data for one domain
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
}

impl ParsedRobots {
    /// Wraps raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// Used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks if a URL is allowed for the given user agent token
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL to check
    /// * `user_agent` - The product token matched against `User-agent` groups
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay that applies to a user agent
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let agent = user_agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut specific = None;
        let mut wildcard = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group
                    if in_rules {
                        group.clear();
                        in_rules = false;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    in_rules = true;
                    let Some(delay) = parse_delay(value) else {
                        continue;
                    };
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        specific = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        wildcard = Some(delay);
                    }
                }
                _ => in_rules = true,
            }
        }

        specific.or(wildcard)
    }
}

/// Longest crawl delay honoured; larger values are clamped
const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

fn parse_delay(value: &str) -> Option<Duration> {
    let secs = value.parse::<f64>().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    let delay = Duration::try_from_secs_f64(secs).unwrap_or(MAX_CRAWL_DELAY);
    Some(delay.min(MAX_CRAWL_DELAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://shop.example";

    fn url(path: &str) -> String {
        format!("{}{}", BASE, path)
    }

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed(&url("/checkout"), "ProductScout"));
        assert_eq!(robots.crawl_delay("ProductScout"), None);
    }

    #[test]
    fn test_parse_disallow_specific() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /cart");
        assert!(robots.is_allowed(&url("/p/123"), "ProductScout"));
        assert!(!robots.is_allowed(&url("/cart"), "ProductScout"));
        assert!(!robots.is_allowed(&url("/cart/items"), "ProductScout"));
    }

    #[test]
    fn test_parse_allow_and_disallow() {
        let content = "User-agent: *\nDisallow: /account\nAllow: /account/help";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed(&url("/account"), "ProductScout"));
        assert!(robots.is_allowed(&url("/account/help"), "ProductScout"));
    }

    #[test]
    fn test_parse_specific_user_agent() {
        let content = "User-agent: ProductScout\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed(&url("/p/1"), "ProductScout"));
        assert!(robots.is_allowed(&url("/p/1"), "OtherBot"));
    }

    #[test]
    fn test_garbage_allows_everything() {
        let robots = ParsedRobots::from_content("<html>not found</html>");
        assert!(robots.is_allowed(&url("/any/path"), "ProductScout"));
    }

    #[test]
    fn test_crawl_delay_specific_over_wildcard() {
        let content = "User-agent: *\nCrawl-delay: 10\n\nUser-agent: ProductScout\nCrawl-delay: 2.5";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(
            robots.crawl_delay("ProductScout"),
            Some(Duration::from_millis(2500))
        );
        assert_eq!(robots.crawl_delay("OtherBot"), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_crawl_delay_grouped_agents_and_case() {
        let content = "User-agent: BotA\nUser-agent: productscout\nDisallow: /x\ncrawl-delay: 3";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("ProductScout"), Some(Duration::from_secs(3)));
        assert_eq!(robots.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_crawl_delay_huge_values_are_clamped() {
        for value in ["1e30", "inf", "86400"] {
            let content = format!("User-agent: *\nCrawl-delay: {}\n", value);
            let robots = ParsedRobots::from_content(&content);
            assert_eq!(robots.crawl_delay("TestScout"), Some(MAX_CRAWL_DELAY), "{}", value);
        }
    }

    #[test]
    fn test_crawl_delay_ignores_invalid_values() {
        let content = "User-agent: *\nCrawl-delay: soon\nCrawl-delay: -4";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("ProductScout"), None);
    }
}
