//! Storefront-specific strategies
//!
//! A site strategy is the generic signal set plus a profile: URL patterns that
//! identify product pages outright, paths never worth crawling, inline script
//! markers, and the tile markup used to find product links on listings.

use crate::classify::{
    compile_regex, compile_selector, ClassificationVerdict, PageView, ProductStrategy, Signal,
    SignalDetector,
};
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use std::sync::Arc;
use url::{Position, Url};

/// Attributes on product tiles that carry the product URL
const TILE_LINK_ATTRS: &[&str] = &["data-url", "data-href", "data-product-url", "href"];

/// Paths that lead to account, cart, and policy pages on every storefront
const COMMON_EXCLUDED: &[&str] = &[
    "/login",
    "/register",
    "/wishlist",
    "/cart",
    "/checkout",
    "/account",
    "/logout",
];

/// Static description of a storefront
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub id: &'static str,
    /// Domain patterns bound to this profile by default
    pub domains: &'static [&'static str],
    /// Regexes over path and query; a match decides `product`
    pub product_patterns: &'static [&'static str],
    /// Path fragments never followed
    pub excluded_paths: &'static [&'static str],
    /// Regexes over the raw body; a match is weak evidence
    pub script_markers: &'static [&'static str],
    /// CSS selectors for product tiles on listing pages
    pub tile_selectors: &'static [&'static str],
}

/// Profiles registered in every run
pub fn builtin_profiles() -> Vec<SiteProfile> {
    vec![
        SiteProfile {
            id: "nykaa",
            domains: &["nykaafashion.com", "nykaa.com"],
            product_patterns: &[
                r"/prod/",
                r"/products/",
                r"productId=",
                r"/p/\d+",
                r"/fashion/[^/]+/p/",
                r"-p\d+$",
            ],
            excluded_paths: &[
                "/help",
                "/policy",
                "/about",
                "/terms",
                "/customer-service",
                "/privacy",
            ],
            script_markers: &[],
            tile_selectors: &[
                ".product-card",
                ".plp-card",
                ".product-tile",
                ".product-box",
                ".product-item",
            ],
        },
        SiteProfile {
            id: "tatacliq",
            domains: &["tatacliq.com"],
            product_patterns: &[r"/p-\d+", r"pdp/", r"-p-\d+", r"/product-details/"],
            excluded_paths: &["/help", "/policy", "/about", "/terms", "/customer-service"],
            script_markers: &[
                r#""productId"\s*:\s*"[^"]+"#,
                r#""product"\s*:\s*\{"#,
                r"productDetails",
                r"pdpPageData",
            ],
            tile_selectors: &["[class*='product']"],
        },
        SiteProfile {
            id: "westside",
            domains: &["westside.com"],
            product_patterns: &[
                r"/product/",
                r"/[^/]+/[^/]+/[a-zA-Z0-9-]+-[0-9]+\.html",
                r"/[^/]+/[^/]+/[^/]+\?productid=",
            ],
            excluded_paths: &["/search", "/customer", "/store-locator"],
            script_markers: &[],
            tile_selectors: &[".product-item", ".product-tile"],
        },
        SiteProfile {
            id: "virgio",
            domains: &["virgio.com"],
            product_patterns: &[r"/(collection|category)/.*-p\d+$"],
            excluded_paths: &[],
            script_markers: &[],
            tile_selectors: &[],
        },
    ]
}

/// Strategy compiled from a [`SiteProfile`]
#[derive(Debug)]
pub struct SiteStrategy {
    id: String,
    product_patterns: Vec<Regex>,
    excluded_paths: Vec<String>,
    script_markers: Vec<Regex>,
    tiles: Option<Selector>,
    detector: Arc<SignalDetector>,
}

impl SiteStrategy {
    /// Compiles a profile
    ///
    /// # Returns
    ///
    /// * `Ok(SiteStrategy)` - Every pattern and selector compiled
    /// * `Err(ConfigError::InvalidPattern)` - A pattern or selector is invalid
    pub fn from_profile(
        profile: &SiteProfile,
        detector: Arc<SignalDetector>,
    ) -> Result<Self, ConfigError> {
        let product_patterns = profile
            .product_patterns
            .iter()
            .map(|p| compile_regex(p))
            .collect::<Result<Vec<_>, _>>()?;

        let script_markers = profile
            .script_markers
            .iter()
            .map(|p| compile_regex(p))
            .collect::<Result<Vec<_>, _>>()?;

        let tiles = if profile.tile_selectors.is_empty() {
            None
        } else {
            Some(compile_selector(&profile.tile_selectors.join(", "))?)
        };

        let excluded_paths = COMMON_EXCLUDED
            .iter()
            .chain(profile.excluded_paths.iter())
            .map(|p| p.to_string())
            .collect();

        Ok(Self {
            id: profile.id.to_string(),
            product_patterns,
            excluded_paths,
            script_markers,
            tiles,
            detector,
        })
    }

    fn matches_product_pattern(&self, url: &Url) -> bool {
        let target = &url[Position::BeforePath..];
        self.product_patterns.iter().any(|p| p.is_match(target))
    }
}

impl ProductStrategy for SiteStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn classify(&self, page: &PageView<'_>) -> ClassificationVerdict {
        let mut signals: Vec<Signal> = self.detector.detect(page).into_iter().collect();

        if self.matches_product_pattern(page.url) {
            signals.push(Signal::SitePattern);
        }
        if self.script_markers.iter().any(|m| m.is_match(page.body)) {
            signals.push(Signal::ScriptMarker);
        }

        ClassificationVerdict::from_signals(page.url, &self.id, signals)
    }

    fn should_follow(&self, url: &Url) -> bool {
        let path = url.path().to_ascii_lowercase();
        !self
            .excluded_paths
            .iter()
            .any(|excluded| path.contains(excluded.as_str()))
    }

    fn extra_links(&self, page: &PageView<'_>) -> Vec<String> {
        let Some(tiles) = &self.tiles else {
            return Vec::new();
        };

        let mut links = Vec::new();
        for tile in page.document.select(tiles) {
            let own = TILE_LINK_ATTRS
                .iter()
                .filter_map(|attr| tile.value().attr(attr))
                .map(str::to_string);
            links.extend(own);

            // Tiles that are containers carry the link on an inner anchor
            if tile.value().name() != "a" {
                if let Some(href) = tile
                    .descendants()
                    .filter_map(scraper::ElementRef::wrap)
                    .find(|el| el.value().name() == "a")
                    .and_then(|a| a.value().attr("href"))
                {
                    links.push(href.to_string());
                }
            }
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Verdict;
    use scraper::Html;

    fn strategy(id: &str) -> SiteStrategy {
        let profile = builtin_profiles()
            .into_iter()
            .find(|p| p.id == id)
            .unwrap();
        SiteStrategy::from_profile(&profile, Arc::new(SignalDetector::new().unwrap())).unwrap()
    }

    fn classify(strategy: &SiteStrategy, url: &str, body: &str) -> ClassificationVerdict {
        let url = Url::parse(url).unwrap();
        let document = Html::parse_document(body);
        strategy.classify(&PageView {
            url: &url,
            document: &document,
            body,
        })
    }

    #[test]
    fn test_builtin_profiles_compile() {
        let detector = Arc::new(SignalDetector::new().unwrap());
        for profile in builtin_profiles() {
            assert!(SiteStrategy::from_profile(&profile, Arc::clone(&detector)).is_ok());
        }
    }

    #[test]
    fn test_virgio_collection_product() {
        let s = strategy("virgio");
        let verdict = classify(&s, "https://www.virgio.com/collection/dresses/linen-midi-p1234", "<html></html>");
        assert_eq!(verdict.label, Verdict::Product);
        assert_eq!(verdict.strategy, "virgio");

        let verdict = classify(&s, "https://www.virgio.com/collection/dresses", "<html></html>");
        assert_eq!(verdict.label, Verdict::NonProduct);
    }

    #[test]
    fn test_nykaa_query_pattern() {
        let s = strategy("nykaa");
        let verdict = classify(&s, "https://www.nykaafashion.com/item?productId=77", "<html></html>");
        assert_eq!(verdict.label, Verdict::Product);
        assert!(verdict.signals.contains(&Signal::SitePattern));
    }

    #[test]
    fn test_westside_html_product() {
        let s = strategy("westside");
        let verdict = classify(
            &s,
            "https://www.westside.com/women/tops/printed-shirt-300123.html",
            "<html></html>",
        );
        assert_eq!(verdict.label, Verdict::Product);
    }

    #[test]
    fn test_tatacliq_script_marker_is_weak() {
        let s = strategy("tatacliq");
        let body = r#"<html><body><script>window.pdpPageData = {}</script></body></html>"#;
        let verdict = classify(&s, "https://www.tatacliq.com/some-page", body);
        assert_eq!(verdict.label, Verdict::NonProduct);
        assert!(verdict.signals.contains(&Signal::ScriptMarker));

        let body = r#"<html><body><script>window.pdpPageData = {}</script><span class="price">1</span></body></html>"#;
        let verdict = classify(&s, "https://www.tatacliq.com/some-page", body);
        assert_eq!(verdict.label, Verdict::Product);
    }

    #[test]
    fn test_excluded_paths_not_followed() {
        let s = strategy("westside");
        assert!(!s.should_follow(&Url::parse("https://www.westside.com/cart").unwrap()));
        assert!(!s.should_follow(&Url::parse("https://www.westside.com/store-locator/x").unwrap()));
        assert!(s.should_follow(&Url::parse("https://www.westside.com/women/tops").unwrap()));
    }

    #[test]
    fn test_tile_links() {
        let s = strategy("nykaa");
        let body = r#"<html><body>
            <div class="plp-card" data-url="/p/101"><span>Top</span></div>
            <li class="product-tile"><a href="/p/102">Skirt</a></li>
            <div class="banner"><a href="/sale">Sale</a></div>
        </body></html>"#;
        let url = Url::parse("https://www.nykaafashion.com/women").unwrap();
        let document = Html::parse_document(body);
        let links = s.extra_links(&PageView {
            url: &url,
            document: &document,
            body,
        });
        assert_eq!(links, vec!["/p/101".to_string(), "/p/102".to_string()]);
    }
}
