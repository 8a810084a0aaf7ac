use crate::classify::{
    ClassificationVerdict, PageView, ProductStrategy, Signal, SignalDetector, SignalStrength,
    Verdict,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Weak signal groups needed for `product` without strong evidence
const WEAK_QUORUM: usize = 2;

/// Applies the weighted rule to a set of signals
///
/// 1. Any strong signal (structured product markup, site pattern) → `Product`
/// 2. At least two independent weak groups → `Product`
/// 3. Listing evidence alongside a lone weak signal → `Uncertain`
/// 4. Anything else → `NonProduct`
pub fn combine_signals(signals: &[Signal]) -> Verdict {
    let mut weak_groups = BTreeSet::new();
    let mut strong = false;
    let mut listing = false;

    for signal in signals {
        match signal.strength() {
            SignalStrength::Strong => strong = true,
            SignalStrength::Weak(group) => {
                weak_groups.insert(group);
            }
            SignalStrength::Listing => listing = true,
        }
    }

    if strong {
        Verdict::Product
    } else if weak_groups.len() >= WEAK_QUORUM {
        Verdict::Product
    } else if listing && !weak_groups.is_empty() {
        Verdict::Uncertain
    } else {
        Verdict::NonProduct
    }
}

/// Default strategy for storefronts without a registered profile
#[derive(Debug)]
pub struct GenericStrategy {
    detector: Arc<SignalDetector>,
}

impl GenericStrategy {
    pub const ID: &'static str = "generic";

    pub fn new(detector: Arc<SignalDetector>) -> Self {
        Self { detector }
    }
}

impl ProductStrategy for GenericStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn classify(&self, page: &PageView<'_>) -> ClassificationVerdict {
        let signals = self.detector.detect(page).into_iter().collect();
        ClassificationVerdict::from_signals(page.url, Self::ID, signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;
    use url::Url;

    fn classify(url: &str, body: &str) -> ClassificationVerdict {
        let strategy = GenericStrategy::new(Arc::new(SignalDetector::new().unwrap()));
        let url = Url::parse(url).unwrap();
        let document = Html::parse_document(body);
        strategy.classify(&PageView {
            url: &url,
            document: &document,
            body,
        })
    }

    const LD_PRODUCT: &str =
        r#"<script type="application/ld+json">{"@type":"Product","name":"Dress"}</script>"#;

    #[test]
    fn test_strong_signal_wins() {
        assert_eq!(combine_signals(&[Signal::JsonLdProduct]), Verdict::Product);
        assert_eq!(
            combine_signals(&[Signal::JsonLdProduct, Signal::ListingPath, Signal::ProductGrid]),
            Verdict::Product
        );
    }

    #[test]
    fn test_two_weak_groups_make_product() {
        assert_eq!(
            combine_signals(&[Signal::UrlPattern, Signal::PurchaseButton]),
            Verdict::Product
        );
    }

    #[test]
    fn test_same_group_counts_once() {
        assert_eq!(
            combine_signals(&[Signal::UrlPattern, Signal::ProductIdParam]),
            Verdict::NonProduct
        );
    }

    #[test]
    fn test_conflict_is_uncertain() {
        assert_eq!(
            combine_signals(&[Signal::Price, Signal::ProductGrid]),
            Verdict::Uncertain
        );
        assert_eq!(
            combine_signals(&[Signal::UrlPattern, Signal::ListingPath]),
            Verdict::Uncertain
        );
    }

    #[test]
    fn test_weak_quorum_beats_listing_evidence() {
        assert_eq!(
            combine_signals(&[Signal::Price, Signal::PurchaseButton, Signal::ListingPath]),
            Verdict::Product
        );
    }

    #[test]
    fn test_nothing_is_non_product() {
        assert_eq!(combine_signals(&[]), Verdict::NonProduct);
        assert_eq!(combine_signals(&[Signal::ListingPath]), Verdict::NonProduct);
        assert_eq!(combine_signals(&[Signal::Price]), Verdict::NonProduct);
    }

    #[test]
    fn test_structured_marker_always_product() {
        let grid: String = (0..10)
            .map(|i| format!(r#"<li class="product-tile"><a href="/p/{}">x</a></li>"#, i))
            .collect();
        let pages = [
            format!("<html><head>{}</head><body></body></html>", LD_PRODUCT),
            format!("<html><head>{}</head><body><ul>{}</ul></body></html>", LD_PRODUCT, grid),
            format!(
                r#"<html><head>{}</head><body><span class="price">1</span></body></html>"#,
                LD_PRODUCT
            ),
        ];
        for url in ["https://shop.example/category/dresses", "https://shop.example/about"] {
            for body in &pages {
                assert_eq!(classify(url, body).label, Verdict::Product, "{} {}", url, body);
            }
        }
    }

    #[test]
    fn test_listing_page_is_non_product() {
        let body = r#"<html><body><h1>Dresses</h1><a href="/p/1">Dress</a></body></html>"#;
        let verdict = classify("https://shop.example/category/dresses", body);
        assert_eq!(verdict.label, Verdict::NonProduct);
        assert_eq!(verdict.strategy, "generic");
    }

    #[test]
    fn test_product_under_collection_path() {
        let body = r#"<html><body>
            <span class="price">$49.00</span>
            <select name="size"><option>S</option><option>M</option></select>
            <button>Add to cart</button>
        </body></html>"#;
        let verdict = classify(
            "https://shop.example/collections/dresses/products/floral-dress",
            body,
        );
        assert_eq!(verdict.label, Verdict::Product);
        assert!(verdict.signals.contains(&Signal::ListingPath));
    }

    #[test]
    fn test_weak_signals_product() {
        let body = r#"<html><body><span class="price">₹1,299</span><button>Add to cart</button></body></html>"#;
        let verdict = classify("https://shop.example/floral-dress-123", body);
        assert_eq!(verdict.label, Verdict::Product);
        assert!(verdict.signals.contains(&Signal::Price));
    }
}
