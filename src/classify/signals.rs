//! Page signal detection
//!
//! Each detector looks for one independent piece of evidence. Signals are
//! grouped so that two hits from the same source (a product path and a
//! product id in the same URL) only count once.

use crate::classify::{compile_regex, compile_selector, PageView};
use crate::ConfigError;
use regex::Regex;
use scraper::{ElementRef, Selector};
use serde_json::Value;
use std::collections::BTreeSet;

/// Query parameters that identify a single product
const PRODUCT_QUERY_PARAMS: &[&str] = &["product", "productid", "pid", "itemid", "sku", "productcode"];

/// Button/link captions that only appear where something can be bought
const PURCHASE_PHRASES: &[&str] = &["add to cart", "add to bag", "buy now"];

/// Section headings typical of a product detail page
const DETAIL_PHRASES: &[&str] = &[
    "product details",
    "product description",
    "specifications",
    "size chart",
];

/// Product tiles on one page before it is treated as a listing grid
const GRID_THRESHOLD: usize = 6;

/// Evidence found in a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Signal {
    /// JSON-LD block typed `Product`
    JsonLdProduct,
    /// `og:type` meta of `product`
    OpenGraphProduct,
    /// schema.org `Product` microdata
    MicrodataProduct,
    /// Matched a site strategy's product URL pattern
    SitePattern,
    UrlPattern,
    ProductIdParam,
    Price,
    PurchaseButton,
    VariantSelector,
    DetailSection,
    /// Inline product state in a script block (site strategies only)
    ScriptMarker,
    ListingPath,
    ProductGrid,
}

/// How a signal counts in the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStrength {
    /// Decides `product` on its own
    Strong,
    /// Needs a second independent weak signal
    Weak(WeakGroup),
    /// Points at a listing/category page
    Listing,
}

/// Independent sources of weak evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WeakGroup {
    Url,
    Price,
    Purchase,
    Variant,
    Details,
    Embedded,
}

impl Signal {
    pub fn strength(&self) -> SignalStrength {
        match self {
            Self::JsonLdProduct | Self::OpenGraphProduct | Self::MicrodataProduct | Self::SitePattern => {
                SignalStrength::Strong
            }
            Self::UrlPattern | Self::ProductIdParam => SignalStrength::Weak(WeakGroup::Url),
            Self::Price => SignalStrength::Weak(WeakGroup::Price),
            Self::PurchaseButton => SignalStrength::Weak(WeakGroup::Purchase),
            Self::VariantSelector => SignalStrength::Weak(WeakGroup::Variant),
            Self::DetailSection => SignalStrength::Weak(WeakGroup::Details),
            Self::ScriptMarker => SignalStrength::Weak(WeakGroup::Embedded),
            Self::ListingPath | Self::ProductGrid => SignalStrength::Listing,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::JsonLdProduct => "json_ld_product",
            Self::OpenGraphProduct => "og_product",
            Self::MicrodataProduct => "microdata_product",
            Self::SitePattern => "site_pattern",
            Self::UrlPattern => "url_pattern",
            Self::ProductIdParam => "product_id_param",
            Self::Price => "price",
            Self::PurchaseButton => "purchase_button",
            Self::VariantSelector => "variant_selector",
            Self::DetailSection => "detail_section",
            Self::ScriptMarker => "script_marker",
            Self::ListingPath => "listing_path",
            Self::ProductGrid => "product_grid",
        }
    }
}

/// Compiled selectors and patterns shared by every strategy
#[derive(Debug)]
pub struct SignalDetector {
    product_path: Regex,
    listing_path: Regex,
    price_class: Regex,
    variant_attr: Regex,
    ld_json: Selector,
    og_type: Selector,
    price_meta: Selector,
    microdata: Selector,
    classed: Selector,
    purchase: Selector,
    variant: Selector,
    body: Selector,
    tiles: Selector,
}

impl SignalDetector {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            product_path: compile_regex(r"(?i)/(product|products|p|item|pd|buy|shop)/")?,
            listing_path: compile_regex(
                r"(?i)/(category|categories|collection|collections|c|search|catalog|brands?)(/|$)",
            )?,
            price_class: compile_regex(r"(?i)price|cost|mrp|amount")?,
            variant_attr: compile_regex(r"(?i)qty|quantity|size|variant")?,
            ld_json: compile_selector(r#"script[type="application/ld+json"]"#)?,
            og_type: compile_selector(r#"meta[property="og:type"][content]"#)?,
            price_meta: compile_selector(
                r#"meta[property^="product:price"], meta[property^="og:price"], [itemprop="price"]"#,
            )?,
            microdata: compile_selector(r#"[itemtype*="schema.org/Product"]"#)?,
            classed: compile_selector("span[class], div[class], p[class]")?,
            purchase: compile_selector(r#"button, a, input[type="submit"], input[type="button"]"#)?,
            variant: compile_selector("select, input, ul[class], div[class]")?,
            body: compile_selector("body")?,
            tiles: compile_selector(
                ".product-card, .product-tile, .product-item, .plp-card, .product-box",
            )?,
        })
    }

    /// Runs every detector over the page
    pub fn detect(&self, page: &PageView<'_>) -> BTreeSet<Signal> {
        let mut signals = BTreeSet::new();

        if self.has_json_ld_product(page) {
            signals.insert(Signal::JsonLdProduct);
        }
        if self.has_og_product(page) {
            signals.insert(Signal::OpenGraphProduct);
        }
        if page.document.select(&self.microdata).next().is_some() {
            signals.insert(Signal::MicrodataProduct);
        }
        if self.product_path.is_match(page.url.path()) {
            signals.insert(Signal::UrlPattern);
        }
        if has_product_id_param(page) {
            signals.insert(Signal::ProductIdParam);
        }
        if self.has_price(page) {
            signals.insert(Signal::Price);
        }
        if self.has_purchase_button(page) {
            signals.insert(Signal::PurchaseButton);
        }
        if self.has_variant_selector(page) {
            signals.insert(Signal::VariantSelector);
        }
        if self.has_detail_section(page) {
            signals.insert(Signal::DetailSection);
        }
        if self.listing_path.is_match(page.url.path()) {
            signals.insert(Signal::ListingPath);
        }
        if page.document.select(&self.tiles).take(GRID_THRESHOLD).count() >= GRID_THRESHOLD {
            signals.insert(Signal::ProductGrid);
        }

        signals
    }

    fn has_json_ld_product(&self, page: &PageView<'_>) -> bool {
        page.document.select(&self.ld_json).any(|script| {
            let text: String = script.text().collect();
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => declares_product(&value),
                // Sites often ship trailing commas; fall back to a plain scan
                Err(_) => {
                    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                    compact.contains(r#""@type":"Product""#)
                }
            }
        })
    }

    fn has_og_product(&self, page: &PageView<'_>) -> bool {
        page.document.select(&self.og_type).any(|meta| {
            let content = meta.value().attr("content").unwrap_or("").trim().to_ascii_lowercase();
            content == "product" || content.starts_with("product.")
        })
    }

    fn has_price(&self, page: &PageView<'_>) -> bool {
        if page.document.select(&self.price_meta).next().is_some() {
            return true;
        }
        page.document
            .select(&self.classed)
            .any(|el| el.value().attr("class").is_some_and(|c| self.price_class.is_match(c)))
    }

    fn has_purchase_button(&self, page: &PageView<'_>) -> bool {
        page.document.select(&self.purchase).any(|el| {
            let caption = match el.value().name() {
                "input" => el.value().attr("value").unwrap_or("").to_lowercase(),
                _ => element_text(&el),
            };
            PURCHASE_PHRASES.iter().any(|p| caption.contains(p))
        })
    }

    fn has_variant_selector(&self, page: &PageView<'_>) -> bool {
        page.document.select(&self.variant).any(|el| {
            ["name", "class", "id"]
                .iter()
                .filter_map(|attr| el.value().attr(attr))
                .any(|v| self.variant_attr.is_match(v))
        })
    }

    fn has_detail_section(&self, page: &PageView<'_>) -> bool {
        let Some(body) = page.document.select(&self.body).next() else {
            return false;
        };
        let text = element_text(&body);
        DETAIL_PHRASES.iter().any(|p| text.contains(p))
    }
}

/// Lowercased text content with whitespace collapsed
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn has_product_id_param(page: &PageView<'_>) -> bool {
    page.url
        .query_pairs()
        .any(|(key, _)| PRODUCT_QUERY_PARAMS.contains(&key.to_ascii_lowercase().as_str()))
}

/// True if a top-level JSON-LD node (or an `@graph` member) is typed Product
///
/// Nested nodes are not inspected: an `ItemList` of products is a listing.
fn declares_product(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(declares_product),
        Value::Object(map) => {
            let typed = match map.get("@type") {
                Some(Value::String(t)) => is_product_type(t),
                Some(Value::Array(types)) => types
                    .iter()
                    .any(|t| t.as_str().is_some_and(is_product_type)),
                _ => false,
            };
            typed
                || map
                    .get("@graph")
                    .is_some_and(declares_product)
        }
        _ => false,
    }
}

fn is_product_type(t: &str) -> bool {
    let t = t.rsplit('/').next().unwrap_or(t);
    t.eq_ignore_ascii_case("Product")
        || t.eq_ignore_ascii_case("ProductGroup")
        || t.eq_ignore_ascii_case("IndividualProduct")
}
