use crate::classify::{
    builtin_profiles, ClassificationVerdict, GenericStrategy, PageView, ProductClassifier,
    ProductStrategy, SignalDetector, SiteStrategy,
};
use crate::config::Config;
use crate::crawler::FetchedPage;
use crate::url::suffix_match_len;
use crate::{Result, ScoutError};
use scraper::Html;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Catalog of strategies and the domain patterns bound to them
///
/// Resolution order for a domain:
/// 1. A binding whose pattern equals the domain
/// 2. The binding with the longest matching suffix
/// 3. The generic strategy
pub struct StrategyRegistry {
    catalog: HashMap<String, Arc<dyn ProductStrategy>>,
    /// (pattern, strategy id), later bindings replace earlier ones
    bindings: Vec<(String, String)>,
    fallback: Arc<dyn ProductStrategy>,
}

impl StrategyRegistry {
    /// Creates a registry that only knows `fallback`
    pub fn new(fallback: Arc<dyn ProductStrategy>) -> Self {
        let mut catalog: HashMap<String, Arc<dyn ProductStrategy>> = HashMap::new();
        catalog.insert(fallback.id().to_string(), Arc::clone(&fallback));
        Self {
            catalog,
            bindings: Vec::new(),
            fallback,
        }
    }

    /// Generic strategy plus every built-in storefront profile
    pub fn with_builtin_strategies() -> Result<Self> {
        let detector = Arc::new(SignalDetector::new()?);
        let mut registry = Self::new(Arc::new(GenericStrategy::new(Arc::clone(&detector))));

        for profile in builtin_profiles() {
            let strategy = SiteStrategy::from_profile(&profile, Arc::clone(&detector))?;
            registry.register(Arc::new(strategy));
            for domain in profile.domains {
                registry.bind(domain, profile.id)?;
            }
        }

        Ok(registry)
    }

    /// Built-in strategies plus the `[[site]]` bindings of a configuration
    ///
    /// # Returns
    ///
    /// * `Ok(StrategyRegistry)` - Every binding names a known strategy
    /// * `Err(ScoutError::UnknownStrategy)` - A `[[site]]` or `[[seed]]` entry
    ///   names a strategy that does not exist
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::with_builtin_strategies()?;

        for site in &config.site {
            registry.bind(&site.domain, &site.strategy)?;
        }

        for seed in &config.seed {
            if let Some(id) = &seed.strategy {
                registry.get(id)?;
            }
        }

        Ok(registry)
    }

    /// Adds or replaces a strategy under its id
    pub fn register(&mut self, strategy: Arc<dyn ProductStrategy>) {
        self.catalog.insert(strategy.id().to_string(), strategy);
    }

    /// Binds a domain pattern ("shop.com" or "*.shop.com") to a strategy id
    pub fn bind(&mut self, pattern: &str, strategy_id: &str) -> Result<()> {
        if !self.catalog.contains_key(strategy_id) {
            return Err(ScoutError::UnknownStrategy(strategy_id.to_string()));
        }

        let pattern = pattern.to_lowercase();
        self.bindings.retain(|(existing, _)| *existing != pattern);
        self.bindings.push((pattern, strategy_id.to_string()));
        Ok(())
    }

    /// Looks up a strategy by id
    pub fn get(&self, strategy_id: &str) -> Result<Arc<dyn ProductStrategy>> {
        self.catalog
            .get(strategy_id)
            .cloned()
            .ok_or_else(|| ScoutError::UnknownStrategy(strategy_id.to_string()))
    }

    /// Picks the strategy for a domain
    pub fn resolve(&self, domain: &str) -> Arc<dyn ProductStrategy> {
        let domain = domain.to_lowercase();

        let exact = self
            .bindings
            .iter()
            .find(|(pattern, _)| *pattern == domain)
            .map(|(_, id)| id);

        let chosen = exact.or_else(|| {
            self.bindings
                .iter()
                .filter_map(|(pattern, id)| suffix_match_len(pattern, &domain).map(|len| (len, id)))
                .max_by_key(|(len, _)| *len)
                .map(|(_, id)| id)
        });

        match chosen.and_then(|id| self.catalog.get(id)) {
            Some(strategy) => {
                debug!("Domain {} uses strategy '{}'", domain, strategy.id());
                Arc::clone(strategy)
            }
            None => Arc::clone(&self.fallback),
        }
    }

    /// Builds the classifier for one domain session
    ///
    /// A strategy forced on the seed wins over domain resolution.
    pub fn classifier_for(&self, domain: &str, forced: Option<&str>) -> Result<ProductClassifier> {
        let strategy = match forced {
            Some(id) => self.get(id)?,
            None => self.resolve(domain),
        };
        Ok(ProductClassifier::new(strategy))
    }

    /// Classifies a fetched page with the strategy resolved for `domain`
    pub fn classify(&self, url: &Url, page: &FetchedPage, domain: &str) -> ClassificationVerdict {
        let strategy = self.resolve(domain);
        let document = Html::parse_document(&page.body);
        strategy.classify(&PageView {
            url,
            document: &document,
            body: &page.body,
        })
    }

    /// Registered strategy ids, sorted
    pub fn strategy_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.catalog.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.strategy_ids())
            .field("bindings", &self.bindings)
            .finish()
    }
}
