//! Process-local parameter registry.
//!
//! Resolves which request parameters a page declared, reading through a
//! bounded LRU cache into durable storage. Pending declarations of an
//! in-flight save are not held here; they live in the
//! [`RenderContext`](crate::application::context::RenderContext) and take
//! precedence over everything this registry returns.

use std::sync::{Arc, Mutex};

use lru::LruCache;
use metrics::counter;
use tracing::{debug, instrument};

use crate::application::error::RegistryError;
use crate::application::repos::ParamsRepo;
use crate::domain::params::{Origin, PageId, PageIdentity, PageRef, ParameterSet, RegistryEntry};

use super::config::RegistryConfig;
use super::keys::SuffixEncoder;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::registry";

pub const METRIC_REGISTRY_LOOKUP_TOTAL: &str = "renderkey_registry_lookup_total";
pub const METRIC_REGISTRY_PERSIST_TOTAL: &str = "renderkey_registry_persist_total";
pub const METRIC_REGISTRY_EVICT_TOTAL: &str = "renderkey_registry_evict_total";

/// Long-lived registry shared by every render and save of a worker process.
pub struct ParamRegistry {
    config: RegistryConfig,
    encoder: SuffixEncoder,
    cached: Mutex<LruCache<PageIdentity, ParameterSet>>,
    repo: Arc<dyn ParamsRepo>,
}

impl ParamRegistry {
    pub fn new(config: RegistryConfig, repo: Arc<dyn ParamsRepo>) -> Self {
        let cached = Mutex::new(LruCache::new(config.cache_capacity_non_zero()));
        let encoder = config.encoder();
        Self {
            config,
            encoder,
            cached,
            repo,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn encoder(&self) -> &SuffixEncoder {
        &self.encoder
    }

    /// Resolve the declared parameters of `page` from cache or storage.
    ///
    /// A page without a durable id resolves to an empty set and is not
    /// cached, so the first save of that page is never shadowed by it. A
    /// successful storage read is cached even when it returns no rows.
    #[instrument(skip_all, fields(page = %page.identity))]
    pub async fn load(&self, page: &PageRef) -> Result<RegistryEntry, RegistryError> {
        if let Some(params) = self.cached(&page.identity) {
            return Ok(self.entry(page, params, Origin::Cached));
        }

        let Some(page_id) = page.page_id else {
            return Ok(self.entry(page, ParameterSet::new(), Origin::Unknown));
        };

        let params = self.repo.load_params(page_id).await?;
        debug!(
            page_id = page_id.get(),
            declared = params.len(),
            "Loaded declared parameters from storage"
        );
        self.remember(&page.identity, params.clone());
        Ok(self.entry(page, params, Origin::Durable))
    }

    /// Overwrite the stored parameters of a saved page and refresh the cache.
    #[instrument(skip_all, fields(page = %identity, page_id = page_id.get()))]
    pub async fn store(
        &self,
        identity: &PageIdentity,
        page_id: PageId,
        params: &ParameterSet,
    ) -> Result<(), RegistryError> {
        self.repo.replace_params(page_id, params).await?;
        counter!(METRIC_REGISTRY_PERSIST_TOTAL).increment(1);
        debug!(declared = params.len(), "Persisted declared parameters");

        self.remember(identity, params.clone());
        Ok(())
    }

    /// Cached parameters of a page, if this process loaded them before.
    pub fn cached(&self, identity: &PageIdentity) -> Option<ParameterSet> {
        if !self.config.enable_cache {
            return None;
        }
        mutex_lock(&self.cached, SOURCE, "cached")
            .get(identity)
            .cloned()
    }

    pub fn invalidate(&self, identity: &PageIdentity) {
        mutex_lock(&self.cached, SOURCE, "invalidate").pop(identity);
    }

    pub fn clear(&self) {
        mutex_lock(&self.cached, SOURCE, "clear").clear();
    }

    /// Number of cached pages.
    pub fn len(&self) -> usize {
        mutex_lock(&self.cached, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remember(&self, identity: &PageIdentity, params: ParameterSet) {
        if !self.config.enable_cache {
            return;
        }
        let evicted = mutex_lock(&self.cached, SOURCE, "remember").push(identity.clone(), params);
        match evicted {
            Some((evicted, _)) if &evicted != identity => {
                counter!(METRIC_REGISTRY_EVICT_TOTAL).increment(1);
                debug!(evicted = %evicted, "Evicted cached parameters");
            }
            _ => {}
        }
    }

    fn entry(&self, page: &PageRef, params: ParameterSet, origin: Origin) -> RegistryEntry {
        counter!(METRIC_REGISTRY_LOOKUP_TOTAL, "origin" => origin.as_str()).increment(1);
        RegistryEntry {
            identity: page.identity.clone(),
            params,
            origin,
        }
    }
}
