//! Per-render and per-save state.
//!
//! A [`RenderContext`] is created when the host starts expanding a page and
//! dropped once the render (or the save that triggered it) has finished. It
//! owns the pending declarations of that pass and the flag that tells the host
//! to skip caching the output.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::cache::{KeyEncoder, ParamRegistry};
use crate::domain::params::{Origin, PageId, PageIdentity, PageRef, ParameterSet, RegistryEntry};

use super::error::RegistryError;
use super::request::RequestParams;

pub const METRIC_RENDER_UNCACHEABLE_TOTAL: &str = "renderkey_render_uncacheable_total";

/// Where a render currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    /// Directives are being expanded.
    Expanding,
    /// The key suffix is being derived.
    KeyDerivation,
    /// Key derivation finished, successfully or not.
    Done,
}

pub struct RenderContext {
    registry: Arc<ParamRegistry>,
    request: Arc<dyn RequestParams>,
    pending: HashMap<PageIdentity, ParameterSet>,
    caching_disabled: bool,
    phase: RenderPhase,
}

impl RenderContext {
    pub fn new(registry: Arc<ParamRegistry>, request: Arc<dyn RequestParams>) -> Self {
        Self {
            registry,
            request,
            pending: HashMap::new(),
            caching_disabled: false,
            phase: RenderPhase::Idle,
        }
    }

    /// Whether the output of this render must not be cached.
    pub fn caching_disabled(&self) -> bool {
        self.caching_disabled
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Names declared for `page` during this pass, if any directive ran.
    pub fn pending(&self, page: &PageIdentity) -> Option<&ParameterSet> {
        self.pending.get(page)
    }

    /// Record `names` as cache-relevant for `page`.
    ///
    /// The pending set is created even when `names` is empty, so a save whose
    /// content declares nothing still clears earlier declarations.
    pub fn declare<I, S>(&mut self, page: &PageIdentity, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.enter_expansion();
        let set = self.pending.entry(page.clone()).or_default();
        set.extend(names);
        debug!(page = %page, declared = set.len(), "Declared request parameters");
    }

    /// Resolve the declared parameters of `page`; pending declarations win.
    pub async fn lookup(&self, page: &PageRef) -> Result<RegistryEntry, RegistryError> {
        if let Some(params) = self.pending.get(&page.identity) {
            return Ok(RegistryEntry {
                identity: page.identity.clone(),
                params: params.clone(),
                origin: Origin::Pending,
            });
        }
        self.registry.load(page).await
    }

    /// Live value of `name`, empty when the request does not carry it.
    ///
    /// `name` is trimmed before use, like every directive argument, so
    /// `request( lang )` reads `lang`.
    ///
    /// Reading a name the page never declared disables caching for this
    /// render, since the key cannot reflect it. A storage failure while
    /// checking the declaration has the same effect.
    pub async fn read_param(&mut self, page: &PageRef, name: &str) -> String {
        self.enter_expansion();
        let name = name.trim();

        let declared = match self.lookup(page).await {
            Ok(entry) => entry.params.contains(name),
            Err(err) => {
                warn!(
                    page = %page.identity,
                    param = name,
                    error = %err,
                    "Could not resolve declared parameters"
                );
                false
            }
        };
        if !declared {
            self.disable_caching(page, name);
        }

        self.request.text_or_empty(name)
    }

    /// Encode the live values of every declared parameter of `page`.
    ///
    /// Empty when nothing is declared. On storage failure caching is disabled
    /// before the error is returned.
    pub async fn derive_key_suffix(&mut self, page: &PageRef) -> Result<String, RegistryError> {
        self.phase = RenderPhase::KeyDerivation;
        let looked_up = self.lookup(page).await;
        self.phase = RenderPhase::Done;
        let entry = match looked_up {
            Ok(entry) => entry,
            Err(err) => {
                self.disable_caching(page, "");
                return Err(err);
            }
        };

        let values: Vec<String> = entry
            .params
            .iter()
            .map(|name| self.request.text_or_empty(name))
            .collect();
        Ok(self.registry.encoder().encode(&values))
    }

    /// Write this pass's declarations for `identity` to durable storage.
    ///
    /// Returns `false` without touching storage when nothing was declared for
    /// the page, leaving earlier declarations in place.
    pub async fn persist(
        &self,
        identity: &PageIdentity,
        page_id: PageId,
    ) -> Result<bool, RegistryError> {
        let Some(params) = self.pending.get(identity) else {
            return Ok(false);
        };
        self.registry.store(identity, page_id, params).await?;
        Ok(true)
    }

    fn enter_expansion(&mut self) {
        if self.phase == RenderPhase::Idle {
            self.phase = RenderPhase::Expanding;
        }
    }

    fn disable_caching(&mut self, page: &PageRef, param: &str) {
        if self.caching_disabled {
            return;
        }
        self.caching_disabled = true;
        counter!(METRIC_RENDER_UNCACHEABLE_TOTAL).increment(1);
        debug!(page = %page.identity, param, "Render marked uncacheable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::request::QueryParams;
    use crate::cache::RegistryConfig;
    use crate::infra::memory::MemoryParamsRepo;

    fn identity(title: &str) -> PageIdentity {
        PageIdentity::new(title).unwrap()
    }

    fn set(names: &[&str]) -> ParameterSet {
        names.iter().copied().collect()
    }

    fn context(repo: Arc<MemoryParamsRepo>, query: &str) -> RenderContext {
        let registry = Arc::new(ParamRegistry::new(RegistryConfig::default(), repo));
        RenderContext::new(registry, Arc::new(QueryParams::from_query(query)))
    }

    #[tokio::test]
    async fn suffix_encodes_durable_params() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let id = PageId::new(1).unwrap();
        repo.seed(id, set(&["lang"]));
        let foo = PageRef::saved(identity("Foo"), id);

        let mut ctx = context(repo.clone(), "lang=en");
        assert_eq!(ctx.lookup(&foo).await.unwrap().params, set(&["lang"]));
        assert_eq!(ctx.derive_key_suffix(&foo).await.unwrap(), "|en|");
        assert_eq!(ctx.phase(), RenderPhase::Done);

        let mut ctx = context(repo, "lang=a%7Cb");
        assert_eq!(ctx.derive_key_suffix(&foo).await.unwrap(), "|a||b|");
    }

    #[tokio::test]
    async fn suffix_is_deterministic_and_ordered() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let id = PageId::new(5).unwrap();
        repo.seed(id, set(&["c", "a", "b"]));
        let page = PageRef::saved(identity("Multi"), id);

        let mut ctx = context(repo, "b=2&a=1&c=3");
        let first = ctx.derive_key_suffix(&page).await.unwrap();
        let second = ctx.derive_key_suffix(&page).await.unwrap();
        assert_eq!(first, "|1|2|3|");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn suffix_is_empty_without_declarations() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let page = PageRef::saved(identity("Plain"), PageId::new(9).unwrap());

        let mut ctx = context(repo, "lang=en");
        assert!(ctx.lookup(&page).await.unwrap().params.is_empty());
        assert_eq!(ctx.derive_key_suffix(&page).await.unwrap(), "");
    }

    #[tokio::test]
    async fn missing_values_encode_as_empty() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let id = PageId::new(2).unwrap();
        repo.seed(id, set(&["lang", "mode"]));
        let page = PageRef::saved(identity("Foo"), id);

        let mut ctx = context(repo, "mode=print");
        assert_eq!(ctx.derive_key_suffix(&page).await.unwrap(), "||print|");
    }

    #[tokio::test]
    async fn undeclared_read_disables_caching() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let page = PageRef::saved(identity("Loose"), PageId::new(3).unwrap());

        let mut ctx = context(repo, "z=value");
        assert_eq!(ctx.read_param(&page, "z").await, "value");
        assert!(ctx.caching_disabled());
    }

    #[tokio::test]
    async fn undeclared_absent_read_returns_empty_and_disables_caching() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let page = PageRef::unsaved(identity("New"));

        let mut ctx = context(repo, "");
        assert_eq!(ctx.read_param(&page, "z").await, "");
        assert!(ctx.caching_disabled());
    }

    #[tokio::test]
    async fn declared_read_keeps_caching() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let page = PageRef::unsaved(identity("New"));

        let mut ctx = context(repo, "lang=fr");
        ctx.declare(&page.identity, ["lang"]);
        assert_eq!(ctx.read_param(&page, "lang").await, "fr");
        assert!(!ctx.caching_disabled());
        assert_eq!(ctx.phase(), RenderPhase::Expanding);
    }

    #[tokio::test]
    async fn caching_stays_disabled_for_the_render() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let page = PageRef::unsaved(identity("New"));

        let mut ctx = context(repo, "a=1");
        ctx.read_param(&page, "a").await;
        ctx.declare(&page.identity, ["a"]);
        ctx.read_param(&page, "a").await;
        ctx.derive_key_suffix(&page).await.unwrap();
        assert!(ctx.caching_disabled());
    }

    #[tokio::test]
    async fn pending_declarations_shadow_cache_and_storage() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let id = PageId::new(4).unwrap();
        repo.seed(id, set(&["old"]));
        let page = PageRef::saved(identity("Shadow"), id);

        let mut ctx = context(repo.clone(), "");
        ctx.declare(&page.identity, Vec::<String>::new());
        let entry = ctx.lookup(&page).await.unwrap();
        assert_eq!(entry.origin, Origin::Pending);
        assert!(entry.params.is_empty());
        assert_eq!(repo.load_calls(), 0);
    }

    #[tokio::test]
    async fn persist_replaces_prior_rows() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let id = PageId::new(42).unwrap();
        repo.seed(id, set(&["stale"]));
        let bar = identity("Bar");

        let mut ctx = context(repo.clone(), "");
        ctx.declare(&bar, ["x", "y"]);
        assert!(ctx.persist(&bar, id).await.unwrap());
        assert_eq!(repo.stored(id), Some(set(&["x", "y"])));
    }

    #[tokio::test]
    async fn persist_is_idempotent() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let id = PageId::new(42).unwrap();
        let bar = identity("Bar");

        let mut ctx = context(repo.clone(), "");
        ctx.declare(&bar, ["x", "y", "x"]);
        ctx.persist(&bar, id).await.unwrap();
        let once = repo.stored(id);
        ctx.persist(&bar, id).await.unwrap();
        assert_eq!(repo.stored(id), once);
        assert_eq!(repo.replace_calls(), 2);
    }

    #[tokio::test]
    async fn persist_without_declarations_is_noop() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let id = PageId::new(8).unwrap();
        repo.seed(id, set(&["keep"]));
        let page = identity("Untouched");

        let ctx = context(repo.clone(), "");
        assert!(!ctx.persist(&page, id).await.unwrap());
        assert_eq!(repo.stored(id), Some(set(&["keep"])));
        assert_eq!(repo.replace_calls(), 0);
    }

    #[tokio::test]
    async fn storage_failure_on_read_fails_open() {
        let repo = Arc::new(MemoryParamsRepo::new());
        repo.fail_next("database is down");
        let page = PageRef::saved(identity("Foo"), PageId::new(1).unwrap());

        let mut ctx = context(repo, "lang=en");
        assert_eq!(ctx.read_param(&page, "lang").await, "en");
        assert!(ctx.caching_disabled());
    }

    #[tokio::test]
    async fn storage_failure_on_key_derivation_disables_caching() {
        let repo = Arc::new(MemoryParamsRepo::new());
        repo.fail_next("database is down");
        let page = PageRef::saved(identity("Foo"), PageId::new(1).unwrap());

        let mut ctx = context(repo, "lang=en");
        let other = PageRef::unsaved(identity("Other"));
        ctx.declare(&other.identity, ["lang"]);
        ctx.read_param(&other, "lang").await;
        assert_eq!(ctx.phase(), RenderPhase::Expanding);
        assert!(!ctx.caching_disabled());

        let err = ctx.derive_key_suffix(&page).await.unwrap_err();
        assert!(matches!(err, RegistryError::Storage(_)));
        assert!(ctx.caching_disabled());
        assert_eq!(ctx.phase(), RenderPhase::Done);
    }

    #[tokio::test]
    async fn read_param_trims_the_name() {
        let repo = Arc::new(MemoryParamsRepo::new());
        let page = PageRef::unsaved(identity("New"));

        let mut ctx = context(repo, "lang=fr");
        ctx.declare(&page.identity, ["lang"]);
        assert_eq!(ctx.read_param(&page, "  lang ").await, "fr");
        assert!(!ctx.caching_disabled());
    }

    #[test]
    fn new_context_starts_idle() {
        let ctx = context(Arc::new(MemoryParamsRepo::new()), "");
        assert_eq!(ctx.phase(), RenderPhase::Idle);
    }
}
