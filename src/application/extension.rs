//! Hook surface handed to the host wiki.
//!
//! Usage from page content:
//! - declare the parameters a page depends on with
//!   `{{#requestparams: lang|mode}}`
//! - read them with `{{#request: lang}}`

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::cache::ParamRegistry;
use crate::domain::params::PageRef;
use crate::infra::schema::{SchemaBackend, SchemaError, SchemaUpdate};

use super::context::RenderContext;
use super::error::RegistryError;
use super::request::RequestParams;

pub const DIRECTIVE_REQUEST: &str = "request";
pub const DIRECTIVE_REQUEST_PARAMS: &str = "requestparams";

/// Content-expansion directives this extension implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `request(name)`: live value of a parameter.
    Request,
    /// `requestparams(name, ...)`: declare cache-relevant parameters.
    RequestParams,
}

impl Directive {
    pub const ALL: [Directive; 2] = [Directive::Request, Directive::RequestParams];

    pub fn name(self) -> &'static str {
        match self {
            Directive::Request => DIRECTIVE_REQUEST,
            Directive::RequestParams => DIRECTIVE_REQUEST_PARAMS,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|directive| directive.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Outcome of a page save, as reported by the host.
#[derive(Debug, Clone)]
pub struct SavedPage {
    pub page: PageRef,
    /// Whether the saved revision changed the page text.
    pub changed: bool,
}

/// One instance per worker process; hands out a context per render or save.
#[derive(Clone)]
pub struct RequestParamsExtension {
    registry: Arc<ParamRegistry>,
}

impl RequestParamsExtension {
    pub fn new(registry: Arc<ParamRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ParamRegistry> {
        &self.registry
    }

    /// Directive names the host must register with its parser.
    pub fn directive_names(&self) -> [&'static str; 2] {
        Directive::ALL.map(Directive::name)
    }

    /// Start a render or save pass for the given request.
    pub fn begin(&self, request: Arc<dyn RequestParams>) -> RenderContext {
        RenderContext::new(self.registry.clone(), request)
    }

    /// Expand a directive encountered while parsing `page`.
    pub async fn expand(
        &self,
        ctx: &mut RenderContext,
        page: &PageRef,
        directive: &str,
        args: &[&str],
    ) -> Result<String, RegistryError> {
        match Directive::from_name(directive) {
            Some(Directive::Request) => {
                let name = args.first().ok_or(RegistryError::MissingArgument {
                    directive: DIRECTIVE_REQUEST,
                })?;
                Ok(ctx.read_param(page, name).await)
            }
            Some(Directive::RequestParams) => {
                ctx.declare(&page.identity, args.iter().copied());
                Ok(String::new())
            }
            None => Err(RegistryError::UnknownDirective {
                name: directive.to_string(),
            }),
        }
    }

    /// Append the declared parameters' live values to the host's render key.
    ///
    /// On storage failure the key is left untouched and the render is marked
    /// uncacheable, so the host renders fresh instead of serving a wrong entry.
    #[instrument(skip_all, fields(page = %page.identity))]
    pub async fn render_key(
        &self,
        ctx: &mut RenderContext,
        page: &PageRef,
        render_key: &mut String,
    ) {
        match ctx.derive_key_suffix(page).await {
            Ok(suffix) => render_key.push_str(&suffix),
            Err(err) => warn!(error = %err, "Render key left without parameter suffix"),
        }
    }

    /// Persist the declarations collected while saving `saved`.
    ///
    /// Returns whether storage was written.
    #[instrument(skip_all, fields(page = %saved.page.identity, changed = saved.changed))]
    pub async fn page_saved(
        &self,
        ctx: &RenderContext,
        saved: &SavedPage,
    ) -> Result<bool, RegistryError> {
        if ctx.pending(&saved.page.identity).is_none() {
            return Ok(false);
        }
        let page_id = saved
            .page
            .page_id
            .ok_or_else(|| RegistryError::MissingPageId {
                identity: saved.page.identity.clone(),
            })?;
        let written = ctx.persist(&saved.page.identity, page_id).await?;
        info!(page_id = page_id.get(), "Stored request parameter declarations");
        Ok(written)
    }

    /// Table bootstrap for the host's install/upgrade step.
    pub fn schema_update(&self, backend: &str) -> Result<SchemaUpdate, SchemaError> {
        let backend: SchemaBackend = backend.parse()?;
        Ok(backend.schema_update())
    }
}
