//! Render-key caching support.
//!
//! - **Registry**: which request parameters each page declared, read through a
//!   bounded process-local cache into durable storage
//! - **Keys**: encodings that turn declared parameter values into the suffix
//!   appended to the host's render key
//!
//! ## Configuration
//!
//! ```toml
//! [registry]
//! enable_cache = true
//! cache_capacity = 1000
//! separator = "|"
//! encoding = "doubling"
//! ```

mod config;
mod keys;
pub(crate) mod lock;
mod registry;

pub use config::RegistryConfig;
pub use keys::{
    DEFAULT_SEPARATOR, DoublingEncoder, KeyEncoder, KeyEncoding, LengthPrefixedEncoder,
    SuffixEncoder,
};
pub use registry::{
    METRIC_REGISTRY_EVICT_TOTAL, METRIC_REGISTRY_LOOKUP_TOTAL, METRIC_REGISTRY_PERSIST_TOTAL,
    ParamRegistry,
};
