//! Registry configuration.
//!
//! Controls the process-local parameter cache and the render-key encoding via
//! the `[registry]` table of `renderkey.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

use super::keys::{DEFAULT_SEPARATOR, KeyEncoding, SuffixEncoder};

const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Keep loaded parameter sets in process memory.
    pub enable_cache: bool,
    /// Maximum pages held in the process-local cache.
    pub cache_capacity: usize,
    /// Separator used by the doubling encoding.
    pub separator: char,
    /// Suffix encoding appended to render keys.
    pub encoding: KeyEncoding,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            separator: DEFAULT_SEPARATOR,
            encoding: KeyEncoding::default(),
        }
    }
}

impl From<&crate::config::RegistrySettings> for RegistryConfig {
    fn from(settings: &crate::config::RegistrySettings) -> Self {
        Self {
            enable_cache: settings.enable_cache,
            cache_capacity: settings.cache_capacity.get(),
            separator: settings.separator,
            encoding: settings.encoding,
        }
    }
}

impl RegistryConfig {
    /// Returns the cache capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn cache_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.cache_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn encoder(&self) -> SuffixEncoder {
        SuffixEncoder::from_encoding(self.encoding, self.separator)
    }
}
