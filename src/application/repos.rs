//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::params::{PageId, ParameterSet};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Durable storage of the parameter names each page declared.
#[async_trait]
pub trait ParamsRepo: Send + Sync {
    /// Names stored for the page; empty when the page has no rows.
    async fn load_params(&self, page_id: PageId) -> Result<ParameterSet, RepoError>;

    /// Replaces every stored name of the page with `params` in one transaction.
    async fn replace_params(&self, page_id: PageId, params: &ParameterSet)
    -> Result<(), RepoError>;
}
