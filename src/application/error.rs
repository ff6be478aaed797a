use thiserror::Error;

use crate::{
    application::repos::RepoError, domain::error::DomainError, domain::params::PageIdentity,
    infra::error::InfraError, infra::schema::SchemaError,
};

/// Failures surfaced by the registry and the host hooks.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("parameter storage unavailable: {0}")]
    Storage(#[from] RepoError),
    #[error("page `{identity}` has no durable id")]
    MissingPageId { identity: PageIdentity },
    #[error("unknown directive `{name}`")]
    UnknownDirective { name: String },
    #[error("directive `{directive}` requires a parameter name")]
    MissingArgument { directive: &'static str },
}

/// Top-level error of the administrative binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        Self::Registry(RegistryError::Storage(err))
    }
}
