//! Error types for the attribute authority.

use tessera_config::ConfigError;
use tessera_filter::FilterBuildError;
use tessera_resolver::{ConfigurationError, ResolutionError};
use thiserror::Error;

/// Errors raised while building or using an [`AttributeAuthority`](crate::AttributeAuthority).
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// The configuration failed its own shape checks.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The plugin graph is invalid; the resolver was not built.
    #[error("Invalid resolver configuration: {0}")]
    Resolver(#[from] ConfigurationError),

    /// The policy set is invalid; the filter was not built.
    #[error("Invalid filter configuration: {0}")]
    Filter(#[from] FilterBuildError),

    /// A request could not be resolved.
    #[error("Attribute resolution failed: {0}")]
    Resolution(#[from] ResolutionError),
}

/// Result type for authority operations.
pub type Result<T> = std::result::Result<T, AuthorityError>;
