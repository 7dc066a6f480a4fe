//! Error types for graph validation and attribute resolution.

use thiserror::Error;

/// Error raised while building a resolver.
///
/// A resolver that fails validation is never constructed; none of these are
/// recoverable at request time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Two plugins share an id (across definitions and connectors combined).
    #[error("Duplicate plugin id '{0}'")]
    DuplicatePluginId(String),

    /// A plugin depends on an id that is not registered.
    #[error("Plugin '{plugin_id}' depends on unknown plugin '{dependency_id}'")]
    MissingDependency {
        plugin_id: String,
        dependency_id: String,
    },

    /// A dependency chain leads back to the plugin it started from.
    #[error("Plugin '{plugin_id}' has a circular dependency through '{dependency_id}'")]
    CircularDependency {
        plugin_id: String,
        dependency_id: String,
    },

    /// A connector names a failover that is not registered.
    #[error("Data connector '{connector_id}' names unknown failover '{failover_id}'")]
    UnknownFailover {
        connector_id: String,
        failover_id: String,
    },

    /// A connector names an attribute definition as its failover.
    #[error("Data connector '{connector_id}' names '{failover_id}' as failover, which is not a data connector")]
    FailoverNotConnector {
        connector_id: String,
        failover_id: String,
    },
}

/// Error returned by a plugin's own resolve logic.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin could not produce a result.
    #[error("{0}")]
    Failed(String),

    /// The plugin failed because an external collaborator failed.
    #[error("{message}")]
    Source {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PluginError {
    /// Creates a plain failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Creates a failure wrapping an underlying error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Source {
            message: message.into(),
            source: source.into(),
        }
    }
}

/// Error that aborts resolution of a request.
///
/// When `resolve` returns one of these, the request context carries no
/// resolved attributes.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// A plugin's resolve logic failed and no failover absorbed it.
    #[error("Plugin '{plugin_id}' failed to resolve: {source}")]
    PluginFailed {
        plugin_id: String,
        #[source]
        source: PluginError,
    },

    /// A connector's failover could not serve the request either.
    #[error("Data connector '{connector_id}' failed over to '{failover_id}', which also failed: {source}")]
    FailoverFailed {
        connector_id: String,
        failover_id: String,
        #[source]
        source: Box<ResolutionError>,
    },

    /// A connector failed recently and has no failover to use meanwhile.
    #[error("Data connector '{connector_id}' failed previously and will not be retried for another {remaining_ms}ms")]
    Cooldown {
        connector_id: String,
        remaining_ms: i64,
    },

    /// A plugin already failed earlier in this request and is not run again.
    #[error("Plugin '{plugin_id}' already failed in this request: {reason}")]
    AlreadyFailed { plugin_id: String, reason: String },

    /// The same plugin was recorded twice in one work context.
    #[error("Plugin '{plugin_id}' was resolved more than once in a single request")]
    DuplicateResolution { plugin_id: String },

    /// A dependency that passed validation is missing at request time.
    #[error("Plugin '{plugin_id}' references unregistered plugin '{dependency_id}'")]
    InconsistentGraph {
        plugin_id: String,
        dependency_id: String,
    },

    /// A requested attribute is not defined (strict mode only).
    #[error("Requested attribute '{0}' is not defined")]
    UnknownAttribute(String),
}

impl ResolutionError {
    /// Returns the id of the plugin this error originates from, if any.
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            Self::PluginFailed { plugin_id, .. }
            | Self::AlreadyFailed { plugin_id, .. }
            | Self::DuplicateResolution { plugin_id }
            | Self::InconsistentGraph { plugin_id, .. } => Some(plugin_id),
            Self::FailoverFailed { connector_id, .. } | Self::Cooldown { connector_id, .. } => {
                Some(connector_id)
            }
            Self::UnknownAttribute(_) => None,
        }
    }
}

/// Result type for resolution.
pub type Result<T> = std::result::Result<T, ResolutionError>;
