//! Configuration management for Tessera
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (TESSERA_* prefix, `__` between nested keys)
//! 2. tessera.local.toml (gitignored, local overrides)
//! 3. tessera.toml (git-tracked, project config)
//! 4. ~/.config/tessera/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! Besides engine settings, a configuration declares the attribute
//! definitions, data connectors, and filter policies an authority is built
//! from.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

use tessera_filter::AttributeFilterPolicy;
use tessera_resolver::PluginDependency;
use tessera_types::Attribute;

/// Main Tessera configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseraConfig {
    pub authority: AuthorityConfig,
    pub resolver: ResolverConfig,
    pub attribute_definitions: Vec<AttributeDefinitionConfig>,
    pub data_connectors: Vec<DataConnectorConfig>,
    pub filter_policies: Vec<AttributeFilterPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Issuer id used for requests that do not name one.
    pub id: String,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            id: "tessera".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// No-retry window for connectors that do not set their own. 0 disables it.
    pub default_no_retry_delay_ms: u64,
    /// Fail requests that name undefined attributes.
    pub strict: bool,
}

// ============================================================================
// Plugin Descriptions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    /// Releases the merged values of its dependencies.
    Simple,
    /// Scopes the string values of its dependencies with `scope`.
    Scoped,
    /// Releases the request principal.
    PrincipalName,
}

/// Attribute definition from config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinitionConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DefinitionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<PluginDependency>,
    #[serde(default)]
    pub dependency_only: bool,
    #[serde(default = "default_true")]
    pub propagate_failure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    /// Returns `attributes` for every request.
    Static,
    /// Always fails. Stands in for an offline source when exercising failover.
    Unavailable,
}

/// Data connector from config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConnectorConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConnectorKind,
    #[serde(default)]
    pub dependencies: Vec<PluginDependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_retry_delay_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub propagate_failure: bool,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

fn default_true() -> bool {
    true
}

impl TesseraConfig {
    /// Load layered configuration for a project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML document, without layering
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check shape errors the engines would report less clearly.
    ///
    /// Dependency references, failovers, and cycles are checked when the
    /// resolver is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.authority.id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "authority.id must not be empty".to_string(),
            ));
        }

        let mut plugin_ids = HashSet::new();
        let definition_ids = self.attribute_definitions.iter().map(|d| d.id.as_str());
        let connector_ids = self.data_connectors.iter().map(|c| c.id.as_str());
        for id in definition_ids.chain(connector_ids) {
            if id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "plugin ids must not be empty".to_string(),
                ));
            }
            if !plugin_ids.insert(id) {
                return Err(ConfigError::ValidationError(format!(
                    "plugin id '{id}' is declared more than once"
                )));
            }
        }

        for definition in &self.attribute_definitions {
            if definition.kind == DefinitionKind::Scoped
                && definition.scope.as_deref().is_none_or(str::is_empty)
            {
                return Err(ConfigError::ValidationError(format!(
                    "scoped attribute definition '{}' needs a scope",
                    definition.id
                )));
            }
        }

        for policy in &self.filter_policies {
            if policy.id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "filter policy ids must not be empty".to_string(),
                ));
            }
            if let Some(rule) = policy.rules.iter().find(|r| r.attribute_id.is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "rule '{}' in filter policy '{}' names no attribute",
                    rule.id, policy.id
                )));
            }
        }

        Ok(())
    }
}
