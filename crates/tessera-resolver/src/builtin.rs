//! Built-in plugins that need no external data source.
//!
//! Directory, database, and scripted plugins live outside this crate and
//! implement the same traits.

use serde::{Deserialize, Serialize};
use tessera_types::{Attribute, AttributeMap, AttributeValue};
use tracing::debug;

use crate::error::PluginError;
use crate::plugin::{AttributeDefinition, DataConnector, PluginScope};

/// Releases the merged values of its dependencies unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleDefinition;

impl AttributeDefinition for SimpleDefinition {
    fn resolve(&self, scope: &PluginScope<'_>) -> Result<Option<Attribute>, PluginError> {
        Ok(Some(Attribute::with_values(
            scope.plugin_id(),
            scope.dependency_values(),
        )))
    }
}

/// Qualifies each string dependency value with a fixed scope.
///
/// Non-string values cannot be scoped and are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedDefinition {
    pub scope: String,
}

impl ScopedDefinition {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

impl AttributeDefinition for ScopedDefinition {
    fn resolve(&self, scope: &PluginScope<'_>) -> Result<Option<Attribute>, PluginError> {
        let mut attribute = Attribute::new(scope.plugin_id());
        for value in scope.dependency_values() {
            match value.as_str() {
                Some(text) => attribute.push(AttributeValue::scoped(text, &self.scope)),
                None => debug!(
                    plugin_id = %scope.plugin_id(),
                    value = ?value,
                    "Skipping non-string value"
                ),
            }
        }
        Ok(Some(attribute))
    }
}

/// Releases the request's principal name.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrincipalNameDefinition;

impl AttributeDefinition for PrincipalNameDefinition {
    fn resolve(&self, scope: &PluginScope<'_>) -> Result<Option<Attribute>, PluginError> {
        let principal = &scope.request().principal;
        if principal.is_empty() {
            return Ok(None);
        }
        Ok(Some(Attribute::with_values(
            scope.plugin_id(),
            [principal.as_str()],
        )))
    }
}

/// Returns the same attributes for every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticConnector {
    attributes: AttributeMap,
}

impl StaticConnector {
    pub fn new(attributes: impl IntoIterator<Item = Attribute>) -> Self {
        Self {
            attributes: attributes
                .into_iter()
                .map(|attribute| (attribute.id().to_string(), attribute))
                .collect(),
        }
    }

    /// Adds an attribute (builder pattern).
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes
            .insert(attribute.id().to_string(), attribute);
        self
    }
}

impl DataConnector for StaticConnector {
    fn resolve(&self, _scope: &PluginScope<'_>) -> Result<AttributeMap, PluginError> {
        Ok(self.attributes.clone())
    }
}

/// Fails every request.
///
/// Stands in for a source that is offline, so failover and the no-retry
/// window can be exercised without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableConnector {
    message: String,
}

impl UnavailableConnector {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for UnavailableConnector {
    fn default() -> Self {
        Self::new("data source unavailable")
    }
}

impl DataConnector for UnavailableConnector {
    fn resolve(&self, scope: &PluginScope<'_>) -> Result<AttributeMap, PluginError> {
        debug!(plugin_id = %scope.plugin_id(), "Unavailable connector invoked");
        Err(PluginError::new(self.message.clone()))
    }
}
