//! Plugin contract shared by attribute definitions and data connectors.
//!
//! Every attribute-producing unit is registered as a [`ResolverPlugin`]:
//! either a [`DefinitionPlugin`] wrapping an [`AttributeDefinition`], or a
//! [`ConnectorPlugin`] wrapping a [`DataConnector`]. The wrappers carry the
//! settings the engine acts on (id, dependencies, failure handling); the
//! wrapped trait objects only produce values.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tessera_types::{Attribute, AttributeMap, AttributeValue, RequestContext};

use crate::cooldown::FailureCell;
use crate::error::PluginError;
use crate::work::WorkContext;

// ============================================================================
// Dependencies
// ============================================================================

/// A reference from one plugin to another it needs resolved first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginDependency {
    /// Id of the plugin depended on.
    pub plugin_id: String,
    /// For data connector dependencies, the attribute to read from the
    /// connector's output. `None` means every attribute it produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_id: Option<String>,
}

impl PluginDependency {
    /// Depends on a plugin as a whole.
    pub fn on(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            attribute_id: None,
        }
    }

    /// Depends on a single named attribute produced by a data connector.
    pub fn attribute(plugin_id: impl Into<String>, attribute_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            attribute_id: Some(attribute_id.into()),
        }
    }
}

// ============================================================================
// Plugin Traits
// ============================================================================

/// Produces at most one attribute.
///
/// The returned attribute should carry the plugin's id; the resolver
/// renames it otherwise.
pub trait AttributeDefinition: Send + Sync {
    fn resolve(&self, scope: &PluginScope<'_>) -> Result<Option<Attribute>, PluginError>;
}

/// Produces zero or more named attributes.
///
/// Implementations may block on external I/O. They must not retry
/// internally on behalf of the engine; failure bookkeeping is the resolver's.
pub trait DataConnector: Send + Sync {
    fn resolve(&self, scope: &PluginScope<'_>) -> Result<AttributeMap, PluginError>;
}

/// Decides whether a plugin takes part in a request at all.
pub trait ActivationCondition: Send + Sync {
    fn is_active(&self, request: &RequestContext) -> bool;
}

impl<F> ActivationCondition for F
where
    F: Fn(&RequestContext) -> bool + Send + Sync,
{
    fn is_active(&self, request: &RequestContext) -> bool {
        self(request)
    }
}

// ============================================================================
// Plugin Scope
// ============================================================================

/// What a plugin sees while resolving.
///
/// Gives read access to the request and to the results of every plugin
/// resolved so far, which always includes this plugin's dependencies.
pub struct PluginScope<'a> {
    plugin_id: &'a str,
    dependencies: &'a [PluginDependency],
    request: &'a RequestContext,
    work: &'a WorkContext,
}

impl<'a> PluginScope<'a> {
    pub(crate) fn new(
        plugin_id: &'a str,
        dependencies: &'a [PluginDependency],
        request: &'a RequestContext,
        work: &'a WorkContext,
    ) -> Self {
        Self {
            plugin_id,
            dependencies,
            request,
            work,
        }
    }

    pub fn plugin_id(&self) -> &str {
        self.plugin_id
    }

    pub fn request(&self) -> &RequestContext {
        self.request
    }

    pub fn work(&self) -> &WorkContext {
        self.work
    }

    pub fn dependencies(&self) -> &[PluginDependency] {
        self.dependencies
    }

    /// Values of every dependency merged into one list.
    ///
    /// Definition dependencies contribute their attribute's values. Connector
    /// dependencies contribute the named attribute, or all attributes when the
    /// dependency names none. Duplicates are dropped; first occurrence wins.
    pub fn dependency_values(&self) -> Vec<AttributeValue> {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for attribute in self.dependency_sources() {
            for value in attribute.values() {
                if seen.insert(value) {
                    merged.push(value.clone());
                }
            }
        }
        merged
    }

    /// Dependency outputs grouped by source attribute id.
    ///
    /// Attributes with the same id from different dependencies are merged.
    pub fn dependency_attributes(&self) -> AttributeMap {
        let mut merged = AttributeMap::new();
        for attribute in self.dependency_sources() {
            merged
                .entry(attribute.id().to_string())
                .or_insert_with(|| Attribute::new(attribute.id()))
                .extend(attribute.values().iter().cloned());
        }
        for attribute in merged.values_mut() {
            attribute.dedup_values();
        }
        merged
    }

    fn dependency_sources(&self) -> impl Iterator<Item = &'a Attribute> + 'a {
        let work = self.work;
        self.dependencies.iter().flat_map(move |dep| {
            let from_definition = work.attribute(&dep.plugin_id).into_iter();
            let from_connector = work
                .connector_attributes(&dep.plugin_id)
                .into_iter()
                .flat_map(move |attributes| match &dep.attribute_id {
                    Some(name) => attributes.get(name).into_iter().collect::<Vec<_>>(),
                    None => attributes.values().collect(),
                });
            from_definition.chain(from_connector)
        })
    }
}

// ============================================================================
// Registered Plugins
// ============================================================================

/// Settings common to both plugin kinds.
#[derive(Clone)]
pub struct PluginCore {
    pub(crate) id: String,
    pub(crate) dependencies: Vec<PluginDependency>,
    pub(crate) propagate_failure: bool,
    pub(crate) activation: Option<Arc<dyn ActivationCondition>>,
}

impl PluginCore {
    fn new(id: String) -> Self {
        Self {
            id,
            dependencies: Vec::new(),
            propagate_failure: true,
            activation: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dependencies(&self) -> &[PluginDependency] {
        &self.dependencies
    }

    /// Whether a failure of this plugin aborts the request.
    pub fn propagate_failure(&self) -> bool {
        self.propagate_failure
    }

    pub(crate) fn is_active(&self, request: &RequestContext) -> bool {
        self.activation
            .as_ref()
            .is_none_or(|condition| condition.is_active(request))
    }
}

impl fmt::Debug for PluginCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCore")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("propagate_failure", &self.propagate_failure)
            .field("has_activation_condition", &self.activation.is_some())
            .finish()
    }
}

/// A registered attribute definition.
pub struct DefinitionPlugin {
    pub(crate) core: PluginCore,
    pub(crate) dependency_only: bool,
    pub(crate) definition: Box<dyn AttributeDefinition>,
}

impl DefinitionPlugin {
    pub fn new(id: impl Into<String>, definition: impl AttributeDefinition + 'static) -> Self {
        Self {
            core: PluginCore::new(id.into()),
            dependency_only: false,
            definition: Box::new(definition),
        }
    }

    /// Adds a dependency.
    pub fn depends_on(mut self, dependency: PluginDependency) -> Self {
        self.core.dependencies.push(dependency);
        self
    }

    /// Marks the definition as feeding other plugins only; it is never released.
    pub fn dependency_only(mut self, dependency_only: bool) -> Self {
        self.dependency_only = dependency_only;
        self
    }

    /// When false, a failure is logged and the definition resolves to nothing.
    pub fn propagate_failure(mut self, propagate: bool) -> Self {
        self.core.propagate_failure = propagate;
        self
    }

    /// Restricts the definition to requests for which the condition holds.
    pub fn activation_condition(mut self, condition: impl ActivationCondition + 'static) -> Self {
        self.core.activation = Some(Arc::new(condition));
        self
    }

    pub fn core(&self) -> &PluginCore {
        &self.core
    }

    pub fn id(&self) -> &str {
        &self.core.id
    }

    pub fn is_dependency_only(&self) -> bool {
        self.dependency_only
    }
}

impl fmt::Debug for DefinitionPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinitionPlugin")
            .field("core", &self.core)
            .field("dependency_only", &self.dependency_only)
            .finish_non_exhaustive()
    }
}

/// A registered data connector.
///
/// Owns the connector's failure cell, which outlives individual requests.
pub struct ConnectorPlugin {
    pub(crate) core: PluginCore,
    pub(crate) failover: Option<String>,
    pub(crate) no_retry_delay: Option<Duration>,
    pub(crate) failures: FailureCell,
    pub(crate) connector: Box<dyn DataConnector>,
}

impl ConnectorPlugin {
    pub fn new(id: impl Into<String>, connector: impl DataConnector + 'static) -> Self {
        Self {
            core: PluginCore::new(id.into()),
            failover: None,
            no_retry_delay: None,
            failures: FailureCell::new(),
            connector: Box::new(connector),
        }
    }

    /// Adds a dependency.
    pub fn depends_on(mut self, dependency: PluginDependency) -> Self {
        self.core.dependencies.push(dependency);
        self
    }

    /// Names the connector to use when this one fails.
    pub fn failover(mut self, connector_id: impl Into<String>) -> Self {
        self.failover = Some(connector_id.into());
        self
    }

    /// Skips this connector for `delay` after a failure.
    pub fn no_retry_delay(mut self, delay: Duration) -> Self {
        self.no_retry_delay = Some(delay);
        self
    }

    /// When false, an unrecoverable failure is logged and the connector
    /// resolves to nothing.
    pub fn propagate_failure(mut self, propagate: bool) -> Self {
        self.core.propagate_failure = propagate;
        self
    }

    /// Restricts the connector to requests for which the condition holds.
    pub fn activation_condition(mut self, condition: impl ActivationCondition + 'static) -> Self {
        self.core.activation = Some(Arc::new(condition));
        self
    }

    pub fn core(&self) -> &PluginCore {
        &self.core
    }

    pub fn id(&self) -> &str {
        &self.core.id
    }

    pub fn failover_id(&self) -> Option<&str> {
        self.failover.as_deref()
    }

    pub fn retry_delay(&self) -> Option<Duration> {
        self.no_retry_delay
    }

    /// Epoch millisecond of the most recent failure, if any.
    pub fn last_failure_ms(&self) -> Option<i64> {
        self.failures.last_failure_ms()
    }
}

impl fmt::Debug for ConnectorPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorPlugin")
            .field("core", &self.core)
            .field("failover", &self.failover)
            .field("no_retry_delay", &self.no_retry_delay)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

/// A plugin of either kind, as handed to the resolver.
#[derive(Debug)]
pub enum ResolverPlugin {
    Definition(DefinitionPlugin),
    Connector(ConnectorPlugin),
}

impl ResolverPlugin {
    pub fn core(&self) -> &PluginCore {
        match self {
            Self::Definition(plugin) => &plugin.core,
            Self::Connector(plugin) => &plugin.core,
        }
    }

    pub fn id(&self) -> &str {
        &self.core().id
    }

    /// Returns the kind of this plugin.
    pub fn kind(&self) -> PluginKind {
        match self {
            Self::Definition(_) => PluginKind::Definition,
            Self::Connector(_) => PluginKind::Connector,
        }
    }

    /// Failover target for connectors; always `None` for definitions.
    pub fn failover_id(&self) -> Option<&str> {
        match self {
            Self::Definition(_) => None,
            Self::Connector(plugin) => plugin.failover_id(),
        }
    }
}

impl From<DefinitionPlugin> for ResolverPlugin {
    fn from(plugin: DefinitionPlugin) -> Self {
        Self::Definition(plugin)
    }
}

impl From<ConnectorPlugin> for ResolverPlugin {
    fn from(plugin: ConnectorPlugin) -> Self {
        Self::Connector(plugin)
    }
}

/// The two plugin kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Definition,
    Connector,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Definition => write!(f, "attribute definition"),
            Self::Connector => write!(f, "data connector"),
        }
    }
}
