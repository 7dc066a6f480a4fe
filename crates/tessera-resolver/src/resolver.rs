//! The attribute resolution engine.
//!
//! For each request the resolver walks the dependency graph from the
//! requested attribute definitions, resolving every plugin at most once,
//! dependencies first. Connector failures are absorbed by failover where
//! configured; otherwise the request fails as a whole.

use std::collections::HashMap;
use std::sync::Arc;

use tessera_types::{AttributeMap, Clock, RequestContext, SystemClock};
use tracing::{debug, info, warn};

use crate::error::{ConfigurationError, ResolutionError, Result};
use crate::graph::DependencyGraph;
use crate::plugin::{ConnectorPlugin, DefinitionPlugin, PluginCore, PluginScope, ResolverPlugin};
use crate::work::{ResolvedRecord, WorkContext};

/// Resolves attributes for requests.
///
/// Immutable once built apart from each connector's failure cell; share it
/// across threads behind an `Arc`.
#[derive(Debug)]
pub struct AttributeResolver {
    id: String,
    definitions: HashMap<String, DefinitionPlugin>,
    connectors: HashMap<String, ConnectorPlugin>,
    clock: Arc<dyn Clock>,
    strict: bool,
}

impl AttributeResolver {
    /// Builds a resolver from a complete plugin set.
    ///
    /// # Errors
    ///
    /// Any [`ConfigurationError`]: duplicate ids, dangling dependencies or
    /// failovers, or a cycle.
    pub fn new(
        id: impl Into<String>,
        plugins: impl IntoIterator<Item = ResolverPlugin>,
    ) -> std::result::Result<Self, ConfigurationError> {
        let id = id.into();
        let plugins: Vec<ResolverPlugin> = plugins.into_iter().collect();
        DependencyGraph::from_plugins(&plugins)?.validate()?;

        let mut definitions = HashMap::new();
        let mut connectors = HashMap::new();
        for plugin in plugins {
            match plugin {
                ResolverPlugin::Definition(plugin) => {
                    definitions.insert(plugin.id().to_string(), plugin);
                }
                ResolverPlugin::Connector(plugin) => {
                    connectors.insert(plugin.id().to_string(), plugin);
                }
            }
        }

        info!(
            resolver = %id,
            definitions = definitions.len(),
            connectors = connectors.len(),
            "Attribute resolver ready"
        );

        Ok(Self {
            id,
            definitions,
            connectors,
            clock: Arc::new(SystemClock),
            strict: false,
        })
    }

    /// Replaces the clock used for failure bookkeeping.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// When strict, requesting an undefined attribute fails the request.
    pub fn with_strict_requests(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Ids of every registered attribute definition, sorted.
    pub fn definition_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of every registered data connector, sorted.
    pub fn connector_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn definition(&self, id: &str) -> Option<&DefinitionPlugin> {
        self.definitions.get(id)
    }

    pub fn connector(&self, id: &str) -> Option<&ConnectorPlugin> {
        self.connectors.get(id)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolves the request's attributes into `ctx.resolved_attributes`.
    ///
    /// Resolves `ctx.requested_attributes`, or every attribute definition when
    /// that list is empty. On error `ctx.resolved_attributes` is left as it
    /// was; no partial result is published.
    pub fn resolve(&self, ctx: &mut RequestContext) -> Result<()> {
        let mut work = WorkContext::new();

        let targets: Vec<String> = if ctx.requested_attributes.is_empty() {
            self.definition_ids().into_iter().map(String::from).collect()
        } else {
            ctx.requested_attributes.clone()
        };

        for id in &targets {
            if self.strict && !self.definitions.contains_key(id) {
                return Err(ResolutionError::UnknownAttribute(id.clone()));
            }
            self.resolve_definition(id, ctx, &mut work)?;
        }

        let resolved = self.finalize(work);
        info!(
            resolver = %self.id,
            principal = %ctx.principal,
            attributes = resolved.len(),
            "Resolved attributes"
        );
        ctx.resolved_attributes = resolved;
        Ok(())
    }

    /// Resolves one attribute definition and its dependencies.
    ///
    /// Unknown ids are ignored: a request may name attributes this resolver
    /// does not define.
    pub(crate) fn resolve_definition(
        &self,
        id: &str,
        request: &RequestContext,
        work: &mut WorkContext,
    ) -> Result<()> {
        work.replay_failure(id)?;
        if work.contains(id) {
            debug!(plugin_id = %id, "Attribute definition already resolved");
            return Ok(());
        }
        let Some(plugin) = self.definitions.get(id) else {
            debug!(plugin_id = %id, "No attribute definition with this id; skipping");
            return Ok(());
        };

        if !plugin.core.is_active(request) {
            debug!(plugin_id = %id, "Attribute definition inactive for this request");
            return work.record(id, ResolvedRecord::Definition(None));
        }

        self.resolve_dependencies(&plugin.core, request, work)?;

        let outcome = {
            let scope = PluginScope::new(id, &plugin.core.dependencies, request, work);
            plugin.definition.resolve(&scope)
        };

        let attribute = match outcome {
            Ok(Some(attribute)) if attribute.id() != id => {
                debug!(
                    plugin_id = %id,
                    attribute_id = %attribute.id(),
                    "Renaming attribute to its definition id"
                );
                Some(attribute.renamed(id))
            }
            Ok(attribute) => attribute,
            Err(source) if !plugin.core.propagate_failure => {
                warn!(plugin_id = %id, error = %source, "Attribute definition failed; continuing without it");
                None
            }
            Err(source) => {
                return Err(work.fail(
                    id,
                    ResolutionError::PluginFailed {
                        plugin_id: id.to_string(),
                        source,
                    },
                ));
            }
        };

        work.record(id, ResolvedRecord::Definition(attribute))
    }

    /// Resolves one data connector, applying cooldown and failover.
    pub(crate) fn resolve_connector(
        &self,
        plugin: &ConnectorPlugin,
        request: &RequestContext,
        work: &mut WorkContext,
    ) -> Result<()> {
        let id = plugin.id();
        work.replay_failure(id)?;
        if work.contains(id) {
            debug!(plugin_id = %id, "Data connector already resolved");
            return Ok(());
        }

        if !plugin.core.is_active(request) {
            debug!(plugin_id = %id, "Data connector inactive for this request");
            return work.record(id, ResolvedRecord::Connector(None));
        }

        if let Some(delay) = plugin.no_retry_delay {
            if let Some(remaining_ms) = plugin.failures.remaining_ms(self.clock.now_ms(), delay) {
                return match plugin.failover.as_deref() {
                    Some(failover_id) => {
                        info!(
                            plugin_id = %id,
                            failover_id = %failover_id,
                            remaining_ms,
                            "Data connector in cooldown; using failover"
                        );
                        self.substitute(plugin, failover_id, request, work)
                    }
                    None => self.unrecoverable(
                        plugin,
                        ResolutionError::Cooldown {
                            connector_id: id.to_string(),
                            remaining_ms,
                        },
                        work,
                    ),
                };
            }
        }

        self.resolve_dependencies(&plugin.core, request, work)?;

        let outcome = {
            let scope = PluginScope::new(id, &plugin.core.dependencies, request, work);
            plugin.connector.resolve(&scope)
        };

        match outcome {
            Ok(attributes) => {
                plugin.failures.clear();
                work.record(id, ResolvedRecord::Connector(Some(attributes)))
            }
            Err(source) => {
                plugin.failures.record_failure(self.clock.now_ms());
                warn!(plugin_id = %id, error = %source, "Data connector failed");
                match plugin.failover.as_deref() {
                    Some(failover_id) => {
                        info!(plugin_id = %id, failover_id = %failover_id, "Failing over");
                        self.substitute(plugin, failover_id, request, work)
                    }
                    None => self.unrecoverable(
                        plugin,
                        ResolutionError::PluginFailed {
                            plugin_id: id.to_string(),
                            source,
                        },
                        work,
                    ),
                }
            }
        }
    }

    fn resolve_dependencies(
        &self,
        core: &PluginCore,
        request: &RequestContext,
        work: &mut WorkContext,
    ) -> Result<()> {
        for dependency in &core.dependencies {
            let dependency_id = dependency.plugin_id.as_str();
            if self.definitions.contains_key(dependency_id) {
                self.resolve_definition(dependency_id, request, work)?;
            } else if let Some(connector) = self.connectors.get(dependency_id) {
                self.resolve_connector(connector, request, work)?;
            } else {
                return Err(ResolutionError::InconsistentGraph {
                    plugin_id: core.id.clone(),
                    dependency_id: dependency_id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resolves `failover_id` in place of `plugin` and links the two.
    fn substitute(
        &self,
        plugin: &ConnectorPlugin,
        failover_id: &str,
        request: &RequestContext,
        work: &mut WorkContext,
    ) -> Result<()> {
        let Some(failover) = self.connectors.get(failover_id) else {
            return Err(ResolutionError::InconsistentGraph {
                plugin_id: plugin.id().to_string(),
                dependency_id: failover_id.to_string(),
            });
        };

        match self.resolve_connector(failover, request, work) {
            Ok(()) => work.record(
                plugin.id(),
                ResolvedRecord::Failover {
                    served_by: failover_id.to_string(),
                },
            ),
            Err(source) => self.unrecoverable(
                plugin,
                ResolutionError::FailoverFailed {
                    connector_id: plugin.id().to_string(),
                    failover_id: failover_id.to_string(),
                    source: Box::new(source),
                },
                work,
            ),
        }
    }

    /// Propagates `error`, or swallows it if the connector opted out.
    fn unrecoverable(
        &self,
        plugin: &ConnectorPlugin,
        error: ResolutionError,
        work: &mut WorkContext,
    ) -> Result<()> {
        if plugin.core.propagate_failure {
            return Err(work.fail(plugin.id(), error));
        }
        warn!(plugin_id = %plugin.id(), error = %error, "Data connector failed; continuing without it");
        work.record(plugin.id(), ResolvedRecord::Connector(None))
    }

    /// Builds the releasable attribute set from a finished work context.
    ///
    /// Drops definitions that produced nothing, are dependency-only, or have
    /// no values; deduplicates the values of the rest.
    pub(crate) fn finalize(&self, work: WorkContext) -> AttributeMap {
        let mut resolved = AttributeMap::new();
        for (id, record) in work.into_records() {
            let ResolvedRecord::Definition(Some(mut attribute)) = record else {
                continue;
            };
            if self
                .definitions
                .get(&id)
                .is_some_and(DefinitionPlugin::is_dependency_only)
            {
                debug!(plugin_id = %id, "Dropping dependency-only attribute");
                continue;
            }
            if attribute.is_empty() {
                debug!(plugin_id = %id, "Dropping attribute with no values");
                continue;
            }
            attribute.dedup_values();
            resolved.insert(id, attribute);
        }
        resolved
    }
}
