//! Static validation of the plugin dependency graph.
//!
//! Runs once when a resolver is built. Checks that:
//! 1. Plugin ids are unique across both plugin kinds
//! 2. Every dependency names a registered plugin
//! 3. Every failover names a registered data connector
//! 4. No chain of dependency or failover edges returns to where it started

use std::collections::{BTreeMap, HashSet};

use crate::error::ConfigurationError;
use crate::plugin::{PluginKind, ResolverPlugin};

/// Result type for graph validation.
pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// Dependency and failover edges between plugins.
#[derive(Debug, Default)]
pub struct DependencyGraph<'a> {
    kinds: BTreeMap<&'a str, PluginKind>,
    dependencies: BTreeMap<&'a str, Vec<&'a str>>,
    failovers: BTreeMap<&'a str, &'a str>,
}

impl<'a> DependencyGraph<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a complete plugin set.
    pub fn from_plugins(plugins: impl IntoIterator<Item = &'a ResolverPlugin>) -> Result<Self> {
        let mut graph = Self::new();
        for plugin in plugins {
            graph.add(plugin)?;
        }
        Ok(graph)
    }

    /// Adds a plugin's node and outgoing edges.
    pub fn add(&mut self, plugin: &'a ResolverPlugin) -> Result<()> {
        let id = plugin.id();
        if self.kinds.insert(id, plugin.kind()).is_some() {
            return Err(ConfigurationError::DuplicatePluginId(id.to_string()));
        }
        self.dependencies.insert(
            id,
            plugin
                .core()
                .dependencies()
                .iter()
                .map(|dep| dep.plugin_id.as_str())
                .collect(),
        );
        if let Some(failover) = plugin.failover_id() {
            self.failovers.insert(id, failover);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Validates references, then checks for cycles.
    pub fn validate(&self) -> Result<()> {
        self.check_references()?;
        self.check_cycles()
    }

    fn check_references(&self) -> Result<()> {
        for (plugin_id, deps) in &self.dependencies {
            if let Some(missing) = deps.iter().find(|dep| !self.kinds.contains_key(*dep)) {
                return Err(ConfigurationError::MissingDependency {
                    plugin_id: (*plugin_id).to_string(),
                    dependency_id: (*missing).to_string(),
                });
            }
        }

        for (connector_id, failover_id) in &self.failovers {
            match self.kinds.get(failover_id) {
                Some(PluginKind::Connector) => {}
                Some(PluginKind::Definition) => {
                    return Err(ConfigurationError::FailoverNotConnector {
                        connector_id: (*connector_id).to_string(),
                        failover_id: (*failover_id).to_string(),
                    });
                }
                None => {
                    return Err(ConfigurationError::UnknownFailover {
                        connector_id: (*connector_id).to_string(),
                        failover_id: (*failover_id).to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn check_cycles(&self) -> Result<()> {
        // `verified` holds ids whose whole subgraph is known to be acyclic, so
        // diamonds are walked once and never mistaken for cycles. `on_path`
        // holds the ids of the current walk only.
        let mut verified = HashSet::new();
        let mut on_path = Vec::new();

        for &id in self.kinds.keys() {
            self.visit(id, &mut on_path, &mut verified)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        id: &'a str,
        on_path: &mut Vec<&'a str>,
        verified: &mut HashSet<&'a str>,
    ) -> Result<()> {
        if verified.contains(id) {
            return Ok(());
        }
        on_path.push(id);

        for next in self.edges(id) {
            if on_path.contains(&next) {
                return Err(ConfigurationError::CircularDependency {
                    plugin_id: next.to_string(),
                    dependency_id: id.to_string(),
                });
            }
            self.visit(next, on_path, verified)?;
        }

        on_path.pop();
        verified.insert(id);
        Ok(())
    }

    fn edges(&self, id: &'a str) -> impl Iterator<Item = &'a str> + '_ {
        let deps = self
            .dependencies
            .get(id)
            .into_iter()
            .flat_map(|deps| deps.iter().copied());
        deps.chain(self.failovers.get(id).copied())
    }
}

/// Validates a complete plugin set.
///
/// This is the check [`AttributeResolver::new`](crate::AttributeResolver::new)
/// performs; it is exposed for tools that want to validate without building.
pub fn validate(plugins: &[ResolverPlugin]) -> Result<()> {
    DependencyGraph::from_plugins(plugins)?.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::SimpleDefinition;
    use crate::builtin::StaticConnector;
    use crate::plugin::{ConnectorPlugin, DefinitionPlugin, PluginDependency};

    fn definition(id: &str, deps: &[&str]) -> ResolverPlugin {
        deps.iter()
            .fold(DefinitionPlugin::new(id, SimpleDefinition), |plugin, dep| {
                plugin.depends_on(PluginDependency::on(*dep))
            })
            .into()
    }

    fn connector(id: &str, failover: Option<&str>) -> ResolverPlugin {
        let plugin = ConnectorPlugin::new(id, StaticConnector::default());
        match failover {
            Some(failover) => plugin.failover(failover).into(),
            None => plugin.into(),
        }
    }

    #[test]
    fn two_node_cycle_names_both_ids() {
        let plugins = vec![definition("a", &["b"]), definition("b", &["a"])];

        match validate(&plugins) {
            Err(ConfigurationError::CircularDependency {
                plugin_id,
                dependency_id,
            }) => {
                let mut ids = vec![plugin_id, dependency_id];
                ids.sort();
                assert_eq!(ids, vec!["a", "b"]);
            }
            other => panic!("Expected CircularDependency, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let plugins = vec![definition("a", &["a"])];
        assert!(matches!(
            validate(&plugins),
            Err(ConfigurationError::CircularDependency { .. })
        ));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let plugins = vec![
            definition("a", &["b", "c"]),
            definition("b", &["d"]),
            definition("c", &["d"]),
            definition("d", &[]),
        ];
        assert!(validate(&plugins).is_ok());
    }

    #[test]
    fn long_cycle_detected() {
        let plugins = vec![
            definition("a", &["b"]),
            definition("b", &["c"]),
            definition("c", &["d"]),
            definition("d", &["b"]),
        ];
        assert!(matches!(
            validate(&plugins),
            Err(ConfigurationError::CircularDependency { .. })
        ));
    }

    #[test]
    fn missing_dependency_rejected() {
        let plugins = vec![definition("a", &["ghost"])];
        assert_eq!(
            validate(&plugins),
            Err(ConfigurationError::MissingDependency {
                plugin_id: "a".into(),
                dependency_id: "ghost".into(),
            })
        );
    }

    #[test]
    fn duplicate_ids_across_kinds_rejected() {
        let plugins = vec![definition("x", &[]), connector("x", None)];
        assert_eq!(
            validate(&plugins),
            Err(ConfigurationError::DuplicatePluginId("x".into()))
        );
    }

    #[test]
    fn failover_must_exist() {
        let plugins = vec![connector("ldap", Some("nowhere"))];
        assert_eq!(
            validate(&plugins),
            Err(ConfigurationError::UnknownFailover {
                connector_id: "ldap".into(),
                failover_id: "nowhere".into(),
            })
        );
    }

    #[test]
    fn failover_must_be_a_connector() {
        let plugins = vec![connector("ldap", Some("mail")), definition("mail", &[])];
        assert_eq!(
            validate(&plugins),
            Err(ConfigurationError::FailoverNotConnector {
                connector_id: "ldap".into(),
                failover_id: "mail".into(),
            })
        );
    }

    #[test]
    fn failover_loop_is_a_cycle() {
        let plugins = vec![connector("a", Some("b")), connector("b", Some("a"))];
        assert!(matches!(
            validate(&plugins),
            Err(ConfigurationError::CircularDependency { .. })
        ));
    }

    #[test]
    fn empty_plugin_set_is_valid() {
        assert!(validate(&[]).is_ok());
    }
}
