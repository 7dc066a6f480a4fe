//! Turns declarative plugin descriptions into resolver plugins.

use std::time::Duration;

use tessera_config::{
    AttributeDefinitionConfig, ConnectorKind, DataConnectorConfig, DefinitionKind, TesseraConfig,
};
use tessera_resolver::builtin::{
    PrincipalNameDefinition, ScopedDefinition, SimpleDefinition, StaticConnector,
    UnavailableConnector,
};
use tessera_resolver::{ConnectorPlugin, DefinitionPlugin, ResolverPlugin};

/// Builds every plugin a configuration declares, definitions first.
pub(crate) fn plugins(config: &TesseraConfig) -> Vec<ResolverPlugin> {
    let default_delay = Duration::from_millis(config.resolver.default_no_retry_delay_ms);

    config
        .attribute_definitions
        .iter()
        .map(|definition| ResolverPlugin::from(definition_plugin(definition)))
        .chain(
            config
                .data_connectors
                .iter()
                .map(|connector| ResolverPlugin::from(connector_plugin(connector, default_delay))),
        )
        .collect()
}

fn definition_plugin(config: &AttributeDefinitionConfig) -> DefinitionPlugin {
    let plugin = match config.kind {
        DefinitionKind::Simple => DefinitionPlugin::new(&config.id, SimpleDefinition),
        DefinitionKind::Scoped => DefinitionPlugin::new(
            &config.id,
            ScopedDefinition::new(config.scope.clone().unwrap_or_default()),
        ),
        DefinitionKind::PrincipalName => DefinitionPlugin::new(&config.id, PrincipalNameDefinition),
    };

    config
        .dependencies
        .iter()
        .cloned()
        .fold(plugin, DefinitionPlugin::depends_on)
        .dependency_only(config.dependency_only)
        .propagate_failure(config.propagate_failure)
}

fn connector_plugin(config: &DataConnectorConfig, default_delay: Duration) -> ConnectorPlugin {
    let mut plugin = match config.kind {
        ConnectorKind::Static => {
            ConnectorPlugin::new(&config.id, StaticConnector::new(config.attributes.clone()))
        }
        ConnectorKind::Unavailable => ConnectorPlugin::new(
            &config.id,
            UnavailableConnector::new(format!("data connector '{}' is unavailable", config.id)),
        ),
    };

    plugin = config
        .dependencies
        .iter()
        .cloned()
        .fold(plugin, ConnectorPlugin::depends_on)
        .propagate_failure(config.propagate_failure);

    if let Some(failover) = &config.failover {
        plugin = plugin.failover(failover);
    }

    let delay = config
        .no_retry_delay_ms
        .map_or(default_delay, Duration::from_millis);
    if !delay.is_zero() {
        plugin = plugin.no_retry_delay(delay);
    }

    plugin
}
