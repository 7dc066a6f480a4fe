//! # Tessera
//!
//! Attribute resolution and release for identity providers.
//!
//! For each request Tessera computes the attributes known about a
//! principal and then decides which of their values the requesting party may
//! receive:
//!
//! - **Resolution** walks a validated graph of attribute definitions and data
//!   connectors, resolving each at most once, with failover and a no-retry
//!   window for failing connectors
//! - **Filtering** evaluates tri-state policy requirements and applies
//!   permit/deny value rules, where deny always wins
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    AttributeAuthority                      │
//! │  ┌────────────────┐   ┌─────────────────┐                  │
//! │  │ RequestContext │ → │    Resolver     │ → resolved       │
//! │  └────────────────┘   │ (plugin graph)  │                  │
//! │                       └─────────────────┘                  │
//! │                       ┌─────────────────┐                  │
//! │            resolved → │     Filter      │ → released       │
//! │                       │ (policy set)    │                  │
//! │                       └─────────────────┘                  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use tessera::{AttributeAuthority, RequestContext, TesseraConfig};
//!
//! let config = TesseraConfig::from_toml(r#"
//!     [[data_connectors]]
//!     id = "directory"
//!     type = "static"
//!     attributes = [{ id = "mail", values = ["jdoe@example.org"] }]
//!
//!     [[attribute_definitions]]
//!     id = "mail"
//!     type = "simple"
//!     dependencies = [{ plugin_id = "directory", attribute_id = "mail" }]
//!
//!     [[filter_policies]]
//!     id = "anyone"
//!     requirement = { type = "any" }
//!     rules = [{ id = "mail", attribute_id = "mail", matcher = { type = "any" } }]
//! "#)?;
//!
//! let authority = AttributeAuthority::from_config(&config)?;
//! let mut ctx = RequestContext::new("jdoe").with_recipient("https://sp.example.com");
//! authority.release(&mut ctx)?;
//!
//! assert_eq!(ctx.released_attributes["mail"].len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod authority;
mod build;
mod error;

pub use authority::AttributeAuthority;
pub use error::{AuthorityError, Result};

// Re-export core types
pub use tessera_types::{
    Attribute, AttributeMap, AttributeValue, Clock, ManualClock, RequestContext, SystemClock,
    Tristate,
};

// Re-export engines
pub use tessera_filter::{
    AttributeFilter, AttributeFilterPolicy, AttributeRule, FilterBuildError, Matcher,
    PolicyRequirement, PolicyRequirementRule, RuleEffect, ValueMatcher,
};
pub use tessera_resolver::{
    AttributeDefinition, AttributeResolver, ConfigurationError, ConnectorPlugin, DataConnector,
    DefinitionPlugin, PluginDependency, PluginError, PluginScope, ResolutionError, ResolverPlugin,
};

// Re-export configuration
pub use tessera_config::{ConfigError, ConfigLoader, TesseraConfig};

#[cfg(test)]
mod tests;
