//! # tessera-resolver: Attribute resolution
//!
//! Computes the attributes known about a principal for one request by
//! resolving a graph of plugins:
//! - **Attribute definitions** produce at most one attribute each
//! - **Data connectors** produce a map of attributes, with optional failover
//!   and a no-retry window after failures
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  RequestContext                              │
//! │  (principal, issuer, recipient, requested)   │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  AttributeResolver                           │
//! │  ├─ Resolve dependencies first               │
//! │  ├─ Memoize each plugin in a WorkContext     │
//! │  ├─ Fail over / skip connectors in cooldown  │
//! │  └─ Finalize: prune and deduplicate          │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  RequestContext::resolved_attributes         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The plugin graph is validated once, when the resolver is built
//! ([`graph`]). A resolver that builds never sees a dangling reference or a
//! cycle at request time.
//!
//! ## Examples
//!
//! ```
//! use tessera_resolver::{
//!     AttributeResolver, ConnectorPlugin, DefinitionPlugin, PluginDependency, ResolverPlugin,
//!     builtin::{SimpleDefinition, StaticConnector},
//! };
//! use tessera_types::{Attribute, RequestContext};
//!
//! let directory = StaticConnector::default()
//!     .with_attribute(Attribute::with_values("mail", ["jdoe@example.org"]));
//!
//! let resolver = AttributeResolver::new(
//!     "resolver",
//!     [
//!         ResolverPlugin::from(ConnectorPlugin::new("directory", directory)),
//!         ResolverPlugin::from(
//!             DefinitionPlugin::new("mail", SimpleDefinition)
//!                 .depends_on(PluginDependency::attribute("directory", "mail")),
//!         ),
//!     ],
//! )?;
//!
//! let mut ctx = RequestContext::new("jdoe");
//! resolver.resolve(&mut ctx)?;
//!
//! assert_eq!(ctx.resolved_attributes["mail"].len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builtin;
pub mod cooldown;
pub mod error;
pub mod graph;
pub mod plugin;
pub mod resolver;
pub mod work;

pub use cooldown::FailureCell;
pub use error::{ConfigurationError, PluginError, ResolutionError};
pub use graph::{DependencyGraph, validate};
pub use plugin::{
    ActivationCondition, AttributeDefinition, ConnectorPlugin, DataConnector, DefinitionPlugin,
    PluginCore, PluginDependency, PluginKind, PluginScope, ResolverPlugin,
};
pub use resolver::AttributeResolver;
pub use work::{ResolvedRecord, WorkContext};
