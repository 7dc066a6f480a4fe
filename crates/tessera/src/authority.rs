//! The attribute authority: resolution followed by filtering.

use std::sync::Arc;

use tessera_config::TesseraConfig;
use tessera_filter::AttributeFilter;
use tessera_resolver::AttributeResolver;
use tessera_types::{Clock, RequestContext};
use tracing::{debug, info, info_span};

use crate::build;
use crate::error::Result;

/// Answers attribute requests for one issuer.
///
/// Built once and shared across threads behind an `Arc`. All per-request
/// state lives in the [`RequestContext`] passed to each call.
#[derive(Debug)]
pub struct AttributeAuthority {
    id: String,
    resolver: AttributeResolver,
    filter: AttributeFilter,
}

impl AttributeAuthority {
    /// Assembles an authority from already-built engines.
    pub fn new(id: impl Into<String>, resolver: AttributeResolver, filter: AttributeFilter) -> Self {
        Self {
            id: id.into(),
            resolver,
            filter,
        }
    }

    /// Builds both engines from a configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is malformed, the plugin graph is invalid,
    /// or the policy set is invalid. A partially built authority is never
    /// returned.
    pub fn from_config(config: &TesseraConfig) -> Result<Self> {
        config.validate()?;

        let resolver = AttributeResolver::new(config.authority.id.clone(), build::plugins(config))?
            .with_strict_requests(config.resolver.strict);
        let filter = AttributeFilter::new(config.filter_policies.iter().cloned())?;

        info!(
            authority = %config.authority.id,
            definitions = resolver.definition_ids().len(),
            connectors = resolver.connector_ids().len(),
            policies = filter.policies().len(),
            "Attribute authority built from configuration"
        );

        Ok(Self::new(config.authority.id.clone(), resolver, filter))
    }

    /// Replaces the clock the resolver uses for failure bookkeeping.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: self.resolver.with_clock(clock),
            ..self
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resolver(&self) -> &AttributeResolver {
        &self.resolver
    }

    pub fn attribute_filter(&self) -> &AttributeFilter {
        &self.filter
    }

    /// Resolves attributes into `ctx.resolved_attributes`.
    ///
    /// A request without an issuer is attributed to this authority.
    pub fn resolve(&self, ctx: &mut RequestContext) -> Result<()> {
        if ctx.issuer.is_none() {
            debug!(authority = %self.id, "Request names no issuer; using authority id");
            ctx.issuer = Some(self.id.clone());
        }
        self.resolver.resolve(ctx)?;
        Ok(())
    }

    /// Filters `ctx.resolved_attributes` into `ctx.released_attributes`.
    pub fn filter(&self, ctx: &mut RequestContext) {
        self.filter.filter(ctx);
    }

    /// Resolves, then filters.
    ///
    /// On error neither output set of the context is populated.
    pub fn release(&self, ctx: &mut RequestContext) -> Result<()> {
        let span = info_span!(
            "release",
            authority = %self.id,
            principal = %ctx.principal,
            requester = ctx.recipient.as_deref().unwrap_or("-"),
        );
        let _enter = span.enter();

        self.resolve(ctx)?;
        self.filter(ctx);
        Ok(())
    }
}
