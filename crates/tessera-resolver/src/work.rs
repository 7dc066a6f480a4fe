//! Per-request memoization of plugin results.

use std::collections::HashMap;

use tessera_types::{Attribute, AttributeMap};
use tracing::error;

use crate::error::{ResolutionError, Result};

/// Upper bound on failover links followed by a single lookup. Validation
/// rejects failover cycles, so real chains are far shorter.
const MAX_FAILOVER_HOPS: usize = 64;

/// What a plugin resolved to within one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRecord {
    /// An attribute definition and its output (`None` if it produced nothing).
    Definition(Option<Attribute>),
    /// A data connector and its output (`None` if it produced nothing).
    Connector(Option<AttributeMap>),
    /// A data connector whose request was served by another connector.
    Failover { served_by: String },
    /// A plugin whose failure propagated. Later lookups fail the same way
    /// instead of invoking the plugin again.
    Failed { reason: String },
}

/// Results of every plugin resolved so far in one request.
///
/// Each plugin id is recorded at most once. A work context is created by
/// [`AttributeResolver::resolve`](crate::AttributeResolver::resolve) and
/// dropped when it returns.
#[derive(Debug, Default)]
pub struct WorkContext {
    records: HashMap<String, ResolvedRecord>,
}

impl WorkContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the plugin has already been resolved.
    pub fn contains(&self, plugin_id: &str) -> bool {
        self.records.contains_key(plugin_id)
    }

    pub fn get(&self, plugin_id: &str) -> Option<&ResolvedRecord> {
        self.records.get(plugin_id)
    }

    /// Fails with [`ResolutionError::AlreadyFailed`] if the plugin's failure
    /// was recorded earlier in this request.
    pub fn replay_failure(&self, plugin_id: &str) -> Result<()> {
        match self.records.get(plugin_id) {
            Some(ResolvedRecord::Failed { reason }) => Err(ResolutionError::AlreadyFailed {
                plugin_id: plugin_id.to_string(),
                reason: reason.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Records a failure that is about to propagate, then hands it back.
    pub(crate) fn fail(&mut self, plugin_id: &str, error: ResolutionError) -> ResolutionError {
        match self.record(
            plugin_id,
            ResolvedRecord::Failed {
                reason: error.to_string(),
            },
        ) {
            Ok(()) => error,
            Err(duplicate) => duplicate,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records a plugin's result.
    ///
    /// # Errors
    ///
    /// [`ResolutionError::DuplicateResolution`] if the id is already recorded.
    pub fn record(&mut self, plugin_id: &str, record: ResolvedRecord) -> Result<()> {
        if self.records.contains_key(plugin_id) {
            error!(plugin_id = %plugin_id, "Plugin resolved twice in one work context");
            return Err(ResolutionError::DuplicateResolution {
                plugin_id: plugin_id.to_string(),
            });
        }
        self.records.insert(plugin_id.to_string(), record);
        Ok(())
    }

    /// The attribute a definition resolved to, if any.
    pub fn attribute(&self, plugin_id: &str) -> Option<&Attribute> {
        match self.records.get(plugin_id)? {
            ResolvedRecord::Definition(attribute) => attribute.as_ref(),
            _ => None,
        }
    }

    /// The attributes a connector resolved to, following failover links.
    pub fn connector_attributes(&self, plugin_id: &str) -> Option<&AttributeMap> {
        let mut current = plugin_id;
        for _ in 0..MAX_FAILOVER_HOPS {
            match self.records.get(current)? {
                ResolvedRecord::Connector(attributes) => return attributes.as_ref(),
                ResolvedRecord::Failover { served_by } => current = served_by,
                ResolvedRecord::Definition(_) | ResolvedRecord::Failed { .. } => return None,
            }
        }
        None
    }

    /// The connector that served `plugin_id`, if it was substituted.
    pub fn failover_for(&self, plugin_id: &str) -> Option<&str> {
        match self.records.get(plugin_id)? {
            ResolvedRecord::Failover { served_by } => Some(served_by),
            _ => None,
        }
    }

    pub(crate) fn into_records(self) -> impl Iterator<Item = (String, ResolvedRecord)> {
        self.records.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_record_is_rejected() {
        let mut work = WorkContext::new();
        work.record("uid", ResolvedRecord::Definition(None)).unwrap();

        let result = work.record("uid", ResolvedRecord::Definition(None));
        assert!(matches!(
            result,
            Err(ResolutionError::DuplicateResolution { plugin_id }) if plugin_id == "uid"
        ));
        assert_eq!(work.len(), 1);
    }

    #[test]
    fn connector_lookup_follows_failover_links() {
        let mut attributes = AttributeMap::new();
        attributes.insert("mail".into(), Attribute::with_values("mail", ["a@x"]));

        let mut work = WorkContext::new();
        work.record("backup", ResolvedRecord::Connector(Some(attributes.clone())))
            .unwrap();
        work.record(
            "primary",
            ResolvedRecord::Failover {
                served_by: "backup".into(),
            },
        )
        .unwrap();

        assert_eq!(work.connector_attributes("primary"), Some(&attributes));
        assert_eq!(work.failover_for("primary"), Some("backup"));
        assert_eq!(work.failover_for("backup"), None);
    }

    #[test]
    fn recorded_failure_is_replayed() {
        let mut work = WorkContext::new();
        let error = work.fail(
            "ldap",
            ResolutionError::Cooldown {
                connector_id: "ldap".into(),
                remaining_ms: 10,
            },
        );
        assert!(matches!(error, ResolutionError::Cooldown { .. }));

        assert!(work.contains("ldap"));
        assert!(work.connector_attributes("ldap").is_none());
        match work.replay_failure("ldap") {
            Err(ResolutionError::AlreadyFailed { plugin_id, reason }) => {
                assert_eq!(plugin_id, "ldap");
                assert!(reason.contains("10ms"));
            }
            other => panic!("Expected AlreadyFailed, got {other:?}"),
        }
        assert!(work.replay_failure("other").is_ok());
    }

    #[test]
    fn attribute_lookup_ignores_connectors() {
        let mut work = WorkContext::new();
        work.record("ldap", ResolvedRecord::Connector(Some(AttributeMap::new())))
            .unwrap();

        assert!(work.attribute("ldap").is_none());
        assert!(work.connector_attributes("ldap").is_some());
        assert!(work.attribute("missing").is_none());
    }
}
