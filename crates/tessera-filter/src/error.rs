//! Error types for filter construction and matcher evaluation.

use thiserror::Error;

/// Error raised while building an [`AttributeFilter`](crate::AttributeFilter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterBuildError {
    #[error("Duplicate filter policy id '{0}'")]
    DuplicatePolicyId(String),

    #[error("Filter policy '{policy_id}' has duplicate rule id '{rule_id}'")]
    DuplicateRuleId { policy_id: String, rule_id: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// A matcher could not evaluate.
///
/// Distinct from an empty selection: the filter treats a rule whose
/// matcher fails as contributing nothing at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct MatchFailure {
    pub reason: String,
}

impl MatchFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
