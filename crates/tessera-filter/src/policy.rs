//! Filter policy definitions.
//!
//! A policy pairs one requirement rule with an ordered list of attribute
//! rules. The attribute rules only take effect for requests on which the
//! requirement evaluates to `TRUE`.

use serde::{Deserialize, Serialize};

use crate::matcher::ValueMatcher;
use crate::requirement::PolicyRequirement;

// ============================================================================
// Effect
// ============================================================================

/// Whether an attribute rule releases or withholds the values it matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleEffect {
    #[default]
    Permit,
    /// Overrides any permit for the same value, from any policy.
    Deny,
}

// ============================================================================
// Attribute Rule
// ============================================================================

/// Applies a matcher to one attribute and permits or denies what it selects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeRule {
    pub id: String,
    pub attribute_id: String,
    pub matcher: ValueMatcher,
    #[serde(default)]
    pub effect: RuleEffect,
}

impl AttributeRule {
    pub fn permit(
        id: impl Into<String>,
        attribute_id: impl Into<String>,
        matcher: ValueMatcher,
    ) -> Self {
        Self {
            id: id.into(),
            attribute_id: attribute_id.into(),
            matcher,
            effect: RuleEffect::Permit,
        }
    }

    pub fn deny(
        id: impl Into<String>,
        attribute_id: impl Into<String>,
        matcher: ValueMatcher,
    ) -> Self {
        Self {
            id: id.into(),
            attribute_id: attribute_id.into(),
            matcher,
            effect: RuleEffect::Deny,
        }
    }

    pub fn is_deny(&self) -> bool {
        self.effect == RuleEffect::Deny
    }
}

// ============================================================================
// Filter Policy
// ============================================================================

/// A requirement plus the attribute rules it guards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeFilterPolicy {
    pub id: String,
    pub requirement: PolicyRequirement,
    #[serde(default)]
    pub rules: Vec<AttributeRule>,
}

impl AttributeFilterPolicy {
    pub fn new(id: impl Into<String>, requirement: PolicyRequirement) -> Self {
        Self {
            id: id.into(),
            requirement,
            rules: Vec::new(),
        }
    }

    /// Adds a rule to the policy (builder pattern).
    pub fn with_rule(mut self, rule: AttributeRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Permits every value of each listed attribute to anyone.
    ///
    /// A convenience for the common "release to everyone" policy.
    pub fn release_to_anyone<I, S>(id: impl Into<String>, attribute_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut policy = Self::new(id, PolicyRequirement::Any);
        for attribute_id in attribute_ids {
            let attribute_id = attribute_id.into();
            policy = policy.with_rule(AttributeRule::permit(
                format!("release-{attribute_id}"),
                attribute_id,
                ValueMatcher::Any,
            ));
        }
        policy
    }
}
