//! The filter policy engine.
//!
//! Every active policy contributes to per-attribute permitted and denied
//! value sets. Once all policies have run, a value is released only if it
//! is permitted and not denied. Deny wins regardless of which policy
//! contributed which.

use std::collections::{BTreeMap, HashSet};

use tessera_types::{AttributeMap, RequestContext, Tristate};
use tracing::{debug, info, warn};

use crate::error::FilterBuildError;
use crate::matcher::{Matcher, ValueSet};
use crate::policy::{AttributeFilterPolicy, AttributeRule, RuleEffect};
use crate::requirement::PolicyRequirementRule;

/// Result type for filter construction.
pub type Result<T> = std::result::Result<T, FilterBuildError>;

// ============================================================================
// Filter Work State
// ============================================================================

/// Permitted and denied values accumulated for one request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterWorkState {
    permitted: BTreeMap<String, ValueSet>,
    denied: BTreeMap<String, ValueSet>,
}

impl FilterWorkState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `values` to the attribute's permitted or denied set.
    pub fn add(&mut self, attribute_id: &str, effect: RuleEffect, values: ValueSet) {
        let sets = match effect {
            RuleEffect::Permit => &mut self.permitted,
            RuleEffect::Deny => &mut self.denied,
        };
        sets.entry(attribute_id.to_string())
            .or_default()
            .extend(values);
    }

    pub fn permitted(&self, attribute_id: &str) -> Option<&ValueSet> {
        self.permitted.get(attribute_id)
    }

    pub fn denied(&self, attribute_id: &str) -> Option<&ValueSet> {
        self.denied.get(attribute_id)
    }

    /// Applies the accumulated sets to `resolved`.
    ///
    /// Values keep their resolved order. Attributes left with no values are
    /// dropped.
    pub fn release(&self, resolved: &AttributeMap) -> AttributeMap {
        let mut released = AttributeMap::new();
        for (id, permitted) in &self.permitted {
            let Some(attribute) = resolved.get(id) else {
                continue;
            };
            let denied = self.denied.get(id);
            let mut kept = attribute.clone();
            kept.retain_values(|value| {
                permitted.contains(value) && denied.is_none_or(|denied| !denied.contains(value))
            });
            if kept.is_empty() {
                debug!(attribute_id = %id, "No values survived filtering");
                continue;
            }
            released.insert(id.clone(), kept);
        }
        released
    }
}

// ============================================================================
// Attribute Filter
// ============================================================================

/// Decides which resolved values are released.
///
/// Immutable once built; share it across threads behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct AttributeFilter {
    policies: Vec<AttributeFilterPolicy>,
}

impl AttributeFilter {
    /// Builds a filter from a policy set.
    ///
    /// # Errors
    ///
    /// Policy ids must be unique, as must rule ids within a policy.
    pub fn new(policies: impl IntoIterator<Item = AttributeFilterPolicy>) -> Result<Self> {
        let policies: Vec<AttributeFilterPolicy> = policies.into_iter().collect();

        let mut policy_ids = HashSet::new();
        for policy in &policies {
            if !policy_ids.insert(policy.id.as_str()) {
                return Err(FilterBuildError::DuplicatePolicyId(policy.id.clone()));
            }
            let mut rule_ids = HashSet::new();
            for rule in &policy.rules {
                if !rule_ids.insert(rule.id.as_str()) {
                    return Err(FilterBuildError::DuplicateRuleId {
                        policy_id: policy.id.clone(),
                        rule_id: rule.id.clone(),
                    });
                }
            }
        }

        info!(policies = policies.len(), "Attribute filter ready");
        Ok(Self { policies })
    }

    pub fn policies(&self) -> &[AttributeFilterPolicy] {
        &self.policies
    }

    pub fn policy(&self, id: &str) -> Option<&AttributeFilterPolicy> {
        self.policies.iter().find(|policy| policy.id == id)
    }

    /// Filters `ctx.resolved_attributes` into `ctx.released_attributes`.
    ///
    /// Never fails: a requirement that cannot be evaluated deactivates its
    /// policy, and a matcher that cannot be evaluated makes its rule inert.
    /// Every filter error is caught when the policy set is built (see
    /// [`AttributeFilter::new`]), so unlike attribute resolution this call
    /// returns no `Result`.
    pub fn filter(&self, ctx: &mut RequestContext) {
        let released = self.filter_attributes(ctx);
        info!(
            principal = %ctx.principal,
            resolved = ctx.resolved_attributes.len(),
            released = released.len(),
            "Filtered attributes"
        );
        ctx.released_attributes = released;
    }

    /// Computes the released attributes without touching the context.
    pub fn filter_attributes(&self, ctx: &RequestContext) -> AttributeMap {
        let mut state = FilterWorkState::new();
        for policy in &self.policies {
            apply_policy(policy, ctx, &mut state);
        }
        state.release(&ctx.resolved_attributes)
    }
}

// ============================================================================
// Policy Application
// ============================================================================

fn apply_policy(policy: &AttributeFilterPolicy, ctx: &RequestContext, state: &mut FilterWorkState) {
    match policy.requirement.evaluate(ctx) {
        Tristate::True => {}
        Tristate::False => {
            debug!(policy_id = %policy.id, "Policy not active for this request");
            return;
        }
        Tristate::Fail => {
            warn!(policy_id = %policy.id, "Policy requirement could not be evaluated; treating as inactive");
            return;
        }
    }

    debug!(policy_id = %policy.id, rules = policy.rules.len(), "Applying policy");
    for rule in &policy.rules {
        apply_rule(policy, rule, ctx, state);
    }
}

fn apply_rule(
    policy: &AttributeFilterPolicy,
    rule: &AttributeRule,
    ctx: &RequestContext,
    state: &mut FilterWorkState,
) {
    let Some(attribute) = ctx.resolved_attributes.get(&rule.attribute_id) else {
        return;
    };
    if attribute.is_empty() {
        return;
    }

    match rule.matcher.matching_values(attribute, ctx) {
        Ok(values) => {
            debug!(
                policy_id = %policy.id,
                rule_id = %rule.id,
                attribute_id = %rule.attribute_id,
                effect = ?rule.effect,
                matched = values.len(),
                "Rule matched"
            );
            state.add(&rule.attribute_id, rule.effect, values);
        }
        Err(failure) => {
            warn!(
                policy_id = %policy.id,
                rule_id = %rule.id,
                attribute_id = %rule.attribute_id,
                reason = %failure,
                "Matcher could not be evaluated; ignoring rule"
            );
        }
    }
}
