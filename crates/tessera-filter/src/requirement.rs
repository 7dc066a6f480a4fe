//! Policy requirement rules decide whether a policy applies to a request.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_types::{Attribute, RequestContext, Tristate};
use tracing::debug;

use crate::matcher::{Matcher, ValueMatcher, text_equals};
use crate::pattern::Pattern;

/// A tri-state predicate over the request.
///
/// `Fail` means the rule could not be evaluated, for example because the
/// request lacks the element the rule inspects.
pub trait PolicyRequirementRule: Send + Sync + fmt::Debug {
    fn evaluate(&self, ctx: &RequestContext) -> Tristate;
}

/// The built-in requirement rules, plus an escape hatch for custom ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyRequirement {
    /// Always true.
    Any,
    /// The principal equals `value`.
    PrincipalName {
        value: String,
        #[serde(default)]
        ignore_case: bool,
    },
    /// The principal matches `pattern` in full.
    PrincipalNameRegex { pattern: Pattern },
    /// The requesting party equals `value`.
    Requester {
        value: String,
        #[serde(default)]
        ignore_case: bool,
    },
    /// The requesting party matches `pattern` in full.
    RequesterRegex { pattern: Pattern },
    /// The issuer equals `value`.
    Issuer {
        value: String,
        #[serde(default)]
        ignore_case: bool,
    },
    /// A resolved attribute has at least one value selected by `matcher`.
    AttributeValue {
        attribute_id: String,
        matcher: ValueMatcher,
    },
    /// A resolved attribute has between `min` and `max` values, inclusive.
    /// An absent attribute has zero values.
    ValueCount {
        attribute_id: String,
        #[serde(default)]
        min: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
    },
    /// True when every child is true. Stops at the first non-true child.
    And { rules: Vec<PolicyRequirement> },
    /// True when any child is true. Stops at the first true or failed child.
    Or { rules: Vec<PolicyRequirement> },
    Not { rule: Box<PolicyRequirement> },
    #[serde(skip)]
    Custom(Arc<dyn PolicyRequirementRule>),
}

impl PolicyRequirement {
    pub fn requester(value: impl Into<String>) -> Self {
        Self::Requester {
            value: value.into(),
            ignore_case: false,
        }
    }

    pub fn principal(value: impl Into<String>) -> Self {
        Self::PrincipalName {
            value: value.into(),
            ignore_case: false,
        }
    }

    pub fn issuer(value: impl Into<String>) -> Self {
        Self::Issuer {
            value: value.into(),
            ignore_case: false,
        }
    }

    pub fn custom(rule: impl PolicyRequirementRule + 'static) -> Self {
        Self::Custom(Arc::new(rule))
    }

    pub fn not(rule: PolicyRequirement) -> Self {
        Self::Not {
            rule: Box::new(rule),
        }
    }
}

impl PolicyRequirementRule for PolicyRequirement {
    fn evaluate(&self, ctx: &RequestContext) -> Tristate {
        match self {
            Self::Any => Tristate::True,
            Self::PrincipalName { value, ignore_case } => {
                compare(non_empty(&ctx.principal), |p| text_equals(p, value, *ignore_case))
            }
            Self::PrincipalNameRegex { pattern } => {
                compare(non_empty(&ctx.principal), |p| pattern.is_match(p))
            }
            Self::Requester { value, ignore_case } => {
                compare(ctx.recipient.as_deref(), |r| text_equals(r, value, *ignore_case))
            }
            Self::RequesterRegex { pattern } => {
                compare(ctx.recipient.as_deref(), |r| pattern.is_match(r))
            }
            Self::Issuer { value, ignore_case } => {
                compare(ctx.issuer.as_deref(), |i| text_equals(i, value, *ignore_case))
            }
            Self::AttributeValue {
                attribute_id,
                matcher,
            } => {
                let Some(attribute) = ctx.resolved_attributes.get(attribute_id) else {
                    return Tristate::False;
                };
                match matcher.matching_values(attribute, ctx) {
                    Ok(values) => Tristate::from(!values.is_empty()),
                    Err(failure) => {
                        debug!(attribute_id = %attribute_id, reason = %failure, "Requirement matcher failed");
                        Tristate::Fail
                    }
                }
            }
            Self::ValueCount {
                attribute_id,
                min,
                max,
            } => {
                let count = ctx
                    .resolved_attributes
                    .get(attribute_id)
                    .map_or(0, Attribute::len);
                Tristate::from(count >= *min && max.is_none_or(|max| count <= max))
            }
            Self::And { rules } => {
                if rules.is_empty() {
                    return Tristate::Fail;
                }
                for rule in rules {
                    match rule.evaluate(ctx) {
                        Tristate::True => {}
                        other => return other,
                    }
                }
                Tristate::True
            }
            Self::Or { rules } => {
                if rules.is_empty() {
                    return Tristate::Fail;
                }
                for rule in rules {
                    match rule.evaluate(ctx) {
                        Tristate::False => {}
                        other => return other,
                    }
                }
                Tristate::False
            }
            Self::Not { rule } => rule.evaluate(ctx).negate(),
            Self::Custom(rule) => rule.evaluate(ctx),
        }
    }
}

fn non_empty(text: &str) -> Option<&str> {
    (!text.is_empty()).then_some(text)
}

/// `Fail` when the request element is absent.
fn compare(element: Option<&str>, test: impl FnOnce(&str) -> bool) -> Tristate {
    element.map_or(Tristate::Fail, |element| Tristate::from(test(element)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn request() -> RequestContext {
        let mut ctx = RequestContext::new("jdoe")
            .with_issuer("https://idp.example.org")
            .with_recipient("https://sp.example.com");
        ctx.resolved_attributes.insert(
            "affiliation".into(),
            Attribute::with_values("affiliation", ["member", "staff"]),
        );
        ctx
    }

    #[test_case(PolicyRequirement::Any, Tristate::True; "any")]
    #[test_case(PolicyRequirement::principal("jdoe"), Tristate::True; "principal match")]
    #[test_case(PolicyRequirement::principal("JDOE"), Tristate::False; "principal case")]
    #[test_case(
        PolicyRequirement::PrincipalName { value: "JDOE".into(), ignore_case: true },
        Tristate::True;
        "principal ignore case"
    )]
    #[test_case(PolicyRequirement::requester("https://sp.example.com"), Tristate::True; "requester")]
    #[test_case(
        PolicyRequirement::RequesterRegex { pattern: Pattern::new(r"https://.*\.example\.net").unwrap() },
        Tristate::False;
        "requester regex miss"
    )]
    #[test_case(PolicyRequirement::issuer("https://idp.example.org"), Tristate::True; "issuer")]
    #[test_case(
        PolicyRequirement::AttributeValue { attribute_id: "affiliation".into(), matcher: ValueMatcher::value("staff") },
        Tristate::True;
        "attribute value present"
    )]
    #[test_case(
        PolicyRequirement::AttributeValue { attribute_id: "entitlement".into(), matcher: ValueMatcher::Any },
        Tristate::False;
        "attribute absent"
    )]
    #[test_case(
        PolicyRequirement::ValueCount { attribute_id: "affiliation".into(), min: 1, max: Some(2) },
        Tristate::True;
        "value count in range"
    )]
    #[test_case(
        PolicyRequirement::ValueCount { attribute_id: "affiliation".into(), min: 3, max: None },
        Tristate::False;
        "value count below min"
    )]
    fn requirement_evaluates(rule: PolicyRequirement, expected: Tristate) {
        assert_eq!(rule.evaluate(&request()), expected);
    }

    #[test]
    fn missing_request_elements_fail() {
        let bare = RequestContext::new("");
        assert_eq!(PolicyRequirement::principal("jdoe").evaluate(&bare), Tristate::Fail);
        assert_eq!(PolicyRequirement::requester("sp").evaluate(&bare), Tristate::Fail);
        assert_eq!(PolicyRequirement::issuer("idp").evaluate(&bare), Tristate::Fail);
    }

    #[test]
    fn failed_matcher_fails_requirement() {
        let rule = PolicyRequirement::AttributeValue {
            attribute_id: "affiliation".into(),
            matcher: ValueMatcher::Or { matchers: vec![] },
        };
        assert_eq!(rule.evaluate(&request()), Tristate::Fail);
    }

    #[test]
    fn combinators_short_circuit_in_order() {
        let ctx = RequestContext::new("jdoe");
        // The requester check would fail, but the principal check decides first.
        let and = PolicyRequirement::And {
            rules: vec![
                PolicyRequirement::principal("someone-else"),
                PolicyRequirement::requester("sp"),
            ],
        };
        assert_eq!(and.evaluate(&ctx), Tristate::False);

        let or = PolicyRequirement::Or {
            rules: vec![
                PolicyRequirement::principal("jdoe"),
                PolicyRequirement::requester("sp"),
            ],
        };
        assert_eq!(or.evaluate(&ctx), Tristate::True);

        let failing_or = PolicyRequirement::Or {
            rules: vec![
                PolicyRequirement::requester("sp"),
                PolicyRequirement::principal("jdoe"),
            ],
        };
        assert_eq!(failing_or.evaluate(&ctx), Tristate::Fail);
    }

    #[test]
    fn not_keeps_fail() {
        let ctx = RequestContext::new("jdoe");
        assert_eq!(
            PolicyRequirement::not(PolicyRequirement::requester("sp")).evaluate(&ctx),
            Tristate::Fail
        );
        assert_eq!(
            PolicyRequirement::not(PolicyRequirement::principal("jdoe")).evaluate(&ctx),
            Tristate::False
        );
    }

    #[test]
    fn deserializes_nested_requirement() {
        let rule: PolicyRequirement = serde_json::from_str(
            r#"{"type": "and", "rules": [
                {"type": "requester", "value": "https://sp.example.com"},
                {"type": "not", "rule": {"type": "principal_name", "value": "guest"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(rule.evaluate(&request()), Tristate::True);
    }
}
