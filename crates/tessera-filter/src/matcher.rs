//! Matchers select the values of an attribute a rule applies to.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_types::{Attribute, AttributeValue, RequestContext};

use crate::error::MatchFailure;
use crate::pattern::Pattern;

/// Values selected by a matcher.
pub type ValueSet = BTreeSet<AttributeValue>;

/// Selects a subset of an attribute's values.
///
/// Implementations must not depend on anything but their inputs: the filter
/// may call a matcher more than once for the same attribute.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns the selected values, or a failure when the matcher cannot
    /// evaluate against this request.
    fn matching_values(
        &self,
        attribute: &Attribute,
        ctx: &RequestContext,
    ) -> Result<ValueSet, MatchFailure>;
}

// ============================================================================
// Built-in Matchers
// ============================================================================

/// The built-in matchers, plus an escape hatch for custom ones.
///
/// String comparisons apply to the string form of plain and scoped values
/// (for scoped values, the part before the scope). Binary and empty values
/// never match a string or pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueMatcher {
    /// Every value.
    Any,
    /// Values equal to `value`.
    ValueString {
        value: String,
        #[serde(default)]
        ignore_case: bool,
    },
    /// Values matching `pattern` in full.
    ValueRegex { pattern: Pattern },
    /// Scoped values whose scope equals `value`.
    ScopeString {
        value: String,
        #[serde(default)]
        ignore_case: bool,
    },
    /// Scoped values whose scope matches `pattern` in full.
    ScopeRegex { pattern: Pattern },
    /// Values selected by every child.
    And { matchers: Vec<ValueMatcher> },
    /// Values selected by any child.
    Or { matchers: Vec<ValueMatcher> },
    /// Values not selected by the child.
    Not { matcher: Box<ValueMatcher> },
    #[serde(skip)]
    Custom(Arc<dyn Matcher>),
}

impl ValueMatcher {
    pub fn value(value: impl Into<String>) -> Self {
        Self::ValueString {
            value: value.into(),
            ignore_case: false,
        }
    }

    pub fn value_ignore_case(value: impl Into<String>) -> Self {
        Self::ValueString {
            value: value.into(),
            ignore_case: true,
        }
    }

    pub fn scope(value: impl Into<String>) -> Self {
        Self::ScopeString {
            value: value.into(),
            ignore_case: false,
        }
    }

    pub fn custom(matcher: impl Matcher + 'static) -> Self {
        Self::Custom(Arc::new(matcher))
    }

    pub fn not(matcher: ValueMatcher) -> Self {
        Self::Not {
            matcher: Box::new(matcher),
        }
    }
}

impl Matcher for ValueMatcher {
    fn matching_values(
        &self,
        attribute: &Attribute,
        ctx: &RequestContext,
    ) -> Result<ValueSet, MatchFailure> {
        match self {
            Self::Any => Ok(attribute.values().iter().cloned().collect()),
            Self::ValueString { value, ignore_case } => Ok(select(attribute, |v| {
                v.as_str()
                    .is_some_and(|text| text_equals(text, value, *ignore_case))
            })),
            Self::ValueRegex { pattern } => Ok(select(attribute, |v| {
                v.as_str().is_some_and(|text| pattern.is_match(text))
            })),
            Self::ScopeString { value, ignore_case } => Ok(select(attribute, |v| {
                v.scope()
                    .is_some_and(|scope| text_equals(scope, value, *ignore_case))
            })),
            Self::ScopeRegex { pattern } => Ok(select(attribute, |v| {
                v.scope().is_some_and(|scope| pattern.is_match(scope))
            })),
            Self::And { matchers } => {
                let (first, rest) = matchers
                    .split_first()
                    .ok_or_else(|| MatchFailure::new("'and' matcher has no children"))?;
                let mut selected = first.matching_values(attribute, ctx)?;
                for matcher in rest {
                    let next = matcher.matching_values(attribute, ctx)?;
                    selected.retain(|v| next.contains(v));
                }
                Ok(selected)
            }
            Self::Or { matchers } => {
                if matchers.is_empty() {
                    return Err(MatchFailure::new("'or' matcher has no children"));
                }
                let mut selected = ValueSet::new();
                for matcher in matchers {
                    selected.extend(matcher.matching_values(attribute, ctx)?);
                }
                Ok(selected)
            }
            Self::Not { matcher } => {
                let excluded = matcher.matching_values(attribute, ctx)?;
                Ok(select(attribute, |v| !excluded.contains(v)))
            }
            Self::Custom(matcher) => matcher.matching_values(attribute, ctx),
        }
    }
}

fn select(attribute: &Attribute, keep: impl Fn(&AttributeValue) -> bool) -> ValueSet {
    attribute
        .values()
        .iter()
        .filter(|v| keep(*v))
        .cloned()
        .collect()
}

pub(crate) fn text_equals(candidate: &str, expected: &str, ignore_case: bool) -> bool {
    if ignore_case {
        candidate.to_lowercase() == expected.to_lowercase()
    } else {
        candidate == expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn affiliation() -> Attribute {
        let mut attribute = Attribute::with_values("affiliation", ["member", "Staff"]);
        attribute.push(AttributeValue::scoped("faculty", "example.org"));
        attribute.push(AttributeValue::scoped("student", "Sub.Example.org"));
        attribute.push(AttributeValue::binary(vec![0x66, 0x61]));
        attribute.push(AttributeValue::Empty);
        attribute
    }

    fn rendered(values: &ValueSet) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test_case(ValueMatcher::value("member"), &["member"]; "exact string")]
    #[test_case(ValueMatcher::value("staff"), &[]; "case sensitive")]
    #[test_case(ValueMatcher::value_ignore_case("staff"), &["Staff"]; "ignore case")]
    #[test_case(ValueMatcher::value("faculty"), &["faculty@example.org"]; "scoped value part")]
    #[test_case(ValueMatcher::scope("example.org"), &["faculty@example.org"]; "scope string")]
    #[test_case(
        ValueMatcher::ScopeRegex { pattern: Pattern::new(r"(?i)(.+\.)?example\.org").unwrap() },
        &["faculty@example.org", "student@Sub.Example.org"];
        "scope regex"
    )]
    #[test_case(
        ValueMatcher::ValueRegex { pattern: Pattern::new("mem.*").unwrap() },
        &["member"];
        "value regex"
    )]
    fn builtin_matcher_selects(matcher: ValueMatcher, expected: &[&str]) {
        let selected = matcher
            .matching_values(&affiliation(), &RequestContext::new("jdoe"))
            .unwrap();
        let mut got = rendered(&selected);
        got.sort();
        let mut expected: Vec<String> = expected.iter().map(ToString::to_string).collect();
        expected.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn any_selects_binary_and_empty_values() {
        let selected = ValueMatcher::Any
            .matching_values(&affiliation(), &RequestContext::new("jdoe"))
            .unwrap();
        assert_eq!(selected.len(), 6);
    }

    #[test]
    fn not_complements_against_attribute_values() {
        let attribute = Attribute::with_values("mail", ["a", "b", "c"]);
        let selected = ValueMatcher::not(ValueMatcher::value("b"))
            .matching_values(&attribute, &RequestContext::new("jdoe"))
            .unwrap();
        assert_eq!(rendered(&selected), vec!["a", "c"]);
    }

    #[test]
    fn and_intersects_or_unions() {
        let attribute = Attribute::with_values("mail", ["a", "b", "c"]);
        let ctx = RequestContext::new("jdoe");

        let and = ValueMatcher::And {
            matchers: vec![
                ValueMatcher::not(ValueMatcher::value("a")),
                ValueMatcher::not(ValueMatcher::value("c")),
            ],
        };
        assert_eq!(rendered(&and.matching_values(&attribute, &ctx).unwrap()), vec!["b"]);

        let or = ValueMatcher::Or {
            matchers: vec![ValueMatcher::value("a"), ValueMatcher::value("c")],
        };
        assert_eq!(
            rendered(&or.matching_values(&attribute, &ctx).unwrap()),
            vec!["a", "c"]
        );
    }

    #[test]
    fn empty_combinators_fail() {
        let attribute = Attribute::with_values("mail", ["a"]);
        let ctx = RequestContext::new("jdoe");
        assert!(
            ValueMatcher::And { matchers: vec![] }
                .matching_values(&attribute, &ctx)
                .is_err()
        );
        assert!(
            ValueMatcher::Or { matchers: vec![] }
                .matching_values(&attribute, &ctx)
                .is_err()
        );
    }

    #[test]
    fn deserializes_tagged_matchers() {
        let matcher: ValueMatcher = serde_json::from_str(
            r#"{"type": "or", "matchers": [
                {"type": "value_string", "value": "member"},
                {"type": "scope_regex", "pattern": "example\\.org"}
            ]}"#,
        )
        .unwrap();
        let selected = matcher
            .matching_values(&affiliation(), &RequestContext::new("jdoe"))
            .unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn invalid_regex_is_rejected_on_deserialize() {
        let result: Result<ValueMatcher, _> =
            serde_json::from_str(r#"{"type": "value_regex", "pattern": "(["}"#);
        assert!(result.is_err());
    }
}
