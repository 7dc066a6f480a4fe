//! # tessera-types: Core types for `Tessera`
//!
//! This crate contains the shared types used by the resolution and filtering
//! engines:
//! - Attribute values ([`AttributeValue`]) and attributes ([`Attribute`], [`AttributeMap`])
//! - Three-valued logic ([`Tristate`])
//! - Per-request state ([`RequestContext`])
//! - Time sources ([`Clock`], [`SystemClock`], [`ManualClock`])

use std::{
    collections::{BTreeMap, HashSet},
    fmt::{Debug, Display},
};

use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

// ============================================================================
// Attribute Values - Clone (opaque, equality-comparable payloads)
// ============================================================================

/// A single value of an attribute.
///
/// The engines never interpret values beyond equality and string extraction:
/// matchers compare the string form, finalization deduplicates by equality.
///
/// Serialized untagged so configuration can write plain strings for the
/// common case and `{ value = "...", scope = "..." }` tables for scoped values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A plain string value.
    String(String),
    /// A value qualified by a security domain, rendered as `value@scope`.
    Scoped {
        /// The unscoped portion (e.g. `staff`).
        value: String,
        /// The scope (e.g. `example.org`).
        scope: String,
    },
    /// Raw bytes (certificates, opaque identifiers).
    Binary(Bytes),
    /// A value that is present but carries no content.
    Empty,
}

impl AttributeValue {
    /// Creates a plain string value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Creates a scoped value.
    pub fn scoped(value: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::Scoped {
            value: value.into(),
            scope: scope.into(),
        }
    }

    /// Creates a binary value.
    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Self::Binary(bytes.into())
    }

    /// Returns the string content of string-like values.
    ///
    /// For scoped values this is the unscoped portion. Binary and empty
    /// values have no string form.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Scoped { value, .. } => Some(value),
            Self::Binary(_) | Self::Empty => None,
        }
    }

    /// Returns the scope of a scoped value.
    pub fn scope(&self) -> Option<&str> {
        match self {
            Self::Scoped { scope, .. } => Some(scope),
            _ => None,
        }
    }

    /// Returns true if this value is string-like (plain or scoped).
    pub fn is_string_like(&self) -> bool {
        self.as_str().is_some()
    }
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Scoped { value, scope } => write!(f, "{value}@{scope}"),
            Self::Binary(bytes) => write!(
                f,
                "{}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
            Self::Empty => Ok(()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

// ============================================================================
// Attribute - Clone (id plus an ordered value list)
// ============================================================================

/// A named attribute with zero or more values.
///
/// Values keep insertion order; duplicates are allowed until
/// [`dedup_values`](Self::dedup_values) is called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    id: String,
    #[serde(default)]
    values: Vec<AttributeValue>,
}

impl Attribute {
    /// Creates an attribute with no values.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: Vec::new(),
        }
    }

    /// Creates an attribute with the given values.
    pub fn with_values<I, V>(id: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        Self {
            id: id.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    /// Appends a value.
    pub fn push(&mut self, value: impl Into<AttributeValue>) {
        self.values.push(value.into());
    }

    /// Appends every value from the iterator.
    pub fn extend<I: IntoIterator<Item = AttributeValue>>(&mut self, values: I) {
        self.values.extend(values);
    }

    /// Keeps only the values for which `keep` returns true, preserving order.
    pub fn retain_values(&mut self, keep: impl FnMut(&AttributeValue) -> bool) {
        self.values.retain(keep);
    }

    /// Removes duplicate values. The first occurrence of each value is kept.
    pub fn dedup_values(&mut self) {
        let mut seen = HashSet::with_capacity(self.values.len());
        self.values.retain(|v| seen.insert(v.clone()));
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns a copy of this attribute under a different id.
    pub fn renamed(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: self.values.clone(),
        }
    }
}

/// Attributes keyed by id. Ordered so output is deterministic.
pub type AttributeMap = BTreeMap<String, Attribute>;

// ============================================================================
// Tristate - Copy (TRUE / FALSE / FAIL)
// ============================================================================

/// Outcome of a predicate that may be unable to decide.
///
/// `Fail` is an ordinary value, not an error: callers treat it as
/// "could not evaluate" and decide locally what that means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tristate {
    True,
    False,
    Fail,
}

impl Tristate {
    pub fn is_true(self) -> bool {
        self == Self::True
    }

    /// Logical negation. `Fail` stays `Fail`.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Fail => Self::Fail,
        }
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl Display for Tristate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "TRUE"),
            Self::False => write!(f, "FALSE"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

// ============================================================================
// Request Context - NOT shared (one per attribute request)
// ============================================================================

/// Per-request state handed through resolution and filtering.
///
/// Created by the caller, populated by the resolver
/// (`resolved_attributes`) and then by the filter (`released_attributes`).
/// A context must not be reused for a second request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// The subject the attributes describe.
    pub principal: String,
    /// The entity releasing the attributes, if known.
    pub issuer: Option<String>,
    /// The relying party requesting the attributes, if known.
    pub recipient: Option<String>,
    /// Attribute ids to resolve. Empty means every attribute definition.
    pub requested_attributes: Vec<String>,
    /// Output of resolution.
    pub resolved_attributes: AttributeMap,
    /// Output of filtering.
    pub released_attributes: AttributeMap,
}

impl RequestContext {
    /// Creates a context for the given principal.
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            ..Self::default()
        }
    }

    /// Sets the issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the recipient (requesting party).
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Adds a requested attribute id.
    pub fn with_requested_attribute(mut self, id: impl Into<String>) -> Self {
        self.requested_attributes.push(id.into());
        self
    }

    /// Replaces the requested attribute ids.
    pub fn with_requested_attributes<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_attributes = ids.into_iter().map(Into::into).collect();
        self
    }
}
