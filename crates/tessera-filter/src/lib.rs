//! # tessera-filter: Attribute release filtering
//!
//! Decides, value by value, which resolved attributes are released to the
//! requesting party.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  RequestContext::resolved_attributes         │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  AttributeFilter                             │
//! │  ├─ Evaluate each policy's requirement       │
//! │  │  (TRUE / FALSE / FAIL)                    │
//! │  ├─ Apply rules of active policies           │
//! │  │  (permit / deny value sets)               │
//! │  └─ Release permitted minus denied           │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  RequestContext::released_attributes         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Filtering never fails a request. A requirement that evaluates to `FAIL`
//! deactivates its policy; a matcher that cannot evaluate makes its rule
//! inert.
//!
//! ## Examples
//!
//! ```
//! use tessera_filter::{AttributeFilter, AttributeFilterPolicy, AttributeRule, PolicyRequirement, ValueMatcher};
//! use tessera_types::{Attribute, RequestContext};
//!
//! let filter = AttributeFilter::new([
//!     AttributeFilterPolicy::new("release-mail", PolicyRequirement::requester("https://sp.example.com"))
//!         .with_rule(AttributeRule::permit("mail", "mail", ValueMatcher::Any)),
//!     AttributeFilterPolicy::new("no-aliases", PolicyRequirement::Any)
//!         .with_rule(AttributeRule::deny("alias", "mail", ValueMatcher::value("alias@example.org"))),
//! ])?;
//!
//! let mut ctx = RequestContext::new("jdoe").with_recipient("https://sp.example.com");
//! ctx.resolved_attributes.insert(
//!     "mail".into(),
//!     Attribute::with_values("mail", ["jdoe@example.org", "alias@example.org"]),
//! );
//!
//! filter.filter(&mut ctx);
//! assert_eq!(ctx.released_attributes["mail"].len(), 1);
//! # Ok::<(), tessera_filter::FilterBuildError>(())
//! ```

pub mod error;
pub mod filter;
pub mod matcher;
pub mod pattern;
pub mod policy;
pub mod requirement;

pub use error::{FilterBuildError, MatchFailure};
pub use filter::{AttributeFilter, FilterWorkState};
pub use matcher::{Matcher, ValueMatcher, ValueSet};
pub use pattern::Pattern;
pub use policy::{AttributeFilterPolicy, AttributeRule, RuleEffect};
pub use requirement::{PolicyRequirement, PolicyRequirementRule};
