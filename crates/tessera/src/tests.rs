//! End-to-end tests: configuration in, released attributes out.

use std::sync::Arc;
use std::thread;

use test_case::test_case;

use crate::*;

const DIRECTORY: &str = r#"
[authority]
id = "https://idp.example.org"

[resolver]
default_no_retry_delay_ms = 60000

[[data_connectors]]
id = "directory"
type = "static"
attributes = [
    { id = "mail", values = ["jdoe@example.org"] },
    { id = "affiliation", values = ["staff", "member", "alum"] },
]

[[attribute_definitions]]
id = "mail"
type = "simple"
dependencies = [{ plugin_id = "directory", attribute_id = "mail" }]

[[attribute_definitions]]
id = "scopedAffiliation"
type = "scoped"
scope = "example.org"
dependencies = [{ plugin_id = "directory", attribute_id = "affiliation" }]

[[attribute_definitions]]
id = "uid"
type = "principal_name"

[[filter_policies]]
id = "release-to-sp"
requirement = { type = "requester", value = "https://sp.example.com" }
rules = [
    { id = "mail", attribute_id = "mail", matcher = { type = "any" } },
    { id = "affiliation", attribute_id = "scopedAffiliation", matcher = { type = "any" } },
]

[[filter_policies]]
id = "never-alum"
requirement = { type = "any" }
rules = [
    { id = "no-alum", attribute_id = "scopedAffiliation", effect = "deny", matcher = { type = "value_string", value = "alum" } },
]
"#;

const FAILOVER: &str = r#"
[[data_connectors]]
id = "primary"
type = "unavailable"
failover = "cache"
no_retry_delay_ms = 5000

[[data_connectors]]
id = "cache"
type = "static"
attributes = [{ id = "mail", values = ["cached@example.org"] }]

[[attribute_definitions]]
id = "mail"
type = "simple"
dependencies = [{ plugin_id = "primary", attribute_id = "mail" }]

[[filter_policies]]
id = "anyone"
requirement = { type = "any" }
rules = [{ id = "mail", attribute_id = "mail", matcher = { type = "any" } }]
"#;

fn authority(toml: &str) -> AttributeAuthority {
    let config = TesseraConfig::from_toml(toml).expect("config should parse");
    AttributeAuthority::from_config(&config).expect("authority should build")
}

fn released(ctx: &RequestContext, id: &str) -> Vec<String> {
    ctx.released_attributes
        .get(id)
        .map(|a| a.values().iter().map(ToString::to_string).collect())
        .unwrap_or_default()
}

// ============================================================================
// Building
// ============================================================================

#[test]
fn test_from_config_builds_both_engines() {
    let authority = authority(DIRECTORY);

    assert_eq!(authority.id(), "https://idp.example.org");
    assert_eq!(authority.resolver().definition_ids().len(), 3);
    assert_eq!(authority.resolver().connector_ids(), vec!["directory"]);
    assert_eq!(authority.attribute_filter().policies().len(), 2);
    assert_eq!(
        authority
            .resolver()
            .connector("directory")
            .and_then(ConnectorPlugin::retry_delay),
        Some(std::time::Duration::from_secs(60))
    );
}

#[test]
fn test_invalid_config_is_rejected_before_building() {
    let config = TesseraConfig::from_toml(
        r#"
[[attribute_definitions]]
id = "affiliation"
type = "scoped"
"#,
    )
    .unwrap();

    let err = AttributeAuthority::from_config(&config).unwrap_err();
    assert!(matches!(err, AuthorityError::Config(_)));
}

#[test]
fn test_missing_dependency_surfaces_as_resolver_error() {
    let config = TesseraConfig::from_toml(
        r#"
[[attribute_definitions]]
id = "mail"
type = "simple"
dependencies = [{ plugin_id = "ldap" }]
"#,
    )
    .unwrap();

    let err = AttributeAuthority::from_config(&config).unwrap_err();
    assert!(matches!(
        err,
        AuthorityError::Resolver(ConfigurationError::MissingDependency { ref dependency_id, .. })
            if dependency_id == "ldap"
    ));
}

#[test]
fn test_failover_cycle_surfaces_as_resolver_error() {
    let config = TesseraConfig::from_toml(
        r#"
[[data_connectors]]
id = "a"
type = "static"
failover = "b"

[[data_connectors]]
id = "b"
type = "static"
failover = "a"
"#,
    )
    .unwrap();

    let err = AttributeAuthority::from_config(&config).unwrap_err();
    assert!(matches!(
        err,
        AuthorityError::Resolver(ConfigurationError::CircularDependency { .. })
    ));
}

#[test]
fn test_duplicate_rule_surfaces_as_filter_error() {
    let config = TesseraConfig::from_toml(
        r#"
[[filter_policies]]
id = "p"
requirement = { type = "any" }
rules = [
    { id = "r", attribute_id = "mail", matcher = { type = "any" } },
    { id = "r", attribute_id = "uid", matcher = { type = "any" } },
]
"#,
    )
    .unwrap();

    let err = AttributeAuthority::from_config(&config).unwrap_err();
    assert!(matches!(
        err,
        AuthorityError::Filter(FilterBuildError::DuplicateRuleId { .. })
    ));
}

// ============================================================================
// Release
// ============================================================================

#[test]
fn test_release_applies_permits_and_denies() {
    let authority = authority(DIRECTORY);
    let mut ctx = RequestContext::new("jdoe").with_recipient("https://sp.example.com");

    authority.release(&mut ctx).unwrap();

    assert_eq!(ctx.resolved_attributes.len(), 3);
    assert_eq!(released(&ctx, "mail"), vec!["jdoe@example.org"]);
    assert_eq!(
        released(&ctx, "scopedAffiliation"),
        vec!["staff@example.org", "member@example.org"]
    );
    // Resolved but never permitted.
    assert!(!ctx.released_attributes.contains_key("uid"));
}

#[test]
fn test_release_to_unknown_requester_releases_nothing() {
    let authority = authority(DIRECTORY);
    let mut ctx = RequestContext::new("jdoe").with_recipient("https://other.example.com");

    authority.release(&mut ctx).unwrap();

    assert!(!ctx.resolved_attributes.is_empty());
    assert!(ctx.released_attributes.is_empty());
}

#[test]
fn test_requested_attributes_limit_resolution() {
    let authority = authority(DIRECTORY);
    let mut ctx = RequestContext::new("jdoe")
        .with_recipient("https://sp.example.com")
        .with_requested_attribute("mail");

    authority.release(&mut ctx).unwrap();

    assert_eq!(
        ctx.resolved_attributes.keys().collect::<Vec<_>>(),
        vec!["mail"]
    );
    assert_eq!(released(&ctx, "mail"), vec!["jdoe@example.org"]);
}

#[test_case(None, "https://idp.example.org" ; "defaults to authority id")]
#[test_case(Some("https://proxy.example.org"), "https://proxy.example.org" ; "keeps caller issuer")]
fn test_issuer(issuer: Option<&str>, expected: &str) {
    let authority = authority(DIRECTORY);
    let mut ctx = RequestContext::new("jdoe");
    ctx.issuer = issuer.map(String::from);

    authority.resolve(&mut ctx).unwrap();

    assert_eq!(ctx.issuer.as_deref(), Some(expected));
}

#[test]
fn test_issuer_requirement_sees_defaulted_issuer() {
    let toml = r#"
[authority]
id = "https://idp.example.org"

[[attribute_definitions]]
id = "uid"
type = "principal_name"

[[filter_policies]]
id = "own-issuer"
requirement = { type = "issuer", value = "https://idp.example.org" }
rules = [{ id = "uid", attribute_id = "uid", matcher = { type = "any" } }]
"#;
    let authority = authority(toml);
    let mut ctx = RequestContext::new("jdoe");

    authority.release(&mut ctx).unwrap();

    assert_eq!(released(&ctx, "uid"), vec!["jdoe"]);
}

// ============================================================================
// Failure Handling
// ============================================================================

#[test]
fn test_unavailable_connector_fails_over() {
    let clock = Arc::new(ManualClock::at(1_000));
    let authority = authority(FAILOVER).with_clock(clock.clone());

    let mut ctx = RequestContext::new("jdoe");
    authority.release(&mut ctx).unwrap();
    assert_eq!(released(&ctx, "mail"), vec!["cached@example.org"]);

    let primary = authority.resolver().connector("primary").unwrap();
    assert_eq!(primary.last_failure_ms(), Some(1_000));

    // Inside the window the primary is skipped outright.
    clock.advance_ms(4_999);
    let mut ctx = RequestContext::new("jdoe");
    authority.release(&mut ctx).unwrap();
    assert_eq!(released(&ctx, "mail"), vec!["cached@example.org"]);
    assert_eq!(primary.last_failure_ms(), Some(1_000));

    // Past the window it is tried (and fails) again.
    clock.advance_ms(1);
    let mut ctx = RequestContext::new("jdoe");
    authority.release(&mut ctx).unwrap();
    assert_eq!(primary.last_failure_ms(), Some(6_000));
}

#[test]
fn test_resolution_failure_releases_nothing() {
    let toml = r#"
[[data_connectors]]
id = "primary"
type = "unavailable"

[[attribute_definitions]]
id = "mail"
type = "simple"
dependencies = [{ plugin_id = "primary" }]

[[attribute_definitions]]
id = "uid"
type = "principal_name"

[[filter_policies]]
id = "anyone"
requirement = { type = "any" }
rules = [{ id = "uid", attribute_id = "uid", matcher = { type = "any" } }]
"#;
    let authority = authority(toml);
    let mut ctx = RequestContext::new("jdoe");

    let err = authority.release(&mut ctx).unwrap_err();

    assert!(matches!(
        err,
        AuthorityError::Resolution(ResolutionError::PluginFailed { ref plugin_id, .. })
            if plugin_id == "primary"
    ));
    assert!(ctx.resolved_attributes.is_empty());
    assert!(ctx.released_attributes.is_empty());
}

#[test]
fn test_swallowed_failure_still_releases_the_rest() {
    let toml = r#"
[[data_connectors]]
id = "primary"
type = "unavailable"
propagate_failure = false

[[attribute_definitions]]
id = "mail"
type = "simple"
dependencies = [{ plugin_id = "primary" }]

[[attribute_definitions]]
id = "uid"
type = "principal_name"

[[filter_policies]]
id = "anyone"
requirement = { type = "any" }
rules = [
    { id = "uid", attribute_id = "uid", matcher = { type = "any" } },
    { id = "mail", attribute_id = "mail", matcher = { type = "any" } },
]
"#;
    let authority = authority(toml);
    let mut ctx = RequestContext::new("jdoe");

    authority.release(&mut ctx).unwrap();

    assert_eq!(released(&ctx, "uid"), vec!["jdoe"]);
    assert!(!ctx.released_attributes.contains_key("mail"));
}

#[test]
fn test_strict_mode_rejects_unknown_attribute() {
    let toml = r#"
[resolver]
strict = true

[[attribute_definitions]]
id = "uid"
type = "principal_name"
"#;
    let authority = authority(toml);
    let mut ctx = RequestContext::new("jdoe").with_requested_attribute("eppn");

    let err = authority.release(&mut ctx).unwrap_err();
    assert!(matches!(
        err,
        AuthorityError::Resolution(ResolutionError::UnknownAttribute(ref id)) if id == "eppn"
    ));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_shared_authority_serves_concurrent_requests() {
    let authority = Arc::new(authority(DIRECTORY));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let authority = Arc::clone(&authority);
            thread::spawn(move || {
                let principal = format!("user{i}");
                let mut ctx = RequestContext::new(&principal)
                    .with_recipient("https://sp.example.com")
                    .with_requested_attributes(["uid", "mail"]);
                authority.resolve(&mut ctx).unwrap();
                authority.filter(&mut ctx);
                (principal, ctx)
            })
        })
        .collect();

    for handle in handles {
        let (principal, ctx) = handle.join().unwrap();
        assert_eq!(
            ctx.resolved_attributes["uid"].values(),
            &[AttributeValue::string(principal)]
        );
        assert_eq!(released(&ctx, "mail"), vec!["jdoe@example.org"]);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest::proptest! {
    /// Property: released values are always a subset of resolved values.
    #[test]
    fn prop_released_subset_of_resolved(
        principal in "[a-z]{1,12}",
        requester in proptest::option::of("https://[a-z]{1,8}\\.example\\.com"),
    ) {
        let authority = authority(DIRECTORY);
        let mut ctx = RequestContext::new(principal);
        ctx.recipient = requester;

        authority.release(&mut ctx).unwrap();

        for (id, released) in &ctx.released_attributes {
            let resolved = &ctx.resolved_attributes[id];
            proptest::prop_assert!(!released.is_empty());
            for value in released.values() {
                proptest::prop_assert!(resolved.values().contains(value));
            }
        }
    }
}
