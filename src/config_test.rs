use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

// =============================================================================
// IdentityConfig
// =============================================================================

#[test]
fn identity_config_requires_url_and_key() {
    let cfg = IdentityConfig::from_lookup(lookup_from(&[
        ("SUPABASE_URL", "https://abc.supabase.co/"),
        ("SUPABASE_ANON_KEY", "anon"),
    ]))
    .unwrap();
    assert_eq!(cfg.url, "https://abc.supabase.co");
    assert_eq!(cfg.anon_key, "anon");
    assert_eq!(cfg.timeout, Duration::from_secs(DEFAULT_IDENTITY_TIMEOUT_SECS));
}

#[test]
fn identity_config_missing_key_is_none() {
    assert!(IdentityConfig::from_lookup(lookup_from(&[("SUPABASE_URL", "https://abc.supabase.co")])).is_none());
}

#[test]
fn identity_config_missing_url_is_none() {
    assert!(IdentityConfig::from_lookup(lookup_from(&[("SUPABASE_ANON_KEY", "anon")])).is_none());
}

#[test]
fn identity_config_blank_values_are_none() {
    assert!(
        IdentityConfig::from_lookup(lookup_from(&[("SUPABASE_URL", "   "), ("SUPABASE_ANON_KEY", "anon")])).is_none()
    );
}

#[test]
fn identity_config_timeout_override() {
    let cfg = IdentityConfig::from_lookup(lookup_from(&[
        ("SUPABASE_URL", "https://abc.supabase.co"),
        ("SUPABASE_ANON_KEY", "anon"),
        ("IDENTITY_TIMEOUT_SECS", "3"),
    ]))
    .unwrap();
    assert_eq!(cfg.timeout, Duration::from_secs(3));
}

// =============================================================================
// ServerConfig
// =============================================================================

#[test]
fn server_config_defaults() {
    let cfg = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.public_origin, DEFAULT_PUBLIC_ORIGIN);
    assert!(cfg.database_url.is_none());
    assert!(!cfg.cookie_secure);
    assert_eq!(cfg.guard_policy, GuardFailurePolicy::FailClosed);
    assert_eq!(cfg.profile_save_debounce, Duration::from_millis(500));
}

#[test]
fn server_config_invalid_port_errors() {
    let err = ServerConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
    assert_eq!(err, ConfigError::InvalidPort("eighty".into()));
}

#[test]
fn server_config_rejects_schemeless_origin() {
    let err = ServerConfig::from_lookup(lookup_from(&[("PUBLIC_ORIGIN", "waly.app")])).unwrap_err();
    assert!(err.to_string().contains("PUBLIC_ORIGIN"));
}

#[test]
fn server_config_https_origin_implies_secure_cookies() {
    let cfg = ServerConfig::from_lookup(lookup_from(&[("PUBLIC_ORIGIN", "https://waly.app/")])).unwrap();
    assert_eq!(cfg.public_origin, "https://waly.app");
    assert!(cfg.cookie_secure);
}

#[test]
fn server_config_cookie_secure_explicit_override() {
    let cfg = ServerConfig::from_lookup(lookup_from(&[
        ("PUBLIC_ORIGIN", "https://waly.app"),
        ("COOKIE_SECURE", "off"),
    ]))
    .unwrap();
    assert!(!cfg.cookie_secure);
}

#[test]
fn server_config_guard_fail_open_opt_in() {
    let cfg = ServerConfig::from_lookup(lookup_from(&[("GUARD_FAIL_OPEN", "TRUE")])).unwrap();
    assert_eq!(cfg.guard_policy, GuardFailurePolicy::FailOpen);
}

#[test]
fn server_config_unparseable_numbers_fall_back_to_defaults() {
    let cfg = ServerConfig::from_lookup(lookup_from(&[
        ("PROFILE_SAVE_DEBOUNCE_MS", "soon"),
        ("CONTEXT_IDLE_TTL_SECS", "-1"),
    ]))
    .unwrap();
    assert_eq!(cfg.profile_save_debounce, Duration::from_millis(DEFAULT_PROFILE_SAVE_DEBOUNCE_MS));
    assert_eq!(cfg.context_idle_ttl, Duration::from_secs(DEFAULT_CONTEXT_IDLE_TTL_SECS));
}

// =============================================================================
// parse_bool
// =============================================================================

#[test]
fn parse_bool_variants() {
    for raw in ["1", "true", "yes", "on", "  True  "] {
        assert_eq!(parse_bool(raw), Some(true), "expected true for {raw:?}");
    }
    for raw in ["0", "false", "no", "OFF"] {
        assert_eq!(parse_bool(raw), Some(false), "expected false for {raw:?}");
    }
    assert_eq!(parse_bool("maybe"), None);
    assert_eq!(parse_bool(""), None);
}
