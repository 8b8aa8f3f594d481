//! Runtime configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Optional collaborators (the identity service, the profile database) load
//! as `Option`s. A missing variable disables the collaborator with a warning
//! at startup instead of failing the boot, so the site stays navigable in a
//! misconfigured environment.
//!
//! Every parser takes a lookup closure; `from_env` wires it to the process
//! environment and tests feed a map.

use std::time::Duration;

use crate::guard::GuardFailurePolicy;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PUBLIC_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_PROFILE_SAVE_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_CONTEXT_IDLE_TTL_SECS: u64 = 3600;
pub const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid PORT: {0}")]
    InvalidPort(String),
    #[error("invalid PUBLIC_ORIGIN: {0} (expected http:// or https:// origin)")]
    InvalidOrigin(String),
}

// =============================================================================
// IDENTITY SERVICE
// =============================================================================

/// Endpoint and public key of the external identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Base URL without a trailing slash, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public (anon) API key sent with every request.
    pub anon_key: String,
    pub timeout: Duration,
}

impl IdentityConfig {
    /// Load from `SUPABASE_URL` and `SUPABASE_ANON_KEY`.
    /// Returns `None` if either is missing or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let url = non_empty(lookup("SUPABASE_URL"))?;
        let anon_key = non_empty(lookup("SUPABASE_ANON_KEY"))?;
        let timeout_secs = parse_or(&lookup, "IDENTITY_TIMEOUT_SECS", DEFAULT_IDENTITY_TIMEOUT_SECS);
        Some(Self {
            url: url.trim_end_matches('/').to_owned(),
            anon_key,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// =============================================================================
// SERVER
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Externally visible origin; OAuth callbacks are built from it.
    pub public_origin: String,
    pub database_url: Option<String>,
    pub cookie_secure: bool,
    pub guard_policy: GuardFailurePolicy,
    pub profile_save_debounce: Duration,
    pub context_idle_ttl: Duration,
}

impl ServerConfig {
    /// Load server settings.
    ///
    /// - `PORT` (default 3000)
    /// - `PUBLIC_ORIGIN` (default `http://localhost:3000`)
    /// - `DATABASE_URL` (profiles disabled when absent)
    /// - `COOKIE_SECURE` (defaults to whether the origin is https)
    /// - `GUARD_FAIL_OPEN` (default false)
    /// - `PROFILE_SAVE_DEBOUNCE_MS` (default 500)
    /// - `CONTEXT_IDLE_TTL_SECS` (default 3600)
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` or `PUBLIC_ORIGIN` is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match non_empty(lookup("PORT")) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let public_origin = non_empty(lookup("PUBLIC_ORIGIN"))
            .unwrap_or_else(|| DEFAULT_PUBLIC_ORIGIN.to_owned())
            .trim_end_matches('/')
            .to_owned();
        if !(public_origin.starts_with("http://") || public_origin.starts_with("https://")) {
            return Err(ConfigError::InvalidOrigin(public_origin));
        }

        let cookie_secure = lookup("COOKIE_SECURE")
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or_else(|| public_origin.starts_with("https://"));

        let guard_policy = if lookup("GUARD_FAIL_OPEN").as_deref().and_then(parse_bool).unwrap_or(false) {
            GuardFailurePolicy::FailOpen
        } else {
            GuardFailurePolicy::FailClosed
        };

        Ok(Self {
            port,
            public_origin,
            database_url: non_empty(lookup("DATABASE_URL")),
            cookie_secure,
            guard_policy,
            profile_save_debounce: Duration::from_millis(parse_or(
                &lookup,
                "PROFILE_SAVE_DEBOUNCE_MS",
                DEFAULT_PROFILE_SAVE_DEBOUNCE_MS,
            )),
            context_idle_ttl: Duration::from_secs(parse_or(&lookup, "CONTEXT_IDLE_TTL_SECS", DEFAULT_CONTEXT_IDLE_TTL_SECS)),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            public_origin: DEFAULT_PUBLIC_ORIGIN.to_owned(),
            database_url: None,
            cookie_secure: false,
            guard_policy: GuardFailurePolicy::FailClosed,
            profile_save_debounce: Duration::from_millis(DEFAULT_PROFILE_SAVE_DEBOUNCE_MS),
            context_idle_ttl: Duration::from_secs(DEFAULT_CONTEXT_IDLE_TTL_SECS),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
