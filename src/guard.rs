//! Route guard: decides, before any page handler runs, whether the request
//! may proceed or must be redirected.
//!
//! DESIGN
//! ======
//! Paths are classified by prefix against three immutable tables. Excluded
//! and unclassified paths pass straight through without resolving an
//! identity. For protected and auth-only paths the current identity is
//! resolved from the session cookies and the decision table applies:
//!
//! | class     | signed in        | anonymous       |
//! |-----------|------------------|-----------------|
//! | protected | allow            | redirect /login |
//! | auth-only | redirect /intros | allow           |
//!
//! ERROR HANDLING
//! ==============
//! An unconfigured identity service allows everything so the site stays
//! navigable. Any other failure while resolving the identity is logged and
//! the configured [`GuardFailurePolicy`] picks the outcome.
//!
//! A rejected access token with a refresh cookie present is refreshed once;
//! the rotated cookies ride on the response. A rejected refresh token
//! clears both cookies and the request continues anonymously.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, error};

use crate::cookies;
use crate::identity::Identity;
use crate::paths;
use crate::services::context::BrowserContext;
use crate::services::events::AuthEvents;
use crate::services::gateway::{AuthError, AuthGateway};
use crate::state::AppState;

pub const PROTECTED_PREFIXES: &[&str] = &["/intros", "/profile", "/chromeextension"];
pub const AUTH_ONLY_PREFIXES: &[&str] = &["/login", "/signup"];
/// Static assets and the diagnostics page are never evaluated.
pub const EXCLUDED_PREFIXES: &[&str] = &["/static", "/_image", "/favicon.ico", "/images", paths::DIAGNOSTICS];

// =============================================================================
// CLASSIFICATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Protected,
    AuthOnly,
    Unclassified,
}

fn matches_any(path: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}

#[must_use]
pub fn is_excluded(path: &str) -> bool {
    matches_any(path, EXCLUDED_PREFIXES)
}

/// Protected wins if a path matches both tables.
#[must_use]
pub fn classify(path: &str) -> RouteClass {
    if matches_any(path, PROTECTED_PREFIXES) {
        RouteClass::Protected
    } else if matches_any(path, AUTH_ONLY_PREFIXES) {
        RouteClass::AuthOnly
    } else {
        RouteClass::Unclassified
    }
}

// =============================================================================
// DECISION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

#[must_use]
pub fn decide(class: RouteClass, signed_in: bool) -> GuardDecision {
    match (class, signed_in) {
        (RouteClass::Protected, false) => GuardDecision::Redirect(paths::LOGIN),
        (RouteClass::AuthOnly, true) => GuardDecision::Redirect(paths::INTROS),
        _ => GuardDecision::Allow,
    }
}

/// Outcome when identity resolution fails for a reason other than the
/// identity service being unconfigured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardFailurePolicy {
    /// Let every request through.
    FailOpen,
    /// Send protected paths to the login page; allow the rest.
    FailClosed,
}

impl GuardFailurePolicy {
    #[must_use]
    pub fn on_error(self, class: RouteClass) -> GuardDecision {
        match (self, class) {
            (Self::FailClosed, RouteClass::Protected) => GuardDecision::Redirect(paths::LOGIN),
            _ => GuardDecision::Allow,
        }
    }
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

struct Resolved {
    identity: Option<Identity>,
    /// Cookie changes to write onto the response (rotation or clearing).
    cookies: Option<CookieJar>,
}

async fn resolve_identity(gateway: &AuthGateway, jar: &CookieJar, secure: bool) -> Result<Resolved, AuthError> {
    let access = cookies::read(jar, cookies::ACCESS_TOKEN);
    if let Some(identity) = gateway.current_identity(access).await? {
        return Ok(Resolved { identity: Some(identity), cookies: None });
    }

    let Some(refresh) = cookies::read(jar, cookies::REFRESH_TOKEN) else {
        return Ok(Resolved { identity: None, cookies: None });
    };
    match gateway.refresh(refresh).await {
        Ok(session) => {
            debug!(user = %session.identity.id, "route guard refreshed session");
            Ok(Resolved {
                identity: Some(session.identity),
                cookies: Some(cookies::set_session(CookieJar::new(), &session.tokens, secure)),
            })
        }
        Err(AuthError::InvalidCredentials) => Ok(Resolved {
            identity: None,
            cookies: Some(cookies::clear_session(CookieJar::new(), secure)),
        }),
        Err(e) => Err(e),
    }
}

/// Axum middleware; install with `middleware::from_fn_with_state`.
pub async fn route_guard(State(state): State<AppState>, jar: CookieJar, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    if is_excluded(&path) {
        return next.run(req).await;
    }
    let class = classify(&path);
    if class == RouteClass::Unclassified || state.identity.is_none() {
        return next.run(req).await;
    }

    // Refresh events go to the browser's own channel when the context layer ran.
    let events = req
        .extensions()
        .get::<Arc<BrowserContext>>()
        .map_or_else(AuthEvents::new, |ctx| ctx.events.clone());
    let gateway = state.gateway(&events);

    let mut cookie_updates = None;
    let decision = match resolve_identity(&gateway, &jar, state.config.cookie_secure).await {
        Ok(resolved) => {
            cookie_updates = resolved.cookies;
            let decision = decide(class, resolved.identity.is_some());
            if let Some(identity) = resolved.identity {
                req.extensions_mut().insert(identity);
            }
            decision
        }
        Err(e) => {
            error!(error = %e, path = %path, "route guard could not resolve identity");
            state.config.guard_policy.on_error(class)
        }
    };

    let response = match decision {
        GuardDecision::Allow => next.run(req).await,
        GuardDecision::Redirect(to) => {
            debug!(path = %path, to, "route guard redirect");
            Redirect::temporary(to).into_response()
        }
    };

    match cookie_updates {
        Some(jar) => (jar, response).into_response(),
        None => response,
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
