//! Auth routes: sign-up, sign-in, OAuth, verification, sign-out, session.
//!
//! Every handler works on the caller's browser context (attached by the
//! context layer). Mutations hold the context's submission permit for the
//! duration of the identity call; a concurrent second submit gets 409.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::HeaderName;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::Extension;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::cookies;
use crate::identity::Identity;
use crate::paths;
use crate::services::context::BrowserContext;
use crate::services::gateway::AuthError;
use crate::state::AppState;

const DUPLICATE_EMAIL_COPY: &str = "This email address is already in use";

// =============================================================================
// ERROR MAPPING
// =============================================================================

pub(crate) fn auth_error_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::ConfigurationMissing => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::InvalidCredentials | AuthError::InvalidCode => StatusCode::UNAUTHORIZED,
        AuthError::Service(_) => StatusCode::BAD_GATEWAY,
    }
}

pub(crate) fn error_body(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "error": code, "message": message }))).into_response()
}

fn auth_error(err: &AuthError) -> Response {
    error_body(auth_error_status(err), err.code(), &err.to_string())
}

/// Sign-up shows friendlier copy for an address that is already registered.
fn signup_error(err: &AuthError) -> Response {
    if err.is_duplicate_account() {
        return error_body(auth_error_status(err), err.code(), DUPLICATE_EMAIL_COPY);
    }
    auth_error(err)
}

fn busy() -> Response {
    error_body(StatusCode::CONFLICT, "submission_in_progress", "A submission is already in progress")
}

// =============================================================================
// IDENTITY EXTRACTOR
// =============================================================================

/// Identity behind the request's access token. Rejects with 401 when
/// anonymous and with the taxonomy status when the lookup itself fails.
pub struct AuthIdentity(pub Identity);

impl FromRequestParts<AppState> for AuthIdentity {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(Self(identity.clone()));
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let ctx = parts.extensions.get::<Arc<BrowserContext>>().cloned();
        let events = ctx.map(|c| c.events.clone()).unwrap_or_default();
        let gateway = state.gateway(&events);

        match gateway
            .current_identity(cookies::read(&jar, cookies::ACCESS_TOKEN))
            .await
        {
            Ok(Some(identity)) => Ok(Self(identity)),
            Ok(None) => Err(error_body(StatusCode::UNAUTHORIZED, "unauthenticated", "Not signed in")),
            Err(e) => Err(auth_error(&e)),
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct SignupRequest {
    email: String,
    password: String,
    #[serde(default)]
    display_name: String,
}

/// `POST /api/auth/signup`: create an account pending verification.
pub async fn signup(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    jar: CookieJar,
    Json(body): Json<SignupRequest>,
) -> Response {
    let Some(_permit) = ctx.try_begin_submission() else {
        return busy();
    };

    match state
        .gateway(&ctx.events)
        .sign_up(&body.email, &body.password, &body.display_name)
        .await
    {
        Ok(outcome) => {
            let body = Json(json!({ "redirect": outcome.redirect, "email": outcome.pending_email }));
            match &outcome.pending_email {
                Some(email) => (jar.add(cookies::pending_email(email, state.config.cookie_secure)), body).into_response(),
                None => body.into_response(),
            }
        }
        Err(e) => signup_error(&e),
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// `POST /api/auth/login`: password sign-in; sets the session cookies.
pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Response {
    let Some(_permit) = ctx.try_begin_submission() else {
        return busy();
    };

    match state
        .gateway(&ctx.events)
        .sign_in(&body.email, &body.password)
        .await
    {
        Ok(outcome) => {
            let jar = cookies::set_session(jar, &outcome.session.tokens, state.config.cookie_secure);
            let body = json!({ "redirect": outcome.redirect, "user": outcome.session.identity });
            (jar, Json(body)).into_response()
        }
        Err(e) => auth_error(&e),
    }
}

/// `POST /api/auth/logout`: best-effort revoke; always clears the cookies.
pub async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    jar: CookieJar,
) -> Response {
    let access = cookies::read(&jar, cookies::ACCESS_TOKEN).map(str::to_owned);
    let redirect = state
        .gateway(&ctx.events)
        .sign_out(access.as_deref())
        .await;

    let jar = cookies::clear_session(jar, state.config.cookie_secure);
    (jar, Json(json!({ "redirect": redirect }))).into_response()
}

#[derive(Deserialize)]
pub struct ResendRequest {
    #[serde(default)]
    email: Option<String>,
}

/// `POST /api/auth/resend`: resend the confirmation for the pending email.
/// Falls back to the pending-email cookie when the body carries none.
pub async fn resend(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    jar: CookieJar,
    Json(body): Json<ResendRequest>,
) -> Response {
    let Some(_permit) = ctx.try_begin_submission() else {
        return busy();
    };
    let Some(email) = pending_email(body.email, &jar) else {
        return auth_error(&AuthError::Validation("No pending verification email".into()));
    };

    match state
        .gateway(&ctx.events)
        .resend_verification(&email)
        .await
    {
        Ok(()) => Json(json!({ "email": email })).into_response(),
        Err(e) => auth_error(&e),
    }
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    email: Option<String>,
    code: String,
}

/// `POST /api/auth/verify`: confirm the pending sign-up with its code.
/// The client is sent on to `/intros` after the confirmation delay.
pub async fn verify(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    jar: CookieJar,
    Json(body): Json<VerifyRequest>,
) -> Response {
    let Some(_permit) = ctx.try_begin_submission() else {
        return busy();
    };
    let Some(email) = pending_email(body.email, &jar) else {
        return auth_error(&AuthError::Validation("No pending verification email".into()));
    };

    match state
        .gateway(&ctx.events)
        .verify_code(&email, &body.code)
        .await
    {
        Ok(outcome) => {
            let secure = state.config.cookie_secure;
            let jar = cookies::set_session(jar, &outcome.session.tokens, secure).add(cookies::clear_pending_email(secure));
            let refresh = format!("{}; url={}", outcome.delay.as_secs(), outcome.redirect);
            let delay_ms = u64::try_from(outcome.delay.as_millis()).unwrap_or(u64::MAX);
            let body = json!({
                "redirect": outcome.redirect,
                "delay_ms": delay_ms,
                "user": outcome.session.identity,
            });
            (jar, [(HeaderName::from_static("refresh"), refresh)], Json(body)).into_response()
        }
        Err(e) => auth_error(&e),
    }
}

fn pending_email(from_body: Option<String>, jar: &CookieJar) -> Option<String> {
    from_body
        .filter(|e| !e.trim().is_empty())
        .or_else(|| cookies::read(jar, cookies::PENDING_EMAIL).map(str::to_owned))
}

/// `GET /api/auth/session`: resolve and return this context's session.
pub async fn session(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    jar: CookieJar,
) -> Response {
    let gateway = state.gateway(&ctx.events);
    let snapshot = ctx
        .session
        .initialize(&gateway, cookies::read(&jar, cookies::ACCESS_TOKEN))
        .await;
    Json(snapshot).into_response()
}

// =============================================================================
// OAUTH
// =============================================================================

/// `GET /auth/oauth/{provider}`: start the external authorization flow.
pub async fn oauth_start(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    jar: CookieJar,
    Path(provider): Path<String>,
) -> Response {
    let gateway = state.gateway(&ctx.events);
    match gateway.sign_in_with_oauth(&provider, &state.config.public_origin) {
        Ok(start) => {
            let jar = jar.add(cookies::oauth_verifier(&start.code_verifier, state.config.cookie_secure));
            info!(provider = %provider, "oauth flow started");
            (jar, Redirect::temporary(&start.authorize_url)).into_response()
        }
        Err(e) => auth_error(&e),
    }
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    error_description: Option<String>,
}

/// `GET /auth/callback`: exchange the authorization code and land on `/intros`.
/// Any failure (including an unconfigured identity service) lands on `/login`.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    jar: CookieJar,
    Query(params): Query<CallbackQuery>,
) -> Response {
    let secure = state.config.cookie_secure;
    let gateway = state.gateway(&ctx.events);
    if !gateway.is_configured() {
        return Redirect::temporary(paths::LOGIN).into_response();
    }

    let verifier = cookies::read(&jar, cookies::OAUTH_VERIFIER).map(str::to_owned);
    let jar = jar.add(cookies::clear_oauth_verifier(secure));
    let (Some(code), Some(verifier)) = (params.code, verifier) else {
        if let Some(description) = params.error_description {
            warn!(error = %description, "oauth provider returned an error");
        }
        return (jar, Redirect::temporary(paths::LOGIN)).into_response();
    };

    match gateway.complete_oauth(&code, &verifier).await {
        Ok(outcome) => {
            let jar = cookies::set_session(jar, &outcome.session.tokens, secure);
            (jar, Redirect::temporary(outcome.redirect)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "oauth code exchange failed");
            (jar, Redirect::temporary(paths::LOGIN)).into_response()
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
