//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the page shells, the JSON auth/profile API and the
//! identity-change event stream. Two middleware layers run before every
//! handler, outermost first: the browser-context layer attaches the
//! caller's context, then the route guard redirects or lets the request
//! through.

pub mod auth;
pub mod context;
pub mod diagnostics;
pub mod events;
pub mod pages;
pub mod profile;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{guard, paths};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(paths::LANDING, get(pages::landing))
        .route(paths::SIGNUP, get(pages::signup))
        .route(paths::LOGIN, get(pages::login))
        .route(paths::EMAIL_CONFIRMATION, get(pages::email_confirmation))
        .route(paths::VERIFY_EMAIL, get(pages::verify_email))
        .route(paths::INTROS, get(pages::intros))
        .route(paths::PROFILE, get(pages::profile))
        .route(paths::DIAGNOSTICS, get(pages::diagnostics))
        .route("/auth/oauth/{provider}", get(auth::oauth_start))
        .route(paths::OAUTH_CALLBACK, get(auth::oauth_callback))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/resend", post(auth::resend))
        .route("/api/auth/verify", post(auth::verify))
        .route("/api/auth/session", get(auth::session))
        .route("/api/auth/events", get(events::events))
        .route("/api/profile", get(profile::get_profile).patch(profile::patch_profile))
        .route("/api/profile/competitors", post(profile::add_competitor))
        .route("/api/profile/competitors/{name}", delete(profile::remove_competitor))
        .route("/api/diagnostics", get(diagnostics::report))
        .route(paths::HEALTHZ, get(healthz))
        .layer(middleware::from_fn_with_state(state.clone(), guard::route_guard))
        .layer(middleware::from_fn_with_state(state.clone(), context::context_layer))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
