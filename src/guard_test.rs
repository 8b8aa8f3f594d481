use super::*;
use axum::Router;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::middleware;
use axum::routing::get;
use tower::ServiceExt;

use crate::config::ServerConfig;
use crate::state::test_helpers::{MockIdentity, test_app_state, test_app_state_with_config};

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "landing" }))
        .route("/intros", get(|| async { "intros" }))
        .route("/login", get(|| async { "login" }))
        .route("/diagnostics", get(|| async { "diagnostics" }))
        .layer(middleware::from_fn_with_state(state, route_guard))
}

async fn get_path(app: Router, path: &str, cookie: Option<&str>) -> Response {
    let mut builder = axum::http::Request::builder().uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(resp: &Response) -> Option<&str> {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

fn set_cookies(resp: &Response) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_owned())
        .collect()
}

fn signed_in(mock: &MockIdentity) -> String {
    let identity = mock.with_user("ada@example.com", "pw");
    let session = mock.issue_session(&identity);
    format!("{}={}", cookies::ACCESS_TOKEN, session.tokens.access_token)
}

// =============================================================================
// TABLES
// =============================================================================

#[test]
fn classification_is_prefix_based() {
    assert_eq!(classify("/intros"), RouteClass::Protected);
    assert_eq!(classify("/intros/42"), RouteClass::Protected);
    assert_eq!(classify("/profile"), RouteClass::Protected);
    assert_eq!(classify("/chromeextension"), RouteClass::Protected);
    assert_eq!(classify("/login"), RouteClass::AuthOnly);
    assert_eq!(classify("/signup"), RouteClass::AuthOnly);
    assert_eq!(classify("/"), RouteClass::Unclassified);
    assert_eq!(classify("/api/profile"), RouteClass::Unclassified);
    assert_eq!(classify("/verify-email"), RouteClass::Unclassified);
}

#[test]
fn static_assets_and_diagnostics_are_excluded() {
    for path in ["/static/app.css", "/_image?url=x", "/favicon.ico", "/images/logo.png", "/diagnostics"] {
        assert!(is_excluded(path), "{path} should be excluded");
    }
    assert!(!is_excluded("/intros"));
}

#[test]
fn decision_table() {
    assert_eq!(decide(RouteClass::Protected, false), GuardDecision::Redirect("/login"));
    assert_eq!(decide(RouteClass::Protected, true), GuardDecision::Allow);
    assert_eq!(decide(RouteClass::AuthOnly, true), GuardDecision::Redirect("/intros"));
    assert_eq!(decide(RouteClass::AuthOnly, false), GuardDecision::Allow);
    assert_eq!(decide(RouteClass::Unclassified, false), GuardDecision::Allow);
    assert_eq!(decide(RouteClass::Unclassified, true), GuardDecision::Allow);
}

#[test]
fn failure_policies() {
    assert_eq!(GuardFailurePolicy::FailOpen.on_error(RouteClass::Protected), GuardDecision::Allow);
    assert_eq!(GuardFailurePolicy::FailClosed.on_error(RouteClass::Protected), GuardDecision::Redirect("/login"));
    assert_eq!(GuardFailurePolicy::FailClosed.on_error(RouteClass::AuthOnly), GuardDecision::Allow);
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

#[tokio::test]
async fn unconfigured_identity_service_allows_everything() {
    let resp = get_path(app(test_app_state(None, None)), "/intros", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_protected_request_redirects_to_login() {
    let mock = MockIdentity::new();
    let resp = get_path(app(test_app_state(Some(mock), None)), "/intros", None).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), Some("/login"));
}

#[tokio::test]
async fn signed_in_user_is_bounced_off_login() {
    let mock = MockIdentity::new();
    let cookie = signed_in(&mock);
    let state = test_app_state(Some(mock), None);

    let resp = get_path(app(state.clone()), "/login", Some(&cookie)).await;
    assert_eq!(location(&resp), Some("/intros"));

    let resp = get_path(app(state), "/intros", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_user_reaches_login() {
    let mock = MockIdentity::new();
    let resp = get_path(app(test_app_state(Some(mock), None)), "/login", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn unclassified_and_excluded_paths_skip_identity_lookup() {
    let mock = MockIdentity::new();
    mock.set_transport_down(true);
    let state = test_app_state(Some(Arc::clone(&mock)), None);

    let resp = get_path(app(state.clone()), "/", Some("waly_access_token=access-0")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = get_path(app(state), "/diagnostics", Some("waly_access_token=access-0")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn outage_fails_closed_for_protected_paths_by_default() {
    let mock = MockIdentity::new();
    mock.set_transport_down(true);
    let state = test_app_state(Some(mock), None);

    let resp = get_path(app(state.clone()), "/intros", Some("waly_access_token=access-0")).await;
    assert_eq!(location(&resp), Some("/login"));

    let resp = get_path(app(state), "/login", Some("waly_access_token=access-0")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn outage_fails_open_when_configured() {
    let mock = MockIdentity::new();
    mock.set_transport_down(true);
    let config = ServerConfig { guard_policy: GuardFailurePolicy::FailOpen, ..ServerConfig::default() };
    let state = test_app_state_with_config(config, Some(mock), None);

    let resp = get_path(app(state), "/intros", Some("waly_access_token=access-0")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn stale_access_token_is_refreshed_and_rotated() {
    let mock = MockIdentity::new();
    let identity = mock.with_user("ada@example.com", "pw");
    let session = mock.issue_session(&identity);
    mock.expire_access(&session.tokens.access_token);
    let cookie = format!(
        "{}={}; {}={}",
        cookies::ACCESS_TOKEN,
        session.tokens.access_token,
        cookies::REFRESH_TOKEN,
        session.tokens.refresh_token
    );

    let resp = get_path(app(test_app_state(Some(mock), None)), "/intros", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let set = set_cookies(&resp);
    assert!(set.iter().any(|c| c.starts_with("waly_access_token=access-1")), "{set:?}");
    assert!(set.iter().any(|c| c.starts_with("waly_refresh_token=refresh-1")), "{set:?}");
}

#[tokio::test]
async fn rejected_refresh_clears_session_and_redirects() {
    let mock = MockIdentity::new();
    let cookie = format!("{}=gone; {}=gone", cookies::ACCESS_TOKEN, cookies::REFRESH_TOKEN);

    let resp = get_path(app(test_app_state(Some(mock), None)), "/intros", Some(&cookie)).await;
    assert_eq!(location(&resp), Some("/login"));
    let set = set_cookies(&resp);
    assert!(set.iter().any(|c| c.starts_with("waly_access_token=;")), "{set:?}");
    assert!(set.iter().any(|c| c.starts_with("waly_refresh_token=;")), "{set:?}");
}
