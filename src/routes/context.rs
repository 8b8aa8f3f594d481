//! Browser-context middleware.
//!
//! Resolves (or mints) the `waly_ctx` cookie, attaches the matching
//! `Arc<BrowserContext>` to the request extensions for the guard and the
//! handlers, and sets the cookie on the response when a context was created.
//!
//! Health checks and the paths the guard never evaluates get no context, so
//! monitors and asset fetches do not grow the registry.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::{cookies, guard, paths};
use crate::services::context::BrowserContext;
use crate::state::AppState;

fn needs_context(path: &str) -> bool {
    path != paths::HEALTHZ && !guard::is_excluded(path)
}

pub async fn context_layer(State(state): State<AppState>, jar: CookieJar, mut req: Request, next: Next) -> Response {
    if !needs_context(req.uri().path()) {
        return next.run(req).await;
    }
    let (ctx, created): (Arc<BrowserContext>, bool) = state.contexts.get_or_create(cookies::context_id(&jar)).await;
    req.extensions_mut().insert(Arc::clone(&ctx));

    let response = next.run(req).await;
    if created {
        let jar = CookieJar::new().add(cookies::context(ctx.id, state.config.cookie_secure));
        (jar, response).into_response()
    } else {
        response
    }
}
