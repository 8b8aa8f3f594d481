//! `GET /api/auth/events`: server-sent stream of identity changes for the
//! caller's browser context.
//!
//! The stream opens with an `INITIAL_SESSION` event carrying the current
//! snapshot, then forwards every notification the session store delivers.
//! Disconnecting drops the subscription.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Extension;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;

use crate::services::context::BrowserContext;
use crate::services::events::{AuthEvent, AuthEventKind};

fn to_sse(event: &AuthEvent) -> Event {
    let sse = Event::default().event(event.kind.as_str());
    match serde_json::to_string(event) {
        Ok(data) => sse.data(data),
        Err(_) => sse,
    }
}

pub async fn events(Extension(ctx): Extension<Arc<BrowserContext>>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(AuthEvent { kind: AuthEventKind::InitialSession, identity: ctx.session.snapshot().identity });
    let subscription = ctx.session.subscribe(move |event| {
        let _ = tx.send(event.clone());
    });

    let stream = futures::stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        let event = rx.recv().await?;
        Some((Ok(to_sse(&event)), (rx, subscription)))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
