//! Session store: who is signed in for one browser context.
//!
//! ARCHITECTURE
//! ============
//! Each browser context owns exactly one `SessionStore`. The store holds a
//! `watch` snapshot (`identity`, `loading`) and a pump task that drains the
//! context's [`AuthEvents`]. For every event the pump first updates the
//! snapshot, then calls subscribers in registration order, so callbacks
//! always observe the post-event state.
//!
//! Subscriptions are released by [`Subscription::unsubscribe`] or on drop.
//! Dropping the store stops the pump.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::events::{AuthEvent, AuthEvents};
use super::gateway::AuthGateway;
use crate::identity::Identity;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub loading: bool,
}

impl SessionSnapshot {
    fn pending() -> Self {
        Self { identity: None, loading: true }
    }
}

type Callback = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

pub struct SessionStore {
    state: Arc<watch::Sender<SessionSnapshot>>,
    subscribers: Arc<Mutex<Subscribers>>,
    pump: JoinHandle<()>,
}

impl SessionStore {
    /// Create a store in the loading state, listening on `events`.
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(events: &AuthEvents) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::pending());
        let state = Arc::new(state);
        let subscribers = Arc::new(Mutex::new(Subscribers::default()));
        let pump = tokio::spawn(run_pump(events.subscribe(), Arc::clone(&state), Arc::clone(&subscribers)));
        Self { state, subscribers, pump }
    }

    /// Resolve the current identity through the gateway and clear `loading`.
    ///
    /// Any failure, including an unconfigured identity service, resolves to
    /// an absent identity. Safe to call repeatedly; the last call wins.
    pub async fn initialize(&self, gateway: &AuthGateway, access_token: Option<&str>) -> SessionSnapshot {
        let identity = match gateway.current_identity(access_token).await {
            Ok(identity) => identity,
            Err(e) => {
                debug!(error = %e, "session initialize resolved to anonymous");
                None
            }
        };
        self.state.send_modify(|snapshot| {
            snapshot.identity = identity;
            snapshot.loading = false;
        });
        self.snapshot()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Observe snapshot transitions.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Register a callback for identity-change notifications.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = subs.next_id;
        subs.next_id += 1;
        subs.entries.push((id, Arc::new(on_change)));
        Subscription { id, subscribers: Arc::downgrade(&self.subscribers) }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn run_pump(
    mut rx: tokio::sync::broadcast::Receiver<AuthEvent>,
    state: Arc<watch::Sender<SessionSnapshot>>,
    subscribers: Arc<Mutex<Subscribers>>,
) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "session store lagged behind auth events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        state.send_modify(|snapshot| {
            snapshot.identity.clone_from(&event.identity);
            snapshot.loading = false;
        });

        // Snapshot the callbacks so a callback may (un)subscribe without deadlocking.
        let callbacks: Vec<Callback> = subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(&event);
        }
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle returned by [`SessionStore::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    subscribers: std::sync::Weak<Mutex<Subscribers>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
