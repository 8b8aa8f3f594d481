//! Browser contexts: per-browser session state held server-side.
//!
//! DESIGN
//! ======
//! A context is keyed by the `waly_ctx` cookie and bundles the state a
//! browser tab would otherwise hold: the identity-change channel, the session
//! store, the in-memory profile being edited, and a single-permit gate that
//! rejects duplicate submissions while an auth call is outstanding.
//!
//! Contexts live in a shared map (like live boards do) and are swept once
//! idle past a TTL with no event-stream listeners attached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{RwLock, Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::events::AuthEvents;
use super::profile::Profile;
use super::session::SessionStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// =============================================================================
// BROWSER CONTEXT
// =============================================================================

pub struct BrowserContext {
    pub id: Uuid,
    pub events: AuthEvents,
    pub session: SessionStore,
    /// Profile as last loaded or edited in this context. Optimistic: saves
    /// that later fail are not rolled back.
    pub profile: tokio::sync::Mutex<Option<Profile>>,
    submissions: Semaphore,
    last_seen: Mutex<Instant>,
}

impl BrowserContext {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        let events = AuthEvents::new();
        let session = SessionStore::new(&events);
        Self {
            id,
            events,
            session,
            profile: tokio::sync::Mutex::new(None),
            submissions: Semaphore::new(1),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    /// Claim the submission slot; `None` while another submission is running.
    pub fn try_begin_submission(&self) -> Option<SemaphorePermit<'_>> {
        self.submissions.try_acquire().ok()
    }

    pub fn touch(&self) {
        *self
            .last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_since(&self, now: Instant) -> Duration {
        let last_seen = *self
            .last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(last_seen)
    }

    /// The session store's pump holds one receiver; anything beyond that, or
    /// any session subscriber, is an attached event stream.
    fn has_listeners(&self) -> bool {
        self.events.listener_count() > 1 || self.session.subscriber_count() > 0
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Clone, Default)]
pub struct ContextRegistry {
    contexts: Arc<RwLock<HashMap<Uuid, Arc<BrowserContext>>>>,
}

impl ContextRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the context for `id`, creating one under a freshly minted id
    /// when `id` is unknown or absent. Ids are only ever issued here, never
    /// taken from the caller. The flag is `true` when a context was created
    /// and the caller must hand its id back to the browser.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Arc<BrowserContext>, bool) {
        if let Some(id) = id {
            if let Some(ctx) = self.contexts.read().await.get(&id) {
                ctx.touch();
                return (Arc::clone(ctx), false);
            }
        }

        let ctx = Arc::new(BrowserContext::new(Uuid::new_v4()));
        self.contexts
            .write()
            .await
            .insert(ctx.id, Arc::clone(&ctx));
        debug!(ctx = %ctx.id, "browser context created");
        (ctx, true)
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<BrowserContext>> {
        self.contexts.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    /// Drop contexts idle for longer than `ttl` with no listeners. Returns
    /// how many were removed.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        self.sweep_idle_at(ttl, Instant::now()).await
    }

    pub(crate) async fn sweep_idle_at(&self, ttl: Duration, now: Instant) -> usize {
        let mut contexts = self.contexts.write().await;
        let before = contexts.len();
        contexts.retain(|_, ctx| ctx.has_listeners() || ctx.idle_since(now) <= ttl);
        before - contexts.len()
    }
}

/// Spawn the background sweeper. Returns a handle for shutdown.
pub fn spawn_context_sweeper(registry: ContextRegistry, ttl: Duration) -> JoinHandle<()> {
    info!(ttl_secs = ttl.as_secs(), "browser context sweeper configured");
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;
            let removed = registry.sweep_idle(ttl).await;
            if removed > 0 {
                debug!(removed, "swept idle browser contexts");
            }
        }
    })
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
