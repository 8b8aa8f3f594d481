//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers and middleware via the `State`
//! extractor. It holds the process-wide collaborators: the optional identity
//! provider, the profile store and the browser-context registry. Per-browser
//! state (session store, event channel, edited profile) lives in the
//! registry, never here.

use std::sync::Arc;

use crate::config::{IdentityConfig, ServerConfig};
use crate::identity::IdentityProvider;
use crate::services::context::ContextRegistry;
use crate::services::events::AuthEvents;
use crate::services::gateway::AuthGateway;
use crate::services::profile::ProfileStore;

/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// `None` if the identity service env vars are not configured.
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub identity_config: Option<IdentityConfig>,
    pub profiles: ProfileStore,
    pub contexts: ContextRegistry,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: ServerConfig,
        identity: Option<Arc<dyn IdentityProvider>>,
        identity_config: Option<IdentityConfig>,
        profiles: ProfileStore,
    ) -> Self {
        Self { config: Arc::new(config), identity, identity_config, profiles, contexts: ContextRegistry::new() }
    }

    /// Gateway bound to one browser context's event channel.
    #[must_use]
    pub fn gateway(&self, events: &AuthEvents) -> AuthGateway {
        AuthGateway::new(self.identity.clone(), events.clone())
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;
