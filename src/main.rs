mod config;
mod cookies;
mod db;
mod guard;
mod identity;
mod paths;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use identity::IdentityProvider;
use services::profile::{PgProfiles, ProfileBackend, ProfileStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::ServerConfig::from_env().expect("invalid server configuration");

    // Identity service is optional: every auth operation degrades to
    // `ConfigurationMissing` and the guard lets everything through.
    let identity_config = config::IdentityConfig::from_env();
    let identity: Option<Arc<dyn IdentityProvider>> = match &identity_config {
        Some(cfg) => match identity::GoTrueClient::new(cfg) {
            Ok(client) => {
                tracing::info!(url = %cfg.url, "identity service configured");
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!(error = %e, "identity client init failed: auth disabled");
                None
            }
        },
        None => {
            tracing::warn!("SUPABASE_URL / SUPABASE_ANON_KEY not set: auth disabled");
            None
        }
    };

    let backend: Option<Arc<dyn ProfileBackend>> = db::connect_optional(config.database_url.as_deref())
        .await
        .expect("database init failed")
        .map(|pool| Arc::new(PgProfiles::new(pool)) as Arc<dyn ProfileBackend>);
    let profiles = ProfileStore::new(backend, config.profile_save_debounce);

    let port = config.port;
    let idle_ttl = config.context_idle_ttl;
    let state = state::AppState::new(config, identity, identity_config, profiles);

    let _sweeper = services::context::spawn_context_sweeper(state.contexts.clone(), idle_ttl);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "waly listening");
    axum::serve(listener, app).await.expect("server failed");
}
