//! Profile database pool and migrations.
//!
//! SYSTEM CONTEXT
//! ==============
//! Optional at startup: without `DATABASE_URL` the profile store runs
//! disconnected (defaults on read, dropped saves). When configured, the pool
//! is created and the `profiles` schema migrated before serving traffic.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Pool size from a raw `DB_MAX_CONNECTIONS` value; zero or garbage falls
/// back to the default.
fn parse_max_connections(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
}

/// Connect to `PostgreSQL` and run pending migrations.
///
/// # Errors
///
/// Returns an error if the connection or migrations fail.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;

    Ok(pool)
}

/// Open the profile database when `database_url` is set. `Ok(None)` means
/// profiles run without persistence.
///
/// # Errors
///
/// A configured database that cannot be reached or migrated is an error.
pub async fn connect_optional(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        warn!("DATABASE_URL not set: profile saves disabled");
        return Ok(None);
    };

    let max_connections = parse_max_connections(std::env::var("DB_MAX_CONNECTIONS").ok().as_deref());
    let pool = init_pool(url, max_connections).await?;
    info!(max_connections, "profile database connected");
    Ok(Some(pool))
}
