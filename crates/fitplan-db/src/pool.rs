use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::migrate::MigrateDatabase;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/fitplan-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

const MAX_CONNECTIONS: u32 = 5;

fn pool_options(acquire_timeout: Duration) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(acquire_timeout)
}

/// Connect eagerly; fails now if the database is unreachable.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    pool_options(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))
}

/// Create a pool that connects on first use, so a server can start while
/// the database is down and report it per request.
pub fn create_lazy_pool(config: &DbConfig) -> Result<PgPool> {
    pool_options(Duration::from_secs(5))
        .connect_lazy(&config.database_url)
        .with_context(|| format!("invalid database url {}", config.database_url))
}

/// Create the configured database unless it is already there.
///
/// Returns `true` when the database was created.
pub async fn ensure_database(config: &DbConfig) -> Result<bool> {
    let url = config.database_url.as_str();
    let name = config.database_name().unwrap_or("<unnamed>");

    let exists = Postgres::database_exists(url)
        .await
        .with_context(|| format!("failed to check for database {name}"))?;
    if exists {
        info!(db = name, "database already exists");
        return Ok(false);
    }

    Postgres::create_database(url)
        .await
        .with_context(|| format!("failed to create database {name}"))?;
    info!(db = name, "database created");
    Ok(true)
}

/// Apply pending embedded migrations. Already-applied ones are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    info!(latest = ?latest_embedded_version(), "saved_plans schema migrated");
    Ok(())
}

fn latest_embedded_version() -> Option<i64> {
    MIGRATOR.iter().map(|m| m.version).max()
}

/// Schema version and saved-plan total, reported by `fitplan db-init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaStatus {
    /// Newest successfully applied migration, `None` on a fresh database.
    pub applied: Option<(i64, String)>,
    /// Newest migration compiled into this binary.
    pub embedded: Option<i64>,
    pub saved_plans: i64,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.applied.as_ref().map(|(v, _)| *v) == self.embedded
    }
}

pub async fn schema_status(pool: &PgPool) -> Result<SchemaStatus> {
    let applied: Option<(i64, String)> = sqlx::query_as(
        "SELECT version, description FROM _sqlx_migrations \
         WHERE success ORDER BY version DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .context("failed to read applied migrations")?;

    let saved_plans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM saved_plans")
        .fetch_one(pool)
        .await
        .context("failed to count saved plans")?;

    Ok(SchemaStatus {
        applied,
        embedded: latest_embedded_version(),
        saved_plans,
    })
}
