//! Schema migrations
//!
//! Migrations are embedded from `taskcenter-shared/migrations/`. The directory
//! database and every shard database receive the same set; the directory only
//! reads `accounts`/`users`/`pwd_infos`, shards only `shard_*`.

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{error, info};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Applies pending migrations; `target` names the database in logs
/// (`"directory"`, `"us/shard-0"`).
pub async fn run_migrations(pool: &PgPool, target: &str) -> Result<(), sqlx::migrate::MigrateError> {
    info!(target_db = target, "Applying migrations");
    MIGRATOR.run(pool).await.map_err(|e| {
        error!(target_db = target, error = %e, "Migration failed");
        e
    })
}

/// Latest migration version embedded in this build
pub fn embedded_version() -> Option<i64> {
    MIGRATOR.iter().map(|m| m.version).max()
}

/// Highest successfully applied migration, `None` before the first run
pub async fn schema_version(pool: &PgPool) -> Result<Option<i64>, sqlx::Error> {
    let tracked: Option<String> =
        sqlx::query_scalar("SELECT to_regclass('public._sqlx_migrations')::text")
            .fetch_one(pool)
            .await?;
    if tracked.is_none() {
        return Ok(None);
    }

    sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations WHERE success")
        .fetch_one(pool)
        .await
}

/// Creates the database behind `url` when missing. Development and tests only.
pub async fn ensure_database_exists(url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(url).await? {
        info!("Creating missing database");
        Postgres::create_database(url).await?;
    }
    Ok(())
}
