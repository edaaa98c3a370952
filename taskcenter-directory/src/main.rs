//! # Task Center Directory Server
//!
//! Serves the account directory over HTTP. With the `memory` store backend
//! every region runs in-process on in-memory shards; with `postgres` the
//! directory and each region shard get their own database.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p taskcenter-directory
//! ```

use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use taskcenter_directory::{
    app::{build_router, AppState},
    config::{Config, StoreBackend},
    directory::AccountDirectoryApi,
    mailer::LogLinkMailer,
    store::{MemStore, PgStore, Store},
};
use taskcenter_region::store::{PgShardStore, ShardStore};
use taskcenter_region::{InternalRegionApi, InternalRegionClient, RegionPrivateApi};
use taskcenter_shared::auth::password::Argon2Crypto;
use taskcenter_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, create_shard_pools},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "Task Center Directory v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::load().context("Failed to load configuration")?;

    let (store, regions, db) = match config.store.backend {
        StoreBackend::Memory => memory_backend(&config),
        StoreBackend::Postgres => postgres_backend(&config).await?,
    };

    let directory = AccountDirectoryApi::new(
        store,
        regions,
        Arc::new(LogLinkMailer),
        Arc::new(Argon2Crypto),
        config.directory.clone(),
    )
    .context("Invalid name or password pattern")?;

    let bind_address = config.bind_address();
    let state = AppState::new(Arc::new(directory), config, db.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = db {
        close_pool(pool).await;
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "taskcenter_directory=debug,taskcenter_region=debug,tower_http=debug".into()
    });

    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

type Backend = (Arc<dyn Store>, Arc<dyn InternalRegionApi>, Option<PgPool>);

fn memory_backend(config: &Config) -> Backend {
    let regions = InternalRegionClient::in_memory(
        config
            .regions
            .iter()
            .map(|(name, region)| (name.as_str(), region.shards)),
        config.directory.max_process_entity_count,
    );
    tracing::info!(regions = ?regions.get_regions(), "Using in-memory stores");

    (Arc::new(MemStore::new()), Arc::new(regions), None)
}

async fn postgres_backend(config: &Config) -> anyhow::Result<Backend> {
    let pool = create_pool(&config.database)
        .await
        .context("Failed to connect to the directory database")?;
    run_migrations(&pool, "directory").await?;

    let mut apis = Vec::with_capacity(config.regions.len());
    for (name, region) in &config.regions {
        let shard_pools = create_shard_pools(&config.database, &region.shard_urls)
            .await
            .with_context(|| format!("Failed to connect to the shards of region {name}"))?;
        for (shard, shard_pool) in shard_pools.iter().enumerate() {
            run_migrations(shard_pool, &format!("{name}/shard-{shard}")).await?;
        }

        let store: Arc<dyn ShardStore> = Arc::new(PgShardStore::new(shard_pools));
        apis.push(RegionPrivateApi::new(
            name.as_str(),
            store,
            config.directory.max_process_entity_count,
        ));
        tracing::info!(region = %name, shards = region.shards, "Region ready");
    }

    Ok((
        Arc::new(PgStore::new(pool.clone())),
        Arc::new(InternalRegionClient::new(apis)),
        Some(pool),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, exiting...");
}
