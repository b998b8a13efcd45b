/// Leaderboard Service - HTTP Server
///
/// Boots the durable store, the optional Redis index and the background
/// drivers, then serves the leaderboard API until shutdown.
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use db_pool::{create_pool, ensure_database_exists};
use leaderboard_service::cache::{IndexState, RankedIndex, RedisRankedIndex};
use leaderboard_service::config::StoreBackend;
use leaderboard_service::handlers::{self, AppState};
use leaderboard_service::repository::{MemoryUserStore, PgUserStore, UserStore};
use leaderboard_service::services::{IndexSync, LeaderboardService, SimulationService};
use leaderboard_service::workers::{BackgroundDriver, PeriodicResync, RedisHealthCheck};
use leaderboard_service::Config;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,leaderboard_service=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(env = %config.app.env, store = ?config.store, "Starting leaderboard-service");

    // Durable store
    let store: Arc<dyn UserStore> = match (&config.store, &config.database) {
        (StoreBackend::Postgres, Some(db)) => {
            db.log_config();
            ensure_database_exists(&db.database_url)
                .await
                .context("Failed to ensure database exists")?;

            let pool = create_pool(db.clone())
                .await
                .context("Failed to create database pool")?;

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Migrations completed successfully");

            Arc::new(PgUserStore::new(pool))
        }
        (StoreBackend::Postgres, None) => {
            anyhow::bail!("STORE_BACKEND=postgres requires database configuration")
        }
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory user store; data is lost on restart");
            Arc::new(MemoryUserStore::new())
        }
    };

    // Ranked cache index (optional). Built whenever REDIS_URL is set so the
    // health probe can bring it up later if Redis is down at boot.
    let state = Arc::new(IndexState::new());
    let index: Option<Arc<dyn RankedIndex>> = match &config.redis.url {
        Some(url) => {
            let index = RedisRankedIndex::open(url, config.redis.leaderboard_key.clone())
                .context("Invalid REDIS_URL")?;
            match index.ping().await {
                Ok(()) => tracing::info!(key = %index.key(), "Connected to Redis cache index"),
                Err(e) => tracing::warn!(
                    error = %e,
                    "Redis unreachable at startup; serving from PostgreSQL until it recovers"
                ),
            }
            Some(Arc::new(index))
        }
        None => {
            tracing::info!("REDIS_URL not set; serving from PostgreSQL only");
            None
        }
    };

    let leaderboard = LeaderboardService::new(store.clone(), index.clone(), state.clone());
    let sync = index
        .as_ref()
        .map(|index| IndexSync::new(store.clone(), index.clone(), state.clone()));

    // Background work
    let mut drivers: Vec<BackgroundDriver> = Vec::new();
    if let (Some(index), Some(sync)) = (&index, &sync) {
        // Otherwise the health probe rebuilds on its first successful PING
        if index.is_available() {
            sync.spawn_rebuild();
        }

        let health = RedisHealthCheck::new(
            index.clone(),
            state.clone(),
            sync.clone(),
            config.redis.health_interval,
        );
        drivers.push(BackgroundDriver::new(Arc::new(health)));

        if let Some(interval) = config.sync.interval {
            drivers.push(BackgroundDriver::new(Arc::new(PeriodicResync::new(
                sync.clone(),
                interval,
            ))));
        }
    }
    for driver in &drivers {
        driver.start().await;
    }

    let simulation = Arc::new(SimulationService::new(
        leaderboard.clone(),
        config.simulation.clone(),
    ));
    if config.simulation.autostart {
        simulation.start().await;
    }

    let app_state = web::Data::new(AppState {
        leaderboard,
        simulation: simulation.clone(),
        sync,
    });

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(address = %bind_address, "HTTP server listening");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run()
    .await
    .context("HTTP server error")?;

    tracing::info!("HTTP server stopped, shutting down background work");
    simulation.stop().await;
    for driver in &drivers {
        driver.stop().await;
    }

    tracing::info!("Leaderboard-service shut down");
    Ok(())
}
