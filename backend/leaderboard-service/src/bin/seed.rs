/// Seed the users table with random ratings.
///
/// Truncates `users`, then inserts `SEED_USER_COUNT` rows named `user_00001`,
/// `user_00002`, ... in batches of `SEED_BATCH_SIZE`. A running service picks the
/// new rows up on its next index rebuild (restart or `POST /admin/resync`).
use anyhow::{anyhow, Context, Result};
use db_pool::{create_pool, ensure_database_exists, DbConfig};
use leaderboard_service::config::SeedConfig;
use rand::Rng;
use sqlx::{Postgres, QueryBuilder};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MIN_RATING: i32 = 100;
const MAX_RATING: i32 = 5000;

fn seed_username(n: usize) -> String {
    format!("user_{:05}", n)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let seed = SeedConfig::from_env();
    let db = DbConfig::from_env("leaderboard-seed").map_err(|e| anyhow!(e))?;

    ensure_database_exists(&db.database_url)
        .await
        .context("Failed to ensure database exists")?;
    let pool = create_pool(db)
        .await
        .context("Failed to create database pool")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    sqlx::query("TRUNCATE TABLE users RESTART IDENTITY")
        .execute(&pool)
        .await
        .context("Failed to truncate users")?;

    tracing::info!(
        users = seed.user_count,
        batch_size = seed.batch_size,
        "Seeding users"
    );
    let started = Instant::now();

    let mut inserted = 0usize;
    while inserted < seed.user_count {
        let batch_end = (inserted + seed.batch_size).min(seed.user_count);
        let rows: Vec<(String, i32)> = {
            let mut rng = rand::thread_rng();
            (inserted + 1..=batch_end)
                .map(|n| (seed_username(n), rng.gen_range(MIN_RATING..=MAX_RATING)))
                .collect()
        };

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO users (username, rating) ");
        builder.push_values(rows, |mut row, (username, rating)| {
            row.push_bind(username).push_bind(rating);
        });
        builder
            .build()
            .execute(&pool)
            .await
            .with_context(|| format!("Failed to insert batch ending at user {}", batch_end))?;

        inserted = batch_end;
        tracing::debug!(inserted, "Batch inserted");
    }

    tracing::info!(
        users = inserted,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Seeding complete"
    );
    Ok(())
}
