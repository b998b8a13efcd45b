use sqlx::PgPool;
use tracing::debug;

use super::UserStore;
use crate::domain::{validate_rating, LeaderboardEntry, Page, User};
use crate::error::{LeaderboardError, Result};

const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

/// PostgreSQL repository for users (source of truth)
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_insert_error(err: sqlx::Error, username: &str) -> LeaderboardError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return LeaderboardError::DuplicateName(username.to_string())
            }
            Some(CHECK_VIOLATION) => {
                return LeaderboardError::validation("rating cannot be negative")
            }
            _ => {}
        }
    }
    LeaderboardError::Database(err)
}

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, username: &str, rating: i32) -> Result<User> {
        validate_rating(rating)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, rating)
            VALUES ($1, $2)
            RETURNING id, username, rating, created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(rating)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, username))?;

        debug!(user_id = user.id, username = %user.username, "Created user in PostgreSQL");
        Ok(user)
    }

    async fn update_rating(&self, id: i64, rating: i32) -> Result<User> {
        validate_rating(rating)?;

        // Existence check and write in one statement; zero rows means unknown id
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET rating = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, rating, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(rating)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or_else(|| LeaderboardError::NotFound(format!("user {}", id)))
    }

    async fn get_by_name(&self, pattern: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, rating, created_at, updated_at
            FROM users
            WHERE strpos(username, $1) > 0
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(pattern)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or_else(|| LeaderboardError::NotFound(format!("username matching '{}'", pattern)))
    }

    async fn ranked_range(
        &self,
        page: Page,
        filter: Option<&str>,
    ) -> Result<Vec<LeaderboardEntry>> {
        // Rank is assigned before filtering so it stays global
        let rows = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT id, username, rating, rank
            FROM (
                SELECT id, username, rating,
                       RANK() OVER (ORDER BY rating DESC) AS rank
                FROM users
            ) ranked
            WHERE $3::text IS NULL OR strpos(username, $3) > 0
            ORDER BY rating DESC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .bind(filter)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count_above(&self, rating: i32) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE rating > $1")
            .bind(rating)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, rating, created_at, updated_at FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
