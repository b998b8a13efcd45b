use crate::domain::{LeaderboardEntry, Page, User};
use crate::error::Result;

/// Authoritative user storage.
///
/// Implemented by `PgUserStore` (PostgreSQL) and `MemoryUserStore` (in-process).
/// Ranks produced here follow the same rule as the cache index:
/// `1 + number of users with a strictly greater rating`.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with `DuplicateName` when the username is taken.
    async fn create(&self, username: &str, rating: i32) -> Result<User>;

    /// Set a user's rating in one conditional write and return the updated row.
    /// Fails with `NotFound` when no row has this id.
    async fn update_rating(&self, id: i64, rating: i32) -> Result<User>;

    /// First user whose username contains `pattern`; lowest id wins on ties.
    async fn get_by_name(&self, pattern: &str) -> Result<User>;

    /// Users ordered by rating descending (id ascending on ties), ranked over
    /// the whole table, optionally restricted to usernames containing `filter`.
    async fn ranked_range(&self, page: Page, filter: Option<&str>)
        -> Result<Vec<LeaderboardEntry>>;

    /// Number of users with a rating strictly greater than `rating`
    async fn count_above(&self, rating: i32) -> Result<i64>;

    /// Every user, for index rebuilds
    async fn all_users(&self) -> Result<Vec<User>>;

    /// Health check (optional)
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
