use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LeaderboardError, Result};

/// Default page size for leaderboard reads
pub const DEFAULT_LIMIT: i64 = 50;
/// Page sizes above this are clamped
pub const MAX_LIMIT: i64 = 100;
/// Page size used by username search
pub const SEARCH_LIMIT: i64 = 10;

/// User entity - the authoritative row in `users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One leaderboard row. Cache members carry no timestamps, so neither does this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub id: i64,
    pub username: String,
    pub rating: i32,
    pub rank: i64,
}

/// A single user together with their current rank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithRank {
    #[serde(flatten)]
    pub user: User,
    pub rank: i64,
}

/// Identity of a user inside the ranked cache index.
///
/// Encoded as `"<username>:<id>"` so a range read can render rows without
/// touching the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheMember {
    pub username: String,
    pub id: i64,
}

impl CacheMember {
    pub fn new(username: impl Into<String>, id: i64) -> Self {
        Self {
            username: username.into(),
            id,
        }
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.username, self.id)
    }

    /// Usernames may contain `:`, the id never does
    pub fn parse(raw: &str) -> Option<Self> {
        let (username, id) = raw.rsplit_once(':')?;
        if username.is_empty() {
            return None;
        }
        let id = id.parse().ok()?;
        Some(Self::new(username, id))
    }
}

impl From<&User> for CacheMember {
    fn from(user: &User) -> Self {
        Self::new(user.username.clone(), user.id)
    }
}

/// Validated pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Rejects non-positive limits and negative offsets, clamps large limits
    pub fn new(limit: i64, offset: i64) -> Result<Self> {
        if limit <= 0 {
            return Err(LeaderboardError::validation(
                "limit must be greater than 0",
            ));
        }
        if offset < 0 {
            return Err(LeaderboardError::validation("offset cannot be negative"));
        }
        Ok(Self {
            limit: limit.min(MAX_LIMIT),
            offset,
        })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

pub fn validate_username(username: &str) -> Result<&str> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(LeaderboardError::validation("username is required"));
    }
    Ok(trimmed)
}

pub fn validate_rating(rating: i32) -> Result<i32> {
    if rating < 0 {
        return Err(LeaderboardError::validation("rating cannot be negative"));
    }
    Ok(rating)
}

/// Blank filters mean "no filter"
pub fn normalize_filter(filter: Option<&str>) -> Option<&str> {
    filter.map(str::trim).filter(|f| !f.is_empty())
}
