//! In-process user store.
//!
//! Backs `STORE_BACKEND=memory` for local runs and the test suite. Rows live in
//! a `DashMap`, so writers to different ids land on different shards instead of
//! a single lock. Username uniqueness is claimed through the shard entry API.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicI64, Ordering};

use super::UserStore;
use crate::domain::{validate_rating, LeaderboardEntry, Page, User};
use crate::error::{LeaderboardError, Result};

#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<i64, User>,
    names: DashMap<String, i64>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Copy of every row ordered the way leaderboard reads order them
    fn sorted_snapshot(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| (Reverse(u.rating), u.id));
        users
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, username: &str, rating: i32) -> Result<User> {
        validate_rating(rating)?;

        let user = match self.names.entry(username.to_string()) {
            Entry::Occupied(_) => {
                return Err(LeaderboardError::DuplicateName(username.to_string()))
            }
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let now = Utc::now();
                let user = User {
                    id,
                    username: username.to_string(),
                    rating,
                    created_at: now,
                    updated_at: now,
                };
                // Row goes in before the name guard is released
                self.users.insert(id, user.clone());
                slot.insert(id);
                user
            }
        };

        Ok(user)
    }

    async fn update_rating(&self, id: i64, rating: i32) -> Result<User> {
        validate_rating(rating)?;

        let mut row = self
            .users
            .get_mut(&id)
            .ok_or_else(|| LeaderboardError::NotFound(format!("user {}", id)))?;
        row.rating = rating;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn get_by_name(&self, pattern: &str) -> Result<User> {
        self.users
            .iter()
            .filter(|e| e.value().username.contains(pattern))
            .min_by_key(|e| *e.key())
            .map(|e| e.value().clone())
            .ok_or_else(|| LeaderboardError::NotFound(format!("username matching '{}'", pattern)))
    }

    async fn ranked_range(
        &self,
        page: Page,
        filter: Option<&str>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let sorted = self.sorted_snapshot();

        let mut ranked = Vec::with_capacity(sorted.len());
        let mut rank = 0i64;
        let mut previous: Option<i32> = None;
        for (position, user) in sorted.into_iter().enumerate() {
            if previous != Some(user.rating) {
                rank = position as i64 + 1;
                previous = Some(user.rating);
            }
            ranked.push(LeaderboardEntry {
                id: user.id,
                username: user.username,
                rating: user.rating,
                rank,
            });
        }

        Ok(ranked
            .into_iter()
            .filter(|e| filter.map_or(true, |f| e.username.contains(f)))
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn count_above(&self, rating: i32) -> Result<i64> {
        Ok(self.users.iter().filter(|e| e.value().rating > rating).count() as i64)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}
