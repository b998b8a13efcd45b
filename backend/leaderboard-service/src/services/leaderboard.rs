//! Leaderboard read/write orchestration over the durable store and the ranked index.
//!
//! Writes go to the durable store first; only a successful durable write is
//! mirrored into the index, and a failed mirror is logged, never surfaced.
//!
//! Reads are routed as follows:
//!
//! | filter present | cache available | path |
//! |---|---|---|
//! | yes | any | durable store range query with filter, rank via window function |
//! | no | yes | cache range query, rank via batched `countAbove` |
//! | no | no | durable store range query, rank via window function |
//!
//! "Cache available" means the transport is reachable, the index has been
//! rebuilt at least once, and no rebuild is in flight. Any cache error during a
//! read makes that request fall through to the durable store.
//!
//! The two stores can disagree between a durable write and its mirror, or
//! after a failed mirror, until the next rebuild.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::rank::ScoreGroups;
use crate::cache::{CacheResult, IndexState, RankedIndex};
use crate::domain::{
    normalize_filter, validate_rating, validate_username, CacheMember, LeaderboardEntry, Page,
    User, UserWithRank, SEARCH_LIMIT,
};
use crate::error::{LeaderboardError, Result};
use crate::repository::UserStore;

#[derive(Clone)]
pub struct LeaderboardService {
    store: Arc<dyn UserStore>,
    index: Option<Arc<dyn RankedIndex>>,
    state: Arc<IndexState>,
}

impl LeaderboardService {
    pub fn new(
        store: Arc<dyn UserStore>,
        index: Option<Arc<dyn RankedIndex>>,
        state: Arc<IndexState>,
    ) -> Self {
        Self {
            store,
            index,
            state,
        }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub fn index(&self) -> Option<&Arc<dyn RankedIndex>> {
        self.index.as_ref()
    }

    pub fn index_state(&self) -> &Arc<IndexState> {
        &self.state
    }

    /// The index, if it may answer reads right now
    fn serving_index(&self) -> Option<&Arc<dyn RankedIndex>> {
        self.index
            .as_ref()
            .filter(|index| index.is_available() && self.state.is_serving())
    }

    // ========== Reads ==========

    pub async fn get_leaderboard(
        &self,
        page: Page,
        filter: Option<&str>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let filter = normalize_filter(filter);

        if filter.is_none() {
            if let Some(index) = self.serving_index() {
                match cached_page(index.as_ref(), page).await {
                    Ok(Some(rows)) => {
                        debug!(
                            limit = page.limit,
                            offset = page.offset,
                            "Leaderboard served from cache"
                        );
                        return Ok(rows);
                    }
                    Ok(None) => {
                        debug!(
                            offset = page.offset,
                            "Cache page empty, reading durable store"
                        );
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            "Cache leaderboard read failed, falling back to PostgreSQL"
                        );
                    }
                }
            }
        }

        debug!(
            ?filter,
            limit = page.limit,
            offset = page.offset,
            "Leaderboard served from durable store"
        );
        self.store.ranked_range(page, filter).await
    }

    /// First user whose name contains `filter`, with their global rank
    pub async fn get_user_with_rank(&self, filter: &str) -> Result<UserWithRank> {
        let pattern = normalize_filter(Some(filter))
            .ok_or_else(|| LeaderboardError::validation("username is required"))?;

        let user = self.store.get_by_name(pattern).await?;
        let rank = self.rank_of(&user).await?;

        Ok(UserWithRank { user, rank })
    }

    /// Filtered leaderboard, first page only
    pub async fn search_users(&self, query: &str) -> Result<Vec<LeaderboardEntry>> {
        let page = Page::new(SEARCH_LIMIT, 0)?;
        self.get_leaderboard(page, Some(query)).await
    }

    async fn rank_of(&self, user: &User) -> Result<i64> {
        if let Some(index) = self.serving_index() {
            match index.count_above(i64::from(user.rating)).await {
                Ok(above) => return Ok(above + 1),
                Err(e) => {
                    warn!(
                        user_id = user.id,
                        error = %e,
                        "Cache rank lookup failed, falling back to PostgreSQL"
                    );
                }
            }
        }

        Ok(self.store.count_above(user.rating).await? + 1)
    }

    // ========== Writes ==========

    pub async fn create_user(&self, username: &str, rating: i32) -> Result<User> {
        let username = validate_username(username)?;
        validate_rating(rating)?;

        let user = self.store.create(username, rating).await?;
        info!(user_id = user.id, username = %user.username, rating = user.rating, "User created");

        self.mirror(&user).await;
        Ok(user)
    }

    pub async fn update_rating(&self, id: i64, rating: i32) -> Result<User> {
        validate_rating(rating)?;

        let user = self.store.update_rating(id, rating).await?;
        debug!(user_id = user.id, rating = user.rating, "Rating updated");

        self.mirror(&user).await;
        Ok(user)
    }

    /// Best-effort copy of a committed row into the index
    async fn mirror(&self, user: &User) {
        let Some(index) = &self.index else {
            return;
        };
        if !index.is_available() {
            debug!(user_id = user.id, "Index unavailable, skipping mirror");
            return;
        }

        let member = CacheMember::from(user).key();
        if let Err(e) = index.upsert(&member, i64::from(user.rating)).await {
            warn!(
                user_id = user.id,
                error = %e,
                "Failed to mirror rating into cache index (durable write kept)"
            );
        }
    }
}

/// One page from the index with ranks attached.
///
/// `Ok(None)` means the index had nothing usable for this window.
async fn cached_page(
    index: &dyn RankedIndex,
    page: Page,
) -> CacheResult<Option<Vec<LeaderboardEntry>>> {
    let raw = index.range_descending(page.offset, page.limit).await?;

    let members: Vec<(CacheMember, i32)> = raw
        .into_iter()
        .filter_map(|(key, score)| {
            let parsed = CacheMember::parse(&key).zip(i32::try_from(score).ok());
            if parsed.is_none() {
                warn!(member = %key, score, "Skipping malformed cache member");
            }
            parsed
        })
        .collect();

    if members.is_empty() {
        return Ok(None);
    }

    let groups = ScoreGroups::from_scores(members.iter().map(|(_, rating)| i64::from(*rating)));
    let counts = index.count_above_many(&groups.distinct).await?;
    let Some(ranks) = groups.ranks(&counts) else {
        warn!(
            expected = groups.distinct.len(),
            got = counts.len(),
            "Batched rank reply has the wrong length"
        );
        return Ok(None);
    };

    Ok(Some(
        members
            .into_iter()
            .zip(ranks)
            .map(|((member, rating), rank)| LeaderboardEntry {
                id: member.id,
                username: member.username,
                rating,
                rank,
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MockRankedIndex};
    use crate::repository::MemoryUserStore;

    async fn store_with(ratings: &[(&str, i32)]) -> Arc<MemoryUserStore> {
        let store = Arc::new(MemoryUserStore::new());
        for (name, rating) in ratings {
            store.create(name, *rating).await.unwrap();
        }
        store
    }

    fn warm_state() -> Arc<IndexState> {
        let state = Arc::new(IndexState::new());
        state.begin_rebuild();
        state.finish_rebuild(true);
        state
    }

    #[tokio::test]
    async fn test_cache_error_falls_back_to_store() {
        let store = store_with(&[("alice", 300), ("bob", 200)]).await;

        let mut index = MockRankedIndex::new();
        index.expect_is_available().return_const(true);
        index
            .expect_range_descending()
            .returning(|_, _| Err(CacheError::Unavailable));

        let service = LeaderboardService::new(store, Some(Arc::new(index)), warm_state());
        let rows = service.get_leaderboard(Page::default(), None).await.unwrap();

        let names: Vec<&str> = rows.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(rows[1].rank, 2);
    }

    #[tokio::test]
    async fn test_cache_page_ranks_use_one_batch() {
        let store = store_with(&[]).await;

        let mut index = MockRankedIndex::new();
        index.expect_is_available().return_const(true);
        index.expect_range_descending().returning(|_, _| {
            Ok(vec![
                ("a:1".to_string(), 500),
                ("b:2".to_string(), 500),
                ("c:3".to_string(), 300),
            ])
        });
        index
            .expect_count_above_many()
            .times(1)
            .withf(|scores| scores.to_vec() == vec![500, 300])
            .returning(|_| Ok(vec![0, 2]));

        let service = LeaderboardService::new(store, Some(Arc::new(index)), warm_state());
        let rows = service.get_leaderboard(Page::default(), None).await.unwrap();

        let ranks: Vec<i64> = rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 1, 3]);
        assert_eq!(rows[2].id, 3);
    }

    #[tokio::test]
    async fn test_filter_never_touches_cache() {
        let store = store_with(&[("alice", 300), ("bob", 200)]).await;

        // No expectations: any call on the mock panics
        let index = MockRankedIndex::new();

        let service = LeaderboardService::new(store, Some(Arc::new(index)), warm_state());
        let rows = service
            .get_leaderboard(Page::default(), Some("bo"))
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].username, "bob");
        assert_eq!(rows[0].rank, 2);
    }

    #[tokio::test]
    async fn test_mirror_failure_does_not_fail_write() {
        let store = store_with(&[]).await;

        let mut index = MockRankedIndex::new();
        index.expect_is_available().return_const(true);
        index
            .expect_upsert()
            .times(1)
            .returning(|_, _| Err(CacheError::Unavailable));

        let service = LeaderboardService::new(store.clone(), Some(Arc::new(index)), warm_state());
        let user = service.create_user(" alice ", 1000).await.unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id_skips_mirror() {
        let store = store_with(&[("alice", 10)]).await;
        let index = MockRankedIndex::new();

        let service = LeaderboardService::new(store, Some(Arc::new(index)), warm_state());
        let err = service.update_rating(42, 100).await.unwrap_err();
        assert!(matches!(err, LeaderboardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rank_lookup_error_falls_back() {
        let store = store_with(&[("alice", 300), ("bob", 200), ("carol", 300)]).await;

        let mut index = MockRankedIndex::new();
        index.expect_is_available().return_const(true);
        index
            .expect_count_above()
            .returning(|_| Err(CacheError::Unavailable));

        let service = LeaderboardService::new(store, Some(Arc::new(index)), warm_state());
        let found = service.get_user_with_rank("bob").await.unwrap();
        assert_eq!(found.user.username, "bob");
        assert_eq!(found.rank, 3);
    }

    #[tokio::test]
    async fn test_validation_runs_before_store() {
        let store = store_with(&[]).await;
        let service = LeaderboardService::new(store.clone(), None, Arc::new(IndexState::new()));

        assert!(matches!(
            service.create_user("   ", 10).await,
            Err(LeaderboardError::Validation(_))
        ));
        assert!(matches!(
            service.update_rating(1, -5).await,
            Err(LeaderboardError::Validation(_))
        ));
        assert!(matches!(
            service.get_user_with_rank(" ").await,
            Err(LeaderboardError::Validation(_))
        ));
        assert!(store.is_empty());
    }
}
