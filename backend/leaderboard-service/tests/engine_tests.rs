//! Leaderboard engine tests
//!
//! Run against the in-process store and index, so no PostgreSQL or Redis is needed.
//!
//! Test Coverage:
//! - Cache path and durable path agree on every rank
//! - Rebuild idempotence
//! - Fallback when the index is unavailable, erroring, cold or rebuilding
//! - Write path mirroring and validation
//! - Concurrent updates to distinct users

use leaderboard_service::cache::{IndexState, MemoryRankedIndex, RankedIndex};
use leaderboard_service::domain::{LeaderboardEntry, Page, MAX_LIMIT};
use leaderboard_service::repository::{MemoryUserStore, UserStore};
use leaderboard_service::services::{IndexSync, LeaderboardService};
use leaderboard_service::LeaderboardError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

struct Harness {
    store: Arc<MemoryUserStore>,
    index: Arc<MemoryRankedIndex>,
    state: Arc<IndexState>,
    sync: IndexSync,
    service: LeaderboardService,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryUserStore::new());
        let index = Arc::new(MemoryRankedIndex::new());
        let state = Arc::new(IndexState::new());
        let sync = IndexSync::new(store.clone(), index.clone(), state.clone());
        let service = LeaderboardService::new(store.clone(), Some(index.clone()), state.clone());
        Self {
            store,
            index,
            state,
            sync,
            service,
        }
    }

    async fn with_ratings(ratings: &[i32]) -> Self {
        let harness = Self::new();
        for (i, rating) in ratings.iter().enumerate() {
            harness
                .service
                .create_user(&format!("p{:04}", i + 1), *rating)
                .await
                .unwrap();
        }
        harness.sync.rebuild().await.unwrap();
        harness
    }

    /// Durable-only twin over the same store
    fn durable_only(&self) -> LeaderboardService {
        LeaderboardService::new(self.store.clone(), None, Arc::new(IndexState::new()))
    }
}

async fn all_pages(service: &LeaderboardService) -> Vec<LeaderboardEntry> {
    let mut rows = Vec::new();
    let mut offset = 0;
    loop {
        let page = service
            .get_leaderboard(Page::new(MAX_LIMIT, offset).unwrap(), None)
            .await
            .unwrap();
        if page.is_empty() {
            return rows;
        }
        offset += page.len() as i64;
        rows.extend(page);
    }
}

fn ranks_by_id(rows: &[LeaderboardEntry]) -> HashMap<i64, (i32, i64)> {
    rows.iter().map(|r| (r.id, (r.rating, r.rank))).collect()
}

#[tokio::test]
async fn test_cache_and_durable_ranks_agree() {
    let mut rng = StdRng::seed_from_u64(7);
    // Narrow range forces plenty of ties
    let ratings: Vec<i32> = (0..250).map(|_| rng.gen_range(0..40)).collect();
    let harness = Harness::with_ratings(&ratings).await;

    let cached = all_pages(&harness.service).await;
    let durable = all_pages(&harness.durable_only()).await;

    assert_eq!(cached.len(), ratings.len());
    assert_eq!(ranks_by_id(&cached), ranks_by_id(&durable));

    for id in [1usize, 17, 99, 250] {
        let name = format!("p{:04}", id);
        let via_cache = harness.service.get_user_with_rank(&name).await.unwrap();
        let via_store = harness.durable_only().get_user_with_rank(&name).await.unwrap();
        assert_eq!(via_cache.rank, via_store.rank, "rank mismatch for {}", name);
    }
}

#[tokio::test]
async fn test_rank_is_one_plus_strictly_greater() {
    let harness = Harness::with_ratings(&[500, 500, 300]).await;

    let rows = harness
        .service
        .get_leaderboard(Page::default(), None)
        .await
        .unwrap();
    let mut ranks: Vec<i64> = rows.iter().map(|r| r.rank).collect();
    ranks.sort();
    assert_eq!(ranks, vec![1, 1, 3]);

    let third = harness.service.get_user_with_rank("p0003").await.unwrap();
    assert_eq!(third.rank, 3);
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let harness = Harness::with_ratings(&[10, 20, 20, 5]).await;
    let first = harness.index.range_descending(0, 100).await.unwrap();

    let rebuilt = assert_ok!(harness.sync.rebuild().await);
    assert_eq!(rebuilt, 4);
    let second = harness.index.range_descending(0, 100).await.unwrap();

    assert_eq!(first, second);
    assert!(harness.state.is_serving());
}

#[tokio::test]
async fn test_created_user_appears_in_leaderboard() {
    let harness = Harness::with_ratings(&[1500, 800]).await;

    let alice = harness.service.create_user("alice", 1000).await.unwrap();
    let rows = harness
        .service
        .get_leaderboard(Page::default(), None)
        .await
        .unwrap();

    let row = rows.iter().find(|r| r.id == alice.id).expect("alice listed");
    assert_eq!(row.username, "alice");
    assert_eq!(row.rating, 1000);
    assert_eq!(row.rank, 2);
}

#[tokio::test]
async fn test_page_limits() {
    assert!(matches!(Page::new(0, 0), Err(LeaderboardError::Validation(_))));
    assert!(matches!(Page::new(10, -1), Err(LeaderboardError::Validation(_))));

    let ratings: Vec<i32> = (0..150).collect();
    let harness = Harness::with_ratings(&ratings).await;

    let page = Page::new(1000, 0).unwrap();
    assert_eq!(page.limit, MAX_LIMIT);
    let rows = harness.service.get_leaderboard(page, None).await.unwrap();
    assert_eq!(rows.len(), 100);
    assert_eq!(rows[0].rating, 149);
}

#[tokio::test]
async fn test_fallback_when_unavailable_or_erroring() {
    let harness = Harness::with_ratings(&[300, 200, 100]).await;
    let expected = ranks_by_id(&all_pages(&harness.durable_only()).await);

    harness.index.set_available(false);
    assert_eq!(ranks_by_id(&all_pages(&harness.service).await), expected);

    harness.index.set_available(true);
    harness.index.set_failing(true);
    assert_eq!(ranks_by_id(&all_pages(&harness.service).await), expected);
    let found = harness.service.get_user_with_rank("p0002").await.unwrap();
    assert_eq!(found.rank, 2);
}

#[tokio::test]
async fn test_fallback_when_cold() {
    let harness = Harness::new();
    for (name, rating) in [("a", 30), ("b", 20)] {
        harness.store.create(name, rating).await.unwrap();
    }

    // Never rebuilt: the index is empty and must not be trusted
    assert!(!harness.state.is_warm());
    let rows = all_pages(&harness.service).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].username, "a");
}

#[tokio::test]
async fn test_fallback_while_rebuilding() {
    let harness = Harness::with_ratings(&[30, 20, 10]).await;

    // Simulate the window between clear() and upsert_many()
    harness.state.begin_rebuild();
    harness.index.clear().await.unwrap();

    let rows = all_pages(&harness.service).await;
    assert_eq!(rows.len(), 3);
    let ranks: Vec<i64> = rows.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);

    harness.state.finish_rebuild(true);
}

#[tokio::test]
async fn test_update_mirrors_into_index() {
    let harness = Harness::with_ratings(&[10, 20]).await;

    let updated = harness.service.update_rating(1, 99).await.unwrap();
    assert_eq!(updated.rating, 99);
    assert_eq!(harness.index.score_of("p0001:1").await, Some(99));

    let top = harness
        .service
        .get_leaderboard(Page::new(1, 0).unwrap(), None)
        .await
        .unwrap();
    assert_eq!(top[0].id, 1);
    assert_eq!(top[0].rank, 1);
}

#[tokio::test]
async fn test_mirror_failure_keeps_durable_write() {
    let harness = Harness::with_ratings(&[10]).await;
    harness.index.set_failing(true);

    let updated = harness.service.update_rating(1, 42).await.unwrap();
    assert_eq!(updated.rating, 42);

    let stored = harness.store.get_by_name("p0001").await.unwrap();
    assert_eq!(stored.rating, 42);
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let harness = Harness::with_ratings(&[10]).await;
    let err = assert_err!(harness.service.update_rating(404, 10).await);
    assert!(matches!(err, LeaderboardError::NotFound(_)));
}

#[tokio::test]
async fn test_filtered_reads_keep_global_rank() {
    let harness = Harness::new();
    for (name, rating) in [("alpha", 900), ("bravo", 800), ("alps", 700)] {
        harness.service.create_user(name, rating).await.unwrap();
    }
    harness.sync.rebuild().await.unwrap();

    let rows = harness.service.search_users("al").await.unwrap();
    let got: Vec<(&str, i64)> = rows.iter().map(|r| (r.username.as_str(), r.rank)).collect();
    assert_eq!(got, vec![("alpha", 1), ("alps", 3)]);
}

#[tokio::test]
async fn test_concurrent_updates_to_distinct_ids() {
    let ratings = vec![0; 64];
    let harness = Harness::with_ratings(&ratings).await;

    let mut tasks = tokio::task::JoinSet::new();
    for id in 1..=64i64 {
        let service = harness.service.clone();
        tasks.spawn(async move { service.update_rating(id, id as i32 * 10).await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    for user in harness.store.all_users().await.unwrap() {
        assert_eq!(user.rating, user.id as i32 * 10);
        let member = format!("{}:{}", user.username, user.id);
        assert_eq!(harness.index.score_of(&member).await, Some(user.id * 10));
    }
}
