//! Ranked cache index
//!
//! A derived, disposable copy of `(member, rating)` pairs ordered by rating.
//! The durable store stays authoritative; everything here can be rebuilt from it.

mod memory;
pub mod rank;
mod redis_index;

pub use memory::MemoryRankedIndex;
pub use redis_index::RedisRankedIndex;

use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache index unavailable")]
    Unavailable,
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Ordered `(member, score)` index.
///
/// Members are `CacheMember` keys (`"<username>:<id>"`). Scores are ratings.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RankedIndex: Send + Sync {
    /// Insert or move a member
    async fn upsert(&self, member: &str, score: i64) -> CacheResult<()>;

    /// Members by score descending, starting at `offset`
    async fn range_descending(&self, offset: i64, limit: i64) -> CacheResult<Vec<(String, i64)>>;

    /// Number of members with a score strictly greater than `score`
    async fn count_above(&self, score: i64) -> CacheResult<i64>;

    /// `count_above` for every score, answered in one round trip
    async fn count_above_many(&self, scores: &[i64]) -> CacheResult<Vec<i64>>;

    /// Drop every member
    async fn clear(&self) -> CacheResult<()>;

    async fn upsert_many(&self, entries: &[(String, i64)]) -> CacheResult<()>;

    /// Last known transport reachability. Does not perform I/O.
    fn is_available(&self) -> bool;

    /// Probe the transport and refresh `is_available`
    async fn ping(&self) -> CacheResult<()>;
}

/// Lifecycle of the index contents, shared by the rebuild job and the read path.
///
/// Cold until the first successful rebuild. While a rebuild runs the index may
/// be empty or partial, so reads must not trust it.
#[derive(Debug, Default)]
pub struct IndexState {
    warm: AtomicBool,
    rebuilding: AtomicBool,
}

impl IndexState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_warm(&self) -> bool {
        self.warm.load(Ordering::Acquire)
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    /// Contents can answer reads
    pub fn is_serving(&self) -> bool {
        self.is_warm() && !self.is_rebuilding()
    }

    pub fn begin_rebuild(&self) {
        self.rebuilding.store(true, Ordering::Release);
    }

    /// Ends a rebuild. A failed rebuild leaves the index cold.
    pub fn finish_rebuild(&self, success: bool) {
        self.warm.store(success, Ordering::Release);
        self.rebuilding.store(false, Ordering::Release);
    }

    /// Contents are no longer trusted (e.g. the transport dropped and came back)
    pub fn mark_cold(&self) {
        self.warm.store(false, Ordering::Release);
    }
}
