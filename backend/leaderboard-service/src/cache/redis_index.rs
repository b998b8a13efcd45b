use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{CacheError, CacheResult, RankedIndex};

/// Members per ZADD when loading the whole index
const UPSERT_CHUNK: usize = 1000;

/// Sorted-set backed index.
///
/// Key layout: one ZSET at `key`, member `"<username>:<id>"`, score = rating.
/// The `ConnectionManager` is established on first use and reconnects on its
/// own afterwards. `available` starts false and only a successful PING sets it,
/// so the read path skips the index until the health probe has seen Redis.
#[derive(Clone)]
pub struct RedisRankedIndex {
    client: Client,
    conn: Arc<OnceCell<ConnectionManager>>,
    key: String,
    available: Arc<AtomicBool>,
}

impl RedisRankedIndex {
    /// Parse the URL without touching the network
    pub fn open(url: &str, key: impl Into<String>) -> CacheResult<Self> {
        Ok(Self {
            client: Client::open(url)?,
            conn: Arc::new(OnceCell::new()),
            key: key.into(),
            available: Arc::new(AtomicBool::new(false)),
        })
    }

    /// `open` followed by a PING; fails when Redis is unreachable
    pub async fn connect(url: &str, key: impl Into<String>) -> CacheResult<Self> {
        let index = Self::open(url, key)?;
        index.ping().await?;
        Ok(index)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        let result = self
            .conn
            .get_or_try_init(|| async {
                let conn = ConnectionManager::new(self.client.clone()).await?;
                info!(key = %self.key, "Redis connection established");
                Ok::<_, RedisError>(conn)
            })
            .await
            .cloned();
        self.observe(result)
    }

    /// Record transport failures; command errors (WRONGTYPE etc.) leave the flag alone
    fn observe<T>(&self, result: Result<T, RedisError>) -> CacheResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                let transport = e.is_io_error() || e.is_connection_dropped() || e.is_timeout();
                if transport && self.available.swap(false, Ordering::AcqRel) {
                    warn!(
                        error = %e,
                        key = %self.key,
                        "Redis transport failure, marking index unavailable"
                    );
                }
                Err(CacheError::Redis(e))
            }
        }
    }
}

fn exclusive_min(score: i64) -> String {
    format!("({}", score)
}

#[async_trait::async_trait]
impl RankedIndex for RedisRankedIndex {
    async fn upsert(&self, member: &str, score: i64) -> CacheResult<()> {
        let result = self
            .connection()
            .await?
            .zadd::<_, _, _, ()>(&self.key, member, score)
            .await;
        self.observe(result)
    }

    async fn range_descending(&self, offset: i64, limit: i64) -> CacheResult<Vec<(String, i64)>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let start = offset as isize;
        let stop = (offset + limit - 1) as isize;

        let result = self
            .connection()
            .await?
            .zrevrange_withscores::<_, Vec<(String, f64)>>(&self.key, start, stop)
            .await;
        let rows = self.observe(result)?;

        Ok(rows
            .into_iter()
            .map(|(member, score)| (member, score as i64))
            .collect())
    }

    async fn count_above(&self, score: i64) -> CacheResult<i64> {
        let result = self
            .connection()
            .await?
            .zcount::<_, _, _, i64>(&self.key, exclusive_min(score), "+inf")
            .await;
        self.observe(result)
    }

    async fn count_above_many(&self, scores: &[i64]) -> CacheResult<Vec<i64>> {
        if scores.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for score in scores {
            pipe.zcount(&self.key, exclusive_min(*score), "+inf");
        }

        let mut conn = self.connection().await?;
        let result = pipe.query_async::<_, Vec<i64>>(&mut conn).await;
        let counts = self.observe(result)?;
        debug!(distinct_scores = scores.len(), "Pipelined ZCOUNT batch");
        Ok(counts)
    }

    async fn clear(&self) -> CacheResult<()> {
        let result = self.connection().await?.del::<_, ()>(&self.key).await;
        self.observe(result)
    }

    async fn upsert_many(&self, entries: &[(String, i64)]) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for chunk in entries.chunks(UPSERT_CHUNK) {
            let items: Vec<(i64, &str)> = chunk
                .iter()
                .map(|(member, score)| (*score, member.as_str()))
                .collect();
            pipe.zadd_multiple(&self.key, &items).ignore();
        }

        let mut conn = self.connection().await?;
        let result = pipe.query_async::<_, ()>(&mut conn).await;
        self.observe(result)
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let result = redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await;
        self.observe(result)?;
        self.available.store(true, Ordering::Release);
        Ok(())
    }
}
