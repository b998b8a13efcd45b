use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{CacheError, CacheResult, RankedIndex};

#[derive(Default)]
struct Members {
    scores: HashMap<String, i64>,
    order: BTreeSet<(Reverse<i64>, String)>,
}

impl Members {
    fn insert(&mut self, member: &str, score: i64) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.order.remove(&(Reverse(old), member.to_string()));
        }
        self.order.insert((Reverse(score), member.to_string()));
    }
}

/// In-process ordered index with the same semantics as the sorted set.
///
/// Used when no Redis is configured and by tests, which can flip it
/// unavailable or make every call fail to exercise the fallback paths.
pub struct MemoryRankedIndex {
    members: RwLock<Members>,
    available: AtomicBool,
    failing: AtomicBool,
}

impl Default for MemoryRankedIndex {
    fn default() -> Self {
        Self {
            members: RwLock::new(Members::default()),
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
        }
    }
}

impl MemoryRankedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Calls return errors while `is_available` keeps reporting true
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.scores.len()
    }

    pub async fn score_of(&self, member: &str) -> Option<i64> {
        self.members.read().await.scores.get(member).copied()
    }

    fn check(&self) -> CacheResult<()> {
        if self.failing.load(Ordering::Acquire) || !self.available.load(Ordering::Acquire) {
            return Err(CacheError::Unavailable);
        }
        Ok(())
    }
}

fn count_strictly_above(members: &Members, score: i64) -> i64 {
    members
        .order
        .range(..(Reverse(score), String::new()))
        .count() as i64
}

#[async_trait::async_trait]
impl RankedIndex for MemoryRankedIndex {
    async fn upsert(&self, member: &str, score: i64) -> CacheResult<()> {
        self.check()?;
        self.members.write().await.insert(member, score);
        Ok(())
    }

    async fn range_descending(&self, offset: i64, limit: i64) -> CacheResult<Vec<(String, i64)>> {
        self.check()?;
        let members = self.members.read().await;
        Ok(members
            .order
            .iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|(Reverse(score), member)| (member.clone(), *score))
            .collect())
    }

    async fn count_above(&self, score: i64) -> CacheResult<i64> {
        self.check()?;
        let members = self.members.read().await;
        Ok(count_strictly_above(&members, score))
    }

    async fn count_above_many(&self, scores: &[i64]) -> CacheResult<Vec<i64>> {
        self.check()?;
        let members = self.members.read().await;
        Ok(scores
            .iter()
            .map(|score| count_strictly_above(&members, *score))
            .collect())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.check()?;
        *self.members.write().await = Members::default();
        Ok(())
    }

    async fn upsert_many(&self, entries: &[(String, i64)]) -> CacheResult<()> {
        self.check()?;
        let mut members = self.members.write().await;
        for (member, score) in entries {
            members.insert(member, *score);
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_moves_member() {
        let index = MemoryRankedIndex::new();
        index.upsert("alice:1", 100).await.unwrap();
        index.upsert("bob:2", 200).await.unwrap();
        index.upsert("alice:1", 300).await.unwrap();

        let rows = index.range_descending(0, 10).await.unwrap();
        assert_eq!(
            rows,
            vec![("alice:1".to_string(), 300), ("bob:2".to_string(), 200)]
        );
        assert_eq!(index.len().await, 2);
    }

    #[tokio::test]
    async fn test_count_above_is_strict() {
        let index = MemoryRankedIndex::new();
        let entries = vec![
            ("a:1".to_string(), 500),
            ("b:2".to_string(), 500),
            ("c:3".to_string(), 300),
        ];
        index.upsert_many(&entries).await.unwrap();

        assert_eq!(index.count_above(500).await.unwrap(), 0);
        assert_eq!(index.count_above(300).await.unwrap(), 2);
        assert_eq!(index.count_above(0).await.unwrap(), 3);
        assert_eq!(
            index.count_above_many(&[500, 300, 1000]).await.unwrap(),
            vec![0, 2, 0]
        );
    }

    #[tokio::test]
    async fn test_failure_modes() {
        let index = MemoryRankedIndex::new();
        index.set_failing(true);
        assert!(index.is_available());
        assert!(matches!(
            index.count_above(1).await,
            Err(CacheError::Unavailable)
        ));

        index.set_failing(false);
        index.set_available(false);
        assert!(!index.is_available());
        assert!(index.ping().await.is_err());
    }
}
