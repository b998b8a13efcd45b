use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cache::{IndexState, RankedIndex};
use crate::domain::CacheMember;
use crate::error::Result;
use crate::repository::UserStore;

/// Rebuilds the ranked index from the durable store.
///
/// Readers route around the index while `IndexState` reports a rebuild in
/// flight, so an empty or half-loaded index is never served.
#[derive(Clone)]
pub struct IndexSync {
    store: Arc<dyn UserStore>,
    index: Arc<dyn RankedIndex>,
    state: Arc<IndexState>,
    guard: Arc<Mutex<()>>,
}

impl IndexSync {
    pub fn new(
        store: Arc<dyn UserStore>,
        index: Arc<dyn RankedIndex>,
        state: Arc<IndexState>,
    ) -> Self {
        Self {
            store,
            index,
            state,
            guard: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the index contents with every user. Returns the member count.
    ///
    /// Concurrent calls run one after another. On failure the index is left cold.
    pub async fn rebuild(&self) -> Result<usize> {
        let _running = self.guard.lock().await;
        let started = Instant::now();

        self.state.begin_rebuild();
        info!("Rebuilding leaderboard cache index from PostgreSQL");

        match self.load().await {
            Ok(count) => {
                self.state.finish_rebuild(true);
                info!(
                    members = count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Leaderboard cache index rebuilt"
                );
                Ok(count)
            }
            Err(e) => {
                self.state.finish_rebuild(false);
                error!(error = %e, "Leaderboard cache index rebuild failed");
                Err(e)
            }
        }
    }

    async fn load(&self) -> Result<usize> {
        let users = self.store.all_users().await?;
        let entries: Vec<(String, i64)> = users
            .iter()
            .map(|user| (CacheMember::from(user).key(), i64::from(user.rating)))
            .collect();

        self.index.clear().await?;
        self.index.upsert_many(&entries).await?;
        Ok(entries.len())
    }

    /// Start a rebuild without waiting for it
    pub fn spawn_rebuild(&self) -> JoinHandle<()> {
        let sync = self.clone();
        tokio::spawn(async move {
            // Outcome is already logged by rebuild()
            let _ = sync.rebuild().await;
        })
    }
}
