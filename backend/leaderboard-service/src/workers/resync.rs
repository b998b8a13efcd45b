use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::PeriodicTask;
use crate::services::IndexSync;

/// Periodic full rebuild, bounding drift from failed mirrors
pub struct PeriodicResync {
    sync: IndexSync,
    interval: Duration,
}

impl PeriodicResync {
    pub fn new(sync: IndexSync, interval: Duration) -> Self {
        Self { sync, interval }
    }
}

#[async_trait]
impl PeriodicTask for PeriodicResync {
    fn name(&self) -> &str {
        "index-resync"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn tick(&self) -> Result<()> {
        self.sync.rebuild().await?;
        Ok(())
    }
}
