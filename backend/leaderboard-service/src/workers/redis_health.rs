//! Redis connection health probe
//!
//! Pings the index transport on an interval. `ConnectionManager` reconnects
//! on its own, but the index may have missed mirrors while the link was down,
//! so on recovery the contents are marked cold and rebuilt from PostgreSQL.
//! A reachable index that was never loaded (or whose last rebuild failed) is
//! rebuilt the same way.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::PeriodicTask;
use crate::cache::{IndexState, RankedIndex};
use crate::services::IndexSync;

const MAX_CONSECUTIVE_FAILURES: u32 = 5;

pub struct RedisHealthCheck {
    index: Arc<dyn RankedIndex>,
    state: Arc<IndexState>,
    sync: IndexSync,
    interval: Duration,
    consecutive_failures: AtomicU32,
}

impl RedisHealthCheck {
    pub fn new(
        index: Arc<dyn RankedIndex>,
        state: Arc<IndexState>,
        sync: IndexSync,
        interval: Duration,
    ) -> Self {
        Self {
            index,
            state,
            sync,
            interval,
            consecutive_failures: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl PeriodicTask for RedisHealthCheck {
    fn name(&self) -> &str {
        "redis-health"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn tick(&self) -> Result<()> {
        let was_available = self.index.is_available();

        match self.index.ping().await {
            Ok(()) => {
                let previous = self.consecutive_failures.swap(0, Ordering::AcqRel);
                let cold = !self.state.is_warm() && !self.state.is_rebuilding();
                if previous > 0 || !was_available || cold {
                    info!(
                        previous_failures = previous,
                        "Redis connection recovered, rebuilding index"
                    );
                    self.state.mark_cold();
                    self.sync.rebuild().await?;
                } else {
                    debug!("Redis health check: OK");
                }
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                self.state.mark_cold();
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    error!(
                        consecutive_failures = failures,
                        error = %e,
                        "Redis health check: multiple consecutive failures"
                    );
                } else {
                    warn!(consecutive_failures = failures, error = %e, "Redis health check failed");
                }
            }
        }

        Ok(())
    }
}
