//! Random rating-update stressor.
//!
//! Each tick picks random user ids and ratings and pushes them through the
//! normal write path, so the cache mirror and fallback logic see real traffic.

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::LeaderboardService;
use crate::config::SimulationConfig;
use crate::workers::{BackgroundDriver, PeriodicTask};

struct SimulationTick {
    service: LeaderboardService,
    config: SimulationConfig,
}

impl SimulationTick {
    fn draw(&self) -> Vec<(i64, i32)> {
        let mut rng = rand::thread_rng();
        (0..self.config.updates_per_tick)
            .map(|_| {
                let id = rng.gen_range(1..=self.config.user_count);
                let rating = rng.gen_range(self.config.min_rating..=self.config.max_rating);
                (id, rating)
            })
            .collect()
    }
}

#[async_trait]
impl PeriodicTask for SimulationTick {
    fn name(&self) -> &str {
        "simulation"
    }

    fn interval(&self) -> Duration {
        self.config.interval
    }

    async fn tick(&self) -> Result<()> {
        let mut updates = JoinSet::new();
        for (id, rating) in self.draw() {
            let service = self.service.clone();
            updates.spawn(async move { (id, service.update_rating(id, rating).await) });
        }

        while let Some(joined) = updates.join_next().await {
            match joined {
                Ok((id, Ok(user))) => {
                    debug!(user_id = id, rating = user.rating, "Simulated rating update");
                }
                Ok((id, Err(e))) => {
                    warn!(user_id = id, error = %e, "Simulated rating update failed");
                }
                Err(e) => {
                    warn!(error = %e, "Simulated update task aborted");
                }
            }
        }

        Ok(())
    }
}

/// Start/stop handle for the simulation loop
pub struct SimulationService {
    driver: BackgroundDriver,
}

impl SimulationService {
    pub fn new(service: LeaderboardService, config: SimulationConfig) -> Self {
        let task = Arc::new(SimulationTick { service, config });
        Self {
            driver: BackgroundDriver::new(task),
        }
    }

    pub async fn start(&self) -> bool {
        self.driver.start().await
    }

    pub async fn stop(&self) -> bool {
        self.driver.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    pub fn status(&self) -> &'static str {
        if self.is_running() {
            "running"
        } else {
            "stopped"
        }
    }
}
