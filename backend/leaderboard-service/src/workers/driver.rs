//! Start/stop control for periodic background work.
//!
//! A `BackgroundDriver` owns at most one running loop. Its state is an explicit
//! `Stopped`/`Running` machine behind a mutex, so `start` on a running driver and
//! `stop` on a stopped one are no-ops. Status is mirrored into an atomic flag
//! that callers read without taking the lock.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// One unit of repeated work
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn interval(&self) -> Duration;

    async fn tick(&self) -> Result<()>;
}

/// Run `task` every `task.interval()` until `shutdown` flips to true or its sender drops.
///
/// Failed ticks are logged and the loop carries on.
pub async fn run_periodic(task: Arc<dyn PeriodicTask>, mut shutdown: watch::Receiver<bool>) {
    let mut timer = interval(task.interval());
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0u32;

    info!(
        task = task.name(),
        interval_ms = task.interval().as_millis() as u64,
        "Starting background loop"
    );

    loop {
        tokio::select! {
            _ = timer.tick() => {
                match task.tick().await {
                    Ok(()) => {
                        if consecutive_failures > 0 {
                            info!(
                                task = task.name(),
                                recovered_after = consecutive_failures,
                                "Background task recovered after failures"
                            );
                            consecutive_failures = 0;
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(
                            task = task.name(),
                            error = %e,
                            consecutive_failures,
                            "Background tick failed, will retry on next interval"
                        );
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(task = task.name(), "Background loop stopped");
}

enum DriverState {
    Stopped,
    Running {
        shutdown: watch::Sender<bool>,
        handle: JoinHandle<()>,
    },
}

pub struct BackgroundDriver {
    task: Arc<dyn PeriodicTask>,
    state: Mutex<DriverState>,
    running: Arc<AtomicBool>,
}

impl BackgroundDriver {
    pub fn new(task: Arc<dyn PeriodicTask>) -> Self {
        Self {
            task,
            state: Mutex::new(DriverState::Stopped),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Returns false if the loop was already running
    pub async fn start(&self) -> bool {
        let mut state = self.state.lock().await;

        if let DriverState::Running { handle, .. } = &*state {
            if !handle.is_finished() {
                return false;
            }
        }

        let (tx, rx) = watch::channel(false);
        let task = Arc::clone(&self.task);
        let running = Arc::clone(&self.running);

        running.store(true, Ordering::Release);
        let handle = tokio::spawn(async move {
            run_periodic(task, rx).await;
            running.store(false, Ordering::Release);
        });

        *state = DriverState::Running {
            shutdown: tx,
            handle,
        };
        info!(task = self.task.name(), "Background driver started");
        true
    }

    /// Signal the loop and wait for it to exit. Returns false if nothing was running.
    pub async fn stop(&self) -> bool {
        let mut state = self.state.lock().await;

        let DriverState::Running { shutdown, handle } =
            std::mem::replace(&mut *state, DriverState::Stopped)
        else {
            return false;
        };

        // Receiver is gone if the loop already ended on its own
        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            error!(task = self.task.name(), error = %e, "Background task panicked");
        }
        self.running.store(false, Ordering::Release);

        info!(task = self.task.name(), "Background driver stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
