//! Periodic power-state reconciliation
//!
//! Every interval the poller probes the Player and pushes the result to the
//! host, changed or not. A Player switched by its physical remote is picked
//! up at the next tick at the latest.

use anyhow::Result;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::impl_startable;
use crate::player::PlayerController;

/// Default poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10_000);

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct PowerPoller {
    controller: PlayerController,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl PowerPoller {
    pub fn new(controller: PlayerController, interval: Duration) -> Self {
        Self {
            controller,
            interval,
            running: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    async fn start_internal(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("Power poller already running");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = self.controller.clone();
        let period = self.interval;

        let task = tokio::spawn(async move {
            // First tick after one full period
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Power poller shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        controller.poll_tick().await;
                    }
                }
            }
        });

        info!(
            host = %self.controller.endpoint().hostname,
            "Power poller started ({}ms interval)",
            period.as_millis()
        );
        *running = Some(Running { cancel, task });
        Ok(())
    }

    async fn stop_internal(&self) {
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.task.await {
                debug!("Power poller task ended abnormally: {}", e);
            }
            info!("Power poller stopped");
        }
    }
}

impl_startable!(PowerPoller, "poller");
