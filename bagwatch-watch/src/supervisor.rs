//! Periodic restart of loops that died while their user is still watching.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::WatchRegistry;

/// Calls [`WatchRegistry::resurrect_dead`] on a fixed period.
#[derive(Debug)]
pub struct Supervisor {
    registry: Arc<WatchRegistry>,
    period: Duration,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Creates a supervisor that stops with the registry's shutdown.
    pub fn new(registry: Arc<WatchRegistry>, period: Duration) -> Self {
        let cancel = registry.shutdown_token();
        Self {
            registry,
            period: period.max(Duration::from_millis(10)),
            cancel,
        }
    }

    /// Runs until the registry shuts down.
    pub async fn run(self) {
        info!(period_secs = self.period.as_secs_f64(), "Supervisor started");
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let restarted = self.registry.resurrect_dead().await;
                    if restarted.is_empty() {
                        debug!("No dead loops");
                    }
                }
            }
        }
        info!("Supervisor stopped");
    }

    /// Spawns [`Supervisor::run`] on the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
