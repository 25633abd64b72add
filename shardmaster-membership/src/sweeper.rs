//! Periodic heartbeat sweep driver.
//!
//! Modeled as a one-shot timer re-armed at the end of each sweep (spec.md
//! section 5 and 9 are explicit that a fixed-rate timer would let sweeps
//! pile up on a slow host). Stopping is cooperative: the already-scheduled
//! sweep still runs to completion, then observes the cleared flag and does
//! not schedule another.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct Sweeper {
    interval: Duration,
    enabled: Arc<AtomicBool>,
}

impl Sweeper {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            enabled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle callers can use to `stop()` the sweep from elsewhere.
    pub fn handle(&self) -> SweeperHandle {
        SweeperHandle {
            enabled: self.enabled.clone(),
        }
    }

    /// Spawns the sweep loop, invoking `tick` once per interval.
    pub fn spawn<F>(self, mut tick: F) -> JoinHandle<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.enabled.store(true, Ordering::SeqCst);
        let enabled = self.enabled.clone();
        let interval = self.interval;

        info!(interval_secs = interval.as_secs(), "heartbeat check starting");
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                tick();
                if !enabled.load(Ordering::SeqCst) {
                    debug!("heartbeat check stopped, not re-arming");
                    break;
                }
            }
        })
    }
}

#[derive(Clone)]
pub struct SweeperHandle {
    enabled: Arc<AtomicBool>,
}

impl SweeperHandle {
    pub fn stop(&self) {
        info!("heartbeat check stopping");
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}
