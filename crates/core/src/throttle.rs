//! Pacing of remote EMR calls.
//!
//! The EMR enforces a request rate limit. Every remote call site (enrichment lookups and
//! deactivations) goes through a single [`Throttle`] so the delay policy is configured in one place
//! and tests can inject [`NoopThrottle`].

use std::cell::Cell;
use std::time::{Duration, Instant};

pub trait Throttle {
    /// Block until the next remote call may be issued.
    fn pace(&self);

    /// Called once a cluster has been fully handled. `clusters_done` counts from 1.
    fn cluster_finished(&self, clusters_done: usize);
}

/// Enforces a minimum interval between remote calls, plus a longer pause every `batch_size`
/// clusters.
///
/// Not `Sync`: the engine is a single-threaded batch job.
#[derive(Debug)]
pub struct FixedIntervalThrottle {
    call_delay: Duration,
    batch_pause: Duration,
    batch_size: usize,
    last_call: Cell<Option<Instant>>,
}

impl FixedIntervalThrottle {
    pub fn new(call_delay: Duration, batch_pause: Duration, batch_size: usize) -> Self {
        Self {
            call_delay,
            batch_pause,
            batch_size,
            last_call: Cell::new(None),
        }
    }
}

impl Throttle for FixedIntervalThrottle {
    fn pace(&self) {
        if let Some(last) = self.last_call.get() {
            let elapsed = last.elapsed();
            if elapsed < self.call_delay {
                std::thread::sleep(self.call_delay - elapsed);
            }
        }
        self.last_call.set(Some(Instant::now()));
    }

    fn cluster_finished(&self, clusters_done: usize) {
        if self.batch_size == 0 || self.batch_pause.is_zero() {
            return;
        }
        if clusters_done % self.batch_size == 0 {
            tracing::info!(
                "Processed {} clusters, pausing {:?} for the EMR rate limit",
                clusters_done,
                self.batch_pause
            );
            std::thread::sleep(self.batch_pause);
        }
    }
}

/// Never waits.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopThrottle;

impl Throttle for NoopThrottle {
    fn pace(&self) {}

    fn cluster_finished(&self, _clusters_done: usize) {}
}
