//! Process-wide admission gate for upstream calls
//!
//! Bounds how many upstream calls are in flight at once and enforces a
//! minimum spacing between call starts. One instance per process; all
//! requests pass through the same gate.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::debug;

/// Pacing state shared by every request. `next_start` is the earliest
/// instant at which the next upstream call may begin.
#[derive(Debug, Default)]
struct PacingState {
    next_start: Option<Instant>,
}

/// Concurrency + pacing limiter guarding the upstream model.
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    pacing: Mutex<PacingState>,
    min_interval: Duration,
    max_concurrent: usize,
}

/// Scoped slot handle. Holding one means the owning request may have an
/// upstream call in flight; dropping it releases the slot on every exit path.
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            pacing: Mutex::new(PacingState::default()),
            min_interval,
            max_concurrent,
        }
    }

    /// Block until both admission conditions hold: a free concurrency slot
    /// and `min_interval` elapsed since the previous call start. Waiting
    /// suspends only the calling task.
    pub async fn acquire(&self) -> Slot {
        // The gate owns the semaphore and never closes it.
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore closed");

        // Reserve a start time under the lock, then sleep outside it so a
        // waiting request never blocks other acquirers' bookkeeping.
        let start_at = {
            let mut pacing = self.pacing.lock().await;
            let now = Instant::now();
            let start_at = match pacing.next_start {
                Some(at) if at > now => at,
                _ => now,
            };
            pacing.next_start = Some(start_at + self.min_interval);
            start_at
        };

        let wait = start_at.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Pacing upstream call start");
            tokio::time::sleep_until(start_at).await;
        }

        Slot { _permit: permit }
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }
}
