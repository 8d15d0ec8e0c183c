use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time view of a scheduler's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Tasks accepted into the pending queue.
    pub submitted: u64,
    /// Tasks admitted and handed to a thread.
    pub started: u64,
    /// Tasks that finished, whether or not they faulted.
    pub completed: u64,
    /// Tasks whose body panicked.
    pub faulted: u64,
    /// `try_submit` calls turned away by a full queue.
    pub rejected: u64,
    /// Admitted tasks dropped because their thread could not be created.
    pub spawn_failed: u64,
    pub running: usize,
    pub pending: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub submitted: AtomicU64,
    pub started: AtomicU64,
    pub completed: AtomicU64,
    pub faulted: AtomicU64,
    pub rejected: AtomicU64,
    pub spawn_failed: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self, running: usize, pending: usize) -> SchedulerStats {
        SchedulerStats {
            submitted: self.submitted.load(Ordering::SeqCst),
            started: self.started.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            faulted: self.faulted.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            spawn_failed: self.spawn_failed.load(Ordering::SeqCst),
            running,
            pending,
        }
    }
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::SeqCst);
}
