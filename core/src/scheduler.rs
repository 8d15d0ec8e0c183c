use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::queue::{QueueItem, TaskQueue};
use crate::stats::{bump, Counters, SchedulerStats};
use crate::task::{Task, TaskFault, TaskId, TaskStatus};

pub type FaultObserver = Arc<dyn Fn(&TaskFault) + Send + Sync>;

/// Runs submitted tasks on their own threads, never more than
/// `max_concurrent_tasks` at once. Tasks beyond the limit wait in a bounded
/// FIFO queue and are admitted as running tasks finish.
///
/// `Scheduler` is a handle: clones share the same limit, queue and counters.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

struct Shared {
    config: SchedulerConfig,
    /// Dispatch gate. Guards the running count and every admission decision.
    gate: Mutex<usize>,
    idle: Condvar,
    queue: TaskQueue,
    counters: Counters,
    observer: RwLock<Option<FaultObserver>>,
}

impl Scheduler {
    pub fn new(max_concurrent_tasks: usize) -> SchedulerResult<Self> {
        Self::with_config(SchedulerConfig::new(max_concurrent_tasks))
    }

    pub fn with_config(config: SchedulerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        info!(
            "Scheduler created: max_concurrent_tasks={}, queue_capacity={}",
            config.max_concurrent_tasks, config.queue_capacity
        );
        let queue = TaskQueue::new(config.queue_capacity);
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                gate: Mutex::new(0),
                idle: Condvar::new(),
                queue,
                counters: Counters::default(),
                observer: RwLock::new(None),
            }),
        })
    }

    /// Installs a callback that receives every task fault. It runs on the
    /// faulting task's thread before that task's slot is released.
    pub fn with_fault_observer<F>(self, observer: F) -> Self
    where
        F: Fn(&TaskFault) + Send + Sync + 'static,
    {
        let observer: FaultObserver = Arc::new(observer);
        let mut slot = self
            .shared
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(observer);
        drop(slot);
        self
    }

    /// Queues `task` and attempts to dispatch it. Blocks while the pending
    /// queue is full.
    pub fn submit<T: Task>(&self, task: T) -> SchedulerResult<TaskId> {
        let item = QueueItem::new(Box::new(task));
        let id = item.id;
        self.shared.queue.push(item)?;
        bump(&self.shared.counters.submitted);
        debug!("Task {} {}", id, TaskStatus::Queued);
        self.shared.dispatch()?;
        Ok(id)
    }

    /// Like [`submit`](Self::submit), but returns
    /// [`SchedulerError::QueueFull`] instead of waiting for space.
    pub fn try_submit<T: Task>(&self, task: T) -> SchedulerResult<TaskId> {
        let item = QueueItem::new(Box::new(task));
        let id = item.id;
        if let Err(err) = self.shared.queue.try_push(item) {
            if matches!(err, SchedulerError::QueueFull { .. }) {
                bump(&self.shared.counters.rejected);
                debug!("Task {} rejected: {}", id, err);
            }
            return Err(err);
        }
        bump(&self.shared.counters.submitted);
        debug!("Task {} {}", id, TaskStatus::Queued);
        self.shared.dispatch()?;
        Ok(id)
    }

    /// Blocks until nothing is running and nothing is pending.
    pub fn wait_idle(&self) -> SchedulerResult<()> {
        let mut running = self.shared.lock_gate()?;
        while !self.shared.is_idle_locked(*running)? {
            running = self
                .shared
                .idle
                .wait(running)
                .map_err(|_| SchedulerError::LockPoisoned("gate lock poisoned".to_string()))?;
        }
        Ok(())
    }

    /// Like [`wait_idle`](Self::wait_idle) but gives up after `timeout`.
    /// Returns whether the scheduler was observed idle. A timeout too large
    /// to express as a deadline waits without one.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> SchedulerResult<bool> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait_idle()?;
            return Ok(true);
        };
        let mut running = self.shared.lock_gate()?;
        loop {
            if self.shared.is_idle_locked(*running)? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let (guard, _) = self
                .shared
                .idle
                .wait_timeout(running, deadline - now)
                .map_err(|_| SchedulerError::LockPoisoned("gate lock poisoned".to_string()))?;
            running = guard;
        }
    }

    pub fn is_idle(&self) -> SchedulerResult<bool> {
        let running = self.shared.lock_gate()?;
        self.shared.is_idle_locked(*running)
    }

    pub fn running_count(&self) -> SchedulerResult<usize> {
        Ok(*self.shared.lock_gate()?)
    }

    pub fn pending_count(&self) -> SchedulerResult<usize> {
        self.shared.queue.len()
    }

    pub fn concurrency_limit(&self) -> usize {
        self.shared.config.max_concurrent_tasks
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    pub fn stats(&self) -> SchedulerResult<SchedulerStats> {
        let running = self.running_count()?;
        let pending = self.pending_count()?;
        Ok(self.shared.counters.snapshot(running, pending))
    }
}

impl Shared {
    fn lock_gate(&self) -> SchedulerResult<MutexGuard<'_, usize>> {
        self.gate
            .lock()
            .map_err(|_| SchedulerError::LockPoisoned("gate lock poisoned".to_string()))
    }

    fn can_start(&self, running: usize) -> bool {
        running < self.config.max_concurrent_tasks
    }

    fn is_idle_locked(&self, running: usize) -> SchedulerResult<bool> {
        Ok(running == 0 && self.queue.is_empty()?)
    }

    /// One dispatch attempt: starts at most one pending task. A task whose
    /// thread fails to start does not count, so the next one is tried and
    /// the first failure is returned.
    fn dispatch(self: &Arc<Self>) -> SchedulerResult<()> {
        let mut failure = None;
        loop {
            let admitted = {
                let mut running = self.lock_gate()?;
                self.admit_locked(&mut running)?
            };
            let Some(item) = admitted else {
                break;
            };
            match self.launch(item) {
                Ok(()) => break,
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Must be called with the gate held.
    fn admit_locked(&self, running: &mut usize) -> SchedulerResult<Option<QueueItem>> {
        if !self.can_start(*running) {
            return Ok(None);
        }
        match self.queue.pop()? {
            Some(item) => {
                *running += 1;
                Ok(Some(item))
            }
            None => {
                if *running == 0 {
                    self.idle.notify_all();
                }
                Ok(None)
            }
        }
    }

    /// Hands an admitted task to a new thread. If the thread cannot be
    /// created the task is dropped and its slot released.
    fn launch(self: &Arc<Self>, item: QueueItem) -> SchedulerResult<()> {
        let id = item.id;
        let shared = Arc::clone(self);
        let mut builder = thread::Builder::new().name(format!("tasksched-{}", id));
        if let Some(stack_size) = self.config.thread_stack_size {
            builder = builder.stack_size(stack_size);
        }
        let spawned = builder.spawn(move || {
            shared.execute(item);
            shared.finish();
        });
        match spawned {
            Ok(_) => {
                bump(&self.counters.started);
                Ok(())
            }
            Err(err) => {
                error!("Failed to start thread for task {}, task dropped: {}", id, err);
                bump(&self.counters.spawn_failed);
                self.release_slot();
                Err(SchedulerError::Spawn(format!("task {}: {}", id, err)))
            }
        }
    }

    /// Gives back a slot taken by a task that never started.
    fn release_slot(&self) {
        let mut running = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        *running = running.saturating_sub(1);
        if *running == 0 && self.queue.is_empty().unwrap_or(false) {
            self.idle.notify_all();
        }
    }

    fn execute(&self, item: QueueItem) {
        let QueueItem {
            id,
            task,
            enqueued_at,
        } = item;
        let name = task.name().map(str::to_string);
        debug!(
            "Task {} {} after waiting {:?}",
            id,
            TaskStatus::Running,
            enqueued_at.elapsed()
        );

        let started = Instant::now();
        match panic::catch_unwind(AssertUnwindSafe(move || task.run())) {
            Ok(()) => {
                debug!("Task {} {} in {:?}", id, TaskStatus::Completed, started.elapsed());
            }
            Err(payload) => {
                let fault = TaskFault::from_panic(id, name, payload.as_ref());
                bump(&self.counters.faulted);
                warn!("{}", fault);
                self.report(&fault);
            }
        }
        bump(&self.counters.completed);
    }

    fn report(&self, fault: &TaskFault) {
        let observer = self
            .observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(observer) = observer else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| (*observer)(fault))).is_err() {
            warn!("Fault observer panicked while handling task {}", fault.task_id);
        }
    }

    /// Releases the finished task's slot and admits the next pending task.
    /// Recovers a poisoned gate so the release is never skipped.
    fn finish(self: &Arc<Self>) {
        let next = {
            let mut running = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            *running = running.saturating_sub(1);
            match self.admit_locked(&mut running) {
                Ok(next) => next,
                Err(err) => {
                    error!("Dispatch after completion failed: {}", err);
                    None
                }
            }
        };
        if let Some(item) = next {
            if self.launch(item).is_err() {
                let _ = self.dispatch();
            }
        }
    }
}
