use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

use uuid::Uuid;

use crate::error::{SchedulerError, SchedulerResult};
use crate::task::{Task, TaskId};

pub struct QueueItem {
    pub id: TaskId,
    pub task: Box<dyn Task>,
    pub enqueued_at: Instant,
}

impl QueueItem {
    pub fn new(task: Box<dyn Task>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            enqueued_at: Instant::now(),
        }
    }
}

/// Bounded FIFO of tasks awaiting admission. Safe for any number of
/// concurrent producers; `push` parks the caller while the queue is full.
pub struct TaskQueue {
    items: Mutex<VecDeque<QueueItem>>,
    not_full: Condvar,
    capacity: usize,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub fn push(&self, item: QueueItem) -> SchedulerResult<()> {
        let mut items = self.lock()?;
        while items.len() >= self.capacity {
            items = self
                .not_full
                .wait(items)
                .map_err(|_| SchedulerError::LockPoisoned("queue lock poisoned".to_string()))?;
        }
        items.push_back(item);
        Ok(())
    }

    pub fn try_push(&self, item: QueueItem) -> SchedulerResult<()> {
        let mut items = self.lock()?;
        if items.len() >= self.capacity {
            return Err(SchedulerError::QueueFull {
                capacity: self.capacity,
            });
        }
        items.push_back(item);
        Ok(())
    }

    /// Takes the oldest item without waiting.
    pub fn pop(&self) -> SchedulerResult<Option<QueueItem>> {
        let item = self.lock()?.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        Ok(item)
    }

    pub fn len(&self) -> SchedulerResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> SchedulerResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> SchedulerResult<MutexGuard<'_, VecDeque<QueueItem>>> {
        self.items
            .lock()
            .map_err(|_| SchedulerError::LockPoisoned("queue lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn item() -> QueueItem {
        QueueItem::new(Box::new(|| {}))
    }

    #[test]
    fn pops_in_insertion_order() {
        let queue = TaskQueue::new(8);
        let ids: Vec<TaskId> = (0..5)
            .map(|_| {
                let item = item();
                let id = item.id;
                queue.push(item).unwrap();
                id
            })
            .collect();

        let mut popped = Vec::new();
        while let Some(item) = queue.pop().unwrap() {
            popped.push(item.id);
        }
        assert_eq!(popped, ids);
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn try_push_rejects_when_full() {
        let queue = TaskQueue::new(2);
        queue.try_push(item()).unwrap();
        queue.try_push(item()).unwrap();
        let err = queue.try_push(item()).unwrap_err();
        assert!(matches!(err, SchedulerError::QueueFull { capacity: 2 }));
        assert_eq!(queue.len().unwrap(), 2);

        queue.pop().unwrap();
        assert!(queue.try_push(item()).is_ok());
    }

    #[test]
    fn push_blocks_until_pop_frees_space() {
        let queue = Arc::new(TaskQueue::new(1));
        queue.push(item()).unwrap();

        let (tx, rx) = mpsc::channel();
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.push(item()).unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(queue.pop().unwrap().is_some());
        rx.recv_timeout(Duration::from_secs(5))
            .expect("producer should proceed once space frees");
        producer.join().unwrap();
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let queue = TaskQueue::new(1);
        assert!(queue.pop().unwrap().is_none());
        assert_eq!(queue.capacity(), 1);
    }
}
