use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("pending queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("failed to start task thread: {0}")]
    Spawn(String),
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
