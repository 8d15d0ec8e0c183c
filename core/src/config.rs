use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};

pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Sizing for a [`Scheduler`](crate::Scheduler). Both values are fixed for
/// the lifetime of the scheduler built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on tasks executing at the same time.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// Number of tasks the pending queue holds before `submit` blocks.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Stack size for task threads. `None` uses the platform default.
    #[serde(default)]
    pub thread_stack_size: Option<usize>,
}

fn default_max_concurrent_tasks() -> usize {
    DEFAULT_MAX_CONCURRENT_TASKS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            queue_capacity: default_queue_capacity(),
            thread_stack_size: None,
        }
    }
}

impl SchedulerConfig {
    pub fn new(max_concurrent_tasks: usize) -> Self {
        Self {
            max_concurrent_tasks,
            ..Self::default()
        }
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = Some(thread_stack_size);
        self
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(SchedulerError::InvalidConfiguration(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(SchedulerError::InvalidConfiguration(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_concurrent_tasks, 4);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.thread_stack_size, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_limit() {
        let err = SchedulerConfig::new(0).validate().unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = SchedulerConfig::new(2)
            .with_queue_capacity(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfiguration(_)));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{"max_concurrent_tasks": 3}"#).unwrap();
        assert_eq!(config.max_concurrent_tasks, 3);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.thread_stack_size, None);
    }
}
