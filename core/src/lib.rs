pub mod config;
pub mod error;
pub(crate) mod queue;
pub mod scheduler;
pub mod stats;
pub mod task;


pub use crate::config::SchedulerConfig;
pub use crate::error::{SchedulerError, SchedulerResult};
pub use crate::scheduler::{FaultObserver, Scheduler};
pub use crate::stats::SchedulerStats;
pub use crate::task::{NamedTask, Task, TaskFault, TaskId, TaskStatus};
