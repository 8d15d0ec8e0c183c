use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use uuid::Uuid;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-shot unit of work.
///
/// `run` consumes the task, so a task can be admitted and executed at most
/// once. Any `FnOnce() + Send + 'static` closure is a task.
pub trait Task: Send + 'static {
    fn run(self: Box<Self>);

    /// Label used in logs and fault reports.
    fn name(&self) -> Option<&str> {
        None
    }
}

impl<F> Task for F
where
    F: FnOnce() + Send + 'static,
{
    fn run(self: Box<Self>) {
        (*self)()
    }
}

/// A closure with a label attached.
pub struct NamedTask<F> {
    name: String,
    body: F,
}

impl<F> NamedTask<F>
where
    F: FnOnce() + Send + 'static,
{
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<F> Task for NamedTask<F>
where
    F: FnOnce() + Send + 'static,
{
    fn run(self: Box<Self>) {
        (self.body)()
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// A panic raised by a task body, caught at the execution boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskFault {
    pub task_id: TaskId,
    pub task_name: Option<String>,
    pub message: String,
}

impl TaskFault {
    pub fn from_panic(
        task_id: TaskId,
        task_name: Option<String>,
        payload: &(dyn Any + Send),
    ) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self {
            task_id,
            task_name,
            message,
        }
    }
}

impl fmt::Display for TaskFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.task_name {
            Some(name) => write!(f, "task {} ({}) faulted: {}", self.task_id, name, self.message),
            None => write!(f, "task {} faulted: {}", self.task_id, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn closure_runs_once_through_box() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let task: Box<dyn Task> = Box::new(move || flag.store(true, Ordering::SeqCst));
        assert!(task.name().is_none());
        task.run();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn named_task_exposes_name() {
        let task: Box<dyn Task> = Box::new(NamedTask::new("rebuild-index", || {}));
        assert_eq!(task.name(), Some("rebuild-index"));
        task.run();
    }

    #[test]
    fn fault_message_from_str_and_string_payloads() {
        let id = Uuid::new_v4();

        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        let fault = TaskFault::from_panic(id, None, payload.as_ref());
        assert_eq!(fault.message, "static message");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        let fault = TaskFault::from_panic(id, Some("job".to_string()), payload.as_ref());
        assert_eq!(fault.message, "formatted 7");
        assert!(fault.to_string().contains("(job)"));

        let payload = panic::catch_unwind(|| panic::panic_any(42u32)).unwrap_err();
        let fault = TaskFault::from_panic(id, None, payload.as_ref());
        assert_eq!(fault.message, "unknown panic payload");
    }

    #[test]
    fn status_strings() {
        assert_eq!(TaskStatus::Queued.to_string(), "queued");
        assert_eq!(TaskStatus::Running.as_str(), "running");
        assert_eq!(TaskStatus::Completed.as_str(), "completed");
    }
}
