use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use tasksched_core::{NamedTask, Scheduler, SchedulerConfig, TaskFault};

/// Submits a batch of sleeping tasks to a bounded scheduler and reports how
/// long the batch took.
#[derive(Parser, Debug)]
#[command(name = "tasksched-cli", version, about)]
struct Cli {
    /// Maximum number of tasks running at once.
    #[arg(long, env = "TASKSCHED_LIMIT", default_value_t = 3)]
    limit: usize,

    /// Pending queue capacity.
    #[arg(long, env = "TASKSCHED_QUEUE_CAPACITY", default_value_t = 100)]
    queue_capacity: usize,

    /// Number of tasks to submit.
    #[arg(long, default_value_t = 4)]
    tasks: usize,

    /// How long each task sleeps, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    task_millis: u64,

    /// Make every Nth task panic (0 disables).
    #[arg(long, default_value_t = 0)]
    fail_every: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = SchedulerConfig::new(cli.limit).with_queue_capacity(cli.queue_capacity);
    let scheduler = Scheduler::with_config(config)
        .context("failed to build scheduler")?
        .with_fault_observer(|fault: &TaskFault| warn!("observer: {}", fault));

    let task_time = Duration::from_millis(cli.task_millis);
    let started = Instant::now();

    for number in 1..=cli.tasks {
        let fails = cli.fail_every > 0 && number % cli.fail_every == 0;
        let task = NamedTask::new(format!("task-{}", number), move || {
            println!("Task {} executing", number);
            thread::sleep(task_time);
            if fails {
                panic!("task {} failed on purpose", number);
            }
        });
        let id = scheduler
            .submit(task)
            .with_context(|| format!("failed to submit task {}", number))?;
        info!("Submitted task {} as {}", number, id);
    }

    scheduler.wait_idle().context("failed waiting for tasks")?;
    info!("All tasks finished in {:?}", started.elapsed());

    let stats = scheduler.stats().context("failed to read stats")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
