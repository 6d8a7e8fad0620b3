use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use conveyor_core::{FnTask, QueueConfig, QueueError, Scheduler, TaskError, TaskId};
use rand::Rng;
use serde_json::json;
use tokio::time::sleep;
use tracing::info;

/// Run a handful of demo tasks through the scheduler and print the outcome.
#[derive(Debug, Parser)]
#[command(name = "conveyor", version, about)]
struct Cli {
    /// JSON file with a QueueConfig; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Order pending tasks by priority (highest first)
    #[arg(long)]
    priority: Option<bool>,

    #[arg(long)]
    max_retries: Option<u32>,

    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Number of extra tasks with random latency
    #[arg(long, default_value_t = 0)]
    extra: usize,

    /// Chance that an extra task fails on each execution
    #[arg(long, default_value_t = 0.0)]
    fail_rate: f64,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn queue_config(&self) -> Result<QueueConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => QueueConfig::load(path)?,
            None => QueueConfig::new(2).with_priority(true).with_max_retries(1),
        };

        if let Some(n) = self.max_concurrent {
            config.max_concurrent = n;
        }
        if let Some(enabled) = self.priority {
            config.enable_priority = enabled;
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            config.retry_delay_ms = ms;
        }
        Ok(config)
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn timed(id: &str, priority: i64, ms: u64, value: serde_json::Value) -> Result<FnTask, QueueError> {
    FnTask::builder(id)
        .priority(priority)
        .execute(move || {
            let value = value.clone();
            async move {
                sleep(Duration::from_millis(ms)).await;
                Ok(value)
            }
        })
        .build()
}

/// Extra task with a random latency that fails with probability `fail_rate`
/// on every execution.
fn random_task(fail_rate: f64) -> Result<FnTask, QueueError> {
    let mut rng = rand::thread_rng();
    let ms = rng.gen_range(50..400);
    let priority = rng.gen_range(0..5);
    let fail_rate = if fail_rate.is_nan() { 0.0 } else { fail_rate.clamp(0.0, 1.0) };

    FnTask::builder(TaskId::generate())
        .priority(priority)
        .execute(move || async move {
            sleep(Duration::from_millis(ms)).await;
            if rand::thread_rng().gen_bool(fail_rate) {
                let err: TaskError = format!("simulated failure after {ms}ms").into();
                return Err(err);
            }
            Ok(json!({ "slept_ms": ms }))
        })
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = cli.queue_config()?;
    info!(?config, "conveyor: starting");
    let scheduler = Scheduler::new(config)?;

    scheduler.on_task_complete(|r| {
        println!("Task {} {} in {}ms", r.id, r.status, r.duration_ms);
    });

    scheduler.add(timed("1", 1, 1000, json!({ "data": "fetched" }))?)?;
    scheduler.add(timed("2", 2, 500, json!({ "processed": true }))?)?;
    for _ in 0..cli.extra {
        scheduler.add(random_task(cli.fail_rate)?)?;
    }

    scheduler.start();
    let status = scheduler.wait_idle().await;

    info!(stats = ?scheduler.stats(), "conveyor: idle");
    println!("STATUS: {}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
