use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

mod cli;

use cli::Cli;
use cli::commands::{Commands, DemoArgs};
use taskqueue::builtins::{self, register_builtins};
use taskqueue::{Config, NewTask, Scheduler, TaskPriority, TaskStatus};

fn setup_logging(config: &Config) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskqueue")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("taskqueue.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    let default_level = config.log_level.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => run_demo(&DemoArgs::default(), config),
        Some(Commands::Demo(args)) => run_demo(args, config),
        Some(Commands::Config) => handle_config_command(config),
    }
}

fn handle_config_command(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn run_demo(args: &DemoArgs, config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(demo(args, config))
}

/// Build the i-th demo task: every Kth fails, every 3rd sleeps briefly, the rest echo.
fn demo_task(i: usize, fail_every: usize) -> NewTask {
    let priority = match i % 4 {
        0 => TaskPriority::Low,
        1 => TaskPriority::Normal,
        2 => TaskPriority::High,
        _ => TaskPriority::Urgent,
    };

    let task = if fail_every > 0 && (i + 1) % fail_every == 0 {
        NewTask::new(format!("fail-{}", i), builtins::FAIL)
            .arg("message", format!("task {} failed on purpose", i))
            .with_max_retries(1)
    } else if i % 3 == 0 {
        NewTask::new(format!("sleep-{}", i), builtins::SLEEP).arg("secs", 0.05)
    } else {
        NewTask::new(format!("echo-{}", i), builtins::ECHO).arg("message", format!("hello from task {}", i))
    };
    task.with_priority(priority)
}

async fn demo(args: &DemoArgs, config: &Config) -> Result<()> {
    let mut scheduler_config = config.scheduler.clone();
    if let Some(workers) = args.workers {
        scheduler_config.workers = workers;
    }

    let scheduler = Scheduler::new(scheduler_config).context("Failed to create scheduler")?;
    register_builtins(&scheduler);

    println!(
        "{} {} tasks on {} workers",
        "Running:".cyan(),
        args.tasks,
        scheduler.config().workers
    );

    let mut ids = Vec::with_capacity(args.tasks);
    for i in 0..args.tasks {
        ids.push(scheduler.enqueue(demo_task(i, args.fail_every)).await?);
    }

    let wait = Duration::from_secs(args.wait_secs);
    for id in &ids {
        let task = scheduler.wait_until_settled(id, wait).await?;
        let status = match task.status {
            TaskStatus::Completed => task.status.as_str().green(),
            TaskStatus::Failed => task.status.as_str().red(),
            TaskStatus::Cancelled => task.status.as_str().yellow(),
            _ => task.status.as_str().normal(),
        };
        let detail = match (&task.result, &task.error) {
            (Some(result), _) => result.to_string(),
            (None, Some(error)) => error.clone(),
            (None, None) => String::new(),
        };
        println!(
            "  {:<10} {:<7} {:<10} retries={} {}",
            status,
            task.priority.as_str(),
            task.name,
            task.retry_count,
            detail.dimmed()
        );
    }

    scheduler.stop().await;

    let stats = serde_json::to_string_pretty(&scheduler.stats()).context("Failed to serialize stats")?;
    println!("{}\n{}", "Stats:".cyan(), stats);
    Ok(())
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(&config).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
