//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - demo: run a batch of built-in tasks through the scheduler
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// taskqueue - an in-process priority task scheduler
#[derive(Parser, Debug)]
#[command(name = "taskqueue")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute (defaults to `demo`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enqueue a mixed-priority batch of built-in tasks and wait for them
    Demo(DemoArgs),

    /// Print the effective configuration as YAML
    Config,
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct DemoArgs {
    /// Number of tasks to enqueue
    #[arg(short = 'n', long, default_value_t = 20)]
    pub tasks: usize,

    /// Override the configured worker count
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Make every Kth task a failing one (0 disables)
    #[arg(short, long, default_value_t = 5)]
    pub fail_every: usize,

    /// Seconds to wait for each task to settle
    #[arg(long, default_value_t = 30)]
    pub wait_secs: u64,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            tasks: 20,
            workers: None,
            fail_every: 5,
            wait_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["taskqueue"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.is_verbose());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["taskqueue", "config", "-v", "-c", "/tmp/tq.yml"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tq.yml")));
        assert!(matches!(cli.command, Some(Commands::Config)));
    }

    #[test]
    fn test_demo_defaults() {
        let cli = Cli::try_parse_from(["taskqueue", "demo"]).unwrap();
        match cli.command {
            Some(Commands::Demo(args)) => assert_eq!(args, DemoArgs::default()),
            _ => panic!("Expected demo command"),
        }
    }

    #[test]
    fn test_demo_with_options() {
        let cli = Cli::try_parse_from(["taskqueue", "demo", "--tasks", "100", "-w", "3", "--fail-every", "0"]).unwrap();
        match cli.command {
            Some(Commands::Demo(args)) => {
                assert_eq!(args.tasks, 100);
                assert_eq!(args.workers, Some(3));
                assert_eq!(args.fail_every, 0);
            }
            _ => panic!("Expected demo command"),
        }
    }

    #[test]
    fn test_demo_rejects_non_numeric() {
        assert!(Cli::try_parse_from(["taskqueue", "demo", "--tasks", "many"]).is_err());
    }
}
