//! CLI module for taskqueue - command-line interface and subcommands.
//!
//! Provides the demo run and the effective-config dump.

pub mod commands;

pub use commands::Cli;
