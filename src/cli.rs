// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `world-backup`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "world-backup",
    version,
    about = "Consistent, filtered backups of a running game server.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Backup.toml` in the current working directory.
    #[arg(long, global = true, value_name = "PATH", default_value = "Backup.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WORLD_BACKUP_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run scheduled backups until interrupted.
    ///
    /// Operator commands (`backup`, `toggle`, `status`, `list`, `stop`) are
    /// read from stdin, one per line.
    Run {
        /// Start with scheduled backups switched off.
        #[arg(long)]
        paused: bool,

        /// Do not take a final backup on Ctrl-C.
        #[arg(long)]
        no_final_backup: bool,
    },
    /// Take one backup now and exit.
    Now,
    /// List existing backups, newest first.
    List {
        #[arg(long, default_value_t = 8)]
        limit: usize,
    },
    /// Validate the config and print the resolved layout.
    Check,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
