// src/console.rs

//! Operator console for `world-backup run`.
//!
//! Reads one command per line and forwards it to the engine it was started
//! with, so manual backups and the toggle act on the live daemon:
//!
//! ```text
//! backup   take a backup now
//! toggle   switch scheduled backups on/off
//! status   show the guard flags
//! list     show the newest backups
//! stop     shut down (with the final backup, if enabled)
//! ```

use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::debug;

use crate::backup::{list_backups, list_extension_backups};
use crate::config::BackupConfiguration;
use crate::engine::EngineHandle;
use crate::errors::Result;
use crate::messages::Messages;

const HELP: &str = "commands: backup, toggle, status, list, stop, help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Backup,
    Toggle,
    Status,
    List,
    Stop,
    Help,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "backup" | "now" => Ok(ConsoleCommand::Backup),
            "toggle" => Ok(ConsoleCommand::Toggle),
            "status" => Ok(ConsoleCommand::Status),
            "list" => Ok(ConsoleCommand::List),
            "stop" | "exit" | "quit" => Ok(ConsoleCommand::Stop),
            "help" | "?" => Ok(ConsoleCommand::Help),
            other => Err(format!("unknown command '{other}'; {HELP}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Console {
    handle: EngineHandle,
    config: Arc<BackupConfiguration>,
    messages: Messages,
    list_limit: usize,
}

impl Console {
    pub fn new(handle: EngineHandle, config: Arc<BackupConfiguration>, messages: Messages) -> Self {
        Self {
            handle,
            config,
            messages,
            list_limit: 8,
        }
    }

    /// Consume lines until the input closes or `stop` is read.
    pub async fn run(&self, mut lines: mpsc::Receiver<String>) -> Result<()> {
        while let Some(line) = lines.recv().await {
            if line.trim().is_empty() {
                continue;
            }
            let command = match line.parse::<ConsoleCommand>() {
                Ok(c) => c,
                Err(msg) => {
                    println!("{msg}");
                    continue;
                }
            };
            for reply in self.execute(command).await? {
                println!("{reply}");
            }
            if command == ConsoleCommand::Stop {
                break;
            }
        }
        debug!("console closed");
        Ok(())
    }

    /// Apply one command. Returns the lines to show the operator.
    pub async fn execute(&self, command: ConsoleCommand) -> Result<Vec<String>> {
        let replies = match command {
            ConsoleCommand::Backup => {
                self.handle.request_manual().await?;
                vec!["backup requested".to_string()]
            }
            ConsoleCommand::Toggle => {
                let key = if self.handle.toggle() {
                    "backuptoggleon"
                } else {
                    "backuptoggleoff"
                };
                vec![self.messages.get(key, &[])]
            }
            ConsoleCommand::Status => {
                let s = self.handle.status();
                vec![format!(
                    "enabled={} running={} manual_pending={} last_pending={}",
                    s.backup_enabled, s.in_progress, s.manual_pending, s.last_pending
                )]
            }
            ConsoleCommand::List => listing(&self.config, &self.messages, self.list_limit)?,
            ConsoleCommand::Stop => {
                self.handle.shutdown().await?;
                vec!["shutting down".to_string()]
            }
            ConsoleCommand::Help => vec![HELP.to_string()],
        };
        Ok(replies)
    }
}

/// Forward stdin lines to a channel from a plain thread.
///
/// A blocked read on this thread does not hold up runtime shutdown.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(std::result::Result::ok) {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Existing backups, newest first, formatted for display.
pub fn listing(cfg: &BackupConfiguration, messages: &Messages, limit: usize) -> AnyResult<Vec<String>> {
    let root = cfg.backup_root().display().to_string();

    let mut artifacts = list_backups(cfg)?;
    artifacts.extend(list_extension_backups(cfg)?);
    if artifacts.is_empty() {
        return Ok(vec![messages.get("errorfolderempty", &[root.as_str()])]);
    }

    artifacts.sort_by(|a, b| b.modified.cmp(&a.modified));
    let mut lines = vec![messages.get("listheader", &[root.as_str()])];
    for artifact in artifacts.iter().take(limit) {
        let when: DateTime<Local> = artifact.modified.into();
        lines.push(format!(
            "  {}  {}",
            when.format("%Y-%m-%d %H:%M:%S"),
            artifact.path.display()
        ));
    }
    Ok(lines)
}
