pub mod backup;
pub mod cli;
pub mod config;
pub mod console;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod host;
pub mod logging;
pub mod messages;
pub mod notify;
pub mod path_utils;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Local;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::backup::{JobLayout, unique_job_name};
use crate::cli::{CliArgs, Command};
use crate::console::{Console, listing, spawn_stdin_reader};
use crate::config::loader::load_and_validate;
use crate::config::{BackupConfiguration, ConfigFile};
use crate::engine::{
    BackupGuard, EngineHandle, Runtime, RuntimeEvent, RuntimeOptions, RunSummary, spawn_ticker,
};
use crate::exec::RealExecutorBackend;
use crate::host::{Host, OfflineHost, RconHost};
use crate::messages::Messages;
use crate::notify::Notifier;

/// How the engine is driven for one invocation.
#[derive(Debug, Clone, Copy)]
enum EngineMode {
    /// Periodic ticks until Ctrl-C.
    Daemon { paused: bool, final_backup: bool },
    /// A single manual backup.
    Once,
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - host adapter (RCON or offline)
/// - guard / runtime / executor
/// - ticker, Ctrl-C handling and the stdin console
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    match args.command {
        Command::Check => {
            print_check(&cfg);
            Ok(())
        }
        Command::List { limit } => print_list(&cfg, limit),
        Command::Now => start_engine(cfg, EngineMode::Once).await,
        Command::Run {
            paused,
            no_final_backup,
        } => {
            start_engine(
                cfg,
                EngineMode::Daemon {
                    paused,
                    final_backup: !no_final_backup,
                },
            )
            .await
        }
    }
}

async fn start_engine(cfg: ConfigFile, mode: EngineMode) -> Result<()> {
    let server_root = PathBuf::from(&cfg.backup.server_root);
    if !server_root.is_dir() {
        bail!("server root {} is not a directory", server_root.display());
    }
    let summary = match RconHost::from_config(&cfg.host, &server_root).await? {
        Some(host) => {
            info!(?host, "using RCON host");
            run_engine(cfg, host, mode).await?
        }
        None => {
            warn!("RCON not configured; backing up without quiescing the server");
            run_engine(cfg, OfflineHost, mode).await?
        }
    };

    if matches!(mode, EngineMode::Once) && summary.succeeded == 0 {
        bail!("backup did not complete: {summary:?}");
    }
    Ok(())
}

async fn run_engine<H: Host + 'static>(
    cfg: ConfigFile,
    host: H,
    mode: EngineMode,
) -> Result<RunSummary> {
    let backup_cfg = Arc::new(BackupConfiguration::from_config(&cfg));
    let guard = BackupGuard::from_config(&cfg);

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let handle = EngineHandle::new(rt_tx.clone(), guard.clone());

    let executor = RealExecutorBackend::new(Arc::clone(&backup_cfg), rt_tx.clone());

    let options = match mode {
        EngineMode::Daemon { final_backup, .. } => RuntimeOptions {
            exit_when_idle: false,
            final_backup_on_shutdown: final_backup,
        },
        EngineMode::Once => RuntimeOptions {
            exit_when_idle: true,
            final_backup_on_shutdown: false,
        },
    };

    let messages = Messages::with_overrides(&cfg.messages);
    let runtime = Runtime::new(Arc::clone(&backup_cfg), guard, host, executor, rt_rx)
        .with_options(options)
        .with_notifier(Notifier::from_config(&cfg.notify))
        .with_messages(messages.clone());

    match mode {
        EngineMode::Daemon { paused, .. } => {
            if paused {
                handle.set_enabled(false);
            }
            info!(interval = ?cfg.interval(), status = ?handle.status(), "scheduling backups");
            let _ticker = spawn_ticker(cfg.interval(), rt_tx.clone());

            // Ctrl-C → graceful shutdown.
            let shutdown = handle.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                let _ = shutdown.shutdown().await;
            });

            // Operator commands on stdin act on this engine.
            let console = Console::new(handle.clone(), backup_cfg, messages);
            tokio::spawn(async move {
                if let Err(e) = console.run(spawn_stdin_reader()).await {
                    warn!(error = %e, "console stopped");
                }
            });
        }
        EngineMode::Once => {
            handle.request_manual().await?;
        }
    }

    Ok(runtime.run().await?)
}

/// Print existing backups, newest first.
fn print_list(cfg: &ConfigFile, limit: usize) -> Result<()> {
    let backup_cfg = BackupConfiguration::from_config(cfg);
    let messages = Messages::with_overrides(&cfg.messages);
    for line in listing(&backup_cfg, &messages, limit)? {
        println!("{line}");
    }
    Ok(())
}

/// Print the resolved configuration and where the next job would go.
fn print_check(cfg: &ConfigFile) {
    let backup_cfg = BackupConfiguration::from_config(cfg);
    let job = unique_job_name(&backup_cfg, &Local::now());
    let layout = JobLayout::new(&backup_cfg, &job);

    println!("world-backup check");
    println!("  server_root      = {}", backup_cfg.server_root().display());
    println!("  backup_root      = {}", backup_cfg.backup_root().display());
    match backup_cfg.temp_root() {
        Some(t) => println!("  temp_root        = {}", t.display()),
        None => println!("  temp_root        = (disabled)"),
    }
    println!("  compress         = {}", backup_cfg.compress());
    println!("  split_extensions = {}", backup_cfg.split_extensions());
    println!(
        "  extensions       = {} ({:?} {:?})",
        backup_cfg.extensions_root().display(),
        backup_cfg.selection_mode(),
        backup_cfg.selection_names()
    );
    println!("  interval         = {:?}", cfg.interval());
    println!("  enabled          = {}", cfg.schedule.enabled);
    println!("  empty_server     = {}", cfg.schedule.empty_server);
    println!("  max_backups      = {}", backup_cfg.max_backups());
    println!();
    println!("next job: {job}");
    println!("  full-tree  stage {}", layout.full_tree.stage.display());
    if let Some(p) = layout.full_tree.artifact_path() {
        println!("             -> {}", p.display());
    }
    println!("  extensions stage {}", layout.extensions.stage.display());
    match layout.extensions.artifact_path() {
        Some(p) => println!("             -> {}", p.display()),
        None => println!("             (inside the full-tree artifact)"),
    }
}
