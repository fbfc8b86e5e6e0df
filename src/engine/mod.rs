// src/engine/mod.rs

//! Orchestration engine for world-backup.
//!
//! This module ties together:
//! - the guard state machine (is a run allowed right now?)
//! - the quiescing sequence against the host
//! - the main runtime event loop that reacts to:
//!   - scheduled ticks and manual requests
//!   - job completion events from the executor
//!   - shutdown signals
//!
//! The pure eligibility rules live in [`state`]; [`guard`] wraps them in the
//! per-engine mutex and hands out run permits, backed by the cross-process
//! file lock in [`lock`]; the async/IO shell is implemented in [`runtime`].

use crate::backup::JobReport;

pub mod guard;
pub mod handle;
pub mod lock;
pub mod runtime;
pub mod state;
pub mod ticker;

pub use guard::{Admission, BackupGuard, GuardPolicy, RunPermit};
pub use handle::EngineHandle;
pub use lock::{LOCK_FILE_NAME, RunLock, lock_path};
pub use runtime::{Runtime, RunSummary};
pub use state::{Decision, GuardState, RunCause, SkipReason};
pub use ticker::spawn_ticker;

/// Why a run was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Periodic scheduler tick.
    Scheduled,
    /// Operator asked for a backup now.
    Manual,
    /// Final backup requested by the shutdown hook.
    LastBackup,
}

/// How a dispatched job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded(JobReport),
    Failed(JobReport),
    /// The worker panicked; the message is the panic payload when printable.
    Panicked(String),
}

impl JobOutcome {
    pub fn from_report(report: JobReport) -> Self {
        if report.succeeded() {
            JobOutcome::Succeeded(report)
        } else {
            JobOutcome::Failed(report)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded(_))
    }
}

/// Runtime options used by the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Exit once no job is running after the first trigger was handled
    /// (used for `now`).
    pub exit_when_idle: bool,
    /// On shutdown, run one last backup (forced even with zero sessions)
    /// before exiting.
    pub final_backup_on_shutdown: bool,
}

/// Events flowing into the runtime from the ticker, the operator handle and
/// the executor.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// Evaluate the guard and maybe start a run.
    Tick { reason: TriggerReason },
    /// A dispatched job is done. The permit travels back so the runtime can
    /// resume autosave before the guard is released.
    JobFinished {
        job: String,
        outcome: JobOutcome,
        permit: RunPermit,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}
