// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::backup::BackupJob;
use crate::config::{BackupConfiguration, NotifySection};
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::host::{Host, Region};
use crate::messages::Messages;
use crate::notify::Notifier;

use super::guard::{Admission, BackupGuard, RunPermit};
use super::state::RunCause;
use super::{JobOutcome, RuntimeEvent, RuntimeOptions, TriggerReason};

/// Counters returned when the runtime exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub started: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug)]
struct ActiveRun {
    job: String,
    regions: Vec<Region>,
}

/// Drives the guard in response to `RuntimeEvent`s, quiesces the host and
/// delegates the actual copy to an `ExecutorBackend`.
///
/// This is the primary context: every host call happens here, one at a time.
/// The filesystem work runs elsewhere and comes back as `JobFinished`.
pub struct Runtime<E: ExecutorBackend, H: Host> {
    config: Arc<BackupConfiguration>,
    guard: BackupGuard,
    host: H,
    executor: E,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    notifier: Notifier,
    messages: Messages,
    options: RuntimeOptions,

    active: Option<ActiveRun>,
    triggered: bool,
    shutting_down: bool,
    final_backup_pending: bool,
    summary: RunSummary,
}

impl<E: ExecutorBackend, H: Host> fmt::Debug for Runtime<E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("guard", &self.guard)
            .field("options", &self.options)
            .field("active", &self.active)
            .field("shutting_down", &self.shutting_down)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend, H: Host> Runtime<E, H> {
    pub fn new(
        config: Arc<BackupConfiguration>,
        guard: BackupGuard,
        host: H,
        executor: E,
        event_rx: mpsc::Receiver<RuntimeEvent>,
    ) -> Self {
        Self {
            config,
            guard,
            host,
            executor,
            event_rx,
            notifier: Notifier::from_config(&NotifySection::default()),
            messages: Messages::default(),
            options: RuntimeOptions::default(),
            active: None,
            triggered: false,
            shutting_down: false,
            final_backup_pending: false,
            summary: RunSummary::default(),
        }
    }

    pub fn with_options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Evaluates the guard on every tick and starts runs.
    /// - Resumes the host and releases the permit when a job finishes.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!("world-backup runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            if !self.handle_event(event).await? {
                info!("no more work; stopping runtime");
                break;
            }
        }

        info!(summary = ?self.summary, "runtime exiting");
        Ok(self.summary)
    }

    /// Handle one event. Returns whether the loop should keep running.
    async fn handle_event(&mut self, event: RuntimeEvent) -> Result<bool> {
        match event {
            RuntimeEvent::Tick { reason } => {
                self.triggered = true;
                self.on_tick(reason).await?;
            }
            RuntimeEvent::JobFinished {
                job,
                outcome,
                permit,
            } => {
                self.on_job_finished(job, outcome, permit).await?;
            }
            RuntimeEvent::ShutdownRequested => {
                self.on_shutdown().await?;
            }
        }
        Ok(self.keep_running())
    }

    fn keep_running(&self) -> bool {
        if self.active.is_some() || self.final_backup_pending {
            return true;
        }
        if self.shutting_down {
            return false;
        }
        !(self.options.exit_when_idle && self.triggered)
    }

    async fn on_tick(&mut self, reason: TriggerReason) -> Result<()> {
        match reason {
            TriggerReason::Manual => self.guard.request_manual(),
            TriggerReason::LastBackup => {
                info!("{}", self.messages.get("lastbackup", &[]));
                self.guard.request_last_backup();
            }
            TriggerReason::Scheduled => {}
        }

        let sessions = match self.host.sessions().await {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "could not list sessions; assuming none");
                Vec::new()
            }
        };

        match self.guard.try_acquire(&sessions) {
            Admission::Denied(skip) => {
                info!(?reason, ?skip, "{}", self.messages.get(skip.message_key(), &[]));
                self.summary.skipped += 1;
                Ok(())
            }
            Admission::Granted { permit, cause } => self.start_run(reason, cause, permit).await,
        }
    }

    async fn start_run(
        &mut self,
        reason: TriggerReason,
        cause: RunCause,
        permit: RunPermit,
    ) -> Result<()> {
        let mut regions = Vec::new();
        if let Err(err) = self.quiesce(&mut regions).await {
            error!(error = %err, "quiescing the host failed; run abandoned");
            self.resume_autosave(&regions).await;
            self.summary.failed += 1;
            drop(permit);
            return Ok(());
        }

        let job = BackupJob::new(&self.config, reason);
        info!(job = %job.name, ?reason, ?cause, "dispatching backup job");
        self.active = Some(ActiveRun {
            job: job.name.clone(),
            regions,
        });
        self.summary.started += 1;

        if let Err(err) = self.executor.dispatch(job, permit).await {
            error!(error = %err, "executor rejected backup job");
            if let Some(run) = self.active.take() {
                self.resume_autosave(&run.regions).await;
            }
            return Err(err);
        }
        Ok(())
    }

    /// Announce, flush sessions, disable autosave everywhere, force a save
    /// everywhere. `regions` is filled as soon as it is known so a failure
    /// part-way can still be undone.
    async fn quiesce(&self, regions: &mut Vec<Region>) -> Result<()> {
        let message = self.messages.get("backupstarted", &[]);
        if let Err(err) = self.notifier.announce(&self.host, &message).await {
            warn!(error = %err, "start notification failed");
        }

        self.host.save_sessions().await?;

        *regions = self.host.regions().await?;
        for region in regions.iter() {
            self.host.set_autosave(region, false).await?;
        }
        for region in regions.iter() {
            self.host.force_save(region).await?;
        }

        debug!(regions = regions.len(), "host quiesced");
        Ok(())
    }

    async fn resume_autosave(&self, regions: &[Region]) {
        for region in regions {
            if let Err(err) = self.host.set_autosave(region, true).await {
                warn!(region = %region.name, error = %err, "failed to re-enable autosave");
            }
        }
    }

    async fn on_job_finished(
        &mut self,
        job: String,
        outcome: JobOutcome,
        permit: RunPermit,
    ) -> Result<()> {
        let regions = match self.active.take() {
            Some(run) => {
                if run.job != job {
                    warn!(expected = %run.job, finished = %job, "unexpected job finished");
                }
                run.regions
            }
            None => {
                warn!(%job, "job finished while no run was active");
                Vec::new()
            }
        };

        self.resume_autosave(&regions).await;

        match &outcome {
            JobOutcome::Succeeded(report) => {
                self.summary.succeeded += 1;
                info!(
                    artifacts = ?report.artifacts(),
                    pruned = report.pruned.len(),
                    "{}",
                    self.messages.get("backupfinished", &[job.as_str()])
                );
            }
            JobOutcome::Failed(report) => {
                self.summary.failed += 1;
                error!(?report, "{}", self.messages.get("backupfailed", &[job.as_str()]));
            }
            JobOutcome::Panicked(msg) => {
                self.summary.failed += 1;
                error!(panic = %msg, "{}", self.messages.get("backupfailed", &[job.as_str()]));
            }
        }

        drop(permit);

        if self.final_backup_pending {
            self.final_backup_pending = false;
            self.on_tick(TriggerReason::LastBackup).await?;
        }
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        if self.shutting_down {
            info!("shutdown already in progress");
            return Ok(());
        }
        self.shutting_down = true;

        if self.active.is_some() {
            info!("waiting for the running backup before shutting down");
            self.final_backup_pending = self.options.final_backup_on_shutdown;
            return Ok(());
        }

        if self.options.final_backup_on_shutdown {
            self.on_tick(TriggerReason::LastBackup).await?;
        }
        Ok(())
    }
}
