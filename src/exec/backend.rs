// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning work
//! itself. This makes it easy to swap in a fake executor in tests while
//! keeping the production implementation here.
//!
//! - `RealExecutorBackend` runs [`run_job`] on the blocking pool. A
//!   supervising task awaits the worker's `JoinHandle`, so a panicking job
//!   is reported as [`JobOutcome::Panicked`] instead of vanishing.
//! - Tests can provide their own `ExecutorBackend` that, for example,
//!   records which jobs were dispatched and directly emits `JobFinished`.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task;
use tracing::{error, warn};

use crate::backup::{BackupJob, run_job};
use crate::config::BackupConfiguration;
use crate::engine::{JobOutcome, RunPermit, RuntimeEvent};
use crate::errors::Result;

/// Trait abstracting how backup jobs are executed.
pub trait ExecutorBackend: Send {
    /// Start `job` off the runtime's context.
    ///
    /// The implementation must eventually either send
    /// `RuntimeEvent::JobFinished` carrying `permit`, or drop `permit`.
    fn dispatch(
        &mut self,
        job: BackupJob,
        permit: RunPermit,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    config: Arc<BackupConfiguration>,
    tx: mpsc::Sender<RuntimeEvent>,
}

impl RealExecutorBackend {
    pub fn new(config: Arc<BackupConfiguration>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            config,
            tx: runtime_tx,
        }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn dispatch(
        &mut self,
        job: BackupJob,
        permit: RunPermit,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone what the supervisor needs so the future doesn't borrow `self`.
        let config = Arc::clone(&self.config);
        let tx = self.tx.clone();

        Box::pin(async move {
            let name = job.name.clone();
            tokio::spawn(async move {
                let worker = task::spawn_blocking(move || run_job(&config, &job));
                let outcome = match worker.await {
                    Ok(report) => JobOutcome::from_report(report),
                    Err(join_err) => {
                        let msg = if join_err.is_panic() {
                            panic_message(join_err.into_panic())
                        } else {
                            join_err.to_string()
                        };
                        error!(job = %name, error = %msg, "backup worker panicked");
                        JobOutcome::Panicked(msg)
                    }
                };

                if let Err(send_err) = tx
                    .send(RuntimeEvent::JobFinished {
                        job: name,
                        outcome,
                        permit,
                    })
                    .await
                {
                    // The permit inside the unsent event is dropped here,
                    // which releases the guard.
                    warn!(error = %send_err, "runtime gone; job result dropped");
                }
            });
            Ok(())
        })
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("bang".to_string())), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "non-string panic payload");
    }
}
