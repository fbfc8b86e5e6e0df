// src/engine/handle.rs

//! Operator-facing handle to a running engine.

use anyhow::anyhow;
use tokio::sync::mpsc;

use crate::errors::{BackupError, Result};

use super::guard::BackupGuard;
use super::state::GuardState;
use super::{RuntimeEvent, TriggerReason};

/// Cheap to clone; every clone talks to the same runtime and guard.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<RuntimeEvent>,
    guard: BackupGuard,
}

impl EngineHandle {
    pub fn new(tx: mpsc::Sender<RuntimeEvent>, guard: BackupGuard) -> Self {
        Self { tx, guard }
    }

    async fn send(&self, event: RuntimeEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| BackupError::Other(anyhow!("runtime event channel closed")))
    }

    /// Run a backup now, ignoring the toggle and who is online.
    pub async fn request_manual(&self) -> Result<()> {
        self.send(RuntimeEvent::Tick {
            reason: TriggerReason::Manual,
        })
        .await
    }

    /// Run a final backup even if nobody is online.
    pub async fn request_last_backup(&self) -> Result<()> {
        self.send(RuntimeEvent::Tick {
            reason: TriggerReason::LastBackup,
        })
        .await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(RuntimeEvent::ShutdownRequested).await
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.guard.set_enabled(enabled);
    }

    /// Flip scheduled backups on or off; returns the new value.
    pub fn toggle(&self) -> bool {
        self.guard.toggle()
    }

    pub fn status(&self) -> GuardState {
        self.guard.status()
    }
}
