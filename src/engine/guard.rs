// src/engine/guard.rs

//! Per-engine mutual exclusion for backup runs.
//!
//! [`BackupGuard`] owns the [`GuardState`] behind a `std::sync::Mutex`. The
//! lock is held only for the evaluate-and-acquire step, never across an
//! `.await` or a copy. A granted run is represented by a [`RunPermit`];
//! dropping the permit is the only way `in_progress` returns to false.
//!
//! With a run lock configured, a granted permit also holds the
//! cross-process [`RunLock`], so engines in other processes sharing the
//! backup root are refused while it lives.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::config::{BackupConfiguration, ConfigFile};
use crate::host::Session;

use super::lock::{RunLock, lock_path};
use super::state::{Decision, GuardState, RunCause, SkipReason};

/// Static inputs to the eligibility rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPolicy {
    pub empty_server: bool,
    pub bypass_capability: String,
}

impl GuardPolicy {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            empty_server: cfg.schedule.empty_server,
            bypass_capability: cfg.notify.bypass_capability.clone(),
        }
    }
}

/// Result of [`BackupGuard::try_acquire`].
#[derive(Debug)]
pub enum Admission {
    Granted { permit: RunPermit, cause: RunCause },
    Denied(SkipReason),
}

#[derive(Clone)]
pub struct BackupGuard {
    state: Arc<Mutex<GuardState>>,
    policy: Arc<GuardPolicy>,
    run_lock: Option<Arc<PathBuf>>,
}

impl fmt::Debug for BackupGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupGuard")
            .field("state", &self.status())
            .field("policy", &self.policy)
            .field("run_lock", &self.run_lock)
            .finish()
    }
}

impl BackupGuard {
    pub fn new(backup_enabled: bool, policy: GuardPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(GuardState::new(backup_enabled))),
            policy: Arc::new(policy),
            run_lock: None,
        }
    }

    /// Guard for one engine, locking `<backup_root>/.world-backup.lock` for
    /// each run.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let backup_cfg = BackupConfiguration::from_config(cfg);
        Self::new(cfg.schedule.enabled, GuardPolicy::from_config(cfg))
            .with_run_lock(lock_path(&backup_cfg))
    }

    /// Also take an exclusive file lock at `path` for every granted run.
    pub fn with_run_lock(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_lock = Some(Arc::new(path.into()));
        self
    }

    // A panic while holding the lock cannot leave the flags half-written, so
    // a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evaluate the eligibility rules against `sessions` and, if a run is
    /// allowed, mark it in progress, all under one lock.
    ///
    /// A run held by another process counts as already running: the
    /// one-shot flags consumed by the evaluation are not restored.
    pub fn try_acquire(&self, sessions: &[Session]) -> Admission {
        let mut state = self.lock();
        let cause = match state.evaluate(
            sessions,
            self.policy.empty_server,
            &self.policy.bypass_capability,
        ) {
            Decision::Run(cause) => cause,
            Decision::Skip(reason) => return Admission::Denied(reason),
        };

        let file_lock = match self.run_lock.as_deref() {
            None => None,
            Some(path) => match RunLock::try_acquire(path) {
                Ok(Some(lock)) => Some(lock),
                Ok(None) => {
                    debug!(lock = %path.display(), "run lock held by another engine");
                    return Admission::Denied(SkipReason::AlreadyRunning);
                }
                Err(err) => {
                    warn!(error = %err, lock = %path.display(), "could not take the run lock");
                    return Admission::Denied(SkipReason::LockUnavailable);
                }
            },
        };

        state.in_progress = true;
        debug!(?cause, "run permit acquired");
        Admission::Granted {
            permit: RunPermit {
                state: Arc::clone(&self.state),
                _file_lock: file_lock,
            },
            cause,
        }
    }

    /// Force the next evaluation to run, regardless of the toggle and
    /// sessions.
    pub fn request_manual(&self) {
        self.lock().manual_pending = true;
    }

    /// Allow the next evaluation to run with zero sessions.
    pub fn request_last_backup(&self) {
        self.lock().last_pending = true;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.lock().backup_enabled = enabled;
        info!(enabled, "scheduled backups toggled");
    }

    /// Flip the scheduled-backup toggle. Returns the new value.
    pub fn toggle(&self) -> bool {
        let mut state = self.lock();
        state.backup_enabled = !state.backup_enabled;
        let enabled = state.backup_enabled;
        drop(state);
        info!(enabled, "scheduled backups toggled");
        enabled
    }

    /// Snapshot of the current flags.
    pub fn status(&self) -> GuardState {
        *self.lock()
    }

    pub fn is_in_progress(&self) -> bool {
        self.lock().in_progress
    }
}

/// Proof that a run is in progress. Releases the guard when dropped, on
/// every path: success, failure, worker panic, or a dropped event.
pub struct RunPermit {
    state: Arc<Mutex<GuardState>>,
    // Dropped after `drop` below has cleared `in_progress`.
    _file_lock: Option<RunLock>,
}

impl fmt::Debug for RunPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunPermit").finish_non_exhaustive()
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_progress = false;
        debug!("run permit released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(enabled: bool) -> BackupGuard {
        BackupGuard::new(
            enabled,
            GuardPolicy {
                empty_server: false,
                bypass_capability: "backup.bypass".to_string(),
            },
        )
    }

    #[test]
    fn permit_drop_releases_guard() {
        let g = guard(true);
        let sessions = [Session::new("a")];

        let Admission::Granted { permit, .. } = g.try_acquire(&sessions) else {
            panic!("expected a permit");
        };
        assert!(g.is_in_progress());
        assert!(matches!(
            g.try_acquire(&sessions),
            Admission::Denied(SkipReason::AlreadyRunning)
        ));

        drop(permit);
        assert!(!g.is_in_progress());
        assert!(matches!(g.try_acquire(&sessions), Admission::Granted { .. }));
    }

    #[test]
    fn toggle_flips_and_reports() {
        let g = guard(true);
        assert!(!g.toggle());
        assert!(!g.status().backup_enabled);
        assert!(g.toggle());
        g.set_enabled(false);
        assert!(!g.status().backup_enabled);
    }

    #[test]
    fn run_lock_is_released_with_the_permit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backups/.world-backup.lock");
        let g = guard(true).with_run_lock(&path);

        let Admission::Granted { permit, .. } = g.try_acquire(&[Session::new("a")]) else {
            panic!("expected a permit");
        };
        assert!(RunLock::try_acquire(&path).unwrap().is_none());

        drop(permit);
        assert!(RunLock::try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn manual_request_runs_while_disabled() {
        let g = guard(false);
        g.request_manual();
        assert!(matches!(
            g.try_acquire(&[]),
            Admission::Granted {
                cause: RunCause::Manual,
                ..
            }
        ));
    }
}
