// src/engine/state.rs

//! Pure eligibility rules.
//!
//! [`GuardState::evaluate`] is synchronous and deterministic: no locks, no
//! IO. It consumes the one-shot flags it honours and reports what should
//! happen. Acquiring `in_progress` is left to [`crate::engine::BackupGuard`].

use crate::host::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardState {
    /// Gates scheduled triggers only.
    pub backup_enabled: bool,
    pub in_progress: bool,
    /// One-shot: force the next evaluated run.
    pub manual_pending: bool,
    /// One-shot: force a run even with zero sessions (shutdown hook).
    pub last_pending: bool,
}

impl GuardState {
    pub fn new(backup_enabled: bool) -> Self {
        Self {
            backup_enabled,
            in_progress: false,
            manual_pending: false,
            last_pending: false,
        }
    }
}

/// Why a run was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCause {
    Manual,
    LastBackup,
    EmptyServerAllowed,
    ActiveSessions,
}

/// Why a run was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
    Disabled,
    NoSessions,
    AllSessionsBypass,
    /// The cross-process run lock could not be opened.
    LockUnavailable,
}

impl SkipReason {
    /// Catalog key of the message logged for this skip.
    pub fn message_key(&self) -> &'static str {
        match self {
            SkipReason::AlreadyRunning => "backupinprogress",
            SkipReason::Disabled => "backupoff",
            SkipReason::NoSessions => "abortedbackup",
            SkipReason::AllSessionsBypass => "skipbackupbypass",
            SkipReason::LockUnavailable => "lockunavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Run(RunCause),
    Skip(SkipReason),
}

impl GuardState {
    /// Decide whether a run may start now.
    ///
    /// Rules, first match wins:
    /// 1. a run is in progress: reject, and drop a pending manual request
    ///    (requests are never queued behind a run)
    /// 2. manual request pending: run
    /// 3. scheduled backups disabled: skip
    /// 4. empty-server backups allowed: run
    /// 5. nobody connected: run only for a pending last backup
    /// 6. run if at least one session lacks `bypass_capability`
    pub fn evaluate(
        &mut self,
        sessions: &[Session],
        empty_server: bool,
        bypass_capability: &str,
    ) -> Decision {
        if self.in_progress {
            self.manual_pending = false;
            return Decision::Skip(SkipReason::AlreadyRunning);
        }

        if self.manual_pending {
            self.manual_pending = false;
            return Decision::Run(RunCause::Manual);
        }

        if !self.backup_enabled {
            return Decision::Skip(SkipReason::Disabled);
        }

        if empty_server {
            return Decision::Run(RunCause::EmptyServerAllowed);
        }

        if sessions.is_empty() {
            if self.last_pending {
                self.last_pending = false;
                return Decision::Run(RunCause::LastBackup);
            }
            return Decision::Skip(SkipReason::NoSessions);
        }

        if sessions.iter().any(|s| !s.has_capability(bypass_capability)) {
            Decision::Run(RunCause::ActiveSessions)
        } else {
            Decision::Skip(SkipReason::AllSessionsBypass)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BYPASS: &str = "backup.bypass";

    fn bypassing(name: &str) -> Session {
        Session::new(name).with_capability(BYPASS)
    }

    #[test]
    fn in_progress_rejects_and_drops_manual_request() {
        let mut s = GuardState::new(true);
        s.in_progress = true;
        s.manual_pending = true;

        assert_eq!(
            s.evaluate(&[Session::new("a")], false, BYPASS),
            Decision::Skip(SkipReason::AlreadyRunning)
        );
        assert!(!s.manual_pending);
    }

    #[test]
    fn manual_overrides_disabled_and_is_consumed_once() {
        let mut s = GuardState::new(false);
        s.manual_pending = true;

        assert_eq!(s.evaluate(&[], false, BYPASS), Decision::Run(RunCause::Manual));
        assert_eq!(s.evaluate(&[], false, BYPASS), Decision::Skip(SkipReason::Disabled));
    }

    #[test]
    fn empty_server_setting_allows_runs_without_sessions() {
        let mut s = GuardState::new(true);
        assert_eq!(
            s.evaluate(&[], true, BYPASS),
            Decision::Run(RunCause::EmptyServerAllowed)
        );
    }

    #[test]
    fn last_backup_forces_run_with_zero_sessions() {
        let mut s = GuardState::new(true);
        assert_eq!(s.evaluate(&[], false, BYPASS), Decision::Skip(SkipReason::NoSessions));

        s.last_pending = true;
        assert_eq!(s.evaluate(&[], false, BYPASS), Decision::Run(RunCause::LastBackup));
        assert!(!s.last_pending);
        assert_eq!(s.evaluate(&[], false, BYPASS), Decision::Skip(SkipReason::NoSessions));
    }

    #[test]
    fn last_pending_survives_while_sessions_are_online() {
        let mut s = GuardState::new(true);
        s.last_pending = true;
        assert_eq!(
            s.evaluate(&[Session::new("a")], false, BYPASS),
            Decision::Run(RunCause::ActiveSessions)
        );
        assert!(s.last_pending);
    }

    #[test]
    fn bypass_tie_break() {
        let mut s = GuardState::new(true);
        let mixed = [bypassing("a"), bypassing("b"), Session::new("c")];
        let all_bypass = [bypassing("a"), bypassing("b")];

        assert_eq!(
            s.evaluate(&mixed, false, BYPASS),
            Decision::Run(RunCause::ActiveSessions)
        );
        assert_eq!(
            s.evaluate(&all_bypass, false, BYPASS),
            Decision::Skip(SkipReason::AllSessionsBypass)
        );
    }
}
