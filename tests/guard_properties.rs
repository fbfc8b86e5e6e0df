// tests/guard_properties.rs

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Barrier};
use std::thread;

use proptest::prelude::*;
use tempfile::tempdir;
use world_backup::engine::{Admission, BackupGuard, GuardPolicy, RunCause, SkipReason};
use world_backup::host::Session;
use world_backup_test_utils::builders::ConfigFileBuilder;

const BYPASS: &str = "backup.bypass";

fn guard(enabled: bool, empty_server: bool) -> BackupGuard {
    BackupGuard::new(
        enabled,
        GuardPolicy {
            empty_server,
            bypass_capability: BYPASS.to_string(),
        },
    )
}

fn online(n: usize) -> Vec<Session> {
    (0..n).map(|i| Session::new(format!("p{i}"))).collect()
}

#[test]
fn concurrent_acquire_grants_exactly_one_permit() {
    let g = guard(true, false);
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let g = g.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                match g.try_acquire(&online(1)) {
                    // Keep the permit alive until the test inspects results.
                    Admission::Granted { permit, .. } => Some(permit),
                    Admission::Denied(reason) => {
                        assert_eq!(reason, SkipReason::AlreadyRunning);
                        None
                    }
                }
            })
        })
        .collect();

    let permits: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(permits.len(), 1);
    assert!(g.is_in_progress());
    drop(permits);
    assert!(!g.is_in_progress());
}

#[test]
fn engines_sharing_a_backup_root_never_run_together() {
    let dir = tempdir().unwrap();
    let cfg = ConfigFileBuilder::new().server_root(dir.path()).build();

    // A daemon and a `now` invocation each build their own guard.
    let daemon = BackupGuard::from_config(&cfg);
    let once = BackupGuard::from_config(&cfg);

    let Admission::Granted { permit, .. } = daemon.try_acquire(&online(1)) else {
        panic!("daemon should start its scheduled run");
    };

    once.request_manual();
    assert!(matches!(
        once.try_acquire(&online(1)),
        Admission::Denied(SkipReason::AlreadyRunning)
    ));
    assert!(!once.is_in_progress());

    drop(permit);
    once.request_manual();
    assert!(matches!(
        once.try_acquire(&online(1)),
        Admission::Granted {
            cause: RunCause::Manual,
            ..
        }
    ));
}

#[test]
fn manual_request_is_consumed_exactly_once() {
    let g = guard(false, false);
    g.request_manual();

    let first = g.try_acquire(&[]);
    assert!(matches!(
        first,
        Admission::Granted {
            cause: RunCause::Manual,
            ..
        }
    ));
    drop(first);

    assert!(matches!(
        g.try_acquire(&[]),
        Admission::Denied(SkipReason::Disabled)
    ));
}

#[test]
fn manual_request_during_run_is_rejected_not_queued() {
    let g = guard(false, false);
    g.request_manual();
    let Admission::Granted { permit, .. } = g.try_acquire(&[]) else {
        panic!("expected manual run");
    };

    g.request_manual();
    assert!(matches!(
        g.try_acquire(&[]),
        Admission::Denied(SkipReason::AlreadyRunning)
    ));
    drop(permit);

    assert!(!g.status().manual_pending);
    assert!(matches!(
        g.try_acquire(&[]),
        Admission::Denied(SkipReason::Disabled)
    ));
}

#[test]
fn last_backup_forces_run_with_zero_sessions_once() {
    let g = guard(true, false);
    assert!(matches!(
        g.try_acquire(&[]),
        Admission::Denied(SkipReason::NoSessions)
    ));

    g.request_last_backup();
    let run = g.try_acquire(&[]);
    assert!(matches!(
        run,
        Admission::Granted {
            cause: RunCause::LastBackup,
            ..
        }
    ));
    drop(run);

    assert!(matches!(
        g.try_acquire(&[]),
        Admission::Denied(SkipReason::NoSessions)
    ));
}

#[test]
fn bypass_tie_break() {
    let g = guard(true, false);
    let b = |n: &str| Session::new(n).with_capability(BYPASS);

    let run = g.try_acquire(&[b("a"), b("b"), Session::new("c")]);
    assert!(matches!(run, Admission::Granted { .. }));
    drop(run);

    assert!(matches!(
        g.try_acquire(&[b("a"), b("b")]),
        Admission::Denied(SkipReason::AllSessionsBypass)
    ));
}

#[test]
fn permit_is_released_when_the_holder_panics() {
    let g = guard(true, false);
    let Admission::Granted { permit, .. } = g.try_acquire(&online(1)) else {
        panic!("expected a permit");
    };

    let result = panic::catch_unwind(AssertUnwindSafe(move || {
        let _permit = permit;
        panic!("worker blew up");
    }));

    assert!(result.is_err());
    assert!(!g.is_in_progress());
    assert!(matches!(g.try_acquire(&online(1)), Admission::Granted { .. }));
}

proptest! {
    // Whatever the inputs, a second acquire while a permit is alive is
    // rejected, and after release the guard is idle again.
    #[test]
    fn at_most_one_permit(
        enabled in any::<bool>(),
        empty_server in any::<bool>(),
        manual in any::<bool>(),
        last in any::<bool>(),
        sessions in proptest::collection::vec(any::<bool>(), 0..6),
    ) {
        let g = guard(enabled, empty_server);
        if manual { g.request_manual(); }
        if last { g.request_last_backup(); }
        let sessions: Vec<Session> = sessions
            .iter()
            .enumerate()
            .map(|(i, bypass)| {
                let s = Session::new(format!("p{i}"));
                if *bypass { s.with_capability(BYPASS) } else { s }
            })
            .collect();

        match g.try_acquire(&sessions) {
            Admission::Granted { permit, .. } => {
                prop_assert!(g.is_in_progress());
                g.request_manual();
                let second = g.try_acquire(&sessions);
                prop_assert!(matches!(second, Admission::Denied(SkipReason::AlreadyRunning)));
                drop(permit);
                prop_assert!(!g.is_in_progress());
            }
            Admission::Denied(reason) => {
                prop_assert!(reason != SkipReason::AlreadyRunning);
                prop_assert!(!g.is_in_progress());
                // A skip never consumes a pending manual request because
                // a pending manual request never leads to a skip.
                prop_assert!(!manual);
            }
        }
    }
}
