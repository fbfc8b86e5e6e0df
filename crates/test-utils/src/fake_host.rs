use std::sync::{Arc, Mutex, MutexGuard};

use world_backup::errors::BackupError;
use world_backup::host::{Host, HostFuture, Region, Session};

/// One call made against a [`FakeHost`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Sessions,
    SaveSessions,
    Regions,
    SetAutosave { region: String, enabled: bool },
    ForceSave { region: String },
    Broadcast(String),
    Notify { message: String, capability: String },
}

#[derive(Debug, Default)]
struct State {
    sessions: Vec<Session>,
    regions: Vec<Region>,
    calls: Vec<HostCall>,
    fail_sessions: bool,
    fail_force_save: bool,
}

/// In-memory host that records every call.
///
/// Clones share state, so a test can keep one clone for assertions after
/// moving another into the runtime.
#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<State>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(self, sessions: Vec<Session>) -> Self {
        self.lock().sessions = sessions;
        self
    }

    pub fn with_regions(self, names: &[&str]) -> Self {
        self.lock().regions = names.iter().map(|n| Region::new(*n)).collect();
        self
    }

    pub fn failing_sessions(self) -> Self {
        self.lock().fail_sessions = true;
        self
    }

    pub fn failing_force_save(self) -> Self {
        self.lock().fail_force_save = true;
        self
    }

    pub fn set_sessions(&self, sessions: Vec<Session>) {
        self.lock().sessions = sessions;
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    /// Calls other than the `Sessions` queries made on every tick.
    pub fn quiesce_calls(&self) -> Vec<HostCall> {
        self.calls()
            .into_iter()
            .filter(|c| *c != HostCall::Sessions)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake host lock poisoned")
    }

    fn record(&self, call: HostCall) {
        self.lock().calls.push(call);
    }
}

impl Host for FakeHost {
    fn sessions(&self) -> HostFuture<'_, Vec<Session>> {
        Box::pin(async move {
            self.record(HostCall::Sessions);
            let state = self.lock();
            if state.fail_sessions {
                return Err(BackupError::HostError("sessions unavailable".into()));
            }
            Ok(state.sessions.clone())
        })
    }

    fn save_sessions(&self) -> HostFuture<'_, ()> {
        Box::pin(async move {
            self.record(HostCall::SaveSessions);
            Ok(())
        })
    }

    fn regions(&self) -> HostFuture<'_, Vec<Region>> {
        Box::pin(async move {
            self.record(HostCall::Regions);
            Ok(self.lock().regions.clone())
        })
    }

    fn set_autosave<'a>(&'a self, region: &'a Region, enabled: bool) -> HostFuture<'a, ()> {
        Box::pin(async move {
            self.record(HostCall::SetAutosave {
                region: region.name.clone(),
                enabled,
            });
            Ok(())
        })
    }

    fn force_save<'a>(&'a self, region: &'a Region) -> HostFuture<'a, ()> {
        Box::pin(async move {
            self.record(HostCall::ForceSave {
                region: region.name.clone(),
            });
            if self.lock().fail_force_save {
                return Err(BackupError::HostError("save failed".into()));
            }
            Ok(())
        })
    }

    fn broadcast<'a>(&'a self, message: &'a str) -> HostFuture<'a, ()> {
        Box::pin(async move {
            self.record(HostCall::Broadcast(message.to_string()));
            Ok(())
        })
    }

    fn notify_with_capability<'a>(
        &'a self,
        message: &'a str,
        capability: &'a str,
    ) -> HostFuture<'a, ()> {
        Box::pin(async move {
            self.record(HostCall::Notify {
                message: message.to_string(),
                capability: capability.to_string(),
            });
            Ok(())
        })
    }
}
