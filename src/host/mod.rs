// src/host/mod.rs

//! The narrow interface the engine uses to talk to the running server.
//!
//! The engine never knows which server it is backing up. It only needs to
//! enumerate sessions, flush and pause persistence, and send messages.
//!
//! - [`rcon`] drives a Minecraft server over RCON (production).
//! - [`offline`] is used when no live server is reachable.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;

pub mod offline;
pub mod rcon;

pub use offline::OfflineHost;
pub use rcon::{RconHost, RconSettings};

/// Boxed future returned by every [`Host`] method.
pub type HostFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A connected user, with the capabilities the host granted them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub capabilities: BTreeSet<String>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// A persistent region of host state (a world) whose autosave the engine
/// controls.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Region {
    pub name: String,
}

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Operations the engine needs from the host.
///
/// All methods are called from the engine's event loop, one at a time.
pub trait Host: Send + Sync {
    fn sessions(&self) -> HostFuture<'_, Vec<Session>>;

    /// Persist per-session state (player data).
    fn save_sessions(&self) -> HostFuture<'_, ()>;

    fn regions(&self) -> HostFuture<'_, Vec<Region>>;

    fn set_autosave<'a>(&'a self, region: &'a Region, enabled: bool) -> HostFuture<'a, ()>;

    /// Synchronously write all of `region` to disk.
    fn force_save<'a>(&'a self, region: &'a Region) -> HostFuture<'a, ()>;

    fn broadcast<'a>(&'a self, message: &'a str) -> HostFuture<'a, ()>;

    /// Deliver `message` to every session holding `capability`.
    fn notify_with_capability<'a>(
        &'a self,
        message: &'a str,
        capability: &'a str,
    ) -> HostFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_capabilities() {
        let s = Session::new("alex").with_capability("backup.bypass");
        assert!(s.has_capability("backup.bypass"));
        assert!(!s.has_capability("backup.notify"));
    }
}
