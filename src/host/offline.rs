// src/host/offline.rs

//! Host used when the server is not running (or not reachable).
//!
//! There is nobody to notify and nothing to flush, so every operation is a
//! no-op. Notifications are logged instead.

use tracing::info;

use super::{Host, HostFuture, Region, Session};

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineHost;

impl Host for OfflineHost {
    fn sessions(&self) -> HostFuture<'_, Vec<Session>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn save_sessions(&self) -> HostFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn regions(&self) -> HostFuture<'_, Vec<Region>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn set_autosave<'a>(&'a self, _region: &'a Region, _enabled: bool) -> HostFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn force_save<'a>(&'a self, _region: &'a Region) -> HostFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn broadcast<'a>(&'a self, message: &'a str) -> HostFuture<'a, ()> {
        Box::pin(async move {
            info!(message, "broadcast (offline)");
            Ok(())
        })
    }

    fn notify_with_capability<'a>(
        &'a self,
        message: &'a str,
        capability: &'a str,
    ) -> HostFuture<'a, ()> {
        Box::pin(async move {
            info!(message, capability, "notification (offline)");
            Ok(())
        })
    }
}
