// src/exec/mod.rs

//! Job execution layer.
//!
//! The runtime hands a [`crate::backup::BackupJob`] and its run permit to an
//! [`ExecutorBackend`]. The production backend runs the job on Tokio's
//! blocking pool and reports back via `RuntimeEvent::JobFinished`; tests
//! swap in a fake backend.

pub mod backend;

pub use backend::{ExecutorBackend, RealExecutorBackend, panic_message};
