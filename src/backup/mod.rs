// src/backup/mod.rs

//! The backup executor: filters, staging primitives, artifact layout, the two
//! strategies and retention.
//!
//! Nothing in here knows about the host or the scheduler. A job is run with
//! [`run_job`] on a blocking worker and reports back through a [`JobReport`].

pub mod filter;
pub mod layout;
pub mod retention;
pub mod staging;
pub mod strategy;

pub use filter::{ExclusionFilter, IncludeAll, PathFilter};
pub use layout::{ArtifactPlan, Finalize, JobLayout, unique_job_name};
pub use retention::{Artifact, list_backups, list_extension_backups, prune};
pub use staging::CopyStats;
pub use strategy::{BackupJob, JobReport, Strategy, StrategyOutcome, finalize, run_job};
