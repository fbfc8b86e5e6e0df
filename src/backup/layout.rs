// src/backup/layout.rs

//! Where a job stages its copies and where the finished artifacts end up.
//!
//! Both strategies go through [`ArtifactPlan`]; they only differ in the
//! source root, the filter and the plan they are handed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

use crate::config::BackupConfiguration;
use crate::path_utils::same_path;

/// Archive extension used for compressed artifacts.
pub const ARCHIVE_EXT: &str = "zip";

/// What happens to a staged directory once copying is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalize {
    /// The staged directory already is the artifact (no temp staging).
    InPlace,
    /// Rename the staged directory to this path.
    Promote(PathBuf),
    /// Zip the staged directory to this path, then delete the stage.
    Compress(PathBuf),
    /// Staged inside another plan's directory; finalised together with it.
    Nested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPlan {
    pub stage: PathBuf,
    pub finalize: Finalize,
}

impl ArtifactPlan {
    /// Final location of the artifact this plan produces on its own.
    pub fn artifact_path(&self) -> Option<&Path> {
        match &self.finalize {
            Finalize::InPlace => Some(&self.stage),
            Finalize::Promote(p) | Finalize::Compress(p) => Some(p),
            Finalize::Nested => None,
        }
    }

    /// True when staging and the final destination are distinct paths (or
    /// when there is no separate destination at all).
    pub fn is_isolated(&self) -> bool {
        match &self.finalize {
            Finalize::Promote(p) | Finalize::Compress(p) => !same_path(p, &self.stage),
            Finalize::InPlace | Finalize::Nested => true,
        }
    }
}

/// Resolved plans for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    pub full_tree: ArtifactPlan,
    pub extensions: ArtifactPlan,
}

impl JobLayout {
    pub fn new(cfg: &BackupConfiguration, job_name: &str) -> Self {
        let full_tree = plan_under(cfg, cfg.backup_root(), cfg.temp_root(), job_name);

        let extensions = if cfg.split_extensions() {
            let dest_base = cfg.backup_root().join(cfg.extensions_dir());
            let temp_base = cfg.temp_root().map(|t| t.join(cfg.extensions_dir()));
            plan_under(cfg, &dest_base, temp_base.as_deref(), job_name)
        } else {
            ArtifactPlan {
                stage: full_tree.stage.join(cfg.extensions_dir()),
                finalize: Finalize::Nested,
            }
        };

        Self {
            full_tree,
            extensions,
        }
    }
}

fn plan_under(
    cfg: &BackupConfiguration,
    dest_base: &Path,
    temp_base: Option<&Path>,
    job_name: &str,
) -> ArtifactPlan {
    match temp_base {
        Some(temp) => {
            let stage = temp.join(job_name);
            let finalize = if cfg.compress() {
                Finalize::Compress(dest_base.join(format!("{job_name}.{ARCHIVE_EXT}")))
            } else {
                Finalize::Promote(dest_base.join(job_name))
            };
            ArtifactPlan { stage, finalize }
        }
        None => ArtifactPlan {
            stage: dest_base.join(job_name),
            finalize: Finalize::InPlace,
        },
    }
}

/// Timestamp-derived job name that does not clash with anything already in
/// the backup or temp directories.
pub fn unique_job_name<Tz>(cfg: &BackupConfiguration, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let base = now.format(cfg.date_format()).to_string();
    let mut candidate = base.clone();
    let mut n = 1;
    while name_taken(cfg, &candidate) {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    candidate
}

fn name_taken(cfg: &BackupConfiguration, name: &str) -> bool {
    let layout = JobLayout::new(cfg, name);
    [&layout.full_tree, &layout.extensions].iter().any(|plan| {
        plan.stage.exists() || plan.artifact_path().map(|p| p.exists()).unwrap_or(false)
    })
}
