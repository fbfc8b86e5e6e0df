// src/backup/strategy.rs

//! The two backup strategies and the job runner that drives them.
//!
//! A strategy only chooses its source root, its filter and its plan from the
//! job layout. Copying and finalising go through the shared primitives in
//! [`crate::backup::staging`].

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{error, info, warn};

use crate::backup::filter::ExclusionFilter;
use crate::backup::layout::{ArtifactPlan, Finalize, JobLayout, unique_job_name};
use crate::backup::retention;
use crate::backup::staging::{CopyStats, copy_tree, promote, remove_tree, touch, zip_dir};
use crate::config::BackupConfiguration;
use crate::engine::TriggerReason;

/// One backup run: a name and the resolved plans for both strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
    pub name: String,
    pub layout: JobLayout,
    pub reason: TriggerReason,
}

impl BackupJob {
    pub fn new(cfg: &BackupConfiguration, reason: TriggerReason) -> Self {
        let name = unique_job_name(cfg, &Local::now());
        Self::with_name(cfg, name, reason)
    }

    pub fn with_name(cfg: &BackupConfiguration, name: String, reason: TriggerReason) -> Self {
        let layout = JobLayout::new(cfg, &name);
        Self {
            name,
            layout,
            reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    FullTree,
    Extensions,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::FullTree => f.write_str("full-tree"),
            Strategy::Extensions => f.write_str("extensions"),
        }
    }
}

impl Strategy {
    pub fn source(&self, cfg: &BackupConfiguration) -> PathBuf {
        match self {
            Strategy::FullTree => cfg.server_root().to_path_buf(),
            Strategy::Extensions => cfg.extensions_root(),
        }
    }

    pub fn filter(&self, cfg: &BackupConfiguration) -> ExclusionFilter {
        match self {
            Strategy::FullTree => ExclusionFilter::full_tree(cfg),
            Strategy::Extensions => ExclusionFilter::extensions(cfg),
        }
    }

    pub fn plan<'a>(&self, layout: &'a JobLayout) -> &'a ArtifactPlan {
        match self {
            Strategy::FullTree => &layout.full_tree,
            Strategy::Extensions => &layout.extensions,
        }
    }

    /// Copy this strategy's source into its staging directory.
    ///
    /// Returns `Ok(None)` when there is nothing to copy (no extensions
    /// directory on this server).
    pub fn stage(&self, cfg: &BackupConfiguration, layout: &JobLayout) -> Result<Option<CopyStats>> {
        let source = self.source(cfg);
        let plan = self.plan(layout);

        if *self == Strategy::Extensions {
            if !source.is_dir() {
                return Ok(None);
            }
            // Lets external tooling watching the directory know it is live.
            if let Err(err) = touch(&source) {
                warn!(error = %err, "could not touch extensions directory");
            }
            let filter = self.filter(cfg);
            if let ExclusionFilter::Selection { mode, names } = &filter {
                if !names.is_empty() {
                    info!(?mode, ?names, "applying extension selection");
                }
            }
            return copy_tree(&source, &plan.stage, &filter).map(Some);
        }

        copy_tree(&source, &plan.stage, &self.filter(cfg)).map(Some)
    }
}

/// Move or compress a staged plan to its final location.
///
/// On a failed archive the staged directory is left untouched.
pub fn finalize(plan: &ArtifactPlan) -> Result<Option<PathBuf>> {
    match &plan.finalize {
        Finalize::InPlace => Ok(Some(plan.stage.clone())),
        Finalize::Promote(dest) => {
            promote(&plan.stage, dest)?;
            Ok(Some(dest.clone()))
        }
        Finalize::Compress(dest) => {
            let size = zip_dir(&plan.stage, dest)
                .with_context(|| format!("archiving {}", plan.stage.display()))?;
            info!(archive = %dest.display(), size, "archive written");
            if let Err(err) = remove_tree(&plan.stage) {
                warn!(error = %err, stage = %plan.stage.display(), "archive written but staging directory not removed");
            }
            Ok(Some(dest.clone()))
        }
        Finalize::Nested => Ok(None),
    }
}

/// Result of one strategy within a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Completed {
        stats: CopyStats,
        artifact: Option<PathBuf>,
    },
    Skipped(String),
    Failed(String),
}

impl StrategyOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StrategyOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job: String,
    pub full_tree: StrategyOutcome,
    pub extensions: StrategyOutcome,
    pub pruned: Vec<PathBuf>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        !self.full_tree.is_failed() && !self.extensions.is_failed()
    }

    /// Every artifact this job produced on its own.
    pub fn artifacts(&self) -> Vec<&Path> {
        [&self.full_tree, &self.extensions]
            .into_iter()
            .filter_map(|o| match o {
                StrategyOutcome::Completed {
                    artifact: Some(p), ..
                } => Some(p.as_path()),
                _ => None,
            })
            .collect()
    }
}

/// Run both strategies for `job`. Blocking; call from the worker context.
///
/// I/O failures are caught here and reported in the [`JobReport`]; nothing
/// propagates to the caller.
pub fn run_job(cfg: &BackupConfiguration, job: &BackupJob) -> JobReport {
    info!(job = %job.name, reason = ?job.reason, "backup job started");

    let full_staged = stage_logged(Strategy::FullTree, cfg, job);

    let ext_staged = if !cfg.split_extensions() && full_staged.is_failed() {
        StrategyOutcome::Skipped("full-tree staging failed".to_string())
    } else {
        stage_logged(Strategy::Extensions, cfg, job)
    };

    let extensions = if cfg.split_extensions() {
        finalize_logged(Strategy::Extensions, &job.layout, ext_staged)
    } else {
        ext_staged
    };

    // A nested extensions copy that failed would leave a partial artifact.
    let full_tree = if !cfg.split_extensions() && extensions.is_failed() {
        error!(
            job = %job.name,
            stage = %job.layout.full_tree.stage.display(),
            "extensions staging failed; full-tree artifact not finalised"
        );
        match full_staged {
            StrategyOutcome::Completed { .. } => {
                StrategyOutcome::Failed("nested extensions staging failed".to_string())
            }
            other => other,
        }
    } else {
        finalize_logged(Strategy::FullTree, &job.layout, full_staged)
    };

    let mut report = JobReport {
        job: job.name.clone(),
        full_tree,
        extensions,
        pruned: Vec::new(),
    };

    if report.succeeded() {
        match retention::prune(cfg) {
            Ok(pruned) => report.pruned = pruned,
            Err(err) => warn!(job = %job.name, error = %format!("{err:#}"), "pruning old backups failed"),
        }
        info!(job = %job.name, artifacts = ?report.artifacts(), "backup job finished");
    } else {
        error!(job = %job.name, ?report, "backup job failed");
    }

    report
}

fn stage_logged(strategy: Strategy, cfg: &BackupConfiguration, job: &BackupJob) -> StrategyOutcome {
    match strategy.stage(cfg, &job.layout) {
        Ok(Some(stats)) => {
            info!(
                job = %job.name,
                %strategy,
                files = stats.files,
                bytes = stats.bytes,
                "staging complete"
            );
            StrategyOutcome::Completed {
                stats,
                artifact: None,
            }
        }
        Ok(None) => {
            info!(job = %job.name, %strategy, "nothing to stage");
            StrategyOutcome::Skipped(format!(
                "{} does not exist",
                strategy.source(cfg).display()
            ))
        }
        Err(err) => {
            error!(job = %job.name, %strategy, error = %format!("{err:#}"), "staging failed");
            StrategyOutcome::Failed(format!("{err:#}"))
        }
    }
}

fn finalize_logged(strategy: Strategy, layout: &JobLayout, staged: StrategyOutcome) -> StrategyOutcome {
    let stats = match staged {
        StrategyOutcome::Completed { stats, .. } => stats,
        other => return other,
    };
    let plan = strategy.plan(layout);
    match finalize(plan) {
        Ok(artifact) => StrategyOutcome::Completed { stats, artifact },
        Err(err) => {
            error!(
                %strategy,
                stage = %plan.stage.display(),
                error = %format!("{err:#}"),
                "finalising failed; staged copy kept"
            );
            StrategyOutcome::Failed(format!("{err:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFile, RawConfigFile};
    use std::fs;
    use tempfile::tempdir;

    fn cfg_for(root: &Path, edit: impl FnOnce(&mut RawConfigFile)) -> BackupConfiguration {
        let mut raw = RawConfigFile::default();
        raw.backup.server_root = root.to_string_lossy().into_owned();
        edit(&mut raw);
        BackupConfiguration::from_config(&ConfigFile::try_from(raw).unwrap())
    }

    fn server_tree(root: &Path) {
        fs::create_dir_all(root.join("world/region")).unwrap();
        fs::write(root.join("world/level.dat"), "level").unwrap();
        fs::write(root.join("server.log"), "log").unwrap();
        fs::create_dir_all(root.join("plugins/A")).unwrap();
        fs::write(root.join("plugins/A/config.yml"), "a").unwrap();
    }

    #[test]
    fn uncompressed_run_promotes_stage() {
        let dir = tempdir().unwrap();
        server_tree(dir.path());
        let cfg = cfg_for(dir.path(), |raw| raw.backup.zip = false);
        let job = BackupJob::with_name(&cfg, "job".to_string(), TriggerReason::Manual);

        let report = run_job(&cfg, &job);

        assert!(report.succeeded(), "{report:?}");
        let out = cfg.backup_root().join("job");
        assert!(out.join("world/level.dat").is_file());
        assert!(out.join("plugins/A/config.yml").is_file());
        assert!(!out.join("server.log").exists());
        assert!(!cfg.temp_root().unwrap().join("job").exists());
    }

    #[test]
    fn missing_extensions_dir_is_skipped_not_failed() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("server.properties"), "motd=hi").unwrap();
        let cfg = cfg_for(dir.path(), |raw| raw.backup.zip = false);
        let job = BackupJob::with_name(&cfg, "job".to_string(), TriggerReason::Scheduled);

        let report = run_job(&cfg, &job);

        assert!(report.succeeded());
        assert!(matches!(report.extensions, StrategyOutcome::Skipped(_)));
    }

    #[test]
    fn failed_archive_keeps_staging_directory() {
        let dir = tempdir().unwrap();
        server_tree(dir.path());
        let cfg = cfg_for(dir.path(), |_| {});
        // Occupy the archive path so compression fails.
        fs::create_dir_all(cfg.backup_root()).unwrap();
        fs::write(cfg.backup_root().join("job.zip"), "taken").unwrap();
        let job = BackupJob::with_name(&cfg, "job".to_string(), TriggerReason::Manual);

        let report = run_job(&cfg, &job);

        assert!(report.full_tree.is_failed());
        assert!(job.layout.full_tree.stage.join("world/level.dat").is_file());
        assert_eq!(
            fs::read_to_string(cfg.backup_root().join("job.zip")).unwrap(),
            "taken"
        );
    }

    #[test]
    fn missing_server_root_fails_job_and_skips_nested_extensions() {
        let dir = tempdir().unwrap();
        let cfg = cfg_for(&dir.path().join("gone"), |_| {});
        let job = BackupJob::with_name(&cfg, "job".to_string(), TriggerReason::Manual);

        let report = run_job(&cfg, &job);

        assert!(report.full_tree.is_failed());
        assert!(matches!(report.extensions, StrategyOutcome::Skipped(_)));
        assert!(!report.succeeded());
    }
}
