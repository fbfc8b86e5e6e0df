// src/backup/retention.rs

//! Listing finished artifacts and pruning old ones (`max_backups`).
//!
//! Only entries named like a job (`date_format`, optionally followed by a
//! `-N` collision suffix, optionally `.zip`) count as artifacts. Anything
//! else found in the backup root is left alone.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::format::{Parsed, StrftimeItems, parse};
use tracing::{debug, info, warn};

use crate::backup::layout::ARCHIVE_EXT;
use crate::backup::staging::remove_tree;
use crate::config::BackupConfiguration;

/// A finished backup found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub modified: SystemTime,
    pub is_dir: bool,
}

/// Artifacts directly under the backup root, oldest first.
pub fn list_backups(cfg: &BackupConfiguration) -> Result<Vec<Artifact>> {
    list_artifacts(cfg.backup_root(), &container_names(cfg), cfg.date_format())
}

/// Split extension artifacts, oldest first. Empty when splitting is off.
pub fn list_extension_backups(cfg: &BackupConfiguration) -> Result<Vec<Artifact>> {
    if !cfg.split_extensions() {
        return Ok(Vec::new());
    }
    list_artifacts(
        &cfg.backup_root().join(cfg.extensions_dir()),
        &[],
        cfg.date_format(),
    )
}

/// Whether `name` looks like something [`crate::backup::unique_job_name`]
/// produced for `date_format`, as a directory or an archive.
pub fn is_job_name(name: &str, date_format: &str) -> bool {
    let stem = name
        .strip_suffix(ARCHIVE_EXT)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(name);
    if matches_format(stem, date_format) {
        return true;
    }
    match stem.rsplit_once('-') {
        Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
            matches_format(base, date_format)
        }
        _ => false,
    }
}

// `parse` only checks the text against the format; it does not need a
// complete date.
fn matches_format(s: &str, date_format: &str) -> bool {
    let mut parsed = Parsed::new();
    parse(&mut parsed, s, StrftimeItems::new(date_format)).is_ok()
}

/// Delete the oldest artifacts beyond `max_backups`. Returns what was removed.
pub fn prune(cfg: &BackupConfiguration) -> Result<Vec<PathBuf>> {
    let keep = cfg.max_backups();
    if keep == 0 {
        return Ok(Vec::new());
    }

    let mut removed = prune_list(list_backups(cfg)?, keep)?;
    removed.extend(prune_list(list_extension_backups(cfg)?, keep)?);
    Ok(removed)
}

fn prune_list(artifacts: Vec<Artifact>, keep: usize) -> Result<Vec<PathBuf>> {
    let excess = artifacts.len().saturating_sub(keep);
    let mut removed = Vec::with_capacity(excess);

    for artifact in artifacts.into_iter().take(excess) {
        if artifact.is_dir {
            remove_tree(&artifact.path)?;
        } else {
            fs::remove_file(&artifact.path)
                .with_context(|| format!("removing {}", artifact.path.display()))?;
        }
        info!(artifact = %artifact.path.display(), "pruned old backup");
        removed.push(artifact.path);
    }

    Ok(removed)
}

/// Directory names under the backup root that hold other things than
/// artifacts (temp staging, split extension artifacts).
fn container_names(cfg: &BackupConfiguration) -> Vec<OsString> {
    let mut names = vec![OsString::from(cfg.extensions_dir())];
    if let Some(temp) = cfg.temp_root() {
        if temp.parent() == Some(cfg.backup_root()) {
            if let Some(name) = temp.file_name() {
                names.push(name.to_os_string());
            }
        }
    }
    names
}

fn list_artifacts(dir: &Path, skip: &[OsString], date_format: &str) -> Result<Vec<Artifact>> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("reading {}", dir.display())),
    };

    let mut artifacts = Vec::new();
    for entry in read {
        let entry = entry.with_context(|| format!("reading {}", dir.display()))?;
        let file_name = entry.file_name();
        if skip.contains(&file_name) {
            continue;
        }
        let name = file_name.to_string_lossy().into_owned();
        if !is_job_name(&name, date_format) {
            debug!(entry = %name, "not a backup artifact; ignoring");
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                warn!(error = %err, entry = %name, "skipping unreadable backup entry");
                continue;
            }
        };
        artifacts.push(Artifact {
            name,
            path: entry.path(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            is_dir: metadata.is_dir(),
        });
    }

    artifacts.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(artifacts)
}
