// src/backup/staging.rs

//! Filesystem primitives shared by both backup strategies: filtered
//! recursive copy, promotion of a staged directory, zip compression and
//! deletion.
//!
//! Everything here is blocking and is meant to run on the worker context
//! (`spawn_blocking`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::backup::filter::{IncludeAll, PathFilter};

/// Counters reported by [`copy_tree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: u64,
    pub dirs: u64,
    pub bytes: u64,
}

/// Recursively copy `src` into `dst`, consulting `filter` for every entry.
///
/// Excluded directories are pruned and never descended into. The
/// destination itself is skipped if it happens to live inside `src`.
/// Files that disappear between listing and copying are skipped, since the
/// source tree belongs to a running server.
///
/// Symbolic links are followed and their targets copied as regular entries.
/// A link that points back at one of its own ancestors is skipped.
pub fn copy_tree(src: &Path, dst: &Path, filter: &dyn PathFilter) -> Result<CopyStats> {
    if !src.is_dir() {
        bail!("source directory {} does not exist", src.display());
    }
    fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;
    let dst_canon =
        fs::canonicalize(dst).with_context(|| format!("canonicalizing {}", dst.display()))?;

    let mut stats = CopyStats::default();

    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let Ok(rel) = entry.path().strip_prefix(src) else {
                return false;
            };
            if !filter.includes(rel) {
                debug!(path = %rel.display(), "excluded from backup");
                return false;
            }
            !(entry.file_type().is_dir() && is_same_dir(entry.path(), &dst_canon))
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) if is_not_found(&err) => {
                debug!(error = %err, "entry vanished during copy; skipping");
                continue;
            }
            Err(err) if err.loop_ancestor().is_some() => {
                warn!(error = %err, "symlink loop in server tree; skipping");
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("walking {}", src.display()));
            }
        };

        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("relativizing {}", entry.path().display()))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("creating {}", target.display()))?;
            stats.dirs += 1;
        } else if file_type.is_file() {
            match fs::copy(entry.path(), &target) {
                Ok(bytes) => {
                    stats.files += 1;
                    stats.bytes += bytes;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %rel.display(), "file vanished during copy; skipping");
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!(
                            "copying {} to {}",
                            entry.path().display(),
                            target.display()
                        )
                    });
                }
            }
        } else {
            warn!(path = %rel.display(), "skipping special file");
        }
    }

    Ok(stats)
}

fn is_same_dir(path: &Path, canon: &Path) -> bool {
    fs::canonicalize(path)
        .map(|p| p == canon)
        .unwrap_or(false)
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|e| e.kind() == io::ErrorKind::NotFound)
        .unwrap_or(false)
}

/// Delete a directory tree. Missing directories are not an error.
pub fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("removing {}", path.display())),
    }
}

/// Move a staged directory to its final location.
///
/// Uses a rename and falls back to copy + delete when the two paths live on
/// different filesystems.
pub fn promote(stage: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        bail!("destination {} already exists", dest.display());
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }

    match fs::rename(stage, dest) {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!(
                error = %err,
                stage = %stage.display(),
                dest = %dest.display(),
                "rename failed; falling back to copy"
            );
            if let Err(copy_err) = copy_tree(stage, dest, &IncludeAll) {
                // Leave the stage untouched; only the half-written copy goes.
                if let Err(cleanup) = remove_tree(dest) {
                    warn!(error = %cleanup, dest = %dest.display(), "failed to remove partial copy");
                }
                return Err(copy_err);
            }
            remove_tree(stage)
        }
    }
}

/// Path of the in-progress file used while writing `dest`.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Compress the directory `src` into the zip file `dest`.
///
/// The archive is written to `<dest>.part` and renamed into place only after
/// it was finished successfully. `src` is never modified.
pub fn zip_dir(src: &Path, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    if dest.exists() {
        bail!("archive {} already exists", dest.display());
    }

    let part = part_path(dest);
    if let Err(err) = write_zip(src, &part) {
        if let Err(cleanup) = fs::remove_file(&part) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!(error = %cleanup, part = %part.display(), "failed to remove partial archive");
            }
        }
        return Err(err);
    }

    fs::rename(&part, dest)
        .with_context(|| format!("renaming {} to {}", part.display(), dest.display()))?;
    let size = fs::metadata(dest)
        .with_context(|| format!("reading metadata of {}", dest.display()))?
        .len();
    Ok(size)
}

fn write_zip(src: &Path, part: &Path) -> Result<()> {
    let file =
        fs::File::create(part).with_context(|| format!("creating {}", part.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("relativizing {}", entry.path().display()))?;
        let name = rel.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)
                .with_context(|| format!("adding directory {name}"))?;
        } else if entry.file_type().is_file() {
            zip.start_file(name.as_str(), options)
                .with_context(|| format!("adding file {name}"))?;
            let mut input = fs::File::open(entry.path())
                .with_context(|| format!("opening {}", entry.path().display()))?;
            io::copy(&mut input, &mut zip).with_context(|| format!("compressing {name}"))?;
        }
    }

    zip.finish()
        .with_context(|| format!("finalizing {}", part.display()))?;
    Ok(())
}

/// Update the modification time of `path` to now.
pub fn touch(path: &Path) -> Result<()> {
    filetime::set_file_mtime(path, filetime::FileTime::now())
        .with_context(|| format!("touching {}", path.display()))
}
