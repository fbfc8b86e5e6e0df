// src/config/resolved.rs

//! Paths and policies derived from a validated [`ConfigFile`].
//!
//! Everything the executor needs is resolved once here so that the staging
//! code never has to look at raw strings again.

use std::path::{Path, PathBuf};

use crate::config::model::ConfigFile;
use crate::types::SelectionMode;

/// Immutable per-engine backup configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfiguration {
    server_root: PathBuf,
    backup_root: PathBuf,
    temp_root: Option<PathBuf>,
    compress: bool,
    split_extensions: bool,
    extensions_dir: String,
    log_file: String,
    selection_mode: SelectionMode,
    selection_names: Vec<String>,
    date_format: String,
    max_backups: usize,
}

impl BackupConfiguration {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let b = &cfg.backup;
        let server_root = PathBuf::from(&b.server_root);
        let backup_root = resolve_under(&server_root, &b.path);

        let temp_root = if b.use_temp {
            if b.temp_folder.trim().is_empty() {
                Some(backup_root.join("temp"))
            } else {
                Some(resolve_under(&server_root, &b.temp_folder))
            }
        } else {
            None
        };

        Self {
            server_root,
            backup_root,
            temp_root,
            // Compression only applies to a staged copy.
            compress: b.zip && b.use_temp,
            split_extensions: b.split_extensions,
            extensions_dir: b.extensions_dir.clone(),
            log_file: b.log_file.clone(),
            selection_mode: cfg.extensions.mode,
            selection_names: cfg.extensions.names.clone(),
            date_format: b.date_format.clone(),
            max_backups: b.max_backups,
        }
    }

    pub fn server_root(&self) -> &Path {
        &self.server_root
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// `None` when temp staging is disabled.
    pub fn temp_root(&self) -> Option<&Path> {
        self.temp_root.as_deref()
    }

    pub fn use_temp(&self) -> bool {
        self.temp_root.is_some()
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    pub fn split_extensions(&self) -> bool {
        self.split_extensions
    }

    pub fn extensions_dir(&self) -> &str {
        &self.extensions_dir
    }

    pub fn extensions_root(&self) -> PathBuf {
        self.server_root.join(&self.extensions_dir)
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.selection_mode
    }

    pub fn selection_names(&self) -> &[String] {
        &self.selection_names
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }
}

fn resolve_under(root: &Path, value: &str) -> PathBuf {
    let p = Path::new(value);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}
