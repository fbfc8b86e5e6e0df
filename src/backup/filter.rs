// src/backup/filter.rs

//! Inclusion predicates used by the staging copy.
//!
//! Filters are plain values: they hold their configuration as data and
//! expose a pure `includes` check. The copy primitive only sees the
//! [`PathFilter`] trait, so it does not care which variant it received.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::BackupConfiguration;
use crate::path_utils::relative_to;
use crate::types::SelectionMode;

/// Decides whether a filesystem entry is copied.
///
/// `rel_path` is relative to the root of the copy. Returning `false` for a
/// directory prunes the whole subtree.
pub trait PathFilter: Send + Sync {
    fn includes(&self, rel_path: &Path) -> bool;
}

/// Filter that lets everything through (used for promotion copies).
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAll;

impl PathFilter for IncludeAll {
    fn includes(&self, _rel_path: &Path) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionFilter {
    /// Deny-list used by the full-tree copy.
    ///
    /// `names` are matched against the entry's file name at any depth,
    /// `top_level` against the whole relative path.
    DenyNames {
        names: BTreeSet<String>,
        top_level: BTreeSet<PathBuf>,
    },
    /// Allow/deny by substring membership, used for the extensions subset.
    Selection {
        mode: SelectionMode,
        names: Vec<String>,
    },
}

impl ExclusionFilter {
    /// Filter for the full server tree: never copy the backup directory or
    /// the host log, and leave the extensions directory to the subset copy.
    pub fn full_tree(cfg: &BackupConfiguration) -> Self {
        let mut names = BTreeSet::new();
        if let Some(name) = cfg.backup_root().file_name() {
            names.insert(name.to_string_lossy().into_owned());
        }
        if !cfg.log_file().is_empty() {
            names.insert(cfg.log_file().to_string());
        }

        let mut top_level = BTreeSet::new();
        top_level.insert(PathBuf::from(cfg.extensions_dir()));
        // Staging and destination inside the server tree are never copied,
        // however their paths are spelled in the config.
        let inside = [Some(cfg.backup_root()), cfg.temp_root()]
            .into_iter()
            .flatten()
            .filter_map(|dir| relative_to(cfg.server_root(), dir));
        top_level.extend(inside);

        ExclusionFilter::DenyNames { names, top_level }
    }

    pub fn extensions(cfg: &BackupConfiguration) -> Self {
        ExclusionFilter::Selection {
            mode: cfg.selection_mode(),
            names: cfg.selection_names().to_vec(),
        }
    }
}

impl PathFilter for ExclusionFilter {
    fn includes(&self, rel_path: &Path) -> bool {
        match self {
            ExclusionFilter::DenyNames { names, top_level } => {
                if top_level.iter().any(|p| p.as_path() == rel_path) {
                    return false;
                }
                match rel_path.file_name() {
                    Some(name) => !names.contains(name.to_string_lossy().as_ref()),
                    None => true,
                }
            }
            ExclusionFilter::Selection { mode, names } => {
                if names.is_empty() {
                    return true;
                }
                let id = rel_path.to_string_lossy().replace('\\', "/");
                let listed = names.iter().any(|n| id.contains(n.as_str()));
                match mode {
                    SelectionMode::Allow => listed,
                    SelectionMode::Deny => !listed,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deny(names: &[&str], top: &[&str]) -> ExclusionFilter {
        ExclusionFilter::DenyNames {
            names: names.iter().map(|s| s.to_string()).collect(),
            top_level: top.iter().map(PathBuf::from).collect(),
        }
    }

    fn selection(mode: SelectionMode, names: &[&str]) -> ExclusionFilter {
        ExclusionFilter::Selection {
            mode,
            names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn deny_names_match_at_any_depth() {
        let f = deny(&["backups", "server.log"], &["plugins"]);

        assert!(!f.includes(Path::new("backups")));
        assert!(!f.includes(Path::new("server.log")));
        assert!(!f.includes(Path::new("world/server.log")));
        assert!(!f.includes(Path::new("plugins")));

        assert!(f.includes(Path::new("world/level.dat")));
        assert!(f.includes(Path::new("world/plugins")));
        assert!(f.includes(Path::new("server.log.1")));
    }

    #[test]
    fn allow_mode_keeps_only_listed() {
        let f = selection(SelectionMode::Allow, &["A"]);
        assert!(f.includes(Path::new("A")));
        assert!(f.includes(Path::new("A/config.yml")));
        assert!(f.includes(Path::new("A.jar")));
        assert!(!f.includes(Path::new("B")));
    }

    #[test]
    fn deny_mode_drops_listed() {
        let f = selection(SelectionMode::Deny, &["dynmap"]);
        assert!(!f.includes(Path::new("dynmap")));
        assert!(!f.includes(Path::new("dynmap/tiles/0.png")));
        assert!(f.includes(Path::new("Essentials/config.yml")));
    }

    #[test]
    fn empty_name_list_includes_everything_in_both_modes() {
        for mode in [SelectionMode::Allow, SelectionMode::Deny] {
            let f = selection(mode, &[]);
            assert!(f.includes(Path::new("anything")));
            assert!(f.includes(Path::new("nested/deeper/file.txt")));
        }
    }

    #[test]
    fn absolute_temp_inside_relative_root_is_excluded() {
        use crate::config::{ConfigFile, RawConfigFile};

        let dir = tempfile::tempdir().unwrap();
        let server = dir.path().join("server");
        std::fs::create_dir_all(&server).unwrap();

        let mut raw = RawConfigFile::default();
        // Same directory, spelled the way the default config spells it.
        raw.backup.server_root = server.join(".").to_string_lossy().into_owned();
        raw.backup.temp_folder = server.join("staging").to_string_lossy().into_owned();
        raw.backup.path = server.join("nested/backups").to_string_lossy().into_owned();
        let cfg = BackupConfiguration::from_config(&ConfigFile::try_from(raw).unwrap());

        let f = ExclusionFilter::full_tree(&cfg);
        assert!(!f.includes(Path::new("staging")));
        assert!(!f.includes(Path::new("nested/backups")));
        assert!(f.includes(Path::new("nested")));
        assert!(f.includes(Path::new("world")));
    }

    #[test]
    fn filters_compare_by_value() {
        assert_eq!(
            selection(SelectionMode::Allow, &["A"]),
            selection(SelectionMode::Allow, &["A"])
        );
        assert_ne!(
            selection(SelectionMode::Allow, &["A"]),
            selection(SelectionMode::Deny, &["A"])
        );
    }
}
