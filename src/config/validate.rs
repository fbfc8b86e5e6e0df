// src/config/validate.rs

use std::path::{Component, Path};

use chrono::format::{Item, StrftimeItems};
use tracing::warn;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::resolved::BackupConfiguration;
use crate::errors::{BackupError, Result};
use crate::path_utils::{is_within, same_path};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BackupError;

    fn try_from(mut raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        normalize_names(&mut raw);
        let interval = validate_raw_config(&raw)?;
        let cfg = ConfigFile::new_unchecked(raw, interval);
        validate_layout(&cfg)?;
        Ok(cfg)
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<std::time::Duration> {
    validate_backup_path(cfg)?;
    validate_extensions_dir(cfg)?;
    validate_date_format(cfg)?;
    warn_on_ignored_settings(cfg);
    validate_interval(cfg)
}

/// Drop blank entries from `[extensions].names` so `names = [""]` behaves
/// like an empty list.
fn normalize_names(cfg: &mut RawConfigFile) {
    cfg.extensions.names = cfg
        .extensions
        .names
        .iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
}

fn validate_backup_path(cfg: &RawConfigFile) -> Result<()> {
    if cfg.backup.path.trim().is_empty() {
        return Err(BackupError::ConfigError(
            "[backup].path must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_extensions_dir(cfg: &RawConfigFile) -> Result<()> {
    let dir = Path::new(&cfg.backup.extensions_dir);
    let mut components = dir.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(BackupError::ConfigError(format!(
            "[backup].extensions_dir must be a single directory name (got '{}')",
            cfg.backup.extensions_dir
        ))),
    }
}

fn validate_date_format(cfg: &RawConfigFile) -> Result<()> {
    let fmt = &cfg.backup.date_format;
    if fmt.trim().is_empty() {
        return Err(BackupError::ConfigError(
            "[backup].date_format must not be empty".to_string(),
        ));
    }
    if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return Err(BackupError::ConfigError(format!(
            "[backup].date_format '{}' is not a valid strftime format",
            fmt
        )));
    }
    // Job names become file names.
    let sample = chrono::Local::now().format(fmt).to_string();
    if sample.contains('/') || sample.contains('\\') {
        return Err(BackupError::ConfigError(format!(
            "[backup].date_format '{}' produces path separators",
            fmt
        )));
    }
    Ok(())
}

fn validate_interval(cfg: &RawConfigFile) -> Result<std::time::Duration> {
    let interval = parse_duration(&cfg.schedule.interval)
        .map_err(|e| BackupError::ConfigError(format!("[schedule].interval: {e}")))?;
    if interval.is_zero() {
        return Err(BackupError::ConfigError(
            "[schedule].interval must be greater than zero".to_string(),
        ));
    }
    Ok(interval)
}

fn warn_on_ignored_settings(cfg: &RawConfigFile) {
    if cfg.backup.zip && !cfg.backup.use_temp {
        warn!("[backup].zip has no effect without use_temp; artifacts stay plain directories");
    }
}

/// Staging and destination must not overlap, and neither may swallow the
/// server tree (retention deletes from the backup root, a finished stage
/// is removed).
fn validate_layout(cfg: &ConfigFile) -> Result<()> {
    let resolved = BackupConfiguration::from_config(cfg);
    let server_root = resolved.server_root();

    if is_within(server_root, resolved.backup_root()) {
        return Err(BackupError::ConfigError(format!(
            "[backup].path resolves to {}, which contains the server root {}",
            resolved.backup_root().display(),
            server_root.display()
        )));
    }

    if let Some(temp) = resolved.temp_root() {
        if same_path(temp, resolved.backup_root()) {
            return Err(BackupError::ConfigError(format!(
                "[backup].temp_folder resolves to the backup destination {}",
                temp.display()
            )));
        }
        if is_within(server_root, temp) {
            return Err(BackupError::ConfigError(format!(
                "[backup].temp_folder resolves to {}, which contains the server root {}",
                temp.display(),
                server_root.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(cfg.interval(), std::time::Duration::from_secs(900));
    }

    #[test]
    fn temp_folder_equal_to_backup_path_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.backup.temp_folder = "./backups/".to_string();
        match ConfigFile::try_from(raw) {
            Err(BackupError::ConfigError(msg)) => assert!(msg.contains("temp_folder")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn backup_path_covering_the_server_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for path in [".", "./", ".."] {
            let mut raw = RawConfigFile::default();
            raw.backup.server_root = dir.path().join("server").to_string_lossy().into_owned();
            raw.backup.path = path.to_string();
            match ConfigFile::try_from(raw) {
                Err(BackupError::ConfigError(msg)) => assert!(msg.contains("server root"), "{msg}"),
                other => panic!("expected ConfigError for path {path:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn temp_folder_covering_the_server_root_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.backup.temp_folder = ".".to_string();
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(BackupError::ConfigError(_))
        ));
    }

    #[test]
    fn absolute_backup_path_elsewhere_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let mut raw = RawConfigFile::default();
        raw.backup.server_root = dir.path().join("server").to_string_lossy().into_owned();
        raw.backup.path = dir.path().join("archive").to_string_lossy().into_owned();
        assert!(ConfigFile::try_from(raw).is_ok());
    }

    #[test]
    fn nested_extensions_dir_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.backup.extensions_dir = "mods/plugins".to_string();
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(BackupError::ConfigError(_))
        ));
    }

    #[test]
    fn date_format_with_separator_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.backup.date_format = "%Y/%m/%d".to_string();
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(BackupError::ConfigError(_))
        ));
    }

    #[test]
    fn blank_extension_names_are_dropped() {
        let mut raw = RawConfigFile::default();
        raw.extensions.names = vec!["".to_string(), " A ".to_string()];
        let cfg = ConfigFile::try_from(raw).unwrap();
        assert_eq!(cfg.extensions.names, vec!["A".to_string()]);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.schedule.interval = "0s".to_string();
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(BackupError::ConfigError(_))
        ));
    }
}
