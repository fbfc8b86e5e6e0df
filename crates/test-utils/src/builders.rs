#![allow(dead_code)]

use std::path::Path;

use world_backup::config::{BackupConfiguration, ConfigFile, RawConfigFile};
use world_backup::types::SelectionMode;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn server_root(mut self, root: &Path) -> Self {
        self.config.backup.server_root = root.to_string_lossy().into_owned();
        self
    }

    pub fn backup_path(mut self, path: &str) -> Self {
        self.config.backup.path = path.to_string();
        self
    }

    pub fn use_temp(mut self, val: bool) -> Self {
        self.config.backup.use_temp = val;
        self
    }

    pub fn temp_folder(mut self, path: &str) -> Self {
        self.config.backup.temp_folder = path.to_string();
        self
    }

    pub fn zip(mut self, val: bool) -> Self {
        self.config.backup.zip = val;
        self
    }

    pub fn split_extensions(mut self, val: bool) -> Self {
        self.config.backup.split_extensions = val;
        self
    }

    pub fn max_backups(mut self, n: usize) -> Self {
        self.config.backup.max_backups = n;
        self
    }

    pub fn date_format(mut self, fmt: &str) -> Self {
        self.config.backup.date_format = fmt.to_string();
        self
    }

    pub fn extensions(mut self, mode: SelectionMode, names: &[&str]) -> Self {
        self.config.extensions.mode = mode;
        self.config.extensions.names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn enabled(mut self, val: bool) -> Self {
        self.config.schedule.enabled = val;
        self
    }

    pub fn empty_server(mut self, val: bool) -> Self {
        self.config.schedule.empty_server = val;
        self
    }

    pub fn notify_all(mut self, val: bool) -> Self {
        self.config.notify.all_sessions = val;
        self
    }

    pub fn message(mut self, key: &str, value: &str) -> Self {
        self.config
            .messages
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    pub fn resolve(self) -> BackupConfiguration {
        BackupConfiguration::from_config(&self.build())
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
