// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Anchors a relative `server_root` to the directory holding the file, so
///   validation sees the same paths the engine will use.
/// - Checks durations, date formats, directory names and that staging and
///   destination neither coincide nor contain the server tree.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw_config = load_from_path(path)?;
    anchor_server_root(&mut raw_config, path);
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// A relative `server_root` is taken relative to the config file.
fn anchor_server_root(raw: &mut RawConfigFile, config_path: &Path) {
    let root = Path::new(&raw.backup.server_root);
    if root.is_absolute() {
        return;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    raw.backup.server_root = base.join(root).to_string_lossy().into_owned();
}

/// Default config location: `Backup.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Backup.toml")
}
