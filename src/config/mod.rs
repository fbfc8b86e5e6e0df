// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it (`validate.rs`).
//! - Resolve paths and policies for the executor (`resolved.rs`).

pub mod loader;
pub mod model;
pub mod resolved;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    BackupSection, ConfigFile, ExtensionsSection, HostSection, NotifySection, RawConfigFile,
    ScheduleSection,
};
pub use resolved::BackupConfiguration;
