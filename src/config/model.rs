// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::SelectionMode;

/// Configuration exactly as read from `Backup.toml`, before validation.
///
/// ```toml
/// [backup]
/// path = "backups"
/// zip = true
///
/// [schedule]
/// interval = "15m"
///
/// [extensions]
/// mode = "allow"
/// names = ["WorldEdit"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub backup: BackupSection,

    #[serde(default)]
    pub schedule: ScheduleSection,

    #[serde(default)]
    pub extensions: ExtensionsSection,

    #[serde(default)]
    pub notify: NotifySection,

    /// Overrides for the built-in message catalog, keyed by message name.
    #[serde(default)]
    pub messages: BTreeMap<String, String>,

    #[serde(default)]
    pub host: HostSection,
}

/// Validated configuration. Only obtainable through `ConfigFile::try_from`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub backup: BackupSection,
    pub schedule: ScheduleSection,
    pub extensions: ExtensionsSection,
    pub notify: NotifySection,
    pub messages: BTreeMap<String, String>,
    pub host: HostSection,
    interval: Duration,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, interval: Duration) -> Self {
        Self {
            backup: raw.backup,
            schedule: raw.schedule,
            extensions: raw.extensions,
            notify: raw.notify,
            messages: raw.messages,
            host: raw.host,
            interval,
        }
    }

    /// Parsed `[schedule].interval`.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// `[backup]` section: what to copy and where artifacts go.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupSection {
    /// Root directory of the running server. Everything below it is backed up.
    #[serde(default = "default_server_root")]
    pub server_root: String,

    /// Destination directory for artifacts, relative to `server_root` unless
    /// absolute.
    #[serde(default = "default_backup_path")]
    pub path: String,

    /// Copy into an isolated temp directory first, then zip or promote.
    #[serde(default = "default_true")]
    pub use_temp: bool,

    /// Temp staging directory. Empty means `<path>/temp`.
    #[serde(default)]
    pub temp_folder: String,

    /// Produce `<job>.zip` instead of a plain directory.
    #[serde(default = "default_true")]
    pub zip: bool,

    /// Write the extensions subset as its own artifact under
    /// `<path>/<extensions_dir>/<job>`.
    #[serde(default)]
    pub split_extensions: bool,

    /// Name of the extensions directory below `server_root`.
    #[serde(default = "default_extensions_dir")]
    pub extensions_dir: String,

    /// Host log file that is never copied.
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// chrono strftime format used for job names.
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Keep at most this many artifacts; 0 keeps everything.
    #[serde(default)]
    pub max_backups: usize,
}

fn default_server_root() -> String {
    ".".to_string()
}

fn default_backup_path() -> String {
    "backups".to_string()
}

fn default_extensions_dir() -> String {
    "plugins".to_string()
}

fn default_log_file() -> String {
    "server.log".to_string()
}

fn default_date_format() -> String {
    "%Y%m%d-%H%M%S".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            server_root: default_server_root(),
            path: default_backup_path(),
            use_temp: true,
            temp_folder: String::new(),
            zip: true,
            split_extensions: false,
            extensions_dir: default_extensions_dir(),
            log_file: default_log_file(),
            date_format: default_date_format(),
            max_backups: 0,
        }
    }
}

/// `[schedule]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSection {
    /// Tick interval for scheduled backups (e.g. `"15m"`).
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Initial value of the operator toggle. Manual backups ignore it.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Back up even when nobody is connected.
    #[serde(default)]
    pub empty_server: bool,
}

fn default_interval() -> String {
    "15m".to_string()
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            enabled: true,
            empty_server: false,
        }
    }
}

/// `[extensions]` section: which installed extensions are backed up.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExtensionsSection {
    #[serde(default)]
    pub mode: SelectionMode,

    #[serde(default)]
    pub names: Vec<String>,
}

/// `[notify]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifySection {
    /// Broadcast the start message to everyone instead of only sessions
    /// holding `capability`.
    #[serde(default = "default_true")]
    pub all_sessions: bool,

    #[serde(default = "default_notify_capability")]
    pub capability: String,

    /// Sessions holding this capability do not keep a scheduled backup alive.
    #[serde(default = "default_bypass_capability")]
    pub bypass_capability: String,
}

fn default_notify_capability() -> String {
    "backup.notify".to_string()
}

fn default_bypass_capability() -> String {
    "backup.bypass".to_string()
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            all_sessions: true,
            capability: default_notify_capability(),
            bypass_capability: default_bypass_capability(),
        }
    }
}

/// `[host]` section: how to reach the running server.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HostSection {
    /// RCON address, e.g. `127.0.0.1:25575`. When unset, `server.properties`
    /// in `server_root` is consulted.
    #[serde(default)]
    pub rcon_address: Option<String>,

    #[serde(default)]
    pub rcon_password: Option<String>,

    /// Capability name -> player names holding it.
    #[serde(default)]
    pub capabilities: BTreeMap<String, Vec<String>>,
}
