// src/messages.rs

//! Keyed message catalog with `{0}`-style placeholders.
//!
//! A message may span several lines; lines are separated by `;;` and split
//! by [`crate::notify`] at delivery time.

use std::collections::BTreeMap;

/// Built-in messages. `[messages]` in the config overrides any of them.
const DEFAULTS: &[(&str, &str)] = &[
    ("backupstarted", "Starting backup...;;The server may lag for a moment."),
    ("backupfinished", "Backup {0} finished."),
    ("backupfailed", "Backup {0} failed, check the log."),
    ("backupinprogress", "A backup is already running."),
    ("backupoff", "Scheduled backups are disabled; skipping."),
    ("abortedbackup", "Nobody is online; skipping backup."),
    ("skipbackupbypass", "Every online player bypasses backups; skipping."),
    ("lockunavailable", "Could not lock the backup folder; skipping backup."),
    ("lastbackup", "Running final backup before shutdown."),
    ("backuptoggleon", "Scheduled backups enabled."),
    ("backuptoggleoff", "Scheduled backups disabled."),
    ("errorfolderempty", "No backups found in {0}."),
    ("listheader", "Backups in {0}:"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
    catalog: BTreeMap<String, String>,
}

impl Default for Messages {
    fn default() -> Self {
        Self::with_overrides(&BTreeMap::new())
    }
}

impl Messages {
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut catalog: BTreeMap<String, String> = DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (key, value) in overrides {
            catalog.insert(key.to_lowercase(), value.clone());
        }
        Self { catalog }
    }

    /// Look up `key` and substitute `{0}`, `{1}`, ... with `args`.
    ///
    /// Unknown keys yield the key itself so a missing entry is visible rather
    /// than silent.
    pub fn get(&self, key: &str, args: &[&str]) -> String {
        let Some(template) = self.catalog.get(key) else {
            return key.to_string();
        };
        args.iter()
            .enumerate()
            .fold(template.clone(), |acc, (i, arg)| {
                acc.replace(&format!("{{{i}}}"), arg)
            })
    }
}
