// src/notify.rs

//! Delivery of multi-line announcements to connected sessions.

use tracing::debug;

use crate::config::NotifySection;
use crate::errors::Result;
use crate::host::Host;

/// Line separator inside catalog messages.
pub const LINE_SEPARATOR: &str = ";;";

/// Split a catalog message into the lines that are delivered one by one.
///
/// Blank lines between two non-blank ones are kept so a message can carry
/// spacing (`"a;;;;b"` is three lines). Trailing blank lines are dropped, and
/// a message with nothing but blanks yields no lines at all.
pub fn split_lines(message: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = message.split(LINE_SEPARATOR).collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notifier {
    all_sessions: bool,
    capability: String,
}

impl Notifier {
    pub fn new(all_sessions: bool, capability: impl Into<String>) -> Self {
        Self {
            all_sessions,
            capability: capability.into(),
        }
    }

    pub fn from_config(section: &NotifySection) -> Self {
        Self::new(section.all_sessions, section.capability.clone())
    }

    /// Deliver each line of `message` in order. Returns the number of lines
    /// sent; an empty message sends nothing.
    pub async fn announce<H: Host + ?Sized>(&self, host: &H, message: &str) -> Result<usize> {
        let lines = split_lines(message);
        for line in &lines {
            if self.all_sessions {
                host.broadcast(line).await?;
            } else {
                host.notify_with_capability(line, &self.capability).await?;
            }
        }
        debug!(lines = lines.len(), all = self.all_sessions, "announcement delivered");
        Ok(lines.len())
    }
}
