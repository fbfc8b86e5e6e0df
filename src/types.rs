use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// How `[extensions].names` is applied to the extensions directory.
///
/// - `Allow`: only entries whose relative path contains one of the names are
///   backed up.
/// - `Deny`: entries whose relative path contains one of the names are
///   skipped (default).
///
/// An empty name list always means "everything", whatever the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    Allow,
    #[default]
    Deny,
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(SelectionMode::Allow),
            "deny" => Ok(SelectionMode::Deny),
            other => Err(format!(
                "invalid extensions mode: {other} (expected \"allow\" or \"deny\")"
            )),
        }
    }
}

/// Parse a duration string like `"500ms"`, `"30s"`, `"15m"` or `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("15m"), Ok(Duration::from_secs(900)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
    }

    #[test]
    fn rejects_missing_or_unknown_units() {
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("3d").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn selection_mode_from_str() {
        assert_eq!("Allow".parse::<SelectionMode>(), Ok(SelectionMode::Allow));
        assert_eq!(" deny".parse::<SelectionMode>(), Ok(SelectionMode::Deny));
        assert!("both".parse::<SelectionMode>().is_err());
    }

    #[test]
    fn selection_mode_defaults_to_deny() {
        assert_eq!(SelectionMode::default(), SelectionMode::Deny);
    }
}
