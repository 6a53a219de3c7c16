//! Service configuration.
//!
//! Values come, in increasing priority, from the defaults, an optional JSON
//! file given with `--config`, and environment variables:
//!
//! ```json
//! { "log": { "level": "info", "target": "syslog" }, "poll_interval_ms": 500 }
//! ```
//!
//! | Variable             | Overrides     |
//! |----------------------|---------------|
//! | `HOTLINE_LOG`        | `log.level`   |
//! | `HOTLINE_LOG_TARGET` | `log.target`  |

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::POLL_INTERVAL;

/// Where log records go.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// The system log (`syslog(3)`).
    #[default]
    Syslog,
    /// Standard error, through `env_logger`.
    Stderr,
}

impl FromStr for LogTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "syslog" => Ok(Self::Syslog),
            "stderr" => Ok(Self::Stderr),
            other => anyhow::bail!("unknown log target {other:?} (expected syslog or stderr)"),
        }
    }
}

/// Logging settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Maximum level: `error`, `warn`, `info`, `debug`, `trace` or `off`.
    pub level: String,
    /// Sink for records.
    pub target: LogTarget,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            target: LogTarget::Syslog,
        }
    }
}

impl LogConfig {
    /// Parsed level; an unrecognised level falls back to `info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        log::LevelFilter::from_str(self.level.trim()).unwrap_or(log::LevelFilter::Info)
    }
}

/// Settings shared by every channel service binary.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Logging settings.
    pub log: LogConfig,
    /// Readiness wait of the service loop, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl ServiceConfig {
    /// Load from `path` if given, then apply environment overrides.
    ///
    /// A missing or malformed file given explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Apply `HOTLINE_LOG` and `HOTLINE_LOG_TARGET`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("HOTLINE_LOG") {
            self.log.level = level;
        }

        if let Some(target) = lookup("HOTLINE_LOG_TARGET") {
            match target.parse() {
                Ok(target) => self.log.target = target,
                Err(e) => eprintln!("Warning: ignoring HOTLINE_LOG_TARGET: {e}"),
            }
        }
    }

    /// Readiness wait as a duration; zero is raised to one millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.target, LogTarget::Syslog);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_load_full_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hotline.json");
        fs::write(
            &path,
            r#"{ "log": { "level": "debug", "target": "stderr" }, "poll_interval_ms": 50 }"#,
        )
        .unwrap();

        let config = ServiceConfig::load_from_file(&path).unwrap();
        assert_eq!(config.log.level_filter(), log::LevelFilter::Debug);
        assert_eq!(config.log.target, LogTarget::Stderr);
        assert_eq!(config.poll_interval_ms, 50);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hotline.json");
        fs::write(&path, r#"{ "log": { "level": "warn" } }"#).unwrap();

        let config = ServiceConfig::load_from_file(&path).unwrap();
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.log.target, LogTarget::Syslog);
        assert_eq!(config.poll_interval_ms, 500);
    }

    #[test]
    fn test_missing_or_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(ServiceConfig::load(Some(dir.path().join("absent.json").as_path())).is_err());

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(ServiceConfig::load_from_file(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            [("HOTLINE_LOG", "trace"), ("HOTLINE_LOG_TARGET", "STDERR")].into_iter().collect();
        let mut config = ServiceConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.log.level_filter(), log::LevelFilter::Trace);
        assert_eq!(config.log.target, LogTarget::Stderr);
    }

    #[test]
    fn test_bad_target_override_is_ignored() {
        let mut config = ServiceConfig::default();
        config.apply_overrides(|key| (key == "HOTLINE_LOG_TARGET").then(|| "journald".to_string()));
        assert_eq!(config.log.target, LogTarget::Syslog);
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let cfg = LogConfig { level: "chatty".into(), target: LogTarget::Stderr };
        assert_eq!(cfg.level_filter(), log::LevelFilter::Info);
    }
}
