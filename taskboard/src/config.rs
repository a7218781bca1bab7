//! Engine configuration loaded with figment
//!
//! Sources are merged in precedence order (later sources override earlier ones):
//! 1. Default values
//! 2. An optional TOML file
//! 3. `TASKBOARD_`-prefixed environment variables

use crate::error::{BoardError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Tunables for the board engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Longest accepted task title, in characters
    pub max_title_length: usize,
    /// Longest accepted task description, in characters
    pub max_description_length: usize,
    /// How long a mutation waits for its board's lock
    pub lock_timeout_ms: u64,
    /// SQLite busy timeout
    pub busy_timeout_ms: u64,
    /// How many times a conflicting write is retried before surfacing
    pub conflict_retries: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            max_title_length: 255,
            max_description_length: 10_000,
            lock_timeout_ms: 5_000,
            busy_timeout_ms: 5_000,
            conflict_retries: 1,
        }
    }
}

impl BoardConfig {
    /// Environment variable prefix
    pub const ENV_PREFIX: &'static str = "TASKBOARD_";

    /// Build the figment for the given optional config file
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(Self::ENV_PREFIX))
    }

    /// Load and validate configuration from all sources
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        debug!(?config, "loaded board configuration");
        Ok(config)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("max_title_length", self.max_title_length as u64),
            ("max_description_length", self.max_description_length as u64),
            ("lock_timeout_ms", self.lock_timeout_ms),
            ("busy_timeout_ms", self.busy_timeout_ms),
        ];
        match limits.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(BoardError::invalid_value(*field, "must be greater than zero")),
            None => Ok(()),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_defaults() {
        let config = BoardConfig::load(None).unwrap();
        assert_eq!(config, BoardConfig::default());
        assert_eq!(config.conflict_retries, 1);
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn test_toml_file_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taskboard.toml");
        std::fs::write(&path, "max_title_length = 80\nconflict_retries = 3\n").unwrap();

        let config = BoardConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_title_length, 80);
        assert_eq!(config.conflict_retries, 3);
        assert_eq!(config.lock_timeout_ms, 5_000);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taskboard.toml");
        std::fs::write(&path, "max_title_length = 80\n").unwrap();

        std::env::set_var("TASKBOARD_MAX_TITLE_LENGTH", "40");
        let config = BoardConfig::load(Some(&path));
        std::env::remove_var("TASKBOARD_MAX_TITLE_LENGTH");

        assert_eq!(config.unwrap().max_title_length, 40);
    }

    #[test]
    #[serial]
    fn test_rejects_zero_lock_timeout() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taskboard.toml");
        std::fs::write(&path, "lock_timeout_ms = 0\n").unwrap();

        let err = BoardConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, BoardError::InvalidValue { .. }));
    }

    #[test]
    fn test_rejects_every_zero_limit() {
        assert!(BoardConfig::default().validate().is_ok());
        let zeroed = [
            BoardConfig {
                max_title_length: 0,
                ..BoardConfig::default()
            },
            BoardConfig {
                max_description_length: 0,
                ..BoardConfig::default()
            },
            BoardConfig {
                lock_timeout_ms: 0,
                ..BoardConfig::default()
            },
            BoardConfig {
                busy_timeout_ms: 0,
                ..BoardConfig::default()
            },
        ];
        for config in zeroed {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, BoardError::InvalidValue { .. }), "{config:?}");
        }
    }
}
