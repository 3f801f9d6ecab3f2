//! Runtime configuration.
//!
//! Loaded from a TOML file; every key is optional and falls back to the
//! defaults below. Command-line flags in the binaries override the file.
//!
//! ```toml
//! database_path = "/var/lib/mcstats/mcstats.db"
//! bind_address = "0.0.0.0:3000"
//! session_ttl_minutes = 120
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const DEFAULT_SESSION_TTL_MINUTES: i64 = 120;

/// One year.
const MAX_SESSION_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Address the HTTP server listens on
    pub bind_address: String,

    /// How long a login session stays valid
    pub session_ttl_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from("mcstats.db"),
            bind_address: "127.0.0.1:3000".to_string(),
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SESSION_TTL_MINUTES).contains(&self.session_ttl_minutes) {
            return Err(ConfigError::Invalid {
                field: "session_ttl_minutes",
                message: format!(
                    "{} is outside 1..={}",
                    self.session_ttl_minutes, MAX_SESSION_TTL_MINUTES
                ),
            });
        }
        Ok(())
    }

    /// File config when a path is given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Config::default()),
        }
    }

    /// Session lifetime; an out-of-range value falls back to the default.
    pub fn session_ttl(&self) -> chrono::Duration {
        let minutes = if self.validate().is_ok() {
            self.session_ttl_minutes
        } else {
            DEFAULT_SESSION_TTL_MINUTES
        };
        chrono::Duration::try_minutes(minutes).unwrap_or_else(chrono::Duration::zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_keys() {
        let config = Config::from_toml("bind_address = \"0.0.0.0:8080\"").unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.database_path, PathBuf::from("mcstats.db"));
        assert_eq!(config.session_ttl_minutes, 120);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            Config::from_toml("databse_path = \"x.db\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_session_ttl_must_be_in_range() {
        for bad in ["0", "-5", "9223372036854775807"] {
            let text = format!("session_ttl_minutes = {}", bad);
            assert!(matches!(
                Config::from_toml(&text),
                Err(ConfigError::Invalid {
                    field: "session_ttl_minutes",
                    ..
                })
            ));
        }

        let config = Config::from_toml("session_ttl_minutes = 525600").unwrap();
        assert_eq!(config.session_ttl(), chrono::Duration::days(365));

        let config = Config {
            session_ttl_minutes: i64::MAX,
            ..Config::default()
        };
        assert_eq!(config.session_ttl(), chrono::Duration::minutes(120));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcstats.toml");
        std::fs::write(
            &path,
            "database_path = \"/tmp/stats.db\"\nsession_ttl_minutes = 15\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/stats.db"));
        assert_eq!(config.session_ttl(), chrono::Duration::minutes(15));

        assert!(matches!(
            Config::load(Some(&dir.path().join("missing.toml"))),
            Err(ConfigError::Io(_))
        ));
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }
}
