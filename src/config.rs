//! Board configuration.
//!
//! Loaded from a TOML file (missing file means defaults), then environment
//! overrides, then validation.

use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BoardError, ConfigError};
use crate::gate::hash_passphrase;
use crate::reference::{default_currencies, default_interest_terms, Currency, InterestTerm, ReferenceData};

pub const DEFAULT_CONFIG_PATH: &str = "rate_board.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    /// SQLite file holding overrides and the lock flag
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Shared operator passphrase (hashed before use)
    #[serde(default = "default_passphrase")]
    pub passphrase: String,

    /// Pre-hashed passphrase; wins over `passphrase` when set
    #[serde(default)]
    pub passphrase_sha256: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log destination while the terminal UI owns the screen
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// How long a changed cell stays highlighted
    #[serde(default = "default_highlight_seconds")]
    pub highlight_seconds: u64,

    #[serde(default = "default_toast_seconds")]
    pub toast_seconds: u64,

    /// Board clock offset from UTC (Lusaka = +2)
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Replaces the built-in currency table when non-empty
    #[serde(default)]
    pub currencies: Vec<Currency>,

    /// Replaces the built-in interest schedule when non-empty
    #[serde(default)]
    pub interest_terms: Vec<InterestTerm>,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("rate_board.db")
}

fn default_passphrase() -> String {
    "duckduckgoose".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("rate_board.log")
}

fn default_highlight_seconds() -> u64 {
    5
}

fn default_toast_seconds() -> u64 {
    3
}

fn default_utc_offset_hours() -> i32 {
    2
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            passphrase: default_passphrase(),
            passphrase_sha256: None,
            log_level: default_log_level(),
            log_file: default_log_file(),
            highlight_seconds: default_highlight_seconds(),
            toast_seconds: default_toast_seconds(),
            utc_offset_hours: default_utc_offset_hours(),
            currencies: Vec::new(),
            interest_terms: Vec::new(),
        }
    }
}

impl BoardConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Missing file → defaults. A file that exists but does not parse is an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment variable overrides
    pub fn with_env_override(mut self) -> Self {
        if let Ok(db) = std::env::var("RATE_BOARD_DB") {
            self.database_path = PathBuf::from(db);
        }

        if let Ok(passphrase) = std::env::var("RATE_BOARD_PASSPHRASE") {
            self.passphrase = passphrase;
            self.passphrase_sha256 = None;
        }

        if let Ok(log_level) = std::env::var("RATE_BOARD_LOG_LEVEL") {
            self.log_level = log_level;
        }

        if let Ok(log_file) = std::env::var("RATE_BOARD_LOG_FILE") {
            self.log_file = PathBuf::from(log_file);
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(format!(
                "Invalid log_level '{}'. Valid values: {:?}",
                self.log_level, valid_log_levels
            ));
        }

        if self.highlight_seconds == 0 {
            errors.push("highlight_seconds must be greater than 0".to_string());
        }
        if self.toast_seconds == 0 {
            errors.push("toast_seconds must be greater than 0".to_string());
        }

        if !(-14..=14).contains(&self.utc_offset_hours) {
            errors.push(format!(
                "utc_offset_hours {} outside -14..=14",
                self.utc_offset_hours
            ));
        }

        if let Some(digest) = &self.passphrase_sha256 {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                errors.push("passphrase_sha256 must be 64 hex characters".to_string());
            }
        } else if self.passphrase.is_empty() {
            errors.push("passphrase must not be empty".to_string());
        }

        if let Err(e) = self.reference_data() {
            errors.push(e.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    pub fn passphrase_digest(&self) -> String {
        match &self.passphrase_sha256 {
            Some(digest) => digest.to_lowercase(),
            None => hash_passphrase(&self.passphrase),
        }
    }

    /// Reference tables, built-in where the config leaves them empty
    pub fn reference_data(&self) -> Result<ReferenceData, BoardError> {
        let currencies = if self.currencies.is_empty() {
            default_currencies()
        } else {
            self.currencies.clone()
        };
        let terms = if self.interest_terms.is_empty() {
            default_interest_terms()
        } else {
            self.interest_terms.clone()
        };
        ReferenceData::new(currencies, terms)
    }

    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    pub fn highlight_duration(&self) -> Duration {
        Duration::from_secs(self.highlight_seconds)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_secs(self.toast_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = BoardConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.highlight_duration(), Duration::from_secs(5));
        assert_eq!(config.utc_offset().local_minus_utc(), 7200);
        assert_eq!(config.passphrase_digest(), hash_passphrase("duckduckgoose"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BoardConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.database_path, PathBuf::from("rate_board.db"));
    }

    #[test]
    fn test_load_partial_file() {
        let file = write_config(
            r#"
            database_path = "/tmp/board.db"
            log_level = "debug"
            highlight_seconds = 8
            "#,
        );

        let config = BoardConfig::load(file.path()).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/board.db"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.highlight_seconds, 8);
        assert_eq!(config.toast_seconds, 3);
    }

    #[test]
    fn test_custom_reference_tables() {
        let file = write_config(
            r#"
            [[currencies]]
            code = "USD"
            name = "US Dollar"
            mid_rate = 18.4

            [[currencies]]
            code = "JPY"
            name = "Japanese Yen"
            mid_rate = 0.12
            decimals = 3
            "#,
        );

        let config = BoardConfig::load(file.path()).unwrap();
        let reference = config.reference_data().unwrap();

        assert_eq!(reference.currencies().len(), 2);
        assert_eq!(reference.mid_rate("USD"), Some(18.4));
        assert_eq!(reference.decimals("USD"), 2);
        assert_eq!(reference.decimals("JPY"), 3);
        // Interest schedule falls back to the built-in one
        assert_eq!(reference.terms().len(), 9);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let file = write_config("highlight_seconds = \"soon\"");
        assert!(matches!(BoardConfig::load(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_collects_errors() {
        let config = BoardConfig {
            log_level: "loud".to_string(),
            highlight_seconds: 0,
            utc_offset_hours: 20,
            passphrase_sha256: Some("xyz".to_string()),
            ..BoardConfig::default()
        };

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("log_level"));
        assert!(err.contains("highlight_seconds"));
        assert!(err.contains("utc_offset_hours"));
        assert!(err.contains("passphrase_sha256"));
    }

    #[test]
    fn test_pre_hashed_passphrase_wins() {
        let digest = hash_passphrase("another secret").to_uppercase();
        let config = BoardConfig {
            passphrase_sha256: Some(digest),
            ..BoardConfig::default()
        };

        assert!(config.validate().is_ok());
        assert_eq!(config.passphrase_digest(), hash_passphrase("another secret"));
    }

    #[test]
    fn test_duplicate_currency_fails_validation() {
        let config = BoardConfig {
            currencies: vec![
                Currency::new("USD", "US Dollar", "us", 23.0),
                Currency::new("USD", "US Dollar", "us", 23.0),
            ],
            ..BoardConfig::default()
        };

        assert!(config.validate().is_err());
    }
}
