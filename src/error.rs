// ⚠️ Error Types
// Every failure the board can hit is recovered locally. These types exist so
// the recovery sites know WHAT failed; nothing here halts the board.

use thiserror::Error;

/// Library error type
#[derive(Debug, Error)]
pub enum BoardError {
    /// Key-value store could not be opened, read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Stored value could not be decoded
    #[error("Corrupt value under key '{key}': {reason}")]
    CorruptValue { key: String, reason: String },

    /// Reference table failed validation
    #[error("Invalid reference data: {0}")]
    ReferenceData(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for BoardError {
    fn from(err: rusqlite::Error) -> Self {
        BoardError::Persistence(err.to_string())
    }
}

/// Configuration loading / validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(String),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Why a privileged intent was refused.
///
/// Refusals never change board state. The controller also pushes a
/// notification to the renderer for each of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("Cannot open manual panel while page is locked")]
    Locked,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Manual panel is not open")]
    EditPanelClosed,

    #[error("No pending confirmation")]
    NothingPending,

    #[error("Unknown rate '{0}'")]
    UnknownTarget(String),
}

pub type Result<T> = std::result::Result<T, BoardError>;
