//! Error types for dpe.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum DpeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("missing config: {0}")]
    MissingConfig(String),

    #[error("feed error: {0}")]
    Feed(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),
}

impl From<serde_json::Error> for DpeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl DpeError {
    /// Stable machine-readable code for robot output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Database(_) => "database",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::MissingConfig(_) => "missing_config",
            Self::Feed(_) => "feed",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::ConfirmationRequired(_) => "confirmation_required",
        }
    }
}

pub type Result<T> = std::result::Result<T, DpeError>;
