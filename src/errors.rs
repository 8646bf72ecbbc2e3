//! Error handling for the dataset generator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Empty population: no {subset} accounts available")]
    EmptyPopulation { subset: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Worker task failed: {message}")]
    TaskFailed { message: String },
}

impl SynthError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SynthError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Convert error to a short message suitable for the CLI
    pub fn to_user_message(&self) -> String {
        match self {
            SynthError::InvalidConfiguration { message } => {
                format!("Configuration rejected: {}. Fix the config and run again.", message)
            }
            SynthError::EmptyPopulation { subset } => {
                format!(
                    "Cannot generate fraud without {} accounts. Raise the account count or set fraud_ratio to 0.",
                    subset
                )
            }
            SynthError::Io(e) => format!("Could not read or write a file: {}", e),
            SynthError::Csv(_) => "Failed to write the CSV ledger.".to_string(),
            SynthError::Serialization { .. } => "Configuration file is not valid JSON.".to_string(),
            SynthError::TaskFailed { .. } => "A worker task failed. Try again without --parallel.".to_string(),
        }
    }

    /// Errors raised by up-front validation, before any data is produced
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SynthError::InvalidConfiguration { .. }
                | SynthError::EmptyPopulation { .. }
                | SynthError::Serialization { .. }
        )
    }
}

impl From<serde_json::Error> for SynthError {
    fn from(e: serde_json::Error) -> Self {
        SynthError::Serialization {
            message: e.to_string(),
        }
    }
}

// Convenience type alias
pub type Result<T> = std::result::Result<T, SynthError>;
