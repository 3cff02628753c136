//! Errors raised before a batch starts.

use thiserror::Error;

use crate::llm::LlmError;
use crate::table::TableError;
use crate::taxonomy::TaxonomyError;

/// A batch could not be set up. No record has been processed when one of
/// these is returned.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Column '{column}' not found (available: {})", .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Cannot read input: {0}")]
    InputUnreadable(String),

    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Failure threshold must be at least 1")]
    InvalidThreshold,

    #[error("{0}")]
    UnknownTaxonomy(String),

    #[error("{0}")]
    InvalidTaxonomy(String),

    #[error("Backend setup failed: {0}")]
    Backend(String),
}

impl From<LlmError> for SetupError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::MissingApiKey(msg) => SetupError::MissingCredentials(msg),
            other => SetupError::Backend(other.to_string()),
        }
    }
}

impl From<TableError> for SetupError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::Io { .. } | TableError::UnsupportedFormat(_) => {
                SetupError::InputUnreadable(e.to_string())
            }
            other => SetupError::InvalidTable(other.to_string()),
        }
    }
}

impl From<TaxonomyError> for SetupError {
    fn from(e: TaxonomyError) -> Self {
        match e {
            TaxonomyError::Unknown(_) | TaxonomyError::Io { .. } => {
                SetupError::UnknownTaxonomy(e.to_string())
            }
            other => SetupError::InvalidTaxonomy(other.to_string()),
        }
    }
}
