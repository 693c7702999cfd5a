//! Error model for the audit pipeline.

use thiserror::Error;

use crate::field::Field;

/// Result type used across the audit crates.
pub type AuditResult<T> = Result<T, AuditError>;

/// Fatal audit failure.
///
/// Every variant aborts the stage that raised it; prior state is left untouched.
/// Allocation shortfalls and ambiguities are *not* errors, they are returned as
/// data next to a successful result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// A required field could not be resolved from the header row at all.
    #[error("{document}: could not find a {field} column")]
    MissingColumn { document: String, field: Field },

    /// The file parsed but produced zero usable rows.
    #[error("{document}: no valid part/quantity rows found")]
    NoValidData { document: String },

    /// A stage transition was requested from a stage that does not allow it.
    #[error("cannot {action} while in stage {stage}")]
    InvalidStage {
        stage: &'static str,
        action: &'static str,
    },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The input adapter or exporter failed.
    #[error("source failure: {0}")]
    Source(String),
}

impl AuditError {
    pub fn missing_column(document: impl Into<String>, field: Field) -> Self {
        Self::MissingColumn {
            document: document.into(),
            field,
        }
    }

    pub fn no_valid_data(document: impl Into<String>) -> Self {
        Self::NoValidData {
            document: document.into(),
        }
    }

    pub fn invalid_stage(stage: &'static str, action: &'static str) -> Self {
        Self::InvalidStage { stage, action }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn source_failure(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// True for failures caused by the shape of an input file.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::MissingColumn { .. } | Self::NoValidData { .. })
    }
}
