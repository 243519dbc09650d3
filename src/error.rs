//! Error types for the fraud scoring service

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by artifact loading, table parsing and scoring.
///
/// Per-cell anomalies (missing columns, missing cells, unseen categories) are
/// never represented here; the aligner resolves them with sentinel values.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// An artifact file could not be located or deserialized
    #[error("missing artifact '{name}' at {}: {reason}", path.display())]
    MissingArtifact {
        name: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// Artifacts loaded but disagree with each other
    #[error("inconsistent artifacts: {0}")]
    InconsistentArtifacts(String),

    /// The uploaded payload is not a parseable table
    #[error("invalid input table: {0}")]
    InputShape(String),

    /// The model failed to produce scores
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Configuration errors are fatal and never caused by the caller's input
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ServiceError::MissingArtifact { .. } | ServiceError::InconsistentArtifacts(_)
        )
    }

    pub fn is_input_shape(&self) -> bool {
        matches!(self, ServiceError::InputShape(_))
    }
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
