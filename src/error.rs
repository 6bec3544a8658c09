//! Error taxonomy for the mood aggregator.
//!
//! Input problems are reported before anything is written, so callers can
//! surface them as validation errors. Storage failures carry the `anyhow`
//! context chain built up by the store.

use thiserror::Error;

/// Errors surfaced by aggregator operations.
#[derive(Debug, Error)]
pub enum MoodError {
    /// The emotion label is not one of the seven known labels.
    #[error(
        "invalid emotion label '{0}' (expected one of: happy, sad, angry, fearful, disgusted, surprised, neutral)"
    )]
    InvalidEmotionLabel(String),

    /// Confidence lies outside [0, 1] or is not a number.
    #[error("confidence {0} is outside the range [0, 1]")]
    InvalidConfidence(f64),

    /// No user identity was supplied.
    #[error("a user id is required")]
    MissingUser,

    /// The report does not exist or belongs to another user.
    #[error("report {0} not found")]
    NotFound(String),

    /// The underlying store failed.
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Result alias for aggregator operations.
pub type MoodResult<T> = std::result::Result<T, MoodError>;

impl MoodError {
    /// Whether the error was caused by caller-supplied input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            MoodError::InvalidEmotionLabel(_)
                | MoodError::InvalidConfidence(_)
                | MoodError::MissingUser
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            MoodError::NotFound(_) => 3,
            e if e.is_invalid_input() => 2,
            _ => 1,
        }
    }
}
