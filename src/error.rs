//! Error types for Brainform

use thiserror::Error;

/// Errors surfaced by the form session, pattern tables and batch uploads.
///
/// None of these are fatal: every path leaves the session idle with its
/// feature slots intact so the user can correct and resubmit.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("Please enter some feature values or use test patterns")]
    NoValues,

    #[error("{0} invalid values detected. Please fix them.")]
    InvalidValues(usize),

    #[error("Analysis already in progress...")]
    Busy,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("{0}")]
    Application(String),

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Unknown feature slot: {0}")]
    UnknownSlot(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Submission result arrived for an abandoned analysis")]
    StaleSubmission,

    #[error("Invalid range: min {min} is greater than max {max}")]
    InvalidRange { min: f64, max: f64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl FormError {
    /// True for errors caught by client-side validation, before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, FormError::NoValues | FormError::InvalidValues(_))
    }
}

/// Failure reported by a submission collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    /// The call failed at the network layer.
    #[error("{0}")]
    Transport(String),

    /// The server answered with a structured failure.
    #[error("{0}")]
    Application(String),
}

impl From<SubmissionError> for FormError {
    fn from(e: SubmissionError) -> Self {
        match e {
            SubmissionError::Transport(msg) => FormError::Transport(msg),
            SubmissionError::Application(msg) => FormError::Application(msg),
        }
    }
}
