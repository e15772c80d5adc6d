//! Error types for trueno-tune
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Only [`Error::CandidateFailure`] is recovered by the search engine. Errors
//! raised while one candidate trains or evaluates are wrapped into it unless
//! they are [fatal](Error::is_fatal).

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// trueno-tune error types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid CLI or semantic parameter, detected before any work begins
    #[error("Configuration error for `{parameter}`: {message}")]
    Configuration {
        /// Offending parameter name
        parameter: String,
        /// What is wrong with it
        message: String,
    },

    /// Malformed or insufficient input records
    #[error("Data error in dataset `{dataset}`: {message}")]
    Data {
        /// Offending dataset id
        dataset: String,
        /// What is wrong with it
        message: String,
    },

    /// Split size outside `0..available`
    #[error("Invalid split size {size}: must be smaller than the {available} available datasets")]
    InvalidSize {
        /// Requested held-out size
        size: usize,
        /// Number of datasets available to split
        available: usize,
    },

    /// Dataset has fewer pipelines than the requested k
    #[error("Dataset `{dataset}` has {available} pipelines, fewer than k={k}")]
    InsufficientPipelines {
        /// Offending dataset id
        dataset: String,
        /// Requested k
        k: usize,
        /// Pipelines present in the dataset
        available: usize,
    },

    /// One hyperparameter configuration failed to train or evaluate
    #[error("Candidate {candidate} failed: {reason}")]
    CandidateFailure {
        /// Candidate index in the search
        candidate: usize,
        /// Failure reason
        reason: String,
    },

    /// Model fitting diverged or produced unusable predictions
    #[error("Training failed: {0}")]
    Training(String),

    /// Logic defect (e.g. negative regret). Never swallowed.
    #[error("Internal consistency error: {0}\nThis indicates a defect. Please report this issue.")]
    InternalConsistency(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Configuration`] error.
    pub fn config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Data`] error.
    pub fn data(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Data {
            dataset: dataset.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort a whole search rather than fail one
    /// candidate. Defects and I/O problems are never attributed to a
    /// hyperparameter configuration.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InternalConsistency(_) | Self::Io(_) | Self::Json(_)
        )
    }
}
