//! Error types for formtree.
//!
//! Validation failures are data ([`crate::model::ValidateErrors`]), never an
//! `Err`. This enum covers faults around validation: rejected async
//! validators, missing runtimes, conversions and configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{failed} async validator(s) rejected: {message}")]
    ValidatorRejected { failed: usize, message: String },

    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("value conversion error: {0}")]
    Value(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// A single async validator fault, before composition.
    pub fn rejected(message: impl Into<String>) -> Self {
        Error::ValidatorRejected {
            failed: 1,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
