//! Error types for template construction, persistence and matching.

use thiserror::Error;

use crate::paillier::CryptoError;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Duplicate(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// The query template has no features, so no score is defined.
    #[error("query template has no features")]
    DivisionByZero,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
