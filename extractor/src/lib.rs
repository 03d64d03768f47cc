//! Minutiae extraction from fingerprint images.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fptemplate::MinutiaPoint;
use thiserror::Error;

pub use dataset::ImageDirectory;
pub use sourceafis::{decode_template, SourceAfisExtractor};

mod dataset;
mod sourceafis;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("image not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The extractor could not be started or failed.
    #[error("extractor unavailable: {0}")]
    Unavailable(String),

    #[error("extractor did not finish within {0:?}")]
    Timeout(Duration),

    /// The extractor output lacks an expected field.
    #[error("malformed extractor output: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a fingerprint image into its minutiae.
pub trait Extractor {
    fn extract(&self, image: &Path) -> Result<Vec<MinutiaPoint>, ExtractionError>;
}
