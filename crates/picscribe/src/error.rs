use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that stop a run before any image is processed.
#[derive(Error, Debug)]
pub enum PicscribeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Completion cache error: {0}")]
    Cache(#[from] crate::db::DatabaseError),

    #[error("Model unavailable: {0}")]
    Model(#[from] crate::ai::ModelError),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Failed to prepare '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Timeout must be at least 1 second")]
    ZeroTimeout,

    #[error("Maximum edge must be at least 1 pixel")]
    ZeroMaxEdge,

    #[error("Invalid model URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Directory scan failed for '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Failures reported by the external collaborators (converter, OCR,
/// vision model, metadata tool).
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to read image '{path}': {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process image: {0}")]
    ImageProcessing(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Model request failed: {0}")]
    ModelRequest(String),

    #[error("Unexpected model response: {0}")]
    ModelResponse(String),

    #[error("Metadata update failed: {0}")]
    Metadata(String),

    #[error("Command '{program}' failed: {message}")]
    Command { program: String, message: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl ProcessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, PicscribeError>;
