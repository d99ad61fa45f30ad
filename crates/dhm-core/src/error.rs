use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DhmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Unrecognized image format: {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    Parameter(String),

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Empty frame sequence in {0}")]
    EmptySequence(PathBuf),
}

pub type Result<T> = std::result::Result<T, DhmError>;
