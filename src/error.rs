//! Error types for rust-pbipgen

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while generating or updating a PBIP project
#[derive(Error, Debug)]
pub enum PbipGenError {
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    #[error("Required template file missing: {path}")]
    TemplateMissing { path: PathBuf },

    #[error("Failed to read template file: {path}")]
    TemplateReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read existing model file: {path}")]
    ModelReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup of {path} failed: {message}")]
    BackupFailed { path: PathBuf, message: String },

    #[error("Invalid .platform file: {path}: {message}")]
    PlatformFileInvalid { path: PathBuf, message: String },

    #[error("Build cancelled")]
    Cancelled,
}

impl PbipGenError {
    pub fn invariant(message: impl Into<String>) -> Self {
        PbipGenError::InvariantViolation {
            message: message.into(),
        }
    }
}
