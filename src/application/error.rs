//! Application-level errors (wraps domain errors)

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{program} not found: {}", .path.display())]
    BinaryNotFound {
        program: String,
        path: PathBuf,
        /// What the binary is needed for, when not the main job
        purpose: Option<String>,
    },

    #[error("Video device not found: {}", .0.display())]
    DeviceNotFound(PathBuf),

    #[error("Failed to open stream: {reason}")]
    StreamOpen { reason: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
