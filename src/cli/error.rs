//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::exitcode;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Signal { .. } => exitcode::SOFTWARE,
                InfraError::Application(app) => match app {
                    ApplicationError::Domain(_) => exitcode::USAGE,
                    ApplicationError::BinaryNotFound { .. } => exitcode::NOT_FOUND,
                    ApplicationError::DeviceNotFound(_) => exitcode::FAILURE,
                    ApplicationError::StreamOpen { .. } => exitcode::FAILURE,
                    ApplicationError::Config { .. } => exitcode::CONFIG,
                    ApplicationError::OperationFailed { source, .. } => {
                        if source.is::<std::io::Error>() {
                            exitcode::IOERR
                        } else {
                            exitcode::SOFTWARE
                        }
                    }
                },
            },
        }
    }

    /// Follow-up advice shown under the error message, if any.
    pub fn hint(&self) -> Option<String> {
        match self {
            CliError::Infra(InfraError::Application(ApplicationError::BinaryNotFound {
                program,
                purpose,
                ..
            })) => Some(match purpose {
                Some(purpose) => format!(
                    "Install {program} to use {purpose}, or pass its location with --{program}-path."
                ),
                None => format!(
                    "Please install {program}, or pass its location with --{program}-path."
                ),
            }),
            _ => None,
        }
    }
}
