//! Error types for the DevHub CLI.
//!
//! CliError wraps HubError from the core library and adds CLI-specific
//! variants.

use devhub_core::error::{
    ControlError, HubError, OnboardingError, RollbackError, StorageError,
};
use thiserror::Error;

/// Exit codes for the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NETWORK_ERROR: i32 = 2;
    pub const BROKER_ERROR: i32 = 3;
    pub const INVALID_ARGS: i32 = 4;
}

/// Main error type for the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Hub(#[from] HubError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Hub(e) => match e {
                HubError::Transport(_) | HubError::Onboarding(_) | HubError::Io(_) => {
                    exit_codes::NETWORK_ERROR
                }
                HubError::Registration(_) | HubError::Rollback(_) | HubError::Admin(_) => {
                    exit_codes::BROKER_ERROR
                }
                HubError::Validation(_) | HubError::Control(_) => exit_codes::INVALID_ARGS,
                HubError::Storage(_) | HubError::Other(_) => exit_codes::GENERAL_ERROR,
            },
            CliError::Io(_) => exit_codes::GENERAL_ERROR,
            CliError::InvalidArgument(_) => exit_codes::INVALID_ARGS,
            CliError::Other(_) => exit_codes::GENERAL_ERROR,
        }
    }
}

// Conversions from core error subtypes to CliError
impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        CliError::Hub(HubError::Storage(e))
    }
}

impl From<ControlError> for CliError {
    fn from(e: ControlError) -> Self {
        CliError::Hub(HubError::Control(e))
    }
}

impl From<OnboardingError> for CliError {
    fn from(e: OnboardingError) -> Self {
        CliError::Hub(HubError::Onboarding(e))
    }
}

impl From<RollbackError> for CliError {
    fn from(e: RollbackError) -> Self {
        CliError::Hub(HubError::Rollback(e))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
