//! Structured error handling and exit codes.

use serde::Serialize;

use crate::engine::EngineError;
use crate::normalize::ValidationError;
use crate::service::ServiceError;

/// Exit codes for the inpaint-cache binary.
///
/// - 0: Success
/// - 1: General error (unexpected failure)
/// - 2: Invalid input (bad image, mask or parameters)
/// - 3: Partial success (result produced but not cached)
/// - 4: Engine failure (engine missing or inference failed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the request completed.
    Success = 0,
    /// General error: an unexpected error occurred.
    GeneralError = 1,
    /// Invalid input: the request could not be used.
    InvalidInput = 2,
    /// Partial success: a result was produced but could not be cached.
    PartialSuccess = 3,
    /// Engine failure: the engine could not be loaded or failed to infer.
    EngineFailure = 4,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "IC000",
            Self::GeneralError => "IC001",
            Self::InvalidInput => "IC002",
            Self::PartialSuccess => "IC003",
            Self::EngineFailure => "IC004",
        }
    }

    /// Pick the exit code for an error bubbled up to `main`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(e) = cause.downcast_ref::<ServiceError>() {
                return match e {
                    ServiceError::Validation(_) => Self::InvalidInput,
                    ServiceError::Engine(_) => Self::EngineFailure,
                    ServiceError::Storage(_) => Self::GeneralError,
                };
            }
            if cause.is::<ValidationError>() {
                return Self::InvalidInput;
            }
            if cause.is::<EngineError>() {
                return Self::EngineFailure;
            }
        }
        Self::GeneralError
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "IC002")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
        }
    }
}
