//! Error types and error code constants for pymove.
//!
//! This module provides a unified error type (`PymoveError`) that bridges
//! domain-specific errors from the Python layer (registry, graph, move phases,
//! configuration) into a common format suitable for JSON output.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad input from caller)
//! - `3`: Resolution errors (no symbol at location, module not found, project not found)
//! - `4`: Apply errors (stale source, edit failures, unparsable results)
//! - `10`: Internal errors (bugs, unexpected state)

use std::fmt;

use thiserror::Error;

pub use crate::types::Location;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output.
///
/// These codes map to CLI exit codes and appear in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed request).
    InvalidArguments = 2,
    /// Resolution errors (nothing to move, module not found, no project).
    ResolutionError = 3,
    /// Apply errors (stale source, edit conflicts, broken results).
    ApplyError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
///
/// Every subsystem error is converted to this type before being rendered as
/// JSON output.
#[derive(Debug, Error)]
pub enum PymoveError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// No top-level function or class at the requested location.
    #[error("no movable symbol at {file}:{line}:{col}")]
    NothingToMove { file: String, line: u32, col: u32 },

    /// The file is not a module of the loaded project.
    #[error("module not found: {path}")]
    ModuleNotFound { path: String },

    /// No project configuration could be located.
    #[error("project not found: {message}")]
    ProjectNotFound { message: String },

    /// The requested import replacement renames the object.
    #[error("cannot replace import of '{from}' with '{to}': object names differ")]
    ObjectMismatch { from: String, to: String },

    /// Failed to apply changes.
    #[error("apply error: {message}")]
    ApplyError {
        message: String,
        file: Option<String>,
    },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&PymoveError> for OutputErrorCode {
    fn from(err: &PymoveError) -> Self {
        match err {
            PymoveError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            PymoveError::NothingToMove { .. } => OutputErrorCode::ResolutionError,
            PymoveError::ModuleNotFound { .. } => OutputErrorCode::ResolutionError,
            PymoveError::ProjectNotFound { .. } => OutputErrorCode::ResolutionError,
            PymoveError::ObjectMismatch { .. } => OutputErrorCode::InvalidArguments,
            PymoveError::ApplyError { .. } => OutputErrorCode::ApplyError,
            PymoveError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<PymoveError> for OutputErrorCode {
    fn from(err: PymoveError) -> Self {
        OutputErrorCode::from(&err)
    }
}

impl From<std::io::Error> for PymoveError {
    fn from(err: std::io::Error) -> Self {
        PymoveError::InternalError {
            message: format!("I/O error: {}", err),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl PymoveError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        PymoveError::InvalidArguments {
            message: message.into(),
            details: None,
        }
    }

    /// Create an invalid arguments error with JSON details.
    pub fn invalid_args_with_details(
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        PymoveError::InvalidArguments {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Create a "nothing to move" error.
    pub fn nothing_to_move(file: impl Into<String>, line: u32, col: u32) -> Self {
        PymoveError::NothingToMove {
            file: file.into(),
            line,
            col,
        }
    }

    /// Create a module not found error.
    pub fn module_not_found(path: impl Into<String>) -> Self {
        PymoveError::ModuleNotFound { path: path.into() }
    }

    /// Create an apply error attached to a file.
    pub fn apply(message: impl Into<String>, file: Option<String>) -> Self {
        PymoveError::ApplyError {
            message: message.into(),
            file,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        PymoveError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod error_code_mapping {
        use super::*;

        #[test]
        fn nothing_to_move_maps_to_resolution_error() {
            let err = PymoveError::nothing_to_move("mod1.py", 3, 4);
            assert_eq!(err.error_code(), OutputErrorCode::ResolutionError);
            assert_eq!(err.error_code().code(), 3);
        }

        #[test]
        fn invalid_arguments_maps_to_invalid_arguments() {
            let err = PymoveError::invalid_args("bad location");
            assert_eq!(OutputErrorCode::from(&err), OutputErrorCode::InvalidArguments);
        }

        #[test]
        fn object_mismatch_maps_to_invalid_arguments() {
            let err = PymoveError::ObjectMismatch {
                from: "a.f".to_string(),
                to: "b.g".to_string(),
            };
            assert_eq!(err.error_code().code(), 2);
        }

        #[test]
        fn apply_error_maps_to_apply_error() {
            let err = PymoveError::apply("source changed", Some("a.py".to_string()));
            assert_eq!(err.error_code().code(), 4);
        }

        #[test]
        fn io_error_becomes_internal() {
            let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
            let err = PymoveError::from(io);
            assert_eq!(err.error_code(), OutputErrorCode::InternalError);
            assert!(err.to_string().contains("disk gone"));
        }
    }

    mod display {
        use super::*;

        #[test]
        fn nothing_to_move_display() {
            let err = PymoveError::nothing_to_move("pkg/mod.py", 10, 0);
            assert_eq!(err.to_string(), "no movable symbol at pkg/mod.py:10:0");
        }

        #[test]
        fn object_mismatch_display() {
            let err = PymoveError::ObjectMismatch {
                from: "a.f".to_string(),
                to: "b.g".to_string(),
            };
            assert_eq!(
                err.to_string(),
                "cannot replace import of 'a.f' with 'b.g': object names differ"
            );
        }

        #[test]
        fn code_values() {
            assert_eq!(OutputErrorCode::InvalidArguments.code(), 2);
            assert_eq!(OutputErrorCode::ResolutionError.code(), 3);
            assert_eq!(OutputErrorCode::ApplyError.code(), 4);
            assert_eq!(OutputErrorCode::InternalError.code(), 10);
            assert_eq!(OutputErrorCode::ApplyError.to_string(), "4");
        }
    }
}
