//! Error bridge implementations for Python-layer errors.
//!
//! This module provides `impl From<X> for PymoveError` conversions from the
//! Python-layer error types to the unified `PymoveError` type.
//!
//! These bridges live here rather than in `pymove-core` because core does
//! not depend on the Python layer.

use pymove_core::error::PymoveError;

use crate::config::ConfigError;
use crate::cst::{EditError, ParseError};
use crate::graph::GraphError;
use crate::module::ModuleError;
use crate::ops::MoveError;
use crate::registry::RegistryError;
use crate::session::SessionError;

// ============================================================================
// Bridge: SessionError -> PymoveError
// ============================================================================

impl From<SessionError> for PymoveError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::ModuleNotFound { path } => PymoveError::module_not_found(path),
            SessionError::Config(err) => PymoveError::from(err),
            SessionError::Registry(err) => PymoveError::from(err),
            SessionError::Move(err) => PymoveError::from(err),
            SessionError::Graph(err) => PymoveError::from(err),
            SessionError::Module(err) => PymoveError::from(err),
            SessionError::Parse(err) => PymoveError::from(err),
        }
    }
}

// ============================================================================
// Bridge: ConfigError -> PymoveError
// ============================================================================

impl From<ConfigError> for PymoveError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProjectNotFound { .. } | ConfigError::MissingProjectName { .. } => {
                PymoveError::ProjectNotFound {
                    message: err.to_string(),
                }
            }
            ConfigError::Toml { ref path, .. } => PymoveError::invalid_args_with_details(
                err.to_string(),
                serde_json::json!({ "path": path }),
            ),
            ConfigError::Io { .. } => PymoveError::internal(err.to_string()),
        }
    }
}

// ============================================================================
// Bridge: RegistryError -> PymoveError
// ============================================================================

impl From<RegistryError> for PymoveError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::FolderNotFound { ref path } => PymoveError::invalid_args_with_details(
                err.to_string(),
                serde_json::json!({ "folder": path }),
            ),
        }
    }
}

// ============================================================================
// Bridge: MoveError -> PymoveError
// ============================================================================

impl From<MoveError> for PymoveError {
    fn from(err: MoveError) -> Self {
        match err {
            MoveError::ObjectMismatch { from, to } => PymoveError::ObjectMismatch { from, to },
            MoveError::StaleSource { ref module } => {
                let module = module.clone();
                PymoveError::apply(err.to_string(), Some(module))
            }
            MoveError::Edit(err) => PymoveError::from(err),
            MoveError::Graph(err) => PymoveError::from(err),
            MoveError::ModuleNotFound { .. } => PymoveError::internal(err.to_string()),
        }
    }
}

// ============================================================================
// Bridge: tree and graph errors -> PymoveError
// ============================================================================

impl From<EditError> for PymoveError {
    fn from(err: EditError) -> Self {
        match err {
            // Overlapping or out-of-range edits are bugs in the edit planner.
            EditError::Overlap { .. } | EditError::OutOfBounds { .. } => {
                PymoveError::internal(err.to_string())
            }
            EditError::BrokenResult(_) | EditError::Parse(_) => PymoveError::apply(err.to_string(), None),
        }
    }
}

impl From<ParseError> for PymoveError {
    fn from(err: ParseError) -> Self {
        PymoveError::apply(err.to_string(), None)
    }
}

impl From<GraphError> for PymoveError {
    fn from(err: GraphError) -> Self {
        PymoveError::internal(err.to_string())
    }
}

impl From<ModuleError> for PymoveError {
    fn from(err: ModuleError) -> Self {
        match err {
            ModuleError::Io { ref path, .. } => {
                let path = path.clone();
                PymoveError::apply(err.to_string(), Some(path))
            }
            ModuleError::Parse { ref path, .. } => {
                let path = path.clone();
                PymoveError::apply(err.to_string(), Some(path))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pymove_core::error::OutputErrorCode;

    #[test]
    fn missing_module_is_resolution_error() {
        let err = PymoveError::from(SessionError::ModuleNotFound {
            path: "proj/nope.py".to_string(),
        });
        assert_eq!(err.error_code(), OutputErrorCode::ResolutionError);
        assert!(matches!(err, PymoveError::ModuleNotFound { ref path } if path == "proj/nope.py"));
    }

    #[test]
    fn object_mismatch_keeps_names() {
        let err = PymoveError::from(SessionError::Move(MoveError::ObjectMismatch {
            from: "a.f".to_string(),
            to: "b.g".to_string(),
        }));
        assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
        assert!(matches!(err, PymoveError::ObjectMismatch { ref from, ref to } if from == "a.f" && to == "b.g"));
    }

    #[test]
    fn stale_source_is_apply_error() {
        let err = PymoveError::from(MoveError::StaleSource {
            module: "proj.mod1".to_string(),
        });
        assert_eq!(err.error_code(), OutputErrorCode::ApplyError);
        assert!(matches!(err, PymoveError::ApplyError { file: Some(ref f), .. } if f == "proj.mod1"));
    }

    #[test]
    fn missing_project_is_resolution_error() {
        let err = PymoveError::from(ConfigError::ProjectNotFound {
            path: "/tmp/x".to_string(),
        });
        assert_eq!(err.error_code(), OutputErrorCode::ResolutionError);
    }

    #[test]
    fn missing_folder_is_invalid_arguments() {
        let err = PymoveError::from(RegistryError::FolderNotFound {
            path: "src".to_string(),
        });
        assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
    }
}
