//! JSON output types and serialization for CLI responses.
//!
//! ## Design Principles
//!
//! 1. **Status first:** Every response has `status` as first field
//! 2. **Deterministic:** Same input -> same output (field order, array ordering)
//! 3. **Versioned:** Schema version in response enables forward compatibility

use std::io::{self, Write};

use serde::{Deserialize, Serialize, Serializer};

use crate::edit::TextEdit;
use crate::error::{OutputErrorCode, PymoveError};
use crate::types::Location;

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Shared Types
// ============================================================================

/// Warning information for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    /// Stable warning code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// File the warning applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Warning {
    pub fn new(code: impl Into<String>, message: impl Into<String>, file: Option<String>) -> Self {
        Warning {
            code: code.into(),
            message: message.into(),
            file,
        }
    }
}

/// A module of the loaded project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Fully-qualified dotted name (`pkg.sub.mod`, `pkg.__init__`).
    pub name: String,
    /// File path.
    pub path: String,
    /// Whether the file failed to parse.
    pub parse_error: bool,
}

/// One dependency edge: `dependent` imports from `dependency`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeInfo {
    pub dependent: String,
    pub dependency: String,
}

/// The edits for one file produced by a refactoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// File path.
    pub path: String,
    /// Fully-qualified module name.
    pub module: String,
    /// Edits against the file's previous text.
    pub edits: Vec<TextEdit>,
    /// Unified diff of the change.
    pub diff: String,
}

// ============================================================================
// Response Structs
// ============================================================================

/// Response for the `graph` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Modules ordered by name.
    pub modules: Vec<ModuleInfo>,
    /// Edges ordered by (dependent, dependency); repeated edges appear repeatedly.
    #[serde(serialize_with = "serialize_sorted_edges")]
    pub edges: Vec<EdgeInfo>,
    /// Load diagnostics (unreadable or unparsable files).
    #[serde(serialize_with = "serialize_sorted_warnings")]
    pub warnings: Vec<Warning>,
}

impl GraphResponse {
    pub fn new(modules: Vec<ModuleInfo>, edges: Vec<EdgeInfo>, warnings: Vec<Warning>) -> Self {
        GraphResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            modules,
            edges,
            warnings,
        }
    }
}

/// Response for the `move` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Name of the moved symbol (absent when nothing moved).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Source module name.
    pub source: String,
    /// Target module name.
    pub target: String,
    /// Changed files, ordered by path.
    #[serde(serialize_with = "serialize_sorted_changes")]
    pub files: Vec<FileChange>,
    /// Whether the changes were written to disk.
    pub applied: bool,
    /// Warnings (may be empty).
    #[serde(serialize_with = "serialize_sorted_warnings")]
    pub warnings: Vec<Warning>,
}

impl MoveResponse {
    pub fn new(
        symbol: Option<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        files: Vec<FileChange>,
        applied: bool,
        warnings: Vec<Warning>,
    ) -> Self {
        MoveResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            symbol,
            source: source.into(),
            target: target.into(),
            files,
            applied,
            warnings,
        }
    }
}

/// Response for the `config` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// The resolved project configuration.
    pub config: serde_json::Value,
}

impl ConfigResponse {
    pub fn new(config: serde_json::Value) -> Self {
        ConfigResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            config,
        }
    }
}

/// Response for the `diff` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Edits against the original text.
    pub edits: Vec<TextEdit>,
}

impl DiffResponse {
    pub fn new(edits: Vec<TextEdit>) -> Self {
        DiffResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            edits,
        }
    }
}

// ============================================================================
// Error Response
// ============================================================================

/// Error details for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code.
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Where the error occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ErrorInfo {
    /// Create from a PymoveError.
    pub fn from_error(err: &PymoveError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let message = err.to_string();

        let (details, location) = match err {
            PymoveError::NothingToMove { file, line, col } => {
                (None, Some(Location::new(file.clone(), *line, *col)))
            }
            PymoveError::InvalidArguments { details, .. } => (details.clone(), None),
            PymoveError::ModuleNotFound { path } => {
                (Some(serde_json::json!({ "path": path })), None)
            }
            PymoveError::ObjectMismatch { from, to } => {
                (Some(serde_json::json!({ "from": from, "to": to })), None)
            }
            PymoveError::ApplyError { file, .. } => {
                let details = file.as_ref().map(|f| serde_json::json!({ "file": f }));
                (details, None)
            }
            _ => (None, None),
        };

        ErrorInfo {
            code,
            message,
            details,
            location,
        }
    }
}

/// Error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Error information.
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Create an error response from a PymoveError.
    pub fn from_error(err: &PymoveError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Deterministic Serialization
// ============================================================================

fn serialize_sorted_warnings<S>(warnings: &[Warning], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut sorted: Vec<_> = warnings.iter().collect();
    sorted.sort_by(|a, b| (&a.file, &a.code, &a.message).cmp(&(&b.file, &b.code, &b.message)));
    sorted.serialize(serializer)
}

fn serialize_sorted_edges<S>(edges: &[EdgeInfo], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut sorted: Vec<_> = edges.iter().collect();
    sorted.sort();
    sorted.serialize(serializer)
}

fn serialize_sorted_changes<S>(files: &[FileChange], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut sorted: Vec<_> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    sorted.serialize(serializer)
}

// ============================================================================
// Emit
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
///
/// This is the single output path for CLI, ensuring consistency.
/// The output is deterministic: same input produces identical bytes.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_has_status_first() {
        let err = PymoveError::nothing_to_move("mod1.py", 4, 0);
        let resp = ErrorResponse::from_error(&err);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.starts_with("{\"status\":\"error\""));
        assert!(json.contains("\"code\":3"));
        assert!(json.contains("\"line\":4"));
    }

    #[test]
    fn object_mismatch_details() {
        let err = PymoveError::ObjectMismatch {
            from: "a.f".to_string(),
            to: "b.g".to_string(),
        };
        let info = ErrorInfo::from_error(&err);
        let details = info.details.unwrap();
        assert_eq!(details["from"], "a.f");
        assert_eq!(details["to"], "b.g");
    }

    #[test]
    fn graph_edges_serialize_sorted() {
        let edges = vec![
            EdgeInfo {
                dependent: "pkg.b".to_string(),
                dependency: "pkg.a".to_string(),
            },
            EdgeInfo {
                dependent: "pkg.a".to_string(),
                dependency: "pkg.c".to_string(),
            },
        ];
        let resp = GraphResponse::new(Vec::new(), edges, Vec::new());
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["edges"][0]["dependent"], "pkg.a");
        assert_eq!(value["edges"][1]["dependent"], "pkg.b");
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
    }

    #[test]
    fn move_response_orders_files_by_path() {
        let change = |path: &str| FileChange {
            path: path.to_string(),
            module: String::new(),
            edits: Vec::new(),
            diff: String::new(),
        };
        let resp = MoveResponse::new(
            Some("f".to_string()),
            "pkg.a",
            "pkg.b",
            vec![change("z.py"), change("a.py")],
            false,
            Vec::new(),
        );
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["files"][0]["path"], "a.py");
        assert_eq!(value["applied"], false);
    }

    #[test]
    fn emit_is_pretty_and_newline_terminated() {
        let resp = DiffResponse::new(Vec::new());
        let mut buf = Vec::new();
        emit_response(&resp, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("{\n"));
        assert!(text.ends_with("}\n"));
    }
}
