//! CLI front door.
//!
//! Provides the command helpers behind the `pymove` binary:
//! - `graph` - Dump the project's modules and dependency edges
//! - `config` - Print the resolved project configuration
//! - `move` - Move a top-level definition and repair imports project-wide
//! - `diff` - Text edits between two files
//!
//! ## Error Handling
//!
//! All functions return `Result<String, PymoveError>`, where the string is
//! the pretty-printed JSON response. Subsystem errors convert into
//! `PymoveError` through the `From` impls in `pymove-python`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use pymove_core::diff::{text_edits, unified_diff};
use pymove_core::error::PymoveError;
use pymove_core::output::{
    ConfigResponse, DiffResponse, EdgeInfo, FileChange, GraphResponse, ModuleInfo, MoveResponse,
    Warning,
};
use pymove_core::types::Location;
use pymove_python::config::load_project_config;
use pymove_python::session::{ModuleChange, Workspace};

// ============================================================================
// Commands
// ============================================================================

/// Scan the project containing `workspace` and describe its graph.
pub fn run_graph(workspace: &Path) -> Result<String, PymoveError> {
    let ws = Workspace::open(workspace)?;
    let root = ws.config().root.clone();
    let graph = ws.graph();

    let mut modules: Vec<ModuleInfo> = graph
        .modules()
        .map(|(_, module)| ModuleInfo {
            name: module.full_mod_name(),
            path: display_path(&root, &module.path),
            parse_error: module.parse_error().is_some(),
        })
        .collect();
    modules.sort_by(|a, b| a.name.cmp(&b.name));

    let edges = graph
        .edges()
        .into_iter()
        .map(|edge| EdgeInfo {
            dependent: graph.display_name(edge.dependent),
            dependency: graph.display_name(edge.dependency),
        })
        .collect();

    let warnings = ws
        .diagnostics()
        .iter()
        .map(|d| {
            Warning::new(
                "scan_diagnostic",
                d.message.clone(),
                Some(display_path(&root, &d.path)),
            )
        })
        .collect();

    to_json(&GraphResponse::new(modules, edges, warnings))
}

/// Print the configuration of the project containing `workspace`.
pub fn run_config(workspace: &Path) -> Result<String, PymoveError> {
    let config = load_project_config(workspace)?;
    let value = serde_json::to_value(&config)
        .map_err(|e| PymoveError::internal(format!("JSON serialization error: {}", e)))?;
    to_json(&ConfigResponse::new(value))
}

/// Move the definition at `from` (`path:line:col`) before line `to`
/// (`path:line`) of another module.
///
/// Without `apply` nothing is written; the response carries the edits and a
/// unified diff per changed file either way.
pub fn run_move(
    workspace: &Path,
    from: &str,
    to: &str,
    apply: bool,
    format: bool,
) -> Result<String, PymoveError> {
    let from_loc = Location::parse(from).ok_or_else(|| {
        PymoveError::invalid_args(format!(
            "invalid location format '{}', expected path:line:col",
            from
        ))
    })?;
    let to_loc = Location::parse_line(to).ok_or_else(|| {
        PymoveError::invalid_args(format!(
            "invalid location format '{}', expected path:line",
            to
        ))
    })?;

    let mut ws = Workspace::open(workspace)?;
    let source_path = resolve_path(workspace, &from_loc.file);
    let target_path = resolve_path(workspace, &to_loc.file);
    let source = ws.module_id(&source_path)?;
    let target = ws.module_id(&target_path)?;
    let source_name = ws.graph().display_name(source);
    let target_name = ws.graph().display_name(target);

    let started = ws.start_move(
        &source_path,
        from_loc.line as usize,
        from_loc.column_offset() as usize,
    )?;
    if started.is_none() {
        return Err(PymoveError::nothing_to_move(
            from_loc.file,
            from_loc.line,
            from_loc.col,
        ));
    }

    let outcome = ws.finish_move(&target_path, to_loc.line as usize, format)?;
    let root = ws.config().root.clone();
    ws.close();

    let mut warnings = Vec::new();
    if outcome.is_empty() {
        warnings.push(Warning::new(
            "nothing_moved",
            format!("{} is already defined in {}", from_loc.file, target_name),
            Some(from_loc.file.clone()),
        ));
    }

    let files: Vec<FileChange> = outcome
        .changes
        .iter()
        .map(|change| file_change(&root, change))
        .collect();

    if apply {
        for change in &outcome.changes {
            write_change(change)?;
        }
        info!(files = outcome.changes.len(), "applied move");
    }

    let symbol = (!outcome.symbol.is_empty()).then(|| outcome.symbol.clone());
    to_json(&MoveResponse::new(
        symbol,
        source_name,
        target_name,
        files,
        apply,
        warnings,
    ))
}

/// Text edits turning `original` into `updated`.
pub fn run_diff(original: &Path, updated: &Path) -> Result<String, PymoveError> {
    let a = read_text(original)?;
    let b = read_text(updated)?;
    to_json(&DiffResponse::new(text_edits(&a, &b)))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn to_json<T: Serialize>(response: &T) -> Result<String, PymoveError> {
    serde_json::to_string_pretty(response)
        .map_err(|e| PymoveError::internal(format!("JSON serialization error: {}", e)))
}

/// Relative paths on the command line are taken from the workspace directory.
fn resolve_path(workspace: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn file_change(root: &Path, change: &ModuleChange) -> FileChange {
    let path = display_path(root, &change.path);
    FileChange {
        diff: unified_diff(&path, &change.old_text, &change.new_text),
        path,
        module: change.module.clone(),
        edits: change.edits.clone(),
    }
}

fn write_change(change: &ModuleChange) -> Result<(), PymoveError> {
    fs::write(&change.path, &change.new_text).map_err(|e| {
        warn!(path = %change.path.display(), error = %e, "write failed");
        PymoveError::apply(
            format!("failed to write {}: {}", change.path.display(), e),
            Some(change.path.display().to_string()),
        )
    })
}

fn read_text(path: &Path) -> Result<String, PymoveError> {
    fs::read_to_string(path).map_err(|e| {
        PymoveError::invalid_args_with_details(
            format!("cannot read {}: {}", path.display(), e),
            serde_json::json!({ "path": path.display().to_string() }),
        )
    })
}
