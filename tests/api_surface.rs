//! Compile-only test to verify public API surface.
//!
//! This file serves as a compile-time contract for the public API.
//! If this file fails to compile, the public API has regressed.
//!
//! Run with: cargo test -- api_surface

// Allow unused imports - this test is about compile-time verification, not runtime usage
#![allow(unused_imports)]

// ============================================================================
// Core Infrastructure Types
// ============================================================================

// edit module - spans, positions and text edits
use pymove::edit::{Position, Range, Span, TextEdit};

// diff module - edit diff builder
use pymove::diff::{
    apply_edit_blocks, apply_edits, edit_blocks, matching_blocks, text_edits, unified_diff,
    DiffError, EditBlock, MatchingBlock,
};

// error module - error types and codes
use pymove::error::{OutputErrorCode, PymoveError};

// output module - JSON output types
use pymove::output::{
    emit_response, ConfigResponse, DiffResponse, EdgeInfo, ErrorInfo, ErrorResponse, FileChange,
    GraphResponse, ModuleInfo, MoveResponse, Warning, SCHEMA_VERSION,
};

// text module - position utilities
use pymove::text::{blank_lines_after, blank_lines_before, offset_to_position, position_to_offset};

// types module - shared location type
use pymove::types::Location;

// ============================================================================
// Python Layer
// ============================================================================

use pymove::python::config::{
    find_project_file, load_project_config, project_name, ConfigError, FormatterConfig,
    ProjectConfig,
};
use pymove::python::cst::{EditError, ParseError, SourceTree, Statement, StatementKind, StmtId, TreeEditor};
use pymove::python::format::{format_source, FormatError, Formatter};
use pymove::python::graph::{build_graph, module_dependencies, DependencyGraph, Edge, GraphError, ModuleId};
use pymove::python::imports::{ImportKind, ImportPath, ImportStatement, ModuleImports};
use pymove::python::module::{Module, ModuleError, Symbol, SymbolKind};
use pymove::python::ops::move_source::{start_move, MoveSource};
use pymove::python::ops::move_target::finish_move;
use pymove::python::ops::replace_imports::ImportReplacer;
use pymove::python::ops::MoveError;
use pymove::python::registry::{scan_folder, scan_project, RegistryError, ScanDiagnostic, ScanResult};
use pymove::python::resolve::{resolve_name, resolve_qualified, split_qualified, ResolveError};
use pymove::python::session::{ModuleChange, MoveOutcome, SessionError, Workspace};

// ============================================================================
// Front Door
// ============================================================================

use pymove::cli::{run_config, run_diff, run_graph, run_move};

#[test]
fn api_surface_compiles() {
    // Every subsystem error converts into the unified error.
    fn bridges<E: Into<PymoveError>>() {}
    bridges::<SessionError>();
    bridges::<ConfigError>();
    bridges::<RegistryError>();
    bridges::<MoveError>();
    bridges::<GraphError>();
    bridges::<ModuleError>();
    bridges::<ParseError>();
    bridges::<EditError>();
}
