//! Python support for pymove.
//!
//! This crate provides:
//! - Lossless Python source trees (tree-sitter) with top-level statement
//!   indexing and batched edits
//! - Import tables, scope-aware reference collection and qualified-name
//!   resolution
//! - Project configuration, module discovery and the module dependency graph
//! - The two-phase move-symbol refactoring with project-wide import repair
//! - An external formatter step and the per-workspace session

pub mod config;
pub mod cst;
pub mod format;
pub mod graph;
pub mod imports;
pub mod module;
pub mod ops;
pub mod registry;
pub mod resolve;
pub mod scope;
pub mod session;

// Error bridges - converts Python-layer errors to PymoveError
mod error_bridges;

pub use config::{load_project_config, FormatterConfig, ProjectConfig};
pub use graph::{build_graph, DependencyGraph, Edge, ModuleId};
pub use module::{Module, Symbol, SymbolKind};
pub use ops::move_source::{start_move, MoveSource};
pub use ops::move_target::finish_move;
pub use ops::MoveError;
pub use session::{ModuleChange, MoveOutcome, SessionError, Workspace};
