//! The move-symbol refactoring.
//!
//! A move runs in two phases so the editor can pick the destination after
//! the symbol was chosen:
//!
//! 1. [`move_source::start_move`] finds the top-level definition at a
//!    position, works out which imports it needs, and prepares the source
//!    tree without it. Nothing is committed.
//! 2. [`move_target::finish_move`] inserts the definition into the target,
//!    rewrites imports in the target and every dependent of the source, and
//!    commits all trees and graph edges together.
//!
//! [`replace_imports::ImportReplacer`] does the import rewriting for both.

pub mod move_source;
pub mod move_target;
pub mod replace_imports;

use thiserror::Error;

use crate::cst::{EditError, SourceTree};
use crate::graph::{GraphError, ModuleId};
use crate::imports::{ImportBinding, ImportKind, ModuleImports};
use crate::scope::{module_definitions, Definition};

// ============================================================================
// Error Types
// ============================================================================

/// Errors from the move phases.
#[derive(Debug, Error)]
pub enum MoveError {
    /// A replacement pair renames the object instead of moving it.
    #[error("cannot replace '{from}' with '{to}': object names differ")]
    ObjectMismatch { from: String, to: String },

    /// The source module changed after the move was started.
    #[error("module {module} changed since the move started")]
    StaleSource { module: String },

    /// A module handle did not resolve.
    #[error("module not found: {id}")]
    ModuleNotFound { id: ModuleId },

    /// Applying edits to a tree failed.
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result type for move operations.
pub type MoveResult<T> = Result<T, MoveError>;

// ============================================================================
// Module Name Table
// ============================================================================

/// What a module-scope name refers to.
#[derive(Debug)]
pub(crate) enum Lookup<'a> {
    /// Bound by imports; every module-scope import binding of the name.
    Imported(Vec<&'a ImportBinding>),
    /// Bound by a definition in the module itself.
    Local,
    /// Not bound at module scope (builtins, star imports, typos).
    Unbound,
}

/// Module-scope bindings of one module: its imports and its definitions.
#[derive(Debug)]
pub(crate) struct NameTable {
    pub(crate) imports: ModuleImports,
    definitions: Vec<Definition>,
}

impl NameTable {
    pub(crate) fn new(tree: &SourceTree, package: &str) -> Self {
        NameTable {
            imports: ModuleImports::collect(tree, package),
            definitions: module_definitions(tree),
        }
    }

    /// Resolve a module-scope name. When both imports and definitions bind
    /// it, the binding latest in the file wins.
    pub(crate) fn lookup(&self, name: &str) -> Lookup<'_> {
        let imported: Vec<&ImportBinding> = self
            .imports
            .module_scope()
            .filter(|b| b.kind != ImportKind::Star && b.name == name)
            .collect();
        let last_import = imported.iter().map(|b| b.offset).max();
        let last_definition = self
            .definitions
            .iter()
            .filter(|d| d.name == name)
            .map(|d| d.offset)
            .max();
        match (last_import, last_definition) {
            (Some(i), Some(d)) if d > i => Lookup::Local,
            (Some(_), _) => Lookup::Imported(imported),
            (None, Some(_)) => Lookup::Local,
            (None, None) => Lookup::Unbound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(code: &str) -> NameTable {
        NameTable::new(&SourceTree::parse(code).unwrap(), "proj")
    }

    #[test]
    fn import_then_definition_is_local() {
        let t = table("from proj.a import x\nx = 1\n");
        assert!(matches!(t.lookup("x"), Lookup::Local));
    }

    #[test]
    fn definition_then_import_is_imported() {
        let t = table("x = 1\nfrom proj.a import x\n");
        match t.lookup("x") {
            Lookup::Imported(bindings) => assert_eq!(bindings[0].target, "proj.a.x"),
            other => panic!("unexpected lookup: {:?}", other),
        }
    }

    #[test]
    fn unknown_names_are_unbound() {
        let t = table("from proj.a import *\n");
        assert!(matches!(t.lookup("print"), Lookup::Unbound));
    }

    #[test]
    fn function_level_imports_do_not_bind() {
        let t = table("def f():\n    import os\n");
        assert!(matches!(t.lookup("os"), Lookup::Unbound));
        assert!(matches!(t.lookup("f"), Lookup::Local));
    }
}
