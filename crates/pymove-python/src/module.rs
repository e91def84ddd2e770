//! Python modules: one source file with its identity and current tree.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::cst::{ParseError, SourceTree};
use crate::resolve::strip_init;
use crate::scope::module_definitions;

// ============================================================================
// Error Types
// ============================================================================

/// Errors loading a module.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The parser could not run on the file.
    ///
    /// Syntax errors do not produce this; such modules load with a lossy tree.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },
}

/// Result type for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

// ============================================================================
// Symbols
// ============================================================================

/// Kind of a module-scope definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Variable,
}

/// A name defined at module scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based line of the defining statement.
    pub line: usize,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, line: usize) -> Self {
        Symbol {
            name: name.into(),
            kind,
            line,
        }
    }
}

// ============================================================================
// Module
// ============================================================================

/// One Python source file.
///
/// `package` is the dotted package path containing the file (`proj.pkg`),
/// `name` is the file stem (`mod2`, or `__init__` for package initializers).
/// `text` is the last content known to be on disk; `tree` is the current
/// tree, which runs ahead of `text` while a refactoring is being delivered.
#[derive(Debug, Clone)]
pub struct Module {
    pub path: PathBuf,
    pub package: String,
    pub name: String,
    /// Project folder this module was discovered under.
    pub folder: PathBuf,
    text: String,
    tree: SourceTree,
    symbols: BTreeSet<Symbol>,
    parse_error: Option<String>,
}

impl Module {
    /// Read and parse a module from disk.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. A file that does not
    /// parse still loads, with [`Module::parse_error`] set and a lossy tree.
    pub fn load(
        path: &Path,
        folder: &Path,
        package: impl Into<String>,
        name: impl Into<String>,
    ) -> ModuleResult<Module> {
        let bytes = fs::read(path).map_err(|source| ModuleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Module::from_source(path, folder, package, name, text)
    }

    /// Build a module from in-memory source.
    pub fn from_source(
        path: &Path,
        folder: &Path,
        package: impl Into<String>,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> ModuleResult<Module> {
        let text = text.into();
        let (tree, parse_error) = parse_or_lossy(path, &text)?;
        let symbols = collect_symbols(&tree);
        Ok(Module {
            path: path.to_path_buf(),
            package: package.into(),
            name: name.into(),
            folder: folder.to_path_buf(),
            text,
            tree,
            symbols,
            parse_error,
        })
    }

    /// Dotted name including `__init__` for package initializers.
    pub fn full_mod_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    /// The name other modules import this module by (`__init__` dropped).
    pub fn import_name(&self) -> String {
        strip_init(&self.full_mod_name())
    }

    /// The package used to resolve this module's relative imports.
    pub fn resolution_package(&self) -> &str {
        &self.package
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tree(&self) -> &SourceTree {
        &self.tree
    }

    pub fn symbols(&self) -> &BTreeSet<Symbol> {
        &self.symbols
    }

    /// Look up a module-scope symbol by name.
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// The parse error message, when the file did not parse cleanly.
    pub fn parse_error(&self) -> Option<&str> {
        self.parse_error.as_deref()
    }

    /// Whether the tree still matches the last known on-disk text.
    pub fn is_synced(&self) -> bool {
        self.tree.code() == self.text
    }

    /// Replace the current tree, keeping `text` as the on-disk baseline.
    pub fn set_tree(&mut self, tree: SourceTree) {
        self.symbols = collect_symbols(&tree);
        self.parse_error = tree
            .first_error()
            .map(|(line, column)| ParseError::Syntax { line, column }.to_string());
        self.tree = tree;
    }

    /// Record the current tree's code as the on-disk text.
    pub fn mark_synced(&mut self) {
        self.text = self.tree.code().to_string();
    }

    /// Replace text and tree with new on-disk content.
    pub fn reload(&mut self, text: impl Into<String>) -> ModuleResult<()> {
        let text = text.into();
        let (tree, parse_error) = parse_or_lossy(&self.path, &text)?;
        self.symbols = collect_symbols(&tree);
        self.tree = tree;
        self.parse_error = parse_error;
        self.text = text;
        Ok(())
    }
}

fn parse_or_lossy(path: &Path, text: &str) -> ModuleResult<(SourceTree, Option<String>)> {
    let tree = SourceTree::parse_lossy(text).map_err(|source| ModuleError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    match tree.first_error() {
        None => Ok((tree, None)),
        Some((line, column)) => {
            let message = ParseError::Syntax { line, column }.to_string();
            warn!(path = %path.display(), error = %message, "module does not parse");
            Ok((tree, Some(message)))
        }
    }
}

fn collect_symbols(tree: &SourceTree) -> BTreeSet<Symbol> {
    let mut latest: BTreeMap<String, Symbol> = BTreeMap::new();
    for def in module_definitions(tree) {
        let symbol = Symbol::new(def.name.clone(), def.kind, def.line);
        latest.insert(def.name, symbol);
    }
    latest.into_values().collect()
}
