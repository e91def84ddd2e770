//! Per-workspace session state.
//!
//! A [`Workspace`] owns one project's configuration, its dependency graph,
//! and the single pending move slot. Editors talk to it in file terms:
//! save notifications resync the saved module, and a move is started at a
//! position in one file and finished at a line in another.

use std::path::{Path, PathBuf};

use pymove_core::diff::text_edits;
use pymove_core::edit::TextEdit;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{load_project_config, ConfigError, ProjectConfig};
use crate::cst::{ParseError, SourceTree};
use crate::format::{format_source, Formatter};
use crate::graph::{build_graph, DependencyGraph, GraphError, ModuleId};
use crate::module::ModuleError;
use crate::ops::move_source::{start_move, MoveSource};
use crate::ops::move_target::finish_move;
use crate::ops::MoveError;
use crate::registry::{RegistryError, ScanDiagnostic};

// ============================================================================
// Error Types
// ============================================================================

/// Errors from workspace operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The path is not a module of this workspace.
    #[error("module not found: {path}")]
    ModuleNotFound { path: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Move(#[from] MoveError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Result type for workspace operations.
pub type SessionResult<T> = Result<T, SessionError>;

// ============================================================================
// Move Results
// ============================================================================

/// One module rewritten by a move.
#[derive(Debug, Clone)]
pub struct ModuleChange {
    pub id: ModuleId,
    pub path: PathBuf,
    /// Dotted module name.
    pub module: String,
    /// Text before the move.
    pub old_text: String,
    pub new_text: String,
    /// Edits turning `old_text` into `new_text`.
    pub edits: Vec<TextEdit>,
}

/// Everything a finished move changed.
#[derive(Debug, Clone, Default)]
pub struct MoveOutcome {
    /// Qualified name before the move; empty when nothing moved.
    pub symbol: String,
    /// Qualified name after the move.
    pub moved_to: String,
    /// Changed modules, source and target first.
    pub changes: Vec<ModuleChange>,
}

impl MoveOutcome {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

// ============================================================================
// Workspace
// ============================================================================

/// One open project.
#[derive(Debug)]
pub struct Workspace {
    config: ProjectConfig,
    graph: DependencyGraph,
    diagnostics: Vec<ScanDiagnostic>,
    pending: Option<MoveSource>,
}

impl Workspace {
    /// Open the project containing `path`.
    pub fn open(path: &Path) -> SessionResult<Workspace> {
        Workspace::from_config(load_project_config(path)?)
    }

    /// Scan a project and build its graph.
    pub fn from_config(config: ProjectConfig) -> SessionResult<Workspace> {
        let (graph, diagnostics) = build_graph(&config)?;
        info!(
            project = %config.project_name,
            modules = graph.len(),
            edges = graph.edge_count(),
            "opened workspace"
        );
        Ok(Workspace {
            config,
            graph,
            diagnostics,
            pending: None,
        })
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Problems found while scanning.
    pub fn diagnostics(&self) -> &[ScanDiagnostic] {
        &self.diagnostics
    }

    /// The module loaded from `path`.
    pub fn module_id(&self, path: &Path) -> SessionResult<ModuleId> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.root.join(path)
        };
        let canonical = absolute.canonicalize().unwrap_or_else(|_| absolute.clone());
        self.graph
            .node_from_file(&canonical)
            .or_else(|| self.graph.node_from_file(&absolute))
            .or_else(|| self.graph.node_from_file(path))
            .ok_or_else(|| SessionError::ModuleNotFound {
                path: path.display().to_string(),
            })
    }

    /// Record new on-disk content for a module and rebuild its edges.
    ///
    /// Returns the module's new edge count.
    pub fn did_save(&mut self, path: &Path, text: &str) -> SessionResult<usize> {
        let id = self.module_id(path)?;
        let module = self
            .graph
            .module_mut(id)
            .ok_or(GraphError::ModuleNotFound { id })?;
        module.reload(text)?;
        let tree = module.tree().clone();
        let edges = self.graph.resync(id, tree)?;
        debug!(path = %path.display(), edges, "module saved");
        Ok(edges)
    }

    /// Start moving the definition at `line` (1-based) and `column`
    /// (0-based) of `path`, replacing any pending move.
    ///
    /// Returns the pending move, or `None` when no top-level definition
    /// starts there.
    pub fn start_move(
        &mut self,
        path: &Path,
        line: usize,
        column: usize,
    ) -> SessionResult<Option<&MoveSource>> {
        let id = self.module_id(path)?;
        let module = self
            .graph
            .module(id)
            .ok_or(GraphError::ModuleNotFound { id })?;
        let moved = start_move(module, id, line, column)?;
        if self.pending.is_some() {
            debug!("replacing pending move");
        }
        self.pending = if moved.is_empty() { None } else { Some(moved) };
        Ok(self.pending.as_ref())
    }

    pub fn pending_move(&self) -> Option<&MoveSource> {
        self.pending.as_ref()
    }

    /// Drop the pending move.
    pub fn cancel_move(&mut self) -> Option<MoveSource> {
        self.pending.take()
    }

    /// Finish the pending move into `path` before `line`.
    ///
    /// With `format` (or formatting enabled in the project configuration)
    /// every changed module is run through the external formatter. The
    /// pending move is consumed even when finishing fails.
    pub fn finish_move(&mut self, path: &Path, line: usize, format: bool) -> SessionResult<MoveOutcome> {
        let target = self.module_id(path)?;
        let Some(moved) = self.pending.take() else {
            debug!("no pending move");
            return Ok(MoveOutcome::default());
        };
        let symbol = moved.qualified_name();
        let symbol_name = moved.symbol_name.clone();
        let edited = finish_move(&mut self.graph, target, moved, line)?;
        if edited.is_empty() {
            return Ok(MoveOutcome::default());
        }

        let formatter = if format || self.config.formatter.enabled {
            match Formatter::from_config(&self.config.formatter) {
                Ok(formatter) => Some(formatter),
                Err(err) => {
                    warn!(error = %err, "formatter unavailable, leaving modules unformatted");
                    None
                }
            }
        } else {
            None
        };

        let mut changes = Vec::with_capacity(edited.len());
        for id in edited {
            if let Some(formatter) = &formatter {
                self.format_module(formatter, id)?;
            }
            let module = self
                .graph
                .module_mut(id)
                .ok_or(GraphError::ModuleNotFound { id })?;
            let old_text = module.text().to_string();
            let new_text = module.tree().code().to_string();
            module.mark_synced();
            changes.push(ModuleChange {
                id,
                path: module.path.clone(),
                module: module.full_mod_name(),
                edits: text_edits(&old_text, &new_text),
                old_text,
                new_text,
            });
        }

        let moved_to = self
            .graph
            .module(target)
            .map(|m| format!("{}.{}", m.import_name(), symbol_name))
            .unwrap_or_default();
        info!(symbol = %symbol, to = %moved_to, modules = changes.len(), "move delivered");
        Ok(MoveOutcome {
            symbol,
            moved_to,
            changes,
        })
    }

    fn format_module(&mut self, formatter: &Formatter, id: ModuleId) -> SessionResult<()> {
        let Some(module) = self.graph.module(id) else {
            return Ok(());
        };
        let code = module.tree().code();
        let formatted = format_source(formatter, &module.path, code);
        if formatted != code {
            let tree = SourceTree::parse_lossy(&formatted)?;
            self.graph.resync(id, tree)?;
        }
        Ok(())
    }

    /// Close the workspace, dropping the graph and any pending move.
    pub fn close(self) {
        info!(
            project = %self.config.project_name,
            pending = self.pending.is_some(),
            "closed workspace"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pymove_core::diff::apply_edits;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "pyproject.toml",
            "[project]\nname = \"proj\"\n\n[tool.pymove]\nfolders = [\"proj\"]\n",
        );
        write(tmp.path(), "proj/__init__.py", "");
        write(
            tmp.path(),
            "proj/mod1.py",
            "x = 1\n\n\ndef f():\n    return x\n\n\nclass K:\n    pass\n",
        );
        write(tmp.path(), "proj/mod2.py", "y = 2\n");
        write(tmp.path(), "proj/mod3.py", "from proj.mod1 import f\n\nf()\n");
        tmp
    }

    #[test]
    fn opens_from_nested_path() {
        let tmp = project();
        let ws = Workspace::open(&tmp.path().join("proj")).unwrap();
        assert_eq!(ws.config().project_name, "proj");
        assert_eq!(ws.graph().len(), 4);
        assert!(ws.diagnostics().is_empty());
        assert!(ws.module_id(Path::new("proj/mod1.py")).is_ok());
        assert!(matches!(
            ws.module_id(Path::new("proj/missing.py")),
            Err(SessionError::ModuleNotFound { .. })
        ));
    }

    #[test]
    fn move_reports_changes() {
        let tmp = project();
        let mut ws = Workspace::open(tmp.path()).unwrap();
        let pending = ws.start_move(Path::new("proj/mod1.py"), 4, 0).unwrap();
        assert_eq!(pending.map(|m| m.symbol_name.as_str()), Some("f"));

        let outcome = ws.finish_move(Path::new("proj/mod2.py"), 100, false).unwrap();
        assert_eq!(outcome.symbol, "proj.mod1.f");
        assert_eq!(outcome.moved_to, "proj.mod2.f");
        let modules: Vec<&str> = outcome.changes.iter().map(|c| c.module.as_str()).collect();
        assert_eq!(modules, vec!["proj.mod1", "proj.mod2", "proj.mod3"]);
        for change in &outcome.changes {
            assert_eq!(apply_edits(&change.old_text, &change.edits).unwrap(), change.new_text);
            let module = ws.graph().module(change.id).unwrap();
            assert!(module.is_synced());
        }
        assert_eq!(
            outcome.changes[1].new_text,
            "from proj.mod1 import x\n\ny = 2\n\n\ndef f():\n    return x\n"
        );
        assert!(ws.pending_move().is_none());
    }

    #[test]
    fn last_start_wins() {
        let tmp = project();
        let mut ws = Workspace::open(tmp.path()).unwrap();
        ws.start_move(Path::new("proj/mod1.py"), 4, 0).unwrap();
        ws.start_move(Path::new("proj/mod1.py"), 8, 0).unwrap();
        assert_eq!(ws.pending_move().unwrap().symbol_name, "K");
        assert!(ws.start_move(Path::new("proj/mod1.py"), 1, 0).unwrap().is_none());
        assert!(ws.pending_move().is_none());
    }

    #[test]
    fn cancel_and_finish_without_pending() {
        let tmp = project();
        let mut ws = Workspace::open(tmp.path()).unwrap();
        ws.start_move(Path::new("proj/mod1.py"), 4, 0).unwrap();
        assert!(ws.cancel_move().is_some());
        let outcome = ws.finish_move(Path::new("proj/mod2.py"), 1, false).unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn save_resyncs_edges() {
        let tmp = project();
        let mut ws = Workspace::open(tmp.path()).unwrap();
        let mod2 = ws.module_id(Path::new("proj/mod2.py")).unwrap();
        assert!(ws.graph().outgoing(mod2).is_empty());

        let edges = ws
            .did_save(Path::new("proj/mod2.py"), "from proj.mod1 import x, f\n")
            .unwrap();
        assert_eq!(edges, 2);
        assert_eq!(ws.graph().outgoing(mod2).len(), 2);
        assert!(ws.graph().module(mod2).unwrap().is_synced());
    }

    #[test]
    fn save_invalidates_pending_move() {
        let tmp = project();
        let mut ws = Workspace::open(tmp.path()).unwrap();
        ws.start_move(Path::new("proj/mod1.py"), 4, 0).unwrap();
        ws.did_save(Path::new("proj/mod1.py"), "x = 2\n").unwrap();
        let err = ws
            .finish_move(Path::new("proj/mod2.py"), 1, false)
            .unwrap_err();
        assert!(matches!(err, SessionError::Move(MoveError::StaleSource { .. })));
        assert!(ws.pending_move().is_none());
    }
}
