//! The project dependency graph.
//!
//! Nodes are [`Module`]s addressed by [`ModuleId`] handles. An edge
//! `(dependent, dependency)` records one import binding in `dependent` that
//! resolves into `dependency`; several bindings into the same module give
//! several parallel edges. Each edge carries the imported object name, or
//! `None` for module and star imports.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ProjectConfig;
use crate::cst::SourceTree;
use crate::imports::{ImportKind, ImportPath, ModuleImports};
use crate::module::{Module, Symbol};
use crate::registry::{scan_project, RegistryResult, ScanDiagnostic};
use crate::resolve::resolve_qualified;

// ============================================================================
// Types
// ============================================================================

/// Stable handle of a module in a [`DependencyGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(NodeIndex);

impl ModuleId {
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

/// Errors from graph operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// No edge matches the one to remove.
    #[error("edge not found: {dependent} -> {dependency}")]
    EdgeNotFound {
        dependent: String,
        dependency: String,
    },

    /// The handle does not name a module of this graph.
    #[error("module not found: {id}")]
    ModuleNotFound { id: ModuleId },
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// One dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub dependent: ModuleId,
    pub dependency: ModuleId,
    /// The object imported from `dependency`, if the import names one.
    pub symbol: Option<String>,
}

impl Edge {
    pub fn new(dependent: ModuleId, dependency: ModuleId, symbol: Option<String>) -> Self {
        Edge {
            dependent,
            dependency,
            symbol,
        }
    }
}

// ============================================================================
// Dependency Graph
// ============================================================================

/// Directed multigraph of module dependencies.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: StableDiGraph<Module, Option<String>>,
    by_name: HashMap<String, ModuleId>,
    by_path: HashMap<PathBuf, ModuleId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from loaded modules and compute every module's edges.
    pub fn from_modules(modules: Vec<Module>) -> Self {
        let mut graph = DependencyGraph::new();
        let ids: Vec<ModuleId> = modules.into_iter().map(|m| graph.add_node(m)).collect();
        for id in ids {
            for edge in graph.import_edges(id) {
                graph.add_edge(edge);
            }
        }
        info!(
            modules = graph.len(),
            edges = graph.edge_count(),
            "built dependency graph"
        );
        graph
    }

    /// Append a module. No deduplication is performed; a later module with
    /// the same name or path shadows the earlier one in lookups.
    pub fn add_node(&mut self, module: Module) -> ModuleId {
        let name = module.full_mod_name();
        let path = module.path.clone();
        let id = ModuleId(self.graph.add_node(module));
        if let Some(previous) = self.by_name.insert(name.clone(), id) {
            debug!(module = %name, %previous, "module name shadowed");
        }
        self.by_path.insert(path, id);
        id
    }

    /// Insert a module, replacing the one with the same dotted name.
    ///
    /// A replaced module keeps its handle and edges; its outgoing edges are
    /// stale until [`DependencyGraph::resync`] runs.
    pub fn upsert_module(&mut self, module: Module) -> ModuleId {
        let name = module.full_mod_name();
        match self.by_name.get(&name).copied() {
            Some(id) => {
                if let Some(slot) = self.graph.node_weight_mut(id.0) {
                    self.by_path.insert(module.path.clone(), id);
                    *slot = module;
                }
                id
            }
            None => self.add_node(module),
        }
    }

    /// Append an edge. Parallel edges are kept.
    pub fn add_edge(&mut self, edge: Edge) {
        if self.graph.contains_node(edge.dependent.0) && self.graph.contains_node(edge.dependency.0) {
            self.graph
                .add_edge(edge.dependent.0, edge.dependency.0, edge.symbol);
        }
    }

    /// Remove one edge equal to `edge`.
    pub fn remove_edge(&mut self, edge: &Edge) -> GraphResult<()> {
        let found = self
            .graph
            .edges_directed(edge.dependent.0, Direction::Outgoing)
            .find(|e| e.target() == edge.dependency.0 && *e.weight() == edge.symbol)
            .map(|e| e.id());
        match found {
            Some(id) => {
                self.graph.remove_edge(id);
                Ok(())
            }
            None => Err(GraphError::EdgeNotFound {
                dependent: self.display_name(edge.dependent),
                dependency: self.display_name(edge.dependency),
            }),
        }
    }

    /// Remove every outgoing edge of `id`.
    pub fn reset_dependencies(&mut self, id: ModuleId) {
        let edges: Vec<_> = self
            .graph
            .edges_directed(id.0, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in edges {
            self.graph.remove_edge(edge);
        }
    }

    /// Find a module by dotted name, falling back to `<name>.__init__`.
    pub fn node_from_path(&self, name: &str) -> Option<ModuleId> {
        self.by_name
            .get(name)
            .or_else(|| self.by_name.get(&format!("{}.__init__", name)))
            .copied()
    }

    /// Find a module by file path.
    pub fn node_from_file(&self, path: &Path) -> Option<ModuleId> {
        self.by_path.get(path).copied()
    }

    /// Distinct modules `id` depends on.
    pub fn children(&self, id: ModuleId) -> Vec<ModuleId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Distinct modules depending on `id`.
    pub fn parents(&self, id: ModuleId) -> Vec<ModuleId> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: ModuleId, direction: Direction) -> Vec<ModuleId> {
        let set: BTreeSet<ModuleId> = self
            .graph
            .neighbors_directed(id.0, direction)
            .map(ModuleId)
            .collect();
        set.into_iter().collect()
    }

    /// Every edge, sorted.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .graph
            .edge_references()
            .map(|e| Edge::new(ModuleId(e.source()), ModuleId(e.target()), e.weight().clone()))
            .collect();
        edges.sort();
        edges
    }

    /// Outgoing edges of `id`, sorted.
    pub fn outgoing(&self, id: ModuleId) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .graph
            .edges_directed(id.0, Direction::Outgoing)
            .map(|e| Edge::new(id, ModuleId(e.target()), e.weight().clone()))
            .collect();
        edges.sort();
        edges
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All modules with their handles, in insertion order.
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.graph
            .node_indices()
            .map(move |idx| (ModuleId(idx), &self.graph[idx]))
    }

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.graph.node_weight(id.0)
    }

    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.graph.node_weight_mut(id.0)
    }

    /// Replace a module's tree without touching edges.
    pub fn replace_tree(&mut self, id: ModuleId, tree: SourceTree) -> GraphResult<()> {
        let module = self
            .graph
            .node_weight_mut(id.0)
            .ok_or(GraphError::ModuleNotFound { id })?;
        module.set_tree(tree);
        Ok(())
    }

    /// Replace a module's tree and rebuild its outgoing edges.
    ///
    /// Returns the number of edges the module now has.
    pub fn resync(&mut self, id: ModuleId, tree: SourceTree) -> GraphResult<usize> {
        self.replace_tree(id, tree)?;
        self.reset_dependencies(id);
        let edges = self.import_edges(id);
        let count = edges.len();
        for edge in edges {
            self.add_edge(edge);
        }
        debug!(module = %self.display_name(id), edges = count, "resynced module");
        Ok(count)
    }

    /// The edges derivable from a module's current imports.
    ///
    /// Modules that do not parse have none. Imports that do not resolve to a
    /// project module are skipped, as are imports of the module itself.
    pub fn import_edges(&self, id: ModuleId) -> Vec<Edge> {
        let Some(module) = self.module(id) else {
            return Vec::new();
        };
        if module.parse_error().is_some() {
            return Vec::new();
        }
        let imports = ModuleImports::collect(module.tree(), module.resolution_package());
        let mut edges = Vec::new();
        for binding in &imports.bindings {
            let resolved = self.resolve_import(&binding.target, binding.kind);
            match resolved {
                Some((dependency, _)) if dependency == id => {}
                Some((dependency, symbol)) => edges.push(Edge::new(id, dependency, symbol)),
                None => debug!(
                    module = %module.full_mod_name(),
                    import = %binding.target,
                    "import does not resolve to a project module"
                ),
            }
        }
        edges
    }

    /// Resolve an absolute import target to the project module it reads.
    ///
    /// A member import `X.n` prefers a submodule named `X.n`; otherwise `n`
    /// is taken as a symbol of `X`.
    pub fn resolve_import(&self, target: &str, kind: ImportKind) -> Option<(ModuleId, Option<String>)> {
        match kind {
            ImportKind::Member => match self.node_from_path(target) {
                Some(submodule) => Some((submodule, None)),
                None => resolve_qualified(self, target, "").map(|(module, name)| (module, Some(name))),
            },
            ImportKind::Module | ImportKind::Star => self.node_from_path(target).map(|m| (m, None)),
        }
    }

    /// The edge `dependent` gains by importing `path`, when the path
    /// resolves to another project module.
    pub fn import_edge(&self, dependent: ModuleId, path: &ImportPath) -> Option<Edge> {
        self.resolve_import(&path.path, path.kind)
            .filter(|(dependency, _)| *dependency != dependent)
            .map(|(dependency, symbol)| Edge::new(dependent, dependency, symbol))
    }

    /// Dotted name of a module, or its handle when absent.
    pub fn display_name(&self, id: ModuleId) -> String {
        self.module(id)
            .map(|m| m.full_mod_name())
            .unwrap_or_else(|| id.to_string())
    }
}

/// The dependencies of a module with the symbol each edge imports.
///
/// The symbol is `None` for module and star imports, and for names the
/// dependency does not define itself.
pub fn module_dependencies(graph: &DependencyGraph, id: ModuleId) -> Vec<(ModuleId, Option<Symbol>)> {
    graph
        .outgoing(id)
        .into_iter()
        .map(|edge| {
            let symbol = edge.symbol.as_deref().and_then(|name| {
                graph
                    .module(edge.dependency)
                    .and_then(|m| m.symbol(name))
                    .cloned()
            });
            (edge.dependency, symbol)
        })
        .collect()
}

/// Scan a project and build its dependency graph.
pub fn build_graph(config: &ProjectConfig) -> RegistryResult<(DependencyGraph, Vec<ScanDiagnostic>)> {
    let scan = scan_project(config)?;
    let graph = DependencyGraph::from_modules(scan.modules);
    Ok((graph, scan.diagnostics))
}

// ============================================================================
// Tests
// ============================================================================
