//! Phase one of a move: extract a top-level definition from its module.

use std::collections::BTreeSet;

use pymove_core::text::line_end;
use tracing::{debug, info};

use crate::cst::{SourceTree, StatementKind, StmtId};
use crate::graph::ModuleId;
use crate::imports::{ImportKind, ImportPath};
use crate::module::{Module, SymbolKind};
use crate::resolve::strip_init;
use crate::scope::{module_references, NameReference};

use super::{Lookup, MoveResult, NameTable};

/// A started move.
///
/// Holds the extracted definition and the source tree without it. The
/// source module itself is untouched until the move finishes.
#[derive(Debug, Clone)]
pub struct MoveSource {
    /// The module the symbol comes from.
    pub source: ModuleId,
    /// Dotted import name of the source module.
    pub source_module: String,
    /// Name of the moved symbol; empty when nothing matched.
    pub symbol_name: String,
    pub kind: Option<SymbolKind>,
    /// Source text of the definition, leading comments and decorators
    /// included, ending with a newline.
    pub symbol_text: String,
    /// Imports the definition needs wherever it lands.
    pub needed_imports: BTreeSet<ImportPath>,
    /// The source tree with the definition removed.
    pub updated_source: Option<SourceTree>,
    /// The source text the move was computed from.
    pub(crate) source_code: String,
}

impl MoveSource {
    /// A move that found nothing to move.
    pub fn empty(source: ModuleId, module: &Module) -> Self {
        MoveSource {
            source,
            source_module: module.import_name(),
            symbol_name: String::new(),
            kind: None,
            symbol_text: String::new(),
            needed_imports: BTreeSet::new(),
            updated_source: None,
            source_code: module.tree().code().to_string(),
        }
    }

    /// Whether no symbol was found.
    pub fn is_empty(&self) -> bool {
        self.symbol_name.is_empty() || self.updated_source.is_none()
    }

    /// Qualified name of the symbol at its old location.
    pub fn qualified_name(&self) -> String {
        if self.source_module.is_empty() {
            self.symbol_name.clone()
        } else {
            format!("{}.{}", self.source_module, self.symbol_name)
        }
    }
}

/// Find the top-level function or class whose `def`/`class` line is `line`
/// (1-based) and whose header spans `column` (0-based).
pub fn find_definition(tree: &SourceTree, line: usize, column: usize) -> Option<StmtId> {
    tree.iter_statements()
        .find(|(_, stmt)| {
            stmt.kind.is_definition()
                && stmt.header_line == line
                && stmt.header_start_col <= column
                && column <= stmt.header_end_col
        })
        .map(|(id, _)| id)
}

/// Start moving the definition at `line`/`column` out of `module`.
///
/// A position that matches no top-level definition yields an empty
/// [`MoveSource`] rather than an error.
pub fn start_move(
    module: &Module,
    id: ModuleId,
    line: usize,
    column: usize,
) -> MoveResult<MoveSource> {
    let tree = module.tree();
    let Some(stmt_id) = find_definition(tree, line, column) else {
        debug!(module = %module.full_mod_name(), line, column, "nothing to move");
        return Ok(MoveSource::empty(id, module));
    };
    let (Some(stmt), Some(node)) = (tree.statement(stmt_id), tree.statement_node(stmt_id)) else {
        return Ok(MoveSource::empty(id, module));
    };
    let name = stmt.name.clone().unwrap_or_default();
    let kind = match stmt.kind {
        StatementKind::Class => SymbolKind::Class,
        _ => SymbolKind::Function,
    };

    let code = tree.code();
    let text_start = skip_blank_lines(code, stmt.chunk.start, stmt.span.start);
    let symbol_text = format!("{}\n", &code[text_start..stmt.span.end]);

    let table = NameTable::new(tree, module.resolution_package());
    let references = module_references(tree, node);
    let needed_imports = classify(&table, &references, &name, &module.import_name());

    let mut removal = stmt.chunk;
    if stmt_id.0 == 0 {
        removal.end = skip_blank_lines(code, stmt.chunk.end, code.len());
    }
    let mut editor = tree.edit();
    editor.delete(removal);
    let updated_source = editor.apply()?;

    info!(
        module = %module.full_mod_name(),
        symbol = %name,
        needed = needed_imports.len(),
        "started move"
    );
    Ok(MoveSource {
        source: id,
        source_module: module.import_name(),
        symbol_name: name,
        kind: Some(kind),
        symbol_text,
        needed_imports,
        updated_source: Some(updated_source),
        source_code: code.to_string(),
    })
}

/// Offset past the whole blank lines starting at `from`, stopping at `limit`.
fn skip_blank_lines(code: &str, from: usize, limit: usize) -> usize {
    let mut end = from;
    while end < limit {
        let next = line_end(code, end);
        if next > limit || !code[end..next].trim().is_empty() {
            break;
        }
        end = next;
    }
    end
}

/// The imports needed by references inside a moved definition.
///
/// Names imported by the source module keep their import; names the source
/// module defines itself are imported from it; the symbol's own name,
/// builtins and unknown names need nothing.
fn classify(
    table: &NameTable,
    references: &[NameReference],
    symbol: &str,
    source_module: &str,
) -> BTreeSet<ImportPath> {
    let mut needed = BTreeSet::new();
    for reference in references {
        if reference.name == symbol {
            continue;
        }
        match table.lookup(&reference.name) {
            Lookup::Imported(bindings) => {
                let modules: Vec<_> = bindings
                    .iter()
                    .filter(|b| b.kind == ImportKind::Module)
                    .collect();
                let members = bindings.iter().filter(|b| b.kind == ImportKind::Member);
                for binding in members {
                    needed.insert(ImportPath::member(
                        strip_init(&binding.target),
                        binding.alias.clone(),
                    ));
                }
                if modules.is_empty() {
                    continue;
                }
                let full = reference.dotted(reference.chain.len());
                let best = modules
                    .iter()
                    .filter(|b| b.alias.is_some() || is_dotted_prefix(&b.target, &full))
                    .max_by_key(|b| b.target.len());
                match best {
                    Some(binding) => {
                        needed.insert(ImportPath::module(
                            binding.target.clone(),
                            binding.alias.clone(),
                        ));
                    }
                    None => {
                        for binding in modules {
                            needed.insert(ImportPath::module(
                                binding.target.clone(),
                                binding.alias.clone(),
                            ));
                        }
                    }
                }
            }
            Lookup::Local => {
                let path = if source_module.is_empty() {
                    reference.name.clone()
                } else {
                    format!("{}.{}", source_module, reference.name)
                };
                needed.insert(ImportPath::member(path, None));
            }
            Lookup::Unbound => {}
        }
    }
    needed
}

fn is_dotted_prefix(prefix: &str, name: &str) -> bool {
    name == prefix
        || (name.starts_with(prefix) && name.as_bytes().get(prefix.len()) == Some(&b'.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::graph::DependencyGraph;

    const MOD1: &str = "\
from proj.pkg.mod2 import T
from proj import a as aa
import os.path
import os

y = 2


def test_func():
    return T() + y + aa.something + os.path.join(\"x\") + len([])


def recurse(n):
    return recurse(n - 1) if n else 0


class Klass:
    value = y
";

    fn source(text: &str) -> (DependencyGraph, ModuleId) {
        let module = Module::from_source(
            Path::new("proj/mod1.py"),
            Path::new("proj"),
            "proj",
            "mod1",
            text,
        )
        .unwrap();
        let mut graph = DependencyGraph::new();
        let id = graph.add_node(module);
        (graph, id)
    }

    fn paths(source: &MoveSource) -> Vec<String> {
        source.needed_imports.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn finds_definition_by_header() {
        let tree = SourceTree::parse(MOD1).unwrap();
        assert!(find_definition(&tree, 9, 0).is_some());
        assert!(find_definition(&tree, 9, 4).is_some());
        assert!(find_definition(&tree, 9, 40).is_none());
        assert!(find_definition(&tree, 10, 4).is_none());
        assert!(find_definition(&tree, 6, 0).is_none());
    }

    #[test]
    fn needed_imports_classified() {
        let (graph, id) = source(MOD1);
        let moved = start_move(graph.module(id).unwrap(), id, 9, 4).unwrap();
        assert_eq!(moved.symbol_name, "test_func");
        assert_eq!(moved.kind, Some(SymbolKind::Function));
        assert_eq!(
            paths(&moved),
            vec!["os.path", "proj.a as aa", "proj.mod1.y", "proj.pkg.mod2.T"]
        );
    }

    #[test]
    fn removal_keeps_surroundings() {
        let (graph, id) = source(MOD1);
        let moved = start_move(graph.module(id).unwrap(), id, 9, 0).unwrap();
        assert!(moved.symbol_text.starts_with("def test_func():\n"));
        assert!(moved.symbol_text.ends_with("len([])\n"));
        let updated = moved.updated_source.as_ref().unwrap().code();
        assert!(!updated.contains("test_func"));
        assert!(updated.contains("y = 2\n\n\ndef recurse(n):"));
        assert_eq!(graph.module(id).unwrap().tree().code(), MOD1);
    }

    #[test]
    fn self_reference_excluded() {
        let (graph, id) = source(MOD1);
        let moved = start_move(graph.module(id).unwrap(), id, 13, 0).unwrap();
        assert_eq!(moved.symbol_name, "recurse");
        assert!(moved.needed_imports.is_empty());
    }

    #[test]
    fn class_needs_local_names() {
        let (graph, id) = source(MOD1);
        let moved = start_move(graph.module(id).unwrap(), id, 17, 0).unwrap();
        assert_eq!(moved.kind, Some(SymbolKind::Class));
        assert_eq!(paths(&moved), vec!["proj.mod1.y"]);
        assert_eq!(moved.qualified_name(), "proj.mod1.Klass");
    }

    #[test]
    fn no_match_is_empty() {
        let (graph, id) = source(MOD1);
        let moved = start_move(graph.module(id).unwrap(), id, 6, 0).unwrap();
        assert!(moved.is_empty());
        assert!(moved.needed_imports.is_empty());
    }

    #[test]
    fn first_statement_removal_drops_blank_lines() {
        let (graph, id) = source("def f():\n    pass\n\n\nx = 1\n");
        let moved = start_move(graph.module(id).unwrap(), id, 1, 0).unwrap();
        assert_eq!(moved.updated_source.unwrap().code(), "x = 1\n");
    }

    #[test]
    fn decorators_and_comments_travel() {
        let (graph, id) = source("x = 1\n\n\n# helper\n@decorate\ndef f():\n    return x\n");
        let moved = start_move(graph.module(id).unwrap(), id, 6, 0).unwrap();
        assert_eq!(moved.symbol_text, "# helper\n@decorate\ndef f():\n    return x\n");
        assert_eq!(moved.updated_source.unwrap().code(), "x = 1\n");
    }

    #[test]
    fn decorated_needs_follow() {
        let (graph, id) = source("x = 1\n\n\n@decorate\ndef f():\n    return x\n");
        let moved = start_move(graph.module(id).unwrap(), id, 5, 0).unwrap();
        assert_eq!(paths(&moved), vec!["proj.mod1.x"]);
    }
}
