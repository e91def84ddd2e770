//! Phase two of a move: insert the definition into its new module and
//! repair imports across the project.

use std::collections::BTreeSet;

use pymove_core::text::{blank_lines_after, blank_lines_before};
use tracing::{debug, info, warn};

use crate::cst::SourceTree;
use crate::graph::{DependencyGraph, Edge, ModuleId};
use crate::imports::{import_insertion_offset, ImportKind, ImportPath};
use crate::module::Module;
use crate::scope::module_references;

use super::move_source::MoveSource;
use super::replace_imports::{ImportReplacer, ReplaceReport};
use super::{Lookup, MoveError, MoveResult, NameTable};

/// Blank lines kept around a top-level definition.
const DEFINITION_SPACING: usize = 2;

/// A computed but uncommitted change to one module.
struct PendingChange {
    id: ModuleId,
    tree: SourceTree,
    report: ReplaceReport,
}

/// Finish a started move by inserting the symbol into `target` before the
/// first top-level statement starting at or after `line` (1-based, in the
/// target as it is now), or at the end of the module.
///
/// Every module the move edits is rewritten and committed to the graph
/// together with the matching edge changes. Returns the edited modules,
/// source and target first. An empty [`MoveSource`] or a move into the
/// source module itself changes nothing and returns an empty list.
pub fn finish_move(
    graph: &mut DependencyGraph,
    target: ModuleId,
    moved: MoveSource,
    line: usize,
) -> MoveResult<Vec<ModuleId>> {
    if moved.is_empty() {
        debug!("no pending symbol to move");
        return Ok(Vec::new());
    }
    if target == moved.source {
        warn!(symbol = %moved.symbol_name, "target is the source module, nothing to move");
        return Ok(Vec::new());
    }
    let source_module = graph
        .module(moved.source)
        .ok_or(MoveError::ModuleNotFound { id: moved.source })?;
    if source_module.tree().code() != moved.source_code {
        return Err(MoveError::StaleSource {
            module: source_module.full_mod_name(),
        });
    }
    let target_module = graph
        .module(target)
        .ok_or(MoveError::ModuleNotFound { id: target })?;

    let old_name = moved.qualified_name();
    let new_name = qualify(&target_module.import_name(), &moved.symbol_name);

    let target_change = edit_target(target, target_module, &moved, &old_name, &new_name, line)?;
    let source_change = edit_source(graph, source_module, &moved, &new_name)?;

    let redirect = ImportReplacer::new(
        &[(old_name.clone(), new_name.clone())],
        Vec::new(),
        Vec::new(),
    )?;
    let mut dependent_changes = Vec::new();
    for dependent in graph.parents(moved.source) {
        if dependent == moved.source || dependent == target {
            continue;
        }
        let Some(module) = graph.module(dependent) else {
            continue;
        };
        if module.parse_error().is_some() {
            debug!(module = %module.full_mod_name(), "skipping dependent that does not parse");
            continue;
        }
        if let Some((tree, report)) =
            redirect.apply(module.tree(), module.resolution_package(), &module.import_name())?
        {
            dependent_changes.push(PendingChange {
                id: dependent,
                tree,
                report,
            });
        }
    }

    let mut edited = vec![source_change.id, target_change.id];
    edited.extend(dependent_changes.iter().map(|c| c.id));
    for change in std::iter::once(source_change)
        .chain(std::iter::once(target_change))
        .chain(dependent_changes)
    {
        graph.replace_tree(change.id, change.tree)?;
        update_edges(graph, change.id, &change.report);
    }

    info!(
        symbol = %old_name,
        to = %new_name,
        modules = edited.len(),
        "finished move"
    );
    Ok(edited)
}

fn qualify(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", module, name)
    }
}

/// Rewrite the target's imports and insert the definition.
fn edit_target(
    id: ModuleId,
    module: &Module,
    moved: &MoveSource,
    old_name: &str,
    new_name: &str,
    line: usize,
) -> MoveResult<PendingChange> {
    let tree = module.tree();
    let at = insertion_offset(tree, line);
    let replacer = ImportReplacer::new(
        &[(old_name.to_string(), new_name.to_string())],
        moved.needed_imports.iter().cloned(),
        [old_name.to_string()],
    )?
    .keep_spacing_at(at);
    let mut editor = tree.edit();
    let report = replacer.record(
        tree,
        module.resolution_package(),
        &module.import_name(),
        &mut editor,
    );

    let imports_above = !report.added.is_empty() && import_insertion_offset(tree) <= at;
    editor.insert(at, definition_block(tree, at, &moved.symbol_text, imports_above));
    Ok(PendingChange {
        id,
        tree: editor.apply()?,
        report,
    })
}

/// Offset of the first top-level statement starting at or after `line`,
/// or the end of the last statement.
pub fn insertion_offset(tree: &SourceTree, line: usize) -> usize {
    tree.iter_statements()
        .find(|(_, stmt)| stmt.line >= line)
        .map(|(_, stmt)| stmt.chunk.start)
        .unwrap_or_else(|| tree.footer_start())
}

/// The text inserting `definition` at `at`, separated from surrounding
/// statements by two blank lines.
fn definition_block(tree: &SourceTree, at: usize, definition: &str, imports_above: bool) -> String {
    let code = tree.code();
    let before = &code[..at];
    let after = &code[at..];
    let mut block = String::new();
    if !before.is_empty() && !before.ends_with('\n') {
        block.push('\n');
    }
    if imports_above || !before.trim().is_empty() {
        for _ in blank_lines_before(code, at)..DEFINITION_SPACING {
            block.push('\n');
        }
    }
    block.push_str(definition);
    if !after.trim().is_empty() {
        for _ in blank_lines_after(code, at)..DEFINITION_SPACING {
            block.push('\n');
        }
    }
    block
}

/// The source without the definition.
///
/// Imports only the definition used are dropped, unless another module
/// imports the name through the source. When the rest of the source still
/// uses the symbol, it imports it from its new location.
fn edit_source(
    graph: &DependencyGraph,
    module: &Module,
    moved: &MoveSource,
    new_name: &str,
) -> MoveResult<PendingChange> {
    let id = moved.source;
    let updated = moved
        .updated_source
        .clone()
        .ok_or(MoveError::ModuleNotFound { id })?;
    let package = module.resolution_package();
    let source_name = module.import_name();

    let table = NameTable::new(&updated, package);
    let still_used: BTreeSet<String> = module_references(&updated, updated.root())
        .into_iter()
        .map(|r| r.name)
        .collect();
    let reexported: BTreeSet<String> = graph
        .parents(id)
        .into_iter()
        .flat_map(|parent| graph.outgoing(parent))
        .filter(|edge| edge.dependency == id)
        .filter_map(|edge| edge.symbol)
        .collect();

    let mut add = Vec::new();
    if still_used.contains(&moved.symbol_name)
        && matches!(table.lookup(&moved.symbol_name), Lookup::Unbound)
    {
        add.push(ImportPath::member(new_name, None));
    }
    let remove: Vec<String> = moved
        .needed_imports
        .iter()
        .filter(|path| path.kind == ImportKind::Member && path.module_part() != source_name)
        .filter(|path| {
            let name = path.bound_name();
            !still_used.contains(name) && !reexported.contains(name)
        })
        .map(|path| path.path.clone())
        .collect();

    if add.is_empty() && remove.is_empty() {
        return Ok(PendingChange {
            id,
            tree: updated,
            report: ReplaceReport::default(),
        });
    }
    let replacer = ImportReplacer::new(&[], add, remove)?;
    match replacer.apply(&updated, package, &source_name)? {
        Some((tree, report)) => Ok(PendingChange { id, tree, report }),
        None => Ok(PendingChange {
            id,
            tree: updated,
            report: ReplaceReport::default(),
        }),
    }
}

/// Apply the edge changes implied by one module's import rewrite.
///
/// Removing an edge that is already gone is not an error.
fn update_edges(graph: &mut DependencyGraph, id: ModuleId, report: &ReplaceReport) {
    let removed = report
        .removed
        .iter()
        .chain(report.redirected.iter().map(|(old, _)| old))
        .filter_map(|name| graph.import_edge(id, &ImportPath::member(name.clone(), None)))
        .collect::<Vec<Edge>>();
    for edge in removed {
        if let Err(err) = graph.remove_edge(&edge) {
            debug!(error = %err, "edge already removed");
        }
    }
    let added = report
        .redirected
        .iter()
        .map(|(_, new)| ImportPath::member(new.clone(), None))
        .chain(report.added.iter().cloned())
        .filter_map(|path| graph.import_edge(id, &path))
        .collect::<Vec<Edge>>();
    for edge in added {
        graph.add_edge(edge);
    }
}
