//! Rewriting the imports of one module.
//!
//! An [`ImportReplacer`] is configured with three lists:
//!
//! - replacements `A.S -> B.S`: `from A import S` becomes `from B import S`,
//!   attribute uses `A.S` through module imports become `S` with a new
//!   `from B import S`, and `from A import *` gains `from B import S`;
//! - paths to add, inserted as new import statements unless already bound;
//! - qualified names whose `from` imports are removed.

use pymove_core::edit::Span;
use pymove_core::text::{indentation_at, is_line_leading};

use crate::cst::{SourceTree, TreeEditor};
use crate::imports::{
    emptied_block_gap, group_imports, import_insertion_offset, removal_edit, render_import_block, ImportItem,
    ImportKind, ImportPath,
};
use crate::resolve::{split_qualified, strip_init};
use crate::scope::module_references;

use super::{Lookup, MoveError, MoveResult, NameTable};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Replacement {
    from: String,
    to: String,
    from_module: String,
    object: String,
}

/// What an [`ImportReplacer`] changed in one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceReport {
    /// Paths inserted as new import statements.
    pub added: Vec<ImportPath>,
    /// Qualified names whose `from` import items were removed.
    pub removed: Vec<String>,
    /// `from` import items pointed at a new module, as `(old, new)`.
    pub redirected: Vec<(String, String)>,
    /// Attribute uses shortened to the bare object name.
    pub attributes: usize,
}

impl ReplaceReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.redirected.is_empty()
            && self.attributes == 0
    }
}

/// Rewrites import statements and qualified uses in a module.
#[derive(Debug, Clone, Default)]
pub struct ImportReplacer {
    replacements: Vec<Replacement>,
    add: Vec<ImportPath>,
    remove: Vec<String>,
    keep_spacing_at: Option<usize>,
}

impl ImportReplacer {
    /// Configure a replacer.
    ///
    /// Every replacement must keep the object name: `a.S -> b.S` is valid,
    /// `a.S -> b.T` fails with [`MoveError::ObjectMismatch`].
    pub fn new(
        replace: &[(String, String)],
        add: impl IntoIterator<Item = ImportPath>,
        remove: impl IntoIterator<Item = String>,
    ) -> MoveResult<Self> {
        let mut replacements = Vec::with_capacity(replace.len());
        for (from, to) in replace {
            let from = strip_init(from);
            let to = strip_init(to);
            let (from_module, from_object) = split_qualified(&from);
            let (to_module, to_object) = split_qualified(&to);
            if from_object != to_object || from_module.is_empty() || to_module.is_empty() {
                return Err(MoveError::ObjectMismatch {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            replacements.push(Replacement {
                from_module: from_module.to_string(),
                object: from_object.to_string(),
                from: from.clone(),
                to: to.clone(),
            });
        }
        Ok(ImportReplacer {
            replacements,
            add: add.into_iter().collect(),
            remove: remove.into_iter().map(|r| strip_init(&r)).collect(),
            keep_spacing_at: None,
        })
    }

    /// Keep the blank lines after an emptied leading import block when
    /// `offset` falls inside them, because the caller inserts text there.
    pub fn keep_spacing_at(mut self, offset: usize) -> Self {
        self.keep_spacing_at = Some(offset);
        self
    }

    /// Rewrite `tree`, returning the new tree and what changed, or `None`
    /// when nothing applies to this module.
    pub fn apply(
        &self,
        tree: &SourceTree,
        package: &str,
        module_name: &str,
    ) -> MoveResult<Option<(SourceTree, ReplaceReport)>> {
        let mut editor = tree.edit();
        let report = self.record(tree, package, module_name, &mut editor);
        if editor.is_empty() {
            return Ok(None);
        }
        Ok(Some((editor.apply()?, report)))
    }

    /// Record the rewrite of `tree` into `editor`.
    ///
    /// `module_name` is the dotted import name of the module being edited;
    /// paths pointing back into it are never added.
    pub fn record(
        &self,
        tree: &SourceTree,
        package: &str,
        module_name: &str,
        editor: &mut TreeEditor<'_>,
    ) -> ReplaceReport {
        let table = NameTable::new(tree, package);
        let mut report = ReplaceReport::default();
        let mut wanted: Vec<ImportPath> = Vec::new();
        let mut rewritten: Vec<ImportPath> = Vec::new();

        let cleared =
            self.rewrite_statements(tree, package, &table, editor, &mut report, &mut wanted, &mut rewritten);
        if !self.replacements.is_empty() {
            self.rewrite_attributes(tree, &table, editor, &mut report, &mut wanted);
        }
        wanted.extend(self.add.iter().cloned());

        let own = strip_init(module_name);
        let mut added: Vec<ImportPath> = Vec::new();
        for path in wanted {
            let stale = report.removed.contains(&path.path)
                || report.redirected.iter().any(|(old, _)| *old == path.path);
            if strip_init(path.module_part()) == own
                || rewritten.contains(&path)
                || added.contains(&path)
                || (table.imports.provides(&path) && !stale)
            {
                continue;
            }
            added.push(path);
        }
        if !added.is_empty() {
            let offset = import_insertion_offset(tree);
            editor.insert(offset, render_import_block(tree, offset, &group_imports(&added)));
        } else if let Some(gap) = emptied_block_gap(tree, &cleared) {
            let kept = self
                .keep_spacing_at
                .is_some_and(|at| gap.start <= at && at <= gap.end);
            if !kept {
                editor.delete(gap);
            }
        }
        report.added = added;
        report
    }

    /// Rewrite import statements, returning the spans of top-level
    /// statements removed whole.
    #[allow(clippy::too_many_arguments)]
    fn rewrite_statements(
        &self,
        tree: &SourceTree,
        package: &str,
        table: &NameTable,
        editor: &mut TreeEditor<'_>,
        report: &mut ReplaceReport,
        wanted: &mut Vec<ImportPath>,
        rewritten: &mut Vec<ImportPath>,
    ) -> Vec<Span> {
        let code = tree.code();
        let mut cleared = Vec::new();
        for site in &table.imports.sites {
            let Ok(Some(absolute)) = site.absolute_module(package) else {
                continue;
            };
            let module = strip_init(&absolute);

            if site.star {
                for r in self.replacements.iter().filter(|r| r.from_module == module) {
                    wanted.push(ImportPath::member(r.to.clone(), None));
                }
                continue;
            }

            let mut gone: Vec<usize> = Vec::new();
            let mut moved: Vec<(&ImportItem, &Replacement)> = Vec::new();
            for (i, item) in site.items.iter().enumerate() {
                let qualified = strip_init(&format!("{}.{}", module, item.name));
                if self.remove.contains(&qualified) {
                    gone.push(i);
                    report.removed.push(qualified);
                } else if let Some(r) = self.replacements.iter().find(|r| r.from == qualified) {
                    gone.push(i);
                    moved.push((item, r));
                }
            }
            if gone.is_empty() {
                continue;
            }
            if moved.is_empty() {
                let (span, text) = removal_edit(tree, site, &gone);
                if site.statement.is_some() && text.is_empty() && gone.len() == site.items.len() {
                    cleared.push(site.span);
                }
                editor.replace(span, text);
                continue;
            }

            let targets: Vec<ImportPath> = moved
                .iter()
                .map(|(item, r)| ImportPath::member(r.to.clone(), item.alias.clone()))
                .collect();
            for (_, r) in &moved {
                report.redirected.push((r.from.clone(), r.to.clone()));
            }
            let indent = indentation_at(code, site.span.start);
            let separator = if is_line_leading(code, site.span.start) {
                format!("\n{}", indent)
            } else {
                "; ".to_string()
            };
            let mut lines: Vec<String> = Vec::new();
            if gone.len() < site.items.len() {
                let remaining: Vec<&ImportItem> = site
                    .items
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !gone.contains(i))
                    .map(|(_, item)| item)
                    .collect();
                lines.push(site.render_with(&remaining, indent));
            }
            lines.extend(group_imports(&targets).iter().map(|s| s.render()));
            let comments: Vec<&str> = moved
                .iter()
                .filter_map(|(item, _)| item.comment.as_deref())
                .collect();
            if let Some(last) = lines.last_mut().filter(|_| !comments.is_empty()) {
                last.push_str("  ");
                last.push_str(&comments.join(" "));
            }
            editor.replace(site.span, lines.join(&separator));
            rewritten.extend(targets);
        }
        cleared
    }

    fn rewrite_attributes(
        &self,
        tree: &SourceTree,
        table: &NameTable,
        editor: &mut TreeEditor<'_>,
        report: &mut ReplaceReport,
        wanted: &mut Vec<ImportPath>,
    ) {
        for reference in module_references(tree, tree.root()) {
            if reference.chain.is_empty() {
                continue;
            }
            let Lookup::Imported(bindings) = table.lookup(&reference.name) else {
                continue;
            };
            let hit = bindings.iter().find_map(|binding| {
                (1..=reference.chain.len()).find_map(|depth| {
                    let qualified = match (binding.kind, &binding.alias) {
                        (ImportKind::Module, None) => reference.dotted(depth),
                        _ => format!("{}.{}", binding.target, reference.chain[..depth].join(".")),
                    };
                    let qualified = strip_init(&qualified);
                    self.replacements
                        .iter()
                        .find(|r| r.from == qualified)
                        .map(|r| (depth, r))
                })
            });
            if let Some((depth, r)) = hit {
                editor.replace(reference.chain_spans[depth - 1], r.object.clone());
                wanted.push(ImportPath::member(r.to.clone(), None));
                report.attributes += 1;
            }
        }
    }
}
