//! Import statements: reading them from trees, rendering new ones, and
//! computing the edits that insert or remove them.
//!
//! Three views of an import exist:
//!
//! - [`ImportSite`]: one import statement as written, with its items and span.
//! - [`ImportBinding`]: one name the statement binds, with the absolute
//!   qualified name it refers to.
//! - [`ImportPath`]: a request for a name to be importable in some module,
//!   rendered into a [`ImportStatement`] when it is inserted.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use pymove_core::edit::Span;
use pymove_core::text::{
    blank_lines_after, indentation_at, is_line_leading, is_line_trailing, line_end, line_start,
};
use tracing::debug;
use tree_sitter::Node;

use crate::cst::{SourceTree, StatementKind, StmtId};
use crate::resolve::{resolve_name, split_qualified, ResolveResult};

// ============================================================================
// Import Sites
// ============================================================================

/// How an import binding refers to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImportKind {
    /// `import a.b [as c]`: the binding names a module.
    Module,
    /// `from m import n [as k]`: the binding names an object inside `m`.
    Member,
    /// `from m import *`
    Star,
}

/// One imported item of a statement, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportItem {
    /// Dotted name with whitespace removed.
    pub name: String,
    pub alias: Option<String>,
    pub span: Span,
    /// The `# ...` comment following the item on its line, inside the
    /// statement's parentheses.
    pub comment: Option<String>,
}

impl ImportItem {
    /// Render this item as it would appear in Python source.
    pub fn render(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} as {}", self.name, alias),
            None => self.name.clone(),
        }
    }
}

/// One import statement as written in a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    /// Module text of a `from` import, leading dots included; `None` for
    /// plain `import` statements.
    pub from_module: Option<String>,
    pub items: Vec<ImportItem>,
    /// `from m import *`
    pub star: bool,
    /// Bytes of the statement node.
    pub span: Span,
    /// Whether the statement executes at module scope.
    pub module_scope: bool,
    /// The top-level statement, when the import is one.
    pub statement: Option<StmtId>,
}

impl ImportSite {
    /// Number of leading dots of a relative `from` import.
    pub fn level(&self) -> usize {
        self.from_module
            .as_deref()
            .map(|m| m.chars().take_while(|&c| c == '.').count())
            .unwrap_or(0)
    }

    /// The absolute module a `from` import reads from.
    pub fn absolute_module(&self, package: &str) -> ResolveResult<Option<String>> {
        match &self.from_module {
            Some(module) => resolve_name(module, package).map(Some),
            None => Ok(None),
        }
    }

    /// Local names bound by this statement.
    pub fn bound_names(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| match (&item.alias, &self.from_module) {
                (Some(alias), _) => alias.clone(),
                (None, Some(_)) => item.name.clone(),
                (None, None) => item.name.split('.').next().unwrap_or_default().to_string(),
            })
            .collect()
    }

    /// Render the statement keeping only `items`.
    ///
    /// The statement fits on one line unless a kept item carries a comment;
    /// then it is parenthesized with one item per line, continuation lines
    /// indented one level past `indent`.
    pub fn render_with(&self, items: &[&ImportItem], indent: &str) -> String {
        match &self.from_module {
            Some(module) if items.iter().any(|item| item.comment.is_some()) => {
                let mut out = format!("from {} import (\n", module);
                for item in items {
                    out.push_str(&format!("{}    {},", indent, item.render()));
                    if let Some(comment) = &item.comment {
                        out.push_str("  ");
                        out.push_str(comment);
                    }
                    out.push('\n');
                }
                out.push_str(indent);
                out.push(')');
                out
            }
            Some(module) => format!("from {} import {}", module, join_items(items)),
            None => format!("import {}", join_items(items)),
        }
    }

    /// The bindings this statement creates, resolved against `package`.
    ///
    /// Relative imports that cannot be resolved produce no bindings.
    pub fn bindings(&self, site: usize, package: &str) -> Vec<ImportBinding> {
        let module = match self.absolute_module(package) {
            Ok(module) => module,
            Err(err) => {
                debug!(
                    module = self.from_module.as_deref().unwrap_or_default(),
                    package,
                    error = %err,
                    "skipping unresolvable import"
                );
                return Vec::new();
            }
        };

        let offset = self.span.start;
        match module {
            Some(module) if self.star => vec![ImportBinding {
                kind: ImportKind::Star,
                name: "*".to_string(),
                target: module.clone(),
                module,
                alias: None,
                site,
                item: None,
                module_scope: self.module_scope,
                offset,
            }],
            Some(module) => self
                .items
                .iter()
                .enumerate()
                .map(|(i, item)| ImportBinding {
                    kind: ImportKind::Member,
                    name: item.alias.clone().unwrap_or_else(|| item.name.clone()),
                    target: join_qualified(&module, &item.name),
                    module: module.clone(),
                    alias: item.alias.clone(),
                    site,
                    item: Some(i),
                    module_scope: self.module_scope,
                    offset: item.span.start,
                })
                .collect(),
            None => self
                .items
                .iter()
                .enumerate()
                .map(|(i, item)| ImportBinding {
                    kind: ImportKind::Module,
                    name: item
                        .alias
                        .clone()
                        .unwrap_or_else(|| item.name.split('.').next().unwrap_or_default().to_string()),
                    target: item.name.clone(),
                    module: item.name.clone(),
                    alias: item.alias.clone(),
                    site,
                    item: Some(i),
                    module_scope: self.module_scope,
                    offset: item.span.start,
                })
                .collect(),
        }
    }
}

fn join_items(items: &[&ImportItem]) -> String {
    items
        .iter()
        .map(|item| item.render())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_qualified(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", module, name)
    }
}

/// One name bound by an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub kind: ImportKind,
    /// The local name (`*` for star imports).
    pub name: String,
    /// Absolute qualified target: `m.n` for members, the module path for
    /// module and star imports.
    pub target: String,
    /// Absolute module part of the target.
    pub module: String,
    pub alias: Option<String>,
    /// Index of the statement in [`ModuleImports::sites`].
    pub site: usize,
    /// Index of the item within the statement.
    pub item: Option<usize>,
    pub module_scope: bool,
    /// Byte offset of the binding, for last-binding-wins ordering.
    pub offset: usize,
}

/// All imports of one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleImports {
    pub sites: Vec<ImportSite>,
    pub bindings: Vec<ImportBinding>,
}

impl ModuleImports {
    /// Collect every import statement in `tree`, nested ones included.
    ///
    /// `__future__` imports are not collected.
    pub fn collect(tree: &SourceTree, package: &str) -> ModuleImports {
        let mut sites = Vec::new();
        collect_sites(tree, tree.root(), true, &mut sites);
        let bindings = sites
            .iter()
            .enumerate()
            .flat_map(|(i, site)| site.bindings(i, package))
            .collect();
        ModuleImports { sites, bindings }
    }

    /// Bindings made at module scope.
    pub fn module_scope(&self) -> impl Iterator<Item = &ImportBinding> {
        self.bindings.iter().filter(|b| b.module_scope)
    }

    /// Whether a module-scope binding for `path` already exists.
    pub fn provides(&self, path: &ImportPath) -> bool {
        self.module_scope().any(|b| {
            ImportPath::from_binding(b)
                .map(|existing| existing == *path && existing.kind == path.kind)
                .unwrap_or(false)
        })
    }
}

fn collect_sites(tree: &SourceTree, node: Node<'_>, module_scope: bool, out: &mut Vec<ImportSite>) {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    for child in children {
        match child.kind() {
            "import_statement" | "import_from_statement" => {
                if let Some(mut site) = parse_site(tree.code(), child) {
                    site.module_scope = module_scope;
                    if node.kind() == "module" {
                        site.statement = tree
                            .iter_statements()
                            .find(|(_, s)| s.span.start == site.span.start)
                            .map(|(id, _)| id);
                    }
                    out.push(site);
                }
            }
            "function_definition" | "class_definition" | "lambda" => {
                collect_sites(tree, child, false, out)
            }
            _ => collect_sites(tree, child, module_scope, out),
        }
    }
}

fn dotted_text(code: &str, node: Node<'_>) -> String {
    code[node.start_byte()..node.end_byte()]
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\\')
        .collect()
}

fn parse_item(code: &str, node: Node<'_>) -> Option<ImportItem> {
    let span = Span::new(node.start_byte(), node.end_byte());
    match node.kind() {
        "aliased_import" => {
            let name = node.child_by_field_name("name")?;
            let alias = node.child_by_field_name("alias")?;
            Some(ImportItem {
                name: dotted_text(code, name),
                alias: Some(dotted_text(code, alias)),
                span,
                comment: None,
            })
        }
        "dotted_name" => Some(ImportItem {
            name: dotted_text(code, node),
            alias: None,
            span,
            comment: None,
        }),
        _ => None,
    }
}

/// Give each item the comment that ends its line, if any.
fn attach_comments(code: &str, node: Node<'_>, items: &mut [ImportItem]) {
    let mut cursor = node.walk();
    for comment in node.children(&mut cursor).filter(|n| n.kind() == "comment") {
        let start = comment.start_byte();
        let owner = items
            .iter_mut()
            .rev()
            .find(|item| item.span.end <= start)
            .filter(|item| !code[item.span.end..start].contains('\n'));
        if let Some(item) = owner {
            item.comment = Some(code[start..comment.end_byte()].to_string());
        }
    }
}

/// Parse an `import` or `from ... import` statement node.
pub fn parse_site(code: &str, node: Node<'_>) -> Option<ImportSite> {
    let mut cursor = node.walk();
    let mut items: Vec<ImportItem> = node
        .children_by_field_name("name", &mut cursor)
        .filter_map(|item| parse_item(code, item))
        .collect();
    attach_comments(code, node, &mut items);
    let span = Span::new(node.start_byte(), node.end_byte());

    match node.kind() {
        "import_statement" => Some(ImportSite {
            from_module: None,
            items,
            star: false,
            span,
            module_scope: true,
            statement: None,
        }),
        "import_from_statement" => {
            let module = node.child_by_field_name("module_name")?;
            let mut inner = node.walk();
            let star = node
                .named_children(&mut inner)
                .any(|n| n.kind() == "wildcard_import");
            Some(ImportSite {
                from_module: Some(dotted_text(code, module)),
                items,
                star,
                span,
                module_scope: true,
                statement: None,
            })
        }
        _ => None,
    }
}

/// Local names bound by an import statement node.
pub fn import_bound_names(code: &str, node: Node<'_>) -> Vec<String> {
    parse_site(code, node)
        .map(|site| site.bound_names())
        .unwrap_or_default()
}

// ============================================================================
// Import Paths
// ============================================================================

/// A qualified name that must be importable in a module.
///
/// Equality, hashing and ordering consider only `(path, alias)`.
#[derive(Debug, Clone)]
pub struct ImportPath {
    /// `module.object` for members, the module path for modules.
    pub path: String,
    pub alias: Option<String>,
    pub kind: ImportKind,
}

impl PartialEq for ImportPath {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.alias == other.alias
    }
}

impl Eq for ImportPath {}

impl Hash for ImportPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.alias.hash(state);
    }
}

impl PartialOrd for ImportPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ImportPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.path, &self.alias).cmp(&(&other.path, &other.alias))
    }
}

impl ImportPath {
    /// A member import. An alias equal to the object name is dropped.
    pub fn member(path: impl Into<String>, alias: Option<String>) -> Self {
        let path = path.into();
        let alias = alias.filter(|a| a != split_qualified(&path).1);
        ImportPath {
            path,
            alias,
            kind: ImportKind::Member,
        }
    }

    /// A module import.
    pub fn module(path: impl Into<String>, alias: Option<String>) -> Self {
        ImportPath {
            path: path.into(),
            alias,
            kind: ImportKind::Module,
        }
    }

    /// The path a binding would be re-created with elsewhere.
    pub fn from_binding(binding: &ImportBinding) -> Option<Self> {
        match binding.kind {
            ImportKind::Member => Some(ImportPath::member(
                binding.target.clone(),
                binding.alias.clone(),
            )),
            ImportKind::Module => Some(ImportPath::module(
                binding.target.clone(),
                binding.alias.clone(),
            )),
            ImportKind::Star => None,
        }
    }

    /// The local name the import binds.
    pub fn bound_name(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        match self.kind {
            ImportKind::Module => self.path.split('.').next().unwrap_or_default(),
            _ => split_qualified(&self.path).1,
        }
    }

    /// The module the import reads from.
    pub fn module_part(&self) -> &str {
        match self.kind {
            ImportKind::Module => &self.path,
            _ => split_qualified(&self.path).0,
        }
    }

    /// The statement that creates this binding.
    pub fn to_statement(&self) -> ImportStatement {
        let (module, name) = split_qualified(&self.path);
        match self.kind {
            ImportKind::Member if !module.is_empty() => ImportStatement::from_import_names(
                module,
                vec![ImportedName {
                    name: name.to_string(),
                    alias: self.alias.clone(),
                }],
            ),
            _ => ImportStatement::Import {
                module: self.path.clone(),
                alias: self.alias.clone(),
            },
        }
    }
}

impl fmt::Display for ImportPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} as {}", self.path, alias),
            None => write!(f, "{}", self.path),
        }
    }
}

// ============================================================================
// Rendering New Imports
// ============================================================================

/// A name imported via `from ... import`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    /// The imported name.
    pub name: String,
    /// Optional alias (`as ...`).
    pub alias: Option<String>,
}

impl ImportedName {
    /// Create a new imported name without an alias.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// Render this imported name as it would appear in Python source.
    pub fn render(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} as {}", self.name, alias),
            None => self.name.clone(),
        }
    }
}

/// A Python import statement to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatement {
    /// `import module` or `import module as alias`
    Import {
        module: String,
        alias: Option<String>,
    },
    /// `from module import name1, name2 as alias`
    FromImport {
        module: String,
        names: Vec<ImportedName>,
    },
}

impl ImportStatement {
    /// Create a from-import statement: `from module import name`
    pub fn from_import(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self::FromImport {
            module: module.into(),
            names: vec![ImportedName::new(name)],
        }
    }

    /// Create a from-import statement with multiple names.
    pub fn from_import_names(module: impl Into<String>, names: Vec<ImportedName>) -> Self {
        Self::FromImport {
            module: module.into(),
            names,
        }
    }

    /// Render this import statement as it would appear in Python source.
    pub fn render(&self) -> String {
        match self {
            Self::Import { module, alias } => match alias {
                Some(a) => format!("import {} as {}", module, a),
                None => format!("import {}", module),
            },
            Self::FromImport { module, names } => {
                let names_str = names
                    .iter()
                    .map(|n| n.render())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("from {} import {}", module, names_str)
            }
        }
    }
}

/// Group import paths into statements.
///
/// Member imports from one module share a statement; requesting the same
/// name under several aliases yields one statement listing each alias.
/// Module imports come first, then from-imports, each ordered by module.
pub fn group_imports<'a>(paths: impl IntoIterator<Item = &'a ImportPath>) -> Vec<ImportStatement> {
    let mut modules: Vec<(String, Option<String>)> = Vec::new();
    let mut members: BTreeMap<String, Vec<ImportedName>> = BTreeMap::new();

    for path in paths {
        match path.kind {
            ImportKind::Member if !path.module_part().is_empty() => {
                let (module, name) = split_qualified(&path.path);
                let entry = members.entry(module.to_string()).or_default();
                let imported = ImportedName {
                    name: name.to_string(),
                    alias: path.alias.clone(),
                };
                if !entry.contains(&imported) {
                    entry.push(imported);
                }
            }
            _ => {
                let key = (path.path.clone(), path.alias.clone());
                if !modules.contains(&key) {
                    modules.push(key);
                }
            }
        }
    }
    modules.sort();

    let mut statements: Vec<ImportStatement> = modules
        .into_iter()
        .map(|(module, alias)| ImportStatement::Import { module, alias })
        .collect();
    for (module, mut names) in members {
        names.sort_by(|a, b| (&a.name, &a.alias).cmp(&(&b.name, &b.alias)));
        statements.push(ImportStatement::from_import_names(module, names));
    }
    statements
}

// ============================================================================
// Edit Helpers
// ============================================================================

fn is_docstring(tree: &SourceTree, id: StmtId) -> bool {
    let Some(node) = tree.statement_node(id) else {
        return false;
    };
    if node.kind() != "expression_statement" || node.named_child_count() != 1 {
        return false;
    }
    let mut cursor = node.walk();
    let first = node.named_children(&mut cursor).next();
    first.map(|n| n.kind() == "string").unwrap_or(false)
}

/// Where new imports go: after a leading docstring and any `__future__`
/// imports, otherwise right after the module header.
pub fn import_insertion_offset(tree: &SourceTree) -> usize {
    let mut offset = tree.header_end();
    for (id, stmt) in tree.iter_statements() {
        let skip = (id.0 == 0 && is_docstring(tree, id)) || stmt.kind == StatementKind::FutureImport;
        if !skip {
            break;
        }
        offset = stmt.chunk.end;
    }
    offset
}

/// The blank lines between the leading import block and the code after it,
/// when every import of the block is in `cleared` and alone on its lines.
///
/// The block is the run of imports after a docstring and `__future__`
/// imports. Comment lines end the gap.
pub fn emptied_block_gap(tree: &SourceTree, cleared: &[Span]) -> Option<Span> {
    let code = tree.code();
    let mut statements = tree.iter_statements().skip_while(|(id, stmt)| {
        (id.0 == 0 && is_docstring(tree, *id)) || stmt.kind == StatementKind::FutureImport
    });
    let mut last = None;
    let next = loop {
        match statements.next() {
            Some((_, stmt)) if stmt.kind.is_import() => {
                let alone =
                    is_line_leading(code, stmt.span.start) && is_line_trailing(code, stmt.span.end);
                if !alone || !cleared.contains(&stmt.span) {
                    return None;
                }
                last = Some(stmt.span);
            }
            Some((_, stmt)) => break stmt,
            None => return None,
        }
    };
    let start = line_end(code, last?.end);
    let mut end = start;
    while end < next.span.start {
        let next_line = line_end(code, end);
        if next_line == end || !code[end..next_line].trim().is_empty() {
            break;
        }
        end = next_line;
    }
    (end > start).then_some(Span::new(start, end))
}

/// Text inserting `statements` at `offset`, one per line.
///
/// A blank line separates the block from code that directly follows it,
/// unless that code is another import.
pub fn render_import_block(tree: &SourceTree, offset: usize, statements: &[ImportStatement]) -> String {
    if statements.is_empty() {
        return String::new();
    }
    let code = tree.code();
    let mut block = String::new();
    if offset > 0 && !code[..offset].ends_with('\n') {
        block.push('\n');
    }
    for statement in statements {
        block.push_str(&statement.render());
        block.push('\n');
    }
    let next = tree
        .iter_statements()
        .find(|(_, stmt)| stmt.span.start >= offset)
        .map(|(_, stmt)| stmt.kind);
    if let Some(kind) = next {
        if !kind.is_import() && blank_lines_after(code, offset) == 0 {
            block.push('\n');
        }
    }
    block
}

/// The edit removing items `remove` (indices into `site.items`) from an
/// import statement.
///
/// Removing every item removes the statement: its whole line when it is
/// alone on the line, `pass` when it is the only statement of a block, and
/// the statement plus its `;` separator otherwise. Removing some items
/// re-renders the statement with the rest.
pub fn removal_edit(tree: &SourceTree, site: &ImportSite, remove: &[usize]) -> (Span, String) {
    let remaining: Vec<&ImportItem> = site
        .items
        .iter()
        .enumerate()
        .filter(|(i, _)| !remove.contains(i))
        .map(|(_, item)| item)
        .collect();
    let code = tree.code();
    if !remaining.is_empty() && !site.star {
        let indent = indentation_at(code, site.span.start);
        return (site.span, site.render_with(&remaining, indent));
    }

    let span = site.span;
    if is_only_statement_in_block(tree, span) {
        return (span, "pass".to_string());
    }
    if is_line_leading(code, span.start) && is_line_trailing(code, span.end) {
        return (
            Span::new(line_start(code, span.start), line_end(code, span.end)),
            String::new(),
        );
    }

    let after = &code[span.end..];
    let after_trimmed = after.trim_start_matches([' ', '\t']);
    if let Some(rest) = after_trimmed.strip_prefix(';') {
        let gap = after.len() - rest.trim_start_matches([' ', '\t']).len();
        return (Span::new(span.start, span.end + gap), String::new());
    }
    let before = code[..span.start].trim_end_matches([' ', '\t']);
    if before.ends_with(';') {
        return (Span::new(before.len() - 1, span.end), String::new());
    }
    (span, String::new())
}

fn is_only_statement_in_block(tree: &SourceTree, span: Span) -> bool {
    let Some(node) = tree.root().descendant_for_byte_range(span.start, span.end) else {
        return false;
    };
    let Some(parent) = node.parent() else {
        return false;
    };
    if parent.kind() != "block" {
        return false;
    }
    let mut cursor = parent.walk();
    let statements = parent
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .count();
    statements == 1
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn imports(code: &str, package: &str) -> (SourceTree, ModuleImports) {
        let tree = SourceTree::parse(code).unwrap();
        let imports = ModuleImports::collect(&tree, package);
        (tree, imports)
    }

    mod collection {
        use super::*;

        #[test]
        fn plain_and_aliased_module_imports() {
            let (_, imports) = imports("import os.path\nimport numpy as np\n", "proj");
            let b = &imports.bindings;
            assert_eq!(b.len(), 2);
            assert_eq!(b[0].kind, ImportKind::Module);
            assert_eq!(b[0].name, "os");
            assert_eq!(b[0].target, "os.path");
            assert_eq!(b[1].name, "np");
            assert_eq!(b[1].alias.as_deref(), Some("np"));
        }

        #[test]
        fn relative_member_imports_resolve() {
            let (_, imports) = imports(
                "from .mod2 import T as TT, U\nfrom .. import a\n",
                "proj.pkg",
            );
            let targets: Vec<(&str, &str)> = imports
                .bindings
                .iter()
                .map(|b| (b.name.as_str(), b.target.as_str()))
                .collect();
            assert_eq!(
                targets,
                vec![
                    ("TT", "proj.pkg.mod2.T"),
                    ("U", "proj.pkg.mod2.U"),
                    ("a", "proj.a")
                ]
            );
            assert_eq!(imports.sites[1].level(), 2);
        }

        #[test]
        fn star_import_binding() {
            let (_, imports) = imports("from proj.util import *\n", "proj");
            assert_eq!(imports.bindings.len(), 1);
            assert_eq!(imports.bindings[0].kind, ImportKind::Star);
            assert_eq!(imports.bindings[0].target, "proj.util");
        }

        #[test]
        fn nested_imports_are_not_module_scope() {
            let (_, imports) = imports(
                "try:\n    import json\nexcept ImportError:\n    json = None\n\ndef f():\n    import csv\n",
                "proj",
            );
            let scopes: Vec<(&str, bool)> = imports
                .bindings
                .iter()
                .map(|b| (b.name.as_str(), b.module_scope))
                .collect();
            assert_eq!(scopes, vec![("json", true), ("csv", false)]);
            assert!(imports.sites[0].statement.is_none());
        }

        #[test]
        fn unresolvable_relative_import_skipped() {
            let (_, imports) = imports("from ... import x\n", "proj");
            assert!(imports.bindings.is_empty());
            assert_eq!(imports.sites.len(), 1);
        }

        #[test]
        fn future_imports_ignored() {
            let (_, imports) = imports("from __future__ import annotations\n", "proj");
            assert!(imports.sites.is_empty());
        }

        #[test]
        fn top_level_site_has_statement_id() {
            let (_, imports) = imports("x = 1\nimport os\n", "proj");
            assert_eq!(imports.sites[0].statement, Some(StmtId(1)));
        }
    }

    mod paths {
        use super::*;
        use std::collections::HashSet;

        #[test]
        fn equality_ignores_kind() {
            let a = ImportPath::member("proj.a", None);
            let b = ImportPath::module("proj.a", None);
            assert_eq!(a, b);
            let set: HashSet<ImportPath> = [a, b].into_iter().collect();
            assert_eq!(set.len(), 1);
        }

        #[test]
        fn redundant_alias_dropped() {
            let p = ImportPath::member("proj.mod.T", Some("T".to_string()));
            assert_eq!(p.alias, None);
            assert_eq!(p.bound_name(), "T");
        }

        #[test]
        fn render_statements() {
            assert_eq!(
                ImportPath::member("proj.pkg.mod2.T", Some("TT".to_string()))
                    .to_statement()
                    .render(),
                "from proj.pkg.mod2 import T as TT"
            );
            assert_eq!(
                ImportPath::module("proj.pkg", Some("p".to_string()))
                    .to_statement()
                    .render(),
                "import proj.pkg as p"
            );
            assert_eq!(ImportPath::member("solo", None).to_statement().render(), "import solo");
        }

        #[test]
        fn grouping_collapses_aliases() {
            let paths = vec![
                ImportPath::member("proj.m.n", None),
                ImportPath::member("proj.m.n", Some("a".to_string())),
                ImportPath::member("proj.m.o", None),
                ImportPath::module("proj.x", None),
            ];
            let rendered: Vec<String> = group_imports(&paths).iter().map(|s| s.render()).collect();
            assert_eq!(
                rendered,
                vec!["import proj.x", "from proj.m import n, n as a, o"]
            );
        }

        #[test]
        fn provides_checks_existing_bindings() {
            let (_, imports) = imports("from proj.m import n as k\nimport proj.x\n", "proj");
            assert!(imports.provides(&ImportPath::member("proj.m.n", Some("k".to_string()))));
            assert!(!imports.provides(&ImportPath::member("proj.m.n", None)));
            assert!(imports.provides(&ImportPath::module("proj.x", None)));
        }
    }

    mod edits {
        use super::*;

        fn apply(tree: &SourceTree, span: Span, text: &str) -> String {
            let mut editor = tree.edit();
            editor.replace(span, text);
            editor.render().unwrap()
        }

        #[test]
        fn insertion_after_docstring_and_future() {
            let tree = SourceTree::parse(
                "\"\"\"Doc.\"\"\"\nfrom __future__ import annotations\nimport os\n",
            )
            .unwrap();
            let offset = import_insertion_offset(&tree);
            assert_eq!(&tree.code()[offset..], "import os\n");
        }

        #[test]
        fn insertion_at_top_without_docstring() {
            let tree = SourceTree::parse("# header\n\nx = 1\n").unwrap();
            assert_eq!(import_insertion_offset(&tree), "# header\n\n".len());
        }

        #[test]
        fn import_block_adds_newline_when_needed() {
            let tree = SourceTree::parse("\"\"\"Doc.\"\"\"").unwrap();
            let offset = import_insertion_offset(&tree);
            let block = render_import_block(&tree, offset, &[ImportStatement::from_import("a", "b")]);
            assert_eq!(block, "\nfrom a import b\n");
        }

        #[test]
        fn import_block_separated_from_code() {
            let tree = SourceTree::parse("x = 1\n").unwrap();
            let block = render_import_block(&tree, 0, &[ImportStatement::from_import("a", "b")]);
            assert_eq!(block, "from a import b\n\n");
            let tree = SourceTree::parse("import os\nx = 1\n").unwrap();
            let block = render_import_block(&tree, 0, &[ImportStatement::from_import("a", "b")]);
            assert_eq!(block, "from a import b\n");
        }

        #[test]
        fn remove_whole_line() {
            let (tree, imports) = imports("import os\nfrom proj.m import f\nx = 1\n", "proj");
            let (span, text) = removal_edit(&tree, &imports.sites[1], &[0]);
            assert_eq!(apply(&tree, span, &text), "import os\nx = 1\n");
        }

        #[test]
        fn remove_one_of_many_names() {
            let (tree, imports) = imports("from proj.m import (\n    f,\n    g as h,\n)\n", "proj");
            let (span, text) = removal_edit(&tree, &imports.sites[0], &[0]);
            assert_eq!(apply(&tree, span, &text), "from proj.m import g as h\n");
        }

        #[test]
        fn remove_keeps_comment_of_kept_name() {
            let (tree, imports) =
                imports("if True:\n    from proj.m import (\n        f,  # f\n        g,  # g\n    )\n", "proj");
            assert_eq!(imports.sites[0].items[1].comment.as_deref(), Some("# g"));
            let (span, text) = removal_edit(&tree, &imports.sites[0], &[0]);
            assert_eq!(
                apply(&tree, span, &text),
                "if True:\n    from proj.m import (\n        g,  # g\n    )\n"
            );
        }

        #[test]
        fn remove_only_statement_in_block_leaves_pass() {
            let (tree, imports) = imports("if True:\n    from proj.m import f\n", "proj");
            let (span, text) = removal_edit(&tree, &imports.sites[0], &[0]);
            assert_eq!(apply(&tree, span, &text), "if True:\n    pass\n");
        }

        #[test]
        fn remove_semicolon_separated() {
            let (tree, imports) = imports("from proj.m import f; import os\n", "proj");
            let (span, text) = removal_edit(&tree, &imports.sites[0], &[0]);
            assert_eq!(apply(&tree, span, &text), "import os\n");

            let (span, text) = removal_edit(&tree, &imports.sites[1], &[0]);
            assert_eq!(apply(&tree, span, &text), "from proj.m import f\n");
        }
    }
}
