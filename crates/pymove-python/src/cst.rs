//! Lossless Python syntax trees.
//!
//! A [`SourceTree`] pairs the exact source text with a tree-sitter parse of
//! it and a flat arena of the module's top-level statements. Regenerating
//! code is the identity: [`SourceTree::code`] returns the text the tree was
//! parsed from, comments and formatting included.
//!
//! Each top-level [`Statement`] owns a *chunk*: the bytes from the end of the
//! previous statement's chunk through the end of the statement's last line.
//! Chunks partition the text between the module [header](SourceTree::header_end)
//! (leading comments up to the last blank line before the first statement) and
//! the [footer](SourceTree::footer_start) (trailing comments after the last
//! statement), so removing a chunk removes a statement together with the
//! comments and blank lines that lead into it.
//!
//! Trees are immutable. [`TreeEditor`] batches byte-span edits and produces a
//! freshly parsed tree.

use std::fmt;

use pymove_core::edit::Span;
use pymove_core::text::{line_end, line_start};
use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

// ============================================================================
// Error Types
// ============================================================================

/// Errors produced while parsing Python source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The grammar could not be loaded into the parser.
    #[error("failed to load Python grammar: {0}")]
    Language(String),

    /// The parser gave up without producing a tree.
    #[error("parser produced no tree")]
    NoTree,

    /// The source contains a syntax error.
    #[error("syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },
}

/// Result type for parse operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors produced while applying a batch of edits.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditError {
    /// Two edits touch the same bytes.
    #[error("overlapping edits at {first} and {second}")]
    Overlap { first: Span, second: Span },

    /// An edit reaches outside the source or splits a character.
    #[error("edit span {span} is outside the source (length {len})")]
    OutOfBounds { span: Span, len: usize },

    /// The edited source no longer parses.
    #[error("edit produced invalid Python: {0}")]
    BrokenResult(ParseError),

    /// The edited source could not be parsed at all.
    #[error("failed to parse edited source: {0}")]
    Parse(ParseError),
}

/// Result type for edit operations.
pub type EditResult<T> = Result<T, EditError>;

// ============================================================================
// Statements
// ============================================================================

/// Identifies a top-level statement within one [`SourceTree`].
///
/// Ids are positions in the statement arena and are only meaningful for the
/// tree that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub usize);

/// Classification of a top-level statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// `import a.b [as c], ...`
    Import,
    /// `from m import n [as k], ...` (including relative and star forms)
    ImportFrom,
    /// `from __future__ import ...`
    FutureImport,
    /// `def` or `async def`, possibly decorated
    Function,
    /// `class`, possibly decorated
    Class,
    /// Anything else: assignments, expressions, docstrings, compound blocks
    Other,
}

impl StatementKind {
    /// Whether this kind is an import of any form.
    pub fn is_import(&self) -> bool {
        matches!(
            self,
            StatementKind::Import | StatementKind::ImportFrom | StatementKind::FutureImport
        )
    }

    /// Whether this kind is a movable definition.
    pub fn is_definition(&self) -> bool {
        matches!(self, StatementKind::Function | StatementKind::Class)
    }
}

/// One top-level statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    /// Defined name for functions and classes.
    pub name: Option<String>,
    /// 1-based line of the statement's first line (first decorator, if any).
    pub line: usize,
    /// 1-based line of the `def`/`class` keyword (equals `line` for others).
    pub header_line: usize,
    /// 0-based character column where the header starts on `header_line`.
    pub header_start_col: usize,
    /// 0-based character column where `header_line` ends.
    pub header_end_col: usize,
    /// Bytes of the statement node itself.
    pub span: Span,
    /// Bytes of the statement including leading trivia and its line ending.
    pub chunk: Span,
    /// Index among the module node's children.
    child_index: usize,
}

// ============================================================================
// SourceTree
// ============================================================================

/// An immutable, lossless parse of one Python module.
#[derive(Clone)]
pub struct SourceTree {
    code: String,
    tree: Tree,
    statements: Vec<Statement>,
    header_end: usize,
    footer_start: usize,
    has_errors: bool,
}

impl fmt::Debug for SourceTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceTree")
            .field("len", &self.code.len())
            .field("statements", &self.statements.len())
            .field("has_errors", &self.has_errors)
            .finish()
    }
}

impl SourceTree {
    /// Parse source text, failing on any syntax error.
    pub fn parse(code: &str) -> ParseResult<SourceTree> {
        let tree = Self::parse_lossy(code)?;
        match tree.first_error() {
            Some((line, column)) => Err(ParseError::Syntax { line, column }),
            None => Ok(tree),
        }
    }

    /// Parse source text, keeping error nodes in the tree.
    ///
    /// Only fails when the parser cannot run at all.
    pub fn parse_lossy(code: &str) -> ParseResult<SourceTree> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ParseError::Language(e.to_string()))?;
        let tree = parser.parse(code, None).ok_or(ParseError::NoTree)?;
        let has_errors = tree.root_node().has_error();
        let (statements, header_end, footer_start) = index_statements(code, &tree);
        Ok(SourceTree {
            code: code.to_string(),
            tree,
            statements,
            header_end,
            footer_start,
            has_errors,
        })
    }

    /// The exact source text.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The module node.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Whether the parse contains error or missing nodes.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// 1-based line and 0-based column of the first syntax error.
    pub fn first_error(&self) -> Option<(usize, usize)> {
        if !self.has_errors {
            return None;
        }
        let located = find_error(self.root()).map(|node| {
            let pos = node.start_position();
            (pos.row + 1, pos.column)
        });
        located.or(Some((1, 0)))
    }

    /// Top-level statements in source order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Iterate `(id, statement)` pairs in source order.
    pub fn iter_statements(&self) -> impl Iterator<Item = (StmtId, &Statement)> {
        self.statements
            .iter()
            .enumerate()
            .map(|(i, stmt)| (StmtId(i), stmt))
    }

    /// Look up a statement by id.
    pub fn statement(&self, id: StmtId) -> Option<&Statement> {
        self.statements.get(id.0)
    }

    /// The syntax node for a statement.
    pub fn statement_node(&self, id: StmtId) -> Option<Node<'_>> {
        let stmt = self.statements.get(id.0)?;
        let root = self.root();
        let mut cursor = root.walk();
        let node = root.children(&mut cursor).nth(stmt.child_index);
        node
    }

    /// The function or class node of a definition statement, looking through
    /// any decorators.
    pub fn definition_node(&self, id: StmtId) -> Option<Node<'_>> {
        let node = self.statement_node(id)?;
        if node.kind() == "decorated_definition" {
            node.child_by_field_name("definition")
        } else {
            Some(node)
        }
    }

    /// Source text of a node.
    pub fn text(&self, node: Node<'_>) -> &str {
        &self.code[node.start_byte()..node.end_byte()]
    }

    /// Source text of a byte span.
    pub fn slice(&self, span: Span) -> &str {
        &self.code[span.start..span.end]
    }

    /// End of the module header (leading comments and blank lines).
    pub fn header_end(&self) -> usize {
        self.header_end
    }

    /// Start of the module footer (trailing comments after the last statement).
    pub fn footer_start(&self) -> usize {
        self.footer_start
    }

    /// Start an edit batch against this tree.
    pub fn edit(&self) -> TreeEditor<'_> {
        TreeEditor::new(self)
    }
}

fn find_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(find_error)
}

fn classify(node: Node<'_>) -> StatementKind {
    match node.kind() {
        "import_statement" => StatementKind::Import,
        "import_from_statement" => StatementKind::ImportFrom,
        "future_import_statement" => StatementKind::FutureImport,
        "function_definition" => StatementKind::Function,
        "class_definition" => StatementKind::Class,
        "decorated_definition" => node
            .child_by_field_name("definition")
            .map(classify)
            .unwrap_or(StatementKind::Other),
        _ => StatementKind::Other,
    }
}

/// Build the statement arena plus header/footer boundaries.
fn index_statements(code: &str, tree: &Tree) -> (Vec<Statement>, usize, usize) {
    let root = tree.root_node();
    let mut cursor = root.walk();
    let nodes: Vec<(usize, Node<'_>)> = root
        .children(&mut cursor)
        .enumerate()
        .filter(|(_, n)| n.is_named() && n.kind() != "comment")
        .collect();

    if nodes.is_empty() {
        return (Vec::new(), code.len(), code.len());
    }

    let first_line = line_start(code, nodes[0].1.start_byte());
    let header_end = header_boundary(&code[..first_line]);

    let mut statements = Vec::with_capacity(nodes.len());
    let mut chunk_start = header_end;
    for (i, (child_index, node)) in nodes.iter().enumerate() {
        let span = Span::new(node.start_byte(), node.end_byte());
        let mut chunk_end = line_end(code, span.end);
        if let Some((_, next)) = nodes.get(i + 1) {
            if next.start_byte() < chunk_end {
                chunk_end = next.start_byte();
            }
        }
        let chunk = Span::new(chunk_start.min(span.start), chunk_end);
        chunk_start = chunk_end;

        let kind = classify(*node);
        let definition = if node.kind() == "decorated_definition" {
            node.child_by_field_name("definition").unwrap_or(*node)
        } else {
            *node
        };
        let name = if kind.is_definition() {
            definition
                .child_by_field_name("name")
                .map(|n| code[n.start_byte()..n.end_byte()].to_string())
        } else {
            None
        };
        let header_pos = definition.start_position();
        let header_line_start = line_start(code, definition.start_byte());
        let header_line_end = code[header_line_start..]
            .find('\n')
            .map(|i| header_line_start + i)
            .unwrap_or(code.len());
        let header_start_col = code[header_line_start..definition.start_byte()]
            .chars()
            .count();
        let header_end_col = code[header_line_start..header_line_end]
            .trim_end_matches('\r')
            .chars()
            .count();

        statements.push(Statement {
            kind,
            name,
            line: node.start_position().row + 1,
            header_line: header_pos.row + 1,
            header_start_col,
            header_end_col,
            span,
            chunk,
            child_index: *child_index,
        });
    }

    (statements, header_end, chunk_start)
}

/// End of the last blank line in the leading text, or 0 when there is none.
fn header_boundary(leading: &str) -> usize {
    let mut boundary = 0;
    let mut pos = 0;
    for line in leading.split_inclusive('\n') {
        pos += line.len();
        if line.trim().is_empty() {
            boundary = pos;
        }
    }
    boundary
}

// ============================================================================
// TreeEditor
// ============================================================================

#[derive(Debug, Clone)]
struct PendingEdit {
    span: Span,
    text: String,
    seq: usize,
}

/// Collects byte-span edits against one tree and applies them as a batch.
///
/// All spans refer to the original tree's text. Insertions at the same offset
/// keep the order they were added in and land before any replacement that
/// starts at that offset.
///
/// # Example
///
/// ```ignore
/// let mut editor = tree.edit();
/// editor.delete(stmt.chunk);
/// editor.insert(tree.footer_start(), "\n\ndef moved():\n    pass\n");
/// let updated = editor.apply()?;
/// ```
pub struct TreeEditor<'a> {
    tree: &'a SourceTree,
    edits: Vec<PendingEdit>,
}

impl<'a> TreeEditor<'a> {
    pub fn new(tree: &'a SourceTree) -> Self {
        TreeEditor {
            tree,
            edits: Vec::new(),
        }
    }

    /// Replace the bytes of `span` with `text`.
    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        let seq = self.edits.len();
        self.edits.push(PendingEdit {
            span,
            text: text.into(),
            seq,
        });
    }

    /// Insert `text` at `offset`.
    pub fn insert(&mut self, offset: usize, text: impl Into<String>) {
        self.replace(Span::at(offset), text);
    }

    /// Delete the bytes of `span`.
    pub fn delete(&mut self, span: Span) {
        self.replace(span, String::new());
    }

    /// Number of queued edits.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Whether no edits are queued.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// The new source text, without reparsing.
    pub fn render(&self) -> EditResult<String> {
        let code = self.tree.code();
        let mut edits: Vec<&PendingEdit> = self.edits.iter().collect();
        edits.sort_by_key(|e| (e.span.start, !e.span.is_empty(), e.seq));

        let mut out = String::with_capacity(code.len());
        let mut cursor = 0;
        let mut last: Option<Span> = None;
        for edit in edits {
            let span = edit.span;
            if span.start > span.end
                || !Span::new(0, code.len()).encloses(&span)
                || !code.is_char_boundary(span.start)
                || !code.is_char_boundary(span.end)
            {
                return Err(EditError::OutOfBounds {
                    span,
                    len: code.len(),
                });
            }
            if span.start < cursor {
                return Err(EditError::Overlap {
                    first: last.unwrap_or(span),
                    second: span,
                });
            }
            out.push_str(&code[cursor..span.start]);
            out.push_str(&edit.text);
            cursor = span.end;
            last = Some(span);
        }
        out.push_str(&code[cursor..]);
        Ok(out)
    }

    /// Apply all edits and parse the result.
    ///
    /// When the original tree parsed cleanly, the result must too.
    pub fn apply(self) -> EditResult<SourceTree> {
        let code = self.render()?;
        if self.tree.has_errors() {
            SourceTree::parse_lossy(&code).map_err(EditError::Parse)
        } else {
            SourceTree::parse(&code).map_err(|e| match e {
                ParseError::Syntax { .. } => EditError::BrokenResult(e),
                other => EditError::Parse(other),
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = r#"# leading comment

"""Docstring."""
from __future__ import annotations

import os
from a.b import c


# helper comment
@decorator
def func(x):
    return x


class Klass:
    pass


VALUE = 1
# trailing
"#;

    mod parsing {
        use super::*;

        #[test]
        fn code_round_trips() {
            let tree = SourceTree::parse(MODULE).unwrap();
            assert_eq!(tree.code(), MODULE);
            assert!(!tree.has_errors());
        }

        #[test]
        fn statements_are_classified() {
            let tree = SourceTree::parse(MODULE).unwrap();
            let kinds: Vec<StatementKind> = tree.statements().iter().map(|s| s.kind).collect();
            assert_eq!(
                kinds,
                vec![
                    StatementKind::Other,
                    StatementKind::FutureImport,
                    StatementKind::Import,
                    StatementKind::ImportFrom,
                    StatementKind::Function,
                    StatementKind::Class,
                    StatementKind::Other,
                ]
            );
        }

        #[test]
        fn decorated_definition_lines() {
            let tree = SourceTree::parse(MODULE).unwrap();
            let func = &tree.statements()[4];
            assert_eq!(func.name.as_deref(), Some("func"));
            assert_eq!(func.line, 11);
            assert_eq!(func.header_line, 12);
            assert_eq!(func.header_start_col, 0);
            assert_eq!(func.header_end_col, "def func(x):".len());
        }

        #[test]
        fn syntax_error_rejected_by_strict_parse() {
            let err = SourceTree::parse("def broken(:\n    pass\n").unwrap_err();
            assert!(matches!(err, ParseError::Syntax { line: 1, .. }));
        }

        #[test]
        fn lossy_parse_keeps_text() {
            let code = "def broken(:\n    pass\n";
            let tree = SourceTree::parse_lossy(code).unwrap();
            assert!(tree.has_errors());
            assert_eq!(tree.code(), code);
        }

        #[test]
        fn empty_module() {
            let tree = SourceTree::parse("").unwrap();
            assert!(tree.statements().is_empty());
            assert_eq!(tree.header_end(), 0);
        }
    }

    mod chunks {
        use super::*;

        #[test]
        fn header_stops_at_last_blank_line() {
            let tree = SourceTree::parse(MODULE).unwrap();
            assert_eq!(&MODULE[..tree.header_end()], "# leading comment\n\n");
        }

        #[test]
        fn chunks_partition_the_body() {
            let tree = SourceTree::parse(MODULE).unwrap();
            let mut cursor = tree.header_end();
            for stmt in tree.statements() {
                assert_eq!(stmt.chunk.start, cursor);
                cursor = stmt.chunk.end;
            }
            assert_eq!(cursor, tree.footer_start());
            assert_eq!(&MODULE[tree.footer_start()..], "# trailing\n");
        }

        #[test]
        fn chunk_carries_leading_comment() {
            let tree = SourceTree::parse(MODULE).unwrap();
            let func = &tree.statements()[4];
            let text = tree.slice(func.chunk);
            assert!(text.starts_with("\n\n# helper comment\n@decorator\n"));
            assert!(text.ends_with("return x\n"));
        }

        #[test]
        fn statement_node_lookup() {
            let tree = SourceTree::parse(MODULE).unwrap();
            let (id, _) = tree
                .iter_statements()
                .find(|(_, s)| s.kind == StatementKind::Class)
                .unwrap();
            let node = tree.definition_node(id).unwrap();
            assert_eq!(node.kind(), "class_definition");
            assert!(tree.text(node).starts_with("class Klass"));
        }
    }

    mod editing {
        use super::*;

        #[test]
        fn delete_and_insert_in_one_batch() {
            let tree = SourceTree::parse("a = 1\nb = 2\n").unwrap();
            let second = tree.statements()[1].chunk;
            let mut editor = tree.edit();
            editor.delete(second);
            editor.insert(0, "import os\n");
            let updated = editor.apply().unwrap();
            assert_eq!(updated.code(), "import os\na = 1\n");
        }

        #[test]
        fn insertions_at_same_offset_keep_order_and_precede_replacement() {
            let tree = SourceTree::parse("x = 1\n").unwrap();
            let mut editor = tree.edit();
            editor.replace(Span::new(0, 5), "y = 2");
            editor.insert(0, "a = 0\n");
            editor.insert(0, "b = 0\n");
            assert_eq!(editor.render().unwrap(), "a = 0\nb = 0\ny = 2\n");
        }

        #[test]
        fn overlapping_edits_rejected() {
            let tree = SourceTree::parse("x = 1\n").unwrap();
            let mut editor = tree.edit();
            editor.replace(Span::new(0, 3), "z");
            editor.replace(Span::new(2, 5), "w");
            assert!(matches!(editor.render(), Err(EditError::Overlap { .. })));
        }

        #[test]
        fn edit_past_end_rejected() {
            let tree = SourceTree::parse("x = 1\n").unwrap();
            let mut editor = tree.edit();
            editor.delete(Span::new(4, 9));
            assert!(matches!(
                editor.render(),
                Err(EditError::OutOfBounds { len: 6, .. })
            ));
        }

        #[test]
        fn broken_result_rejected_for_clean_tree() {
            let tree = SourceTree::parse("x = 1\n").unwrap();
            let mut editor = tree.edit();
            editor.insert(0, "def (:\n");
            assert!(matches!(editor.apply(), Err(EditError::BrokenResult(_))));
        }
    }
}
