//! Name bindings and scope-aware reference collection.
//!
//! Python scoping as it matters for moving code between modules:
//!
//! - Functions, lambdas and comprehensions open scopes visible to nested scopes.
//! - A class body opens a scope that only the class body itself sees; methods
//!   and comprehensions nested in the class skip it.
//! - `global` sends a name straight to module scope; `nonlocal` keeps it in an
//!   enclosing function.
//! - Decorators, default values, annotations and base classes are evaluated in
//!   the enclosing scope.
//!
//! [`module_references`] reports every identifier under a node that resolves
//! to module scope. [`module_definitions`] lists the names a module defines
//! itself.

use std::collections::HashSet;

use pymove_core::edit::Span;
use tree_sitter::Node;

use crate::cst::SourceTree;
use crate::imports::import_bound_names;
use crate::module::SymbolKind;

// ============================================================================
// Binding Walk
// ============================================================================

/// A name-binding event found while walking one scope.
enum Binding<'t> {
    /// A def, class or assignment target.
    Definition {
        name: Node<'t>,
        kind: SymbolKind,
        statement: Node<'t>,
    },
    /// `global name`
    Global(Node<'t>),
    /// `nonlocal name`
    Nonlocal(Node<'t>),
    /// An import statement binding names in this scope.
    Import(Node<'t>),
}

const COMPREHENSIONS: &[&str] = &[
    "list_comprehension",
    "set_comprehension",
    "dictionary_comprehension",
    "generator_expression",
];

const TARGET_CONTAINERS: &[&str] = &[
    "pattern_list",
    "tuple_pattern",
    "list_pattern",
    "list_splat_pattern",
    "as_pattern_target",
    "parenthesized_expression",
    "tuple",
    "list",
    "expression_list",
    "list_splat",
];

fn is_comprehension(kind: &str) -> bool {
    COMPREHENSIONS.contains(&kind)
}

/// Walk the statements of one scope body, reporting bindings but not
/// descending into nested scopes.
fn walk_bindings<'t>(node: Node<'t>, sink: &mut dyn FnMut(Binding<'t>)) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    for child in children {
        match child.kind() {
            "function_definition" | "class_definition" => {
                if let Some(name) = child.child_by_field_name("name") {
                    let kind = if child.kind() == "class_definition" {
                        SymbolKind::Class
                    } else {
                        SymbolKind::Function
                    };
                    sink(Binding::Definition {
                        name,
                        kind,
                        statement: child,
                    });
                }
            }
            "lambda" => {}
            kind if is_comprehension(kind) => {}
            "import_statement" | "import_from_statement" => sink(Binding::Import(child)),
            "future_import_statement" | "comment" => {}
            "global_statement" => {
                for name in identifiers(child) {
                    sink(Binding::Global(name));
                }
            }
            "nonlocal_statement" => {
                for name in identifiers(child) {
                    sink(Binding::Nonlocal(name));
                }
            }
            "assignment" | "augmented_assignment" | "for_statement" => {
                if let Some(left) = child.child_by_field_name("left") {
                    for name in target_names(left) {
                        sink(Binding::Definition {
                            name,
                            kind: SymbolKind::Variable,
                            statement: child,
                        });
                    }
                }
                walk_bindings(child, sink);
            }
            "named_expression" => {
                if let Some(name) = child.child_by_field_name("name") {
                    sink(Binding::Definition {
                        name,
                        kind: SymbolKind::Variable,
                        statement: child,
                    });
                }
                walk_bindings(child, sink);
            }
            "as_pattern" | "except_clause" => {
                if let Some(alias) = alias_after_as(child) {
                    for name in target_names(alias) {
                        sink(Binding::Definition {
                            name,
                            kind: SymbolKind::Variable,
                            statement: child,
                        });
                    }
                }
                walk_bindings(child, sink);
            }
            _ => walk_bindings(child, sink),
        }
    }
}

/// Identifier nodes bound by an assignment-like target.
pub(crate) fn target_names(node: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    collect_target_names(node, &mut out);
    out
}

fn collect_target_names<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    if node.kind() == "identifier" {
        out.push(node);
    } else if TARGET_CONTAINERS.contains(&node.kind()) {
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        for child in children {
            collect_target_names(child, out);
        }
    }
}

/// The named child following an `as` keyword.
pub(crate) fn alias_after_as(node: Node<'_>) -> Option<Node<'_>> {
    if let Some(alias) = node.child_by_field_name("alias") {
        return Some(alias);
    }
    let mut cursor = node.walk();
    let mut seen_as = false;
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    for child in children {
        if seen_as && child.is_named() {
            return Some(child);
        }
        if child.kind() == "as" {
            seen_as = true;
        }
    }
    None
}

fn identifiers(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let names: Vec<Node<'_>> = node
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "identifier")
        .collect();
    names
}

fn node_text<'c>(code: &'c str, node: Node<'_>) -> &'c str {
    &code[node.start_byte()..node.end_byte()]
}

// ============================================================================
// Module Definitions
// ============================================================================

/// A name bound at module scope by the module itself (imports excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based line of the binding statement.
    pub line: usize,
    /// Byte offset of the bound name.
    pub offset: usize,
}

/// List module-scope definitions in source order.
///
/// Covers functions, classes and variables bound by assignments, loops,
/// `with ... as`, `except ... as` and walrus expressions, including those
/// nested in module-level `if`/`try`/`with` blocks.
pub fn module_definitions(tree: &SourceTree) -> Vec<Definition> {
    let code = tree.code();
    let mut out = Vec::new();
    walk_bindings(tree.root(), &mut |binding| {
        if let Binding::Definition {
            name,
            kind,
            statement,
        } = binding
        {
            let statement = match statement.parent() {
                Some(parent) if parent.kind() == "decorated_definition" => parent,
                _ => statement,
            };
            out.push(Definition {
                name: node_text(code, name).to_string(),
                kind,
                line: statement.start_position().row + 1,
                offset: name.start_byte(),
            });
        }
    });
    out
}

// ============================================================================
// Reference Collection
// ============================================================================

/// An identifier that resolves to module scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameReference {
    pub name: String,
    pub span: Span,
    /// Attribute names accessed on the identifier, outermost last
    /// (`a.b.c` gives `["b", "c"]` for the reference `a`).
    pub chain: Vec<String>,
    /// Spans of `a.b`, `a.b.c`, ... matching `chain`.
    pub chain_spans: Vec<Span>,
}

impl NameReference {
    /// The dotted text of the reference with its first `depth` attributes.
    pub fn dotted(&self, depth: usize) -> String {
        let mut parts = vec![self.name.as_str()];
        parts.extend(self.chain.iter().take(depth).map(String::as_str));
        parts.join(".")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Function,
    Class,
    Lambda,
    Comprehension,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    locals: HashSet<String>,
    globals: HashSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Scope {
            kind,
            locals: HashSet::new(),
            globals: HashSet::new(),
        }
    }

    fn bind_body(&mut self, code: &str, body: Node<'_>) {
        walk_bindings(body, &mut |binding| match binding {
            Binding::Definition { name, .. } | Binding::Nonlocal(name) => {
                self.locals.insert(node_text(code, name).to_string());
            }
            Binding::Global(name) => {
                self.globals.insert(node_text(code, name).to_string());
            }
            Binding::Import(statement) => {
                self.locals.extend(import_bound_names(code, statement));
            }
        });
        for global in &self.globals {
            self.locals.remove(global);
        }
    }
}

/// Collect every identifier under `node` that resolves to module scope.
///
/// Binding sites (def/class names, parameters, assignment targets, keyword
/// argument names, attribute names, import statements and global/nonlocal
/// declarations) are not references.
pub fn module_references(tree: &SourceTree, node: Node<'_>) -> Vec<NameReference> {
    let mut visitor = ReferenceVisitor {
        code: tree.code(),
        scopes: Vec::new(),
        out: Vec::new(),
    };
    visitor.visit(node);
    visitor.out
}

struct ReferenceVisitor<'c> {
    code: &'c str,
    scopes: Vec<Scope>,
    out: Vec<NameReference>,
}

impl ReferenceVisitor<'_> {
    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            "identifier" => self.reference(node),
            "attribute" => {
                if let Some(object) = node.child_by_field_name("object") {
                    self.visit(object);
                }
            }
            "keyword_argument" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value);
                }
            }
            "dotted_name" => {
                let mut cursor = node.walk();
                let first = node.named_children(&mut cursor).next();
                if let Some(first) = first {
                    self.visit(first);
                }
            }
            "function_definition" => self.visit_function(node),
            "class_definition" => self.visit_class(node),
            "lambda" => self.visit_lambda(node),
            kind if is_comprehension(kind) => self.visit_comprehension(node),
            "import_statement"
            | "import_from_statement"
            | "future_import_statement"
            | "global_statement"
            | "nonlocal_statement"
            | "comment" => {}
            "assignment" | "for_statement" | "for_in_clause" => {
                self.visit_with_targets(node, &["left"])
            }
            "named_expression" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value);
                }
            }
            "as_pattern" | "except_clause" => {
                let alias = alias_after_as(node).map(|a| a.id());
                self.visit_children(node, |child| Some(child.id()) == alias);
            }
            _ => self.visit_children(node, |_| false),
        }
    }

    fn visit_children(&mut self, node: Node<'_>, is_target: impl Fn(Node<'_>) -> bool) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            if is_target(child) {
                self.visit_target(child);
            } else {
                self.visit(child);
            }
        }
    }

    fn visit_with_targets(&mut self, node: Node<'_>, fields: &[&str]) {
        let targets: Vec<usize> = fields
            .iter()
            .filter_map(|f| node.child_by_field_name(f))
            .map(|n| n.id())
            .collect();
        self.visit_children(node, |child| targets.contains(&child.id()));
    }

    /// Visit an assignment target: bare names bind, everything else is read.
    fn visit_target(&mut self, node: Node<'_>) {
        match node.kind() {
            "identifier" => {}
            "attribute" => {
                if let Some(object) = node.child_by_field_name("object") {
                    self.visit(object);
                }
            }
            kind if TARGET_CONTAINERS.contains(&kind) => {
                self.visit_children(node, |_| true);
            }
            _ => self.visit(node),
        }
    }

    fn visit_parameter_defaults(&mut self, params: Node<'_>) {
        let mut cursor = params.walk();
        let children: Vec<Node<'_>> = params.named_children(&mut cursor).collect();
        for param in children {
            for field in ["type", "value"] {
                if let Some(expr) = param.child_by_field_name(field) {
                    self.visit(expr);
                }
            }
        }
    }

    fn visit_function(&mut self, node: Node<'_>) {
        let params = node.child_by_field_name("parameters");
        if let Some(params) = params {
            self.visit_parameter_defaults(params);
        }
        if let Some(returns) = node.child_by_field_name("return_type") {
            self.visit(returns);
        }

        let mut scope = Scope::new(ScopeKind::Function);
        if let Some(params) = params {
            scope.locals.extend(parameter_names(self.code, params));
        }
        let body = node.child_by_field_name("body");
        if let Some(body) = body {
            scope.bind_body(self.code, body);
        }
        self.scopes.push(scope);
        if let Some(body) = body {
            self.visit(body);
        }
        self.scopes.pop();
    }

    fn visit_class(&mut self, node: Node<'_>) {
        if let Some(bases) = node.child_by_field_name("superclasses") {
            self.visit(bases);
        }
        let mut scope = Scope::new(ScopeKind::Class);
        let body = node.child_by_field_name("body");
        if let Some(body) = body {
            scope.bind_body(self.code, body);
        }
        self.scopes.push(scope);
        if let Some(body) = body {
            self.visit(body);
        }
        self.scopes.pop();
    }

    fn visit_lambda(&mut self, node: Node<'_>) {
        let mut scope = Scope::new(ScopeKind::Lambda);
        if let Some(params) = node.child_by_field_name("parameters") {
            self.visit_parameter_defaults(params);
            scope.locals.extend(parameter_names(self.code, params));
        }
        self.scopes.push(scope);
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body);
        }
        self.scopes.pop();
    }

    fn visit_comprehension(&mut self, node: Node<'_>) {
        let mut scope = Scope::new(ScopeKind::Comprehension);
        let mut cursor = node.walk();
        let clauses: Vec<Node<'_>> = node
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "for_in_clause")
            .collect();
        for clause in clauses {
            if let Some(left) = clause.child_by_field_name("left") {
                for name in target_names(left) {
                    scope.locals.insert(node_text(self.code, name).to_string());
                }
            }
        }
        self.scopes.push(scope);
        self.visit_children(node, |_| false);
        self.scopes.pop();
    }

    fn resolves_to_module(&self, name: &str) -> bool {
        let innermost = self.scopes.len().saturating_sub(1);
        for (depth, scope) in self.scopes.iter().enumerate().rev() {
            if scope.kind == ScopeKind::Class && depth != innermost {
                continue;
            }
            if scope.globals.contains(name) {
                return true;
            }
            if scope.locals.contains(name) {
                return false;
            }
        }
        true
    }

    fn reference(&mut self, node: Node<'_>) {
        let name = node_text(self.code, node);
        if !self.resolves_to_module(name) {
            return;
        }

        let mut chain = Vec::new();
        let mut chain_spans = Vec::new();
        let mut current = node;
        while let Some(parent) = current.parent() {
            let is_object = parent.kind() == "attribute"
                && parent.child_by_field_name("object").map(|o| o.id()) == Some(current.id());
            if !is_object {
                break;
            }
            match parent.child_by_field_name("attribute") {
                Some(attr) => {
                    chain.push(node_text(self.code, attr).to_string());
                    chain_spans.push(Span::new(parent.start_byte(), parent.end_byte()));
                }
                None => break,
            }
            current = parent;
        }

        self.out.push(NameReference {
            name: name.to_string(),
            span: Span::new(node.start_byte(), node.end_byte()),
            chain,
            chain_spans,
        });
    }
}

/// Names bound by a `parameters` or `lambda_parameters` node.
fn parameter_names(code: &str, params: Node<'_>) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = params.walk();
    let children: Vec<Node<'_>> = params.named_children(&mut cursor).collect();
    for param in children {
        let bound: Vec<Node<'_>> = match param.kind() {
            "identifier" => vec![param],
            "default_parameter" | "typed_default_parameter" => param
                .child_by_field_name("name")
                .map(target_names)
                .unwrap_or_default(),
            "typed_parameter" => {
                let type_id = param.child_by_field_name("type").map(|t| t.id());
                let mut inner = param.walk();
                let parts: Vec<Node<'_>> = param
                    .named_children(&mut inner)
                    .filter(|n| Some(n.id()) != type_id)
                    .collect();
                parts.into_iter().flat_map(splat_names).collect()
            }
            "list_splat_pattern" | "dictionary_splat_pattern" | "tuple_pattern" => {
                splat_names(param)
            }
            _ => Vec::new(),
        };
        names.extend(bound.into_iter().map(|n| node_text(code, n).to_string()));
    }
    names
}

fn splat_names(node: Node<'_>) -> Vec<Node<'_>> {
    match node.kind() {
        "identifier" => vec![node],
        "list_splat_pattern" | "dictionary_splat_pattern" | "tuple_pattern" => {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            children.into_iter().flat_map(splat_names).collect()
        }
        _ => Vec::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn refs_of_first_statement(code: &str) -> Vec<String> {
        let tree = SourceTree::parse(code).unwrap();
        let (id, _) = tree.iter_statements().next().unwrap();
        let node = tree.statement_node(id).unwrap();
        let mut names: Vec<String> = module_references(&tree, node)
            .into_iter()
            .map(|r| r.name)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    mod definitions {
        use super::*;

        #[test]
        fn module_scope_bindings() {
            let tree = SourceTree::parse(
                "import os\nx = 1\na, (b, *c) = f()\n\n@dec\ndef g():\n    inner = 1\n\nclass K:\n    attr = 2\n\nif True:\n    y: int = 3\n\nwith open('f') as fh:\n    pass\n\ntry:\n    pass\nexcept Exception as err:\n    pass\n\n[z for z in range(3)]\n",
            )
            .unwrap();
            let names: Vec<(String, SymbolKind)> = module_definitions(&tree)
                .into_iter()
                .map(|d| (d.name, d.kind))
                .collect();
            let has = |n: &str, k: SymbolKind| names.iter().any(|(name, kind)| name == n && *kind == k);
            assert!(has("x", SymbolKind::Variable));
            assert!(has("a", SymbolKind::Variable));
            assert!(has("b", SymbolKind::Variable));
            assert!(has("c", SymbolKind::Variable));
            assert!(has("g", SymbolKind::Function));
            assert!(has("K", SymbolKind::Class));
            assert!(has("y", SymbolKind::Variable));
            assert!(has("fh", SymbolKind::Variable));
            assert!(has("err", SymbolKind::Variable));
            assert!(!names.iter().any(|(n, _)| n == "inner" || n == "attr" || n == "z" || n == "os"));
        }

        #[test]
        fn decorated_definition_line_is_decorator() {
            let tree = SourceTree::parse("\n@dec\ndef g():\n    pass\n").unwrap();
            let defs = module_definitions(&tree);
            assert_eq!(defs.len(), 1);
            assert_eq!(defs[0].line, 2);
        }
    }

    mod references {
        use super::*;

        #[test]
        fn parameters_and_locals_are_not_module_references() {
            let names = refs_of_first_statement(
                "def f(a, b=DEFAULT, *args, c: Annot = 1, **kw):\n    local = a + b\n    return local + helper(c) + len(args)\n",
            );
            assert_eq!(names, vec!["Annot", "DEFAULT", "helper", "len"]);
        }

        #[test]
        fn decorators_and_bases_are_references() {
            let names = refs_of_first_statement(
                "@register\nclass C(Base, metaclass=Meta):\n    field = CONST\n",
            );
            assert_eq!(names, vec!["Base", "CONST", "Meta", "register"]);
        }

        #[test]
        fn class_scope_hidden_from_methods() {
            let names = refs_of_first_statement(
                "class C:\n    x = 1\n    def m(self):\n        return x + self.x\n",
            );
            assert_eq!(names, vec!["x"]);
        }

        #[test]
        fn global_declaration_reaches_module() {
            let names = refs_of_first_statement(
                "def f():\n    global counter\n    counter = 0\n    return counter\n",
            );
            assert_eq!(names, vec!["counter"]);
        }

        #[test]
        fn nested_function_sees_enclosing_locals() {
            let names = refs_of_first_statement(
                "def outer():\n    value = 1\n    def inner():\n        return value + other\n    return inner\n",
            );
            assert_eq!(names, vec!["other"]);
        }

        #[test]
        fn comprehension_and_lambda_variables_are_local() {
            let names = refs_of_first_statement(
                "def f(items):\n    g = lambda v: v + OFFSET\n    return [g(i) for i in items if i > LIMIT]\n",
            );
            assert_eq!(names, vec!["LIMIT", "OFFSET"]);
        }

        #[test]
        fn attribute_names_and_keywords_are_skipped() {
            let names = refs_of_first_statement(
                "def f():\n    return mod.attr.deep(key=value)\n",
            );
            assert_eq!(names, vec!["mod", "value"]);
        }

        #[test]
        fn local_imports_shadow() {
            let names = refs_of_first_statement(
                "def f():\n    import json\n    from os import path as p\n    return json.dumps(p.sep)\n",
            );
            assert!(names.is_empty());
        }

        #[test]
        fn recursion_reports_own_name() {
            let names = refs_of_first_statement("def fact(n):\n    return n * fact(n - 1)\n");
            assert_eq!(names, vec!["fact"]);
        }

        #[test]
        fn attribute_chain_recorded() {
            let code = "def f():\n    return pkg.mod.T()\n";
            let tree = SourceTree::parse(code).unwrap();
            let node = tree.statement_node(crate::cst::StmtId(0)).unwrap();
            let refs = module_references(&tree, node);
            assert_eq!(refs.len(), 1);
            assert_eq!(refs[0].chain, vec!["mod".to_string(), "T".to_string()]);
            assert_eq!(refs[0].dotted(2), "pkg.mod.T");
            assert_eq!(tree.slice(refs[0].chain_spans[1]), "pkg.mod.T");
        }

        #[test]
        fn fstring_interpolations_are_references() {
            let names = refs_of_first_statement("def f():\n    return f\"{NAME}!\"\n");
            assert_eq!(names, vec!["NAME"]);
        }
    }
}
