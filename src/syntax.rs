//! Small helpers over the tree-sitter-go tree.
//!
//! The grammar has shifted slightly between releases (`statement_list`,
//! `literal_element`, `var_spec_list`), so helpers that enumerate children
//! flatten those wrappers instead of assuming one layout.

use tree_sitter::Node;

pub(crate) fn walk<'t>(node: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, f);
    }
}

pub(crate) fn slice<'a>(source: &'a str, node: Node) -> &'a str {
    // Offsets from tree-sitter are UTF-8 byte indices; fall back to "" rather
    // than panicking on a misaligned range.
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// Named children, without comments.
pub(crate) fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect();
    children
}

pub(crate) fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children = node.children_by_field_name(field, &mut cursor).collect();
    children
}

pub(crate) fn is_function_like(kind: &str) -> bool {
    matches!(
        kind,
        "function_declaration" | "method_declaration" | "func_literal"
    )
}

/// Statements that open a Go scope or make the code below them conditional.
pub(crate) fn is_control_flow(kind: &str) -> bool {
    matches!(
        kind,
        "if_statement"
            | "for_statement"
            | "expression_switch_statement"
            | "type_switch_statement"
            | "select_statement"
            | "expression_case"
            | "type_case"
            | "default_case"
            | "communication_case"
    )
}

/// Strip any number of wrapping parentheses.
pub(crate) fn strip_parens(mut node: Node<'_>) -> Node<'_> {
    while node.kind() == "parenthesized_expression" {
        match named_children(node).first() {
            Some(inner) => node = *inner,
            None => break,
        }
    }
    node
}

/// Elements of an `expression_list`, or the node itself for a single expression.
pub(crate) fn expression_list(node: Node<'_>) -> Vec<Node<'_>> {
    if node.kind() == "expression_list" {
        named_children(node)
    } else {
        vec![node]
    }
}

/// Arguments of a call expression in source order.
pub(crate) fn call_arguments(call: Node<'_>) -> Vec<Node<'_>> {
    call.child_by_field_name("arguments")
        .map(named_children)
        .unwrap_or_default()
}

/// Unwrap `element` / `literal_element` wrappers around composite literal parts.
pub(crate) fn unwrap_element(node: Node<'_>) -> Node<'_> {
    if matches!(node.kind(), "element" | "literal_element") {
        if let Some(inner) = named_children(node).first() {
            return *inner;
        }
    }
    node
}

/// True if `node` has an unnamed child token with the given text (e.g. `:=`).
pub(crate) fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token);
    found
}

/// True if `inner` lies within `outer` (inclusive).
pub(crate) fn contains(outer: Node<'_>, inner: Node<'_>) -> bool {
    outer.start_byte() <= inner.start_byte() && inner.end_byte() <= outer.end_byte()
}

/// Strip the quotes from an interpreted or raw Go string literal.
pub(crate) fn unquote(text: &str) -> &str {
    let t = text.trim();
    t.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| t.strip_prefix('`').and_then(|s| s.strip_suffix('`')))
        .unwrap_or(t)
}

/// 1-based line of a node's start.
pub(crate) fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}
