//! Per-file binding and type resolution.
//!
//! This is the "type information" the engine consumes: every identifier in
//! expression position is mapped to the binding it refers to, every binding
//! carries the type the file lets us infer for it, and every assignment to a
//! binding is recorded along with whether control flow guards it.
//!
//! Scoping follows Go: package, function (parameters and body share one
//! level), block, `if`/`for`/`switch`/`select` statements, and case clauses.

use crate::syntax::{
    expression_list, field_children, has_token, is_control_flow, is_function_like,
    named_children, slice, strip_parens, unwrap_element,
};
use crate::types::{
    Imports, TokenTypes, TypeName, known_results, parameter_types, type_name_of,
};
use std::collections::{HashMap, HashSet};
use tree_sitter::Node;

pub type BindingId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Package-level function declaration.
    Func,
    /// Package-level `var` or `const`.
    PackageVar,
    /// Receiver, parameter, or named result.
    Param,
    /// Any other local variable.
    Local,
}

/// One write to a binding.
#[derive(Debug, Clone, Copy)]
pub struct Assignment<'t> {
    /// The statement or spec performing the write.
    pub site: Node<'t>,
    /// The assigned expression. `None` when one multi-value call feeds several names.
    pub value: Option<Node<'t>>,
    /// Guarded by control flow (or made from a nested closure) relative to
    /// the block the binding was declared in.
    pub conditional: bool,
}

#[derive(Debug, Clone)]
pub struct Binding<'t> {
    pub name: String,
    pub kind: BindingKind,
    /// The declaring identifier.
    pub decl: Node<'t>,
    /// Innermost function-like node around the declaration.
    pub owner: Option<Node<'t>>,
    /// Node whose scope holds the binding.
    pub scope: Node<'t>,
    pub ty: Option<TypeName>,
    pub assignments: Vec<Assignment<'t>>,
    /// The declaration node for `BindingKind::Func`.
    pub func_decl: Option<Node<'t>>,
}

impl<'t> Binding<'t> {
    pub fn is_package_level(&self) -> bool {
        matches!(self.kind, BindingKind::Func | BindingKind::PackageVar)
    }
}

/// Everything resolution learned about one file.
#[derive(Debug)]
pub struct FileFacts<'t> {
    pub source: &'t str,
    pub root: Node<'t>,
    pub imports: Imports,
    bindings: Vec<Binding<'t>>,
    uses: HashMap<usize, BindingId>,
    struct_fields: HashMap<(String, String), TypeName>,
    func_results: HashMap<String, Vec<Option<TypeName>>>,
}

impl<'t> FileFacts<'t> {
    pub fn resolve(root: Node<'t>, source: &'t str) -> Self {
        let facts = FileFacts {
            source,
            root,
            imports: Imports::collect(root, source),
            bindings: Vec::new(),
            uses: HashMap::new(),
            struct_fields: HashMap::new(),
            func_results: HashMap::new(),
        };
        let mut resolver = Resolver {
            facts,
            scopes: vec![(root, HashMap::new())],
            functions: Vec::new(),
        };
        resolver.declare_package_level();
        resolver.visit_package_bodies();
        resolver.facts
    }

    pub fn text(&self, node: Node<'_>) -> &'t str {
        slice(self.source, node)
    }

    pub fn binding(&self, id: BindingId) -> &Binding<'t> {
        &self.bindings[id]
    }

    /// Whether a binding can hold a token.
    ///
    /// Typed bindings answer from their type. An untyped local can hold one
    /// when some write to it comes from an expression the file cannot type
    /// (a foreign call, a field of a foreign type, a receive, a range or
    /// type-switch variable).
    pub fn may_hold_token(&self, id: BindingId, tokens: &TokenTypes) -> bool {
        self.may_hold_token_in(id, tokens, &mut HashSet::new())
    }

    fn may_hold_token_in(
        &self,
        id: BindingId,
        tokens: &TokenTypes,
        seen: &mut HashSet<BindingId>,
    ) -> bool {
        let binding = &self.bindings[id];
        if let Some(ty) = &binding.ty {
            return tokens.is_token(ty);
        }
        if binding.kind != BindingKind::Local || !seen.insert(id) {
            return false;
        }
        if binding.assignments.is_empty() {
            // `var x T` without a value has a syntactic type; clause variables do not.
            return !binding
                .decl
                .parent()
                .is_some_and(|p| matches!(p.kind(), "var_spec" | "const_spec"));
        }
        binding.assignments.iter().any(|a| match a.value {
            Some(value) => self.untyped_value_may_hold_token(value, tokens, seen),
            None => true,
        })
    }

    fn untyped_value_may_hold_token(
        &self,
        value: Node<'_>,
        tokens: &TokenTypes,
        seen: &mut HashSet<BindingId>,
    ) -> bool {
        let value = strip_parens(value);
        match value.kind() {
            // Unresolved names live in other files of the package.
            "identifier" => self
                .binding_of(value)
                .is_none_or(|id| self.may_hold_token_in(id, tokens, seen)),
            "unary_expression" => {
                let op = value.child_by_field_name("operator").map(|o| self.text(o));
                matches!(op, Some("<-" | "*"))
            }
            "int_literal" | "float_literal" | "imaginary_literal" | "rune_literal"
            | "interpreted_string_literal" | "raw_string_literal" | "true" | "false" | "nil"
            | "iota" | "func_literal" | "composite_literal" | "binary_expression" => false,
            _ => true,
        }
    }

    /// A `x.f` field read whose type resolves to a token.
    pub fn is_token_field(&self, expr: Node<'_>, tokens: &TokenTypes) -> bool {
        expr.kind() == "selector_expression"
            && self.expr_type(expr).is_some_and(|ty| tokens.is_token(&ty))
    }

    /// The binding an identifier (use or declaration) refers to.
    pub fn binding_of(&self, ident: Node<'_>) -> Option<BindingId> {
        self.uses.get(&ident.id()).copied()
    }

    /// Import path for an identifier naming an imported package.
    pub fn package_of(&self, ident: Node<'_>) -> Option<&str> {
        if ident.kind() != "identifier" || self.binding_of(ident).is_some() {
            return None;
        }
        self.imports.resolve(self.text(ident))
    }

    /// Declaration node of a package-level function declared in this file.
    #[cfg(test)]
    pub fn func_decl_named(&self, name: &str) -> Option<Node<'t>> {
        self.bindings
            .iter()
            .find(|b| b.kind == BindingKind::Func && b.name == name)
            .and_then(|b| b.func_decl)
    }

    /// Best-effort static type of an expression.
    pub fn expr_type(&self, expr: Node<'_>) -> Option<TypeName> {
        let expr = strip_parens(expr);
        match expr.kind() {
            "identifier" => self
                .binding_of(expr)
                .and_then(|id| self.bindings[id].ty.clone()),
            "composite_literal" => expr
                .child_by_field_name("type")
                .and_then(|t| type_name_of(t, self.source, &self.imports)),
            "unary_expression" => {
                let op = expr.child_by_field_name("operator").map(|o| self.text(o));
                if matches!(op, Some("&" | "*")) {
                    expr.child_by_field_name("operand")
                        .and_then(|o| self.expr_type(o))
                } else {
                    None
                }
            }
            "selector_expression" => {
                let operand = expr.child_by_field_name("operand")?;
                let field = expr.child_by_field_name("field")?;
                let owner = self.expr_type(operand)?;
                if !owner.is_local() {
                    return None;
                }
                self.struct_fields
                    .get(&(owner.name, self.text(field).to_string()))
                    .cloned()
            }
            "call_expression" => self.call_result_type(expr, 0),
            _ => None,
        }
    }

    /// Type of the `index`-th result of a call, when the callee is known.
    pub fn call_result_type(&self, call: Node<'_>, index: usize) -> Option<TypeName> {
        let callee = strip_parens(call.child_by_field_name("function")?);
        match callee.kind() {
            "identifier" => {
                let name = self.text(callee);
                match self.binding_of(callee) {
                    None if name == "new" && index == 0 => {
                        let arg = named_children(call.child_by_field_name("arguments")?)
                            .into_iter()
                            .next()?;
                        type_name_of(arg, self.source, &self.imports)
                    }
                    Some(id) if self.bindings[id].kind == BindingKind::Func => self
                        .func_results
                        .get(name)
                        .and_then(|r| r.get(index).cloned().flatten()),
                    _ => None,
                }
            }
            "selector_expression" => {
                let operand = callee.child_by_field_name("operand")?;
                let field = callee.child_by_field_name("field")?;
                let path = self.package_of(operand)?;
                known_results(path, self.text(field))
                    .and_then(|r| r.get(index).cloned().flatten())
            }
            _ => None,
        }
    }
}

type ScopeFrame<'t> = (Node<'t>, HashMap<String, BindingId>);

struct Resolver<'t> {
    facts: FileFacts<'t>,
    scopes: Vec<ScopeFrame<'t>>,
    functions: Vec<Node<'t>>,
}

impl<'t> Resolver<'t> {
    fn text(&self, node: Node<'_>) -> &'t str {
        slice(self.facts.source, node)
    }

    fn at_package_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    fn declare(&mut self, ident: Node<'t>, kind: BindingKind, ty: Option<TypeName>) -> BindingId {
        let name = self.text(ident).to_string();
        let id = self.facts.bindings.len();
        let scope = self
            .scopes
            .last()
            .map_or(self.facts.root, |(node, _)| *node);
        self.facts.bindings.push(Binding {
            name: name.clone(),
            kind,
            decl: ident,
            owner: self.functions.last().copied(),
            scope,
            ty,
            assignments: Vec::new(),
            func_decl: None,
        });
        if let Some((_, frame)) = self.scopes.last_mut() {
            frame.insert(name, id);
        }
        self.facts.uses.insert(ident.id(), id);
        id
    }

    fn lookup(&self, name: &str) -> Option<BindingId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|(_, frame)| frame.get(name).copied())
    }

    fn record_use(&mut self, ident: Node<'t>) {
        let name = self.text(ident);
        if name == "_" {
            return;
        }
        if let Some(id) = self.lookup(name) {
            self.facts.uses.insert(ident.id(), id);
        }
    }

    fn with_scope(&mut self, node: Node<'t>, f: impl FnOnce(&mut Self)) {
        self.scopes.push((node, HashMap::new()));
        f(self);
        self.scopes.pop();
    }

    fn push_assignment(&mut self, id: BindingId, site: Node<'t>, value: Option<Node<'t>>) {
        let conditional = is_conditional(site, self.facts.bindings[id].scope);
        self.facts.bindings[id].assignments.push(Assignment {
            site,
            value,
            conditional,
        });
    }

    /// Type of the `index`-th name on the left of `left_len` names fed by `right`.
    fn infer(&self, right: &[Node<'t>], index: usize, left_len: usize) -> Option<TypeName> {
        if right.len() == left_len {
            self.facts.expr_type(right[index])
        } else if right.len() == 1 && strip_parens(right[0]).kind() == "call_expression" {
            self.facts.call_result_type(strip_parens(right[0]), index)
        } else {
            None
        }
    }

    fn declare_package_level(&mut self) {
        let root = self.facts.root;
        for decl in named_children(root) {
            match decl.kind() {
                "function_declaration" => {
                    let Some(name) = decl.child_by_field_name("name") else {
                        continue;
                    };
                    let id = self.declare(name, BindingKind::Func, None);
                    self.facts.bindings[id].func_decl = Some(decl);
                    if let Some(result) = decl.child_by_field_name("result") {
                        let results = if result.kind() == "parameter_list" {
                            parameter_types(result, self.facts.source, &self.facts.imports)
                        } else {
                            vec![type_name_of(result, self.facts.source, &self.facts.imports)]
                        };
                        self.facts
                            .func_results
                            .insert(self.text(name).to_string(), results);
                    }
                }
                "var_declaration" | "const_declaration" => {
                    for spec in value_specs(decl) {
                        let ty = spec
                            .child_by_field_name("type")
                            .and_then(|t| type_name_of(t, self.facts.source, &self.facts.imports));
                        for name in field_children(spec, "name") {
                            if self.text(name) != "_" {
                                self.declare(name, BindingKind::PackageVar, ty.clone());
                            }
                        }
                    }
                }
                "type_declaration" => self.collect_struct_fields(decl),
                _ => {}
            }
        }
    }

    fn collect_struct_fields(&mut self, decl: Node<'t>) {
        for spec in named_children(decl) {
            if spec.kind() != "type_spec" {
                continue;
            }
            let (Some(name), Some(ty)) = (
                spec.child_by_field_name("name"),
                spec.child_by_field_name("type"),
            ) else {
                continue;
            };
            if ty.kind() != "struct_type" {
                continue;
            }
            let owner = self.text(name).to_string();
            let Some(list) = named_children(ty)
                .into_iter()
                .find(|c| c.kind() == "field_declaration_list")
            else {
                continue;
            };
            for field in named_children(list) {
                let Some(field_ty) = field
                    .child_by_field_name("type")
                    .and_then(|t| type_name_of(t, self.facts.source, &self.facts.imports))
                else {
                    continue;
                };
                for fname in field_children(field, "name") {
                    self.facts.struct_fields.insert(
                        (owner.clone(), self.text(fname).to_string()),
                        field_ty.clone(),
                    );
                }
            }
        }
    }

    fn visit_package_bodies(&mut self) {
        let root = self.facts.root;
        for decl in named_children(root) {
            match decl.kind() {
                "function_declaration" | "method_declaration" => self.visit_function(decl),
                "var_declaration" | "const_declaration" => {
                    for spec in value_specs(decl) {
                        self.visit_value_spec(spec);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit(&mut self, node: Node<'t>) {
        match node.kind() {
            kind if is_function_like(kind) => self.visit_function(node),
            "block" => self.with_scope(node, |r| r.visit_children(node)),
            "type_switch_statement" => self.visit_type_switch(node),
            kind if is_control_flow(kind) => self.with_scope(node, |r| r.visit_children(node)),
            "short_var_declaration" => self.visit_short_var(node),
            "var_declaration" | "const_declaration" => {
                for spec in value_specs(node) {
                    self.visit_value_spec(spec);
                }
            }
            "assignment_statement" => self.visit_assignment(node),
            "range_clause" | "receive_statement" => self.visit_binding_clause(node),
            "identifier" => self.record_use(node),
            "selector_expression" => {
                if let Some(operand) = node.child_by_field_name("operand") {
                    self.visit(operand);
                }
            }
            "keyed_element" => {
                let parts = named_children(node);
                for (i, part) in parts.iter().enumerate() {
                    let inner = unwrap_element(*part);
                    // Struct field keys are names, not uses.
                    if i == 0
                        && parts.len() > 1
                        && matches!(inner.kind(), "identifier" | "field_identifier")
                    {
                        continue;
                    }
                    self.visit(*part);
                }
            }
            // Signatures and type expressions declare nothing and use nothing.
            "function_type" | "parameter_list" | "interface_type" | "struct_type"
            | "type_declaration" | "type_arguments" | "comment" => {}
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node<'t>) {
        for child in named_children(node) {
            self.visit(child);
        }
    }

    fn visit_function(&mut self, func: Node<'t>) {
        self.functions.push(func);
        self.with_scope(func, |r| {
            for field in ["receiver", "parameters", "result"] {
                let Some(list) = func.child_by_field_name(field) else {
                    continue;
                };
                if list.kind() != "parameter_list" {
                    continue;
                }
                for decl in named_children(list) {
                    if !matches!(
                        decl.kind(),
                        "parameter_declaration" | "variadic_parameter_declaration"
                    ) {
                        continue;
                    }
                    let ty = decl
                        .child_by_field_name("type")
                        .and_then(|t| type_name_of(t, r.facts.source, &r.facts.imports));
                    for name in field_children(decl, "name") {
                        if r.text(name) != "_" {
                            r.declare(name, BindingKind::Param, ty.clone());
                        }
                    }
                }
            }
            // The body's top level shares the parameters' scope.
            if let Some(body) = func.child_by_field_name("body") {
                r.visit_children(body);
            }
        });
        self.functions.pop();
    }

    fn visit_type_switch(&mut self, node: Node<'t>) {
        self.with_scope(node, |r| {
            if let Some(init) = node.child_by_field_name("initializer") {
                r.visit(init);
            }
            if let Some(value) = node.child_by_field_name("value") {
                r.visit(value);
            }
            if let Some(alias) = node.child_by_field_name("alias") {
                for ident in expression_list(alias) {
                    if ident.kind() == "identifier" && r.text(ident) != "_" {
                        r.declare(ident, BindingKind::Local, None);
                    }
                }
            }
            for clause in named_children(node) {
                if matches!(clause.kind(), "type_case" | "default_case") {
                    r.visit(clause);
                }
            }
        });
    }

    fn visit_short_var(&mut self, node: Node<'t>) {
        let left = node
            .child_by_field_name("left")
            .map(expression_list)
            .unwrap_or_default();
        let right = node
            .child_by_field_name("right")
            .map(expression_list)
            .unwrap_or_default();

        for value in &right {
            self.visit(*value);
        }

        let spread = right.len() != left.len();
        for (i, ident) in left.iter().enumerate() {
            if ident.kind() != "identifier" {
                self.visit(*ident);
                continue;
            }
            let name = self.text(*ident);
            if name == "_" {
                continue;
            }
            let existing = self
                .scopes
                .last()
                .and_then(|(_, frame)| frame.get(name).copied());
            let id = match existing {
                Some(id) => {
                    self.facts.uses.insert(ident.id(), id);
                    id
                }
                None => {
                    let ty = self.infer(&right, i, left.len());
                    self.declare(*ident, BindingKind::Local, ty)
                }
            };
            let value = if spread { None } else { right.get(i).copied() };
            self.push_assignment(id, node, value);
        }
    }

    fn visit_value_spec(&mut self, spec: Node<'t>) {
        let names = field_children(spec, "name");
        let explicit = spec
            .child_by_field_name("type")
            .and_then(|t| type_name_of(t, self.facts.source, &self.facts.imports));
        let values = spec
            .child_by_field_name("value")
            .map(expression_list)
            .unwrap_or_default();

        for value in &values {
            self.visit(*value);
        }

        let package_level = self.at_package_scope();
        for (i, ident) in names.iter().enumerate() {
            if self.text(*ident) == "_" {
                continue;
            }
            let ty = explicit
                .clone()
                .or_else(|| self.infer(&values, i, names.len()));
            let id = if package_level {
                let Some(id) = self.lookup(self.text(*ident)) else {
                    continue;
                };
                if self.facts.bindings[id].ty.is_none() {
                    self.facts.bindings[id].ty = ty;
                }
                id
            } else {
                self.declare(*ident, BindingKind::Local, ty)
            };
            if !values.is_empty() {
                let value = if values.len() == names.len() {
                    Some(values[i])
                } else {
                    None
                };
                self.push_assignment(id, spec, value);
            }
        }
    }

    fn visit_assignment(&mut self, node: Node<'t>) {
        let left = node
            .child_by_field_name("left")
            .map(expression_list)
            .unwrap_or_default();
        let right = node
            .child_by_field_name("right")
            .map(expression_list)
            .unwrap_or_default();

        for value in &right {
            self.visit(*value);
        }
        for target in &left {
            self.visit(*target);
        }

        let op = node.child_by_field_name("operator").map(|o| self.text(o));
        if op != Some("=") {
            return;
        }
        for (i, target) in left.iter().enumerate() {
            let target = strip_parens(*target);
            if target.kind() != "identifier" {
                continue;
            }
            let Some(id) = self.facts.binding_of(target) else {
                continue;
            };
            let value = if right.len() == left.len() {
                Some(right[i])
            } else {
                None
            };
            if self.facts.bindings[id].ty.is_none() {
                self.facts.bindings[id].ty = self.infer(&right, i, left.len());
            }
            self.push_assignment(id, node, value);
        }
    }

    /// `for k, v := range xs` and `case v, ok := <-ch`.
    fn visit_binding_clause(&mut self, node: Node<'t>) {
        if let Some(right) = node.child_by_field_name("right") {
            self.visit(right);
        }
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if has_token(node, ":=") {
            for ident in expression_list(left) {
                if ident.kind() == "identifier" && self.text(ident) != "_" {
                    self.declare(ident, BindingKind::Local, None);
                }
            }
        } else {
            self.visit(left);
        }
    }
}

/// `var`/`const` specs of a declaration, flattening grouped forms.
fn value_specs(decl: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    for child in named_children(decl) {
        match child.kind() {
            "var_spec" | "const_spec" => out.push(child),
            "var_spec_list" | "const_spec_list" => out.extend(value_specs(child)),
            _ => {}
        }
    }
    out
}

/// True if control flow (or a closure boundary) sits between `site` and the
/// scope node the assigned binding lives in.
pub(crate) fn is_conditional(site: Node<'_>, scope: Node<'_>) -> bool {
    let mut cur = site.parent();
    while let Some(node) = cur {
        if node.id() == scope.id() {
            return false;
        }
        if is_control_flow(node.kind()) || is_function_like(node.kind()) {
            return true;
        }
        cur = node.parent();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::syntax::walk;

    fn idents<'t>(root: Node<'t>, source: &str, name: &str) -> Vec<Node<'t>> {
        let mut out = Vec::new();
        walk(root, &mut |n| {
            if n.kind() == "identifier" && slice(source, n) == name {
                out.push(n);
            }
        });
        out
    }

    #[test]
    fn parameters_carry_their_declared_type() {
        let src = r#"package p

import "context"

func run(ctx context.Context, n int) {
	_ = ctx
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let uses = idents(tree.root_node(), src, "ctx");
        assert_eq!(uses.len(), 2);
        let decl = facts.binding_of(uses[0]).unwrap();
        assert_eq!(facts.binding_of(uses[1]), Some(decl));
        let binding = facts.binding(decl);
        assert_eq!(binding.kind, BindingKind::Param);
        assert_eq!(binding.ty, Some(TypeName::new("context", "Context")));
    }

    #[test]
    fn inner_parameter_shadows_outer_binding() {
        let src = r#"package p

import "context"

func run(ctx context.Context) {
	f := func(ctx context.Context) {
		_ = ctx
	}
	_ = f
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let uses = idents(tree.root_node(), src, "ctx");
        assert_eq!(uses.len(), 3);
        let outer = facts.binding_of(uses[0]).unwrap();
        let inner = facts.binding_of(uses[1]).unwrap();
        assert_ne!(outer, inner);
        assert_eq!(facts.binding_of(uses[2]), Some(inner));
    }

    #[test]
    fn short_var_redeclaration_reuses_existing_binding() {
        let src = r#"package p

import "context"

func run(parent context.Context) {
	ctx, cancel := context.WithCancel(parent)
	ctx, stop := context.WithCancel(ctx)
	_, _ = cancel, stop
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let uses = idents(tree.root_node(), src, "ctx");
        let id = facts.binding_of(uses[0]).unwrap();
        assert_eq!(facts.binding_of(uses[1]), Some(id));
        let binding = facts.binding(id);
        assert_eq!(binding.ty, Some(TypeName::new("context", "Context")));
        assert_eq!(binding.assignments.len(), 2);
        assert!(binding.assignments.iter().all(|a| a.value.is_none()));
    }

    #[test]
    fn assignments_inside_if_are_conditional() {
        let src = r#"package p

func run(flag bool) {
	f := func() {}
	if flag {
		f = func() {}
	}
	f = func() {}
	f()
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let f = idents(tree.root_node(), src, "f")[0];
        let binding = facts.binding(facts.binding_of(f).unwrap());
        let flags: Vec<bool> = binding.assignments.iter().map(|a| a.conditional).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn receiver_types_come_from_constructors_and_struct_fields() {
        let src = r#"package p

import (
	"context"
	"sync"

	"golang.org/x/sync/errgroup"
)

type server struct {
	wg sync.WaitGroup
}

func (s *server) run(ctx context.Context) {
	g, gctx := errgroup.WithContext(ctx)
	_, _ = g, gctx
	_ = s.wg
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let g = idents(tree.root_node(), src, "g")[0];
        assert_eq!(
            facts.binding(facts.binding_of(g).unwrap()).ty,
            Some(TypeName::new("golang.org/x/sync/errgroup", "Group"))
        );
        let gctx = idents(tree.root_node(), src, "gctx")[0];
        assert_eq!(
            facts.binding(facts.binding_of(gctx).unwrap()).ty,
            Some(TypeName::new("context", "Context"))
        );

        let mut selector = None;
        walk(tree.root_node(), &mut |n| {
            if n.kind() == "selector_expression" && slice(src, n) == "s.wg" {
                selector = Some(n);
            }
        });
        assert_eq!(
            facts.expr_type(selector.unwrap()),
            Some(TypeName::new("sync", "WaitGroup"))
        );
    }

    #[test]
    fn package_identifiers_are_not_bindings() {
        let src = r#"package p

import "context"

func run() {
	ctx := context.Background()
	_ = ctx
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let pkg = idents(tree.root_node(), src, "context")[0];
        assert_eq!(facts.package_of(pkg), Some("context"));
        let ctx = idents(tree.root_node(), src, "ctx")[0];
        assert_eq!(
            facts.binding(facts.binding_of(ctx).unwrap()).ty,
            Some(TypeName::new("context", "Context"))
        );
    }

    #[test]
    fn untyped_locals_may_hold_tokens_when_their_origin_is_unknown() {
        let src = r#"package p

import (
	"context"
	"net/http"
)

func run(ctx context.Context, r *http.Request, ch chan context.Context, items []string) {
	rctx := r.Context()
	alias := rctx
	n := 1
	label := "x"
	var names []string
	recv := <-ch
	for _, item := range items {
		_ = item
	}
	_, _, _, _, _, _ = alias, n, label, names, recv, ctx
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let tokens = TokenTypes::default();
        let holds = |name: &str| {
            let ident = idents(tree.root_node(), src, name)[0];
            facts.may_hold_token(facts.binding_of(ident).unwrap(), &tokens)
        };
        assert!(holds("ctx"));
        assert!(holds("rctx"));
        assert!(holds("alias"));
        assert!(holds("recv"));
        assert!(holds("item"));
        assert!(!holds("n"));
        assert!(!holds("label"));
        assert!(!holds("names"));
        assert!(!holds("r"));
    }

    #[test]
    fn token_fields_are_recognized_through_struct_declarations() {
        let src = r#"package p

import "context"

type server struct {
	ctx  context.Context
	name string
}

func (s *server) run() {
	_ = s.ctx
	_ = s.name
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let tokens = TokenTypes::default();
        let mut selectors = Vec::new();
        walk(tree.root_node(), &mut |n| {
            if n.kind() == "selector_expression" {
                selectors.push(n);
            }
        });
        assert_eq!(selectors.len(), 2);
        assert!(facts.is_token_field(selectors[0], &tokens));
        assert!(!facts.is_token_field(selectors[1], &tokens));
    }
}
