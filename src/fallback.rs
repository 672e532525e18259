//! Syntactic fallback: resolve a callback expression back to closure bodies
//! by walking assignments, composite literals, factory returns, task
//! constructors and collections, then test those bodies.
//!
//! Anything it cannot follow resolves to satisfied. The search is bounded in
//! depth and guarded by a visited set, so chains of any shape terminate.

use crate::derive::{DerivationOutcome, DerivationRequirement, call_matches};
use crate::flow::collect_calls;
use crate::registry::{Callback, SpawnSite, TaskConstructor};
use crate::resolve::{BindingKind, FileFacts, is_conditional};
use crate::scope::declares_token;
use crate::syntax::{
    call_arguments, contains, expression_list, is_function_like, named_children, strip_parens,
    unwrap_element, walk,
};
use crate::types::TokenTypes;
use std::collections::HashSet;
use tracing::trace;
use tree_sitter::Node;

const MAX_DEPTH: usize = 16;

/// How two answers combine when several closures could be the value.
pub trait Verdict: Copy {
    /// Answer for shapes that cannot be followed.
    fn assumed() -> Self;
    /// Every candidate must pass.
    fn both(self, other: Self) -> Self;
    /// One passing candidate is enough.
    fn either(self, other: Self) -> Self;
}

impl Verdict for bool {
    fn assumed() -> Self {
        true
    }

    fn both(self, other: Self) -> Self {
        self && other
    }

    fn either(self, other: Self) -> Self {
        self || other
    }
}

impl Verdict for DerivationOutcome {
    fn assumed() -> Self {
        DerivationOutcome::SatisfiedAtStart
    }

    fn both(self, other: Self) -> Self {
        self.min(other)
    }

    fn either(self, other: Self) -> Self {
        self.max(other)
    }
}

/// The question asked of each closure body the search reaches.
pub trait ClosureTest<'t> {
    type Verdict: Verdict;

    fn closure(&self, func: Node<'t>) -> Self::Verdict;

    /// Short-circuit for a factory call based on its own arguments.
    fn factory_arguments(&self, _call: Node<'t>) -> Option<Self::Verdict> {
        None
    }
}

/// Does the closure use a token?
pub struct CaptureTest<'a, 't> {
    facts: &'a FileFacts<'t>,
    tokens: &'a TokenTypes,
}

impl<'t> ClosureTest<'t> for CaptureTest<'_, 't> {
    type Verdict = bool;

    fn closure(&self, func: Node<'t>) -> bool {
        if declares_token(func, self.facts, self.tokens) {
            return true;
        }
        func.child_by_field_name("body")
            .is_none_or(|body| mentions_token(self.facts, self.tokens, body, false))
    }

    fn factory_arguments(&self, call: Node<'t>) -> Option<bool> {
        call_arguments(call)
            .into_iter()
            .any(|arg| mentions_token(self.facts, self.tokens, arg, true))
            .then_some(true)
    }
}

/// Does the closure call the derivation requirement, and where?
pub struct DeriveTest<'a, 't> {
    facts: &'a FileFacts<'t>,
    requirement: &'a DerivationRequirement,
}

impl<'t> ClosureTest<'t> for DeriveTest<'_, 't> {
    type Verdict = DerivationOutcome;

    fn closure(&self, func: Node<'t>) -> DerivationOutcome {
        match func.child_by_field_name("body") {
            Some(body) => self.requirement.evaluate(self.facts, &collect_calls(body)),
            None => DerivationOutcome::assumed(),
        }
    }
}

/// True if something under `node` may be a token: an identifier bound to a
/// token-typed binding, an untyped binding from outside `node` that may hold
/// one, or a token-typed field read.
/// Nested func literals are skipped unless `into_literals`.
pub fn mentions_token(
    facts: &FileFacts<'_>,
    tokens: &TokenTypes,
    node: Node<'_>,
    into_literals: bool,
) -> bool {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind() == "identifier" {
            let Some(id) = facts.binding_of(n) else {
                continue;
            };
            let binding = facts.binding(id);
            let token = match &binding.ty {
                Some(ty) => tokens.is_token(ty),
                None => !contains(node, binding.decl) && facts.may_hold_token(id, tokens),
            };
            if token {
                return true;
            }
            continue;
        }
        if facts.is_token_field(n, tokens) {
            return true;
        }
        if n.kind() == "func_literal" && !into_literals && n.id() != node.id() {
            continue;
        }
        stack.extend(named_children(n));
    }
    false
}

/// Entry point of the fallback tier.
pub struct Fallback<'a, 't> {
    facts: &'a FileFacts<'t>,
    tokens: &'a TokenTypes,
}

impl<'a, 't> Fallback<'a, 't> {
    pub fn new(facts: &'a FileFacts<'t>, tokens: &'a TokenTypes) -> Self {
        Self { facts, tokens }
    }

    /// Whether the closure behind `expr`, read at `site`, uses a token.
    pub fn captures(&self, expr: Node<'t>, site: Node<'t>) -> bool {
        let test = CaptureTest {
            facts: self.facts,
            tokens: self.tokens,
        };
        Search::new(self.facts, &test).closure_value(expr, site, 0)
    }

    /// Capture check for a matched callback, following task constructors and
    /// spread collections.
    pub fn callback_captures(
        &self,
        spawn: &SpawnSite<'_, 't>,
        callback: &Callback<'t>,
        site: Node<'t>,
    ) -> bool {
        let test = CaptureTest {
            facts: self.facts,
            tokens: self.tokens,
        };
        Search::new(self.facts, &test).callback(spawn, callback, site)
    }

    pub fn derivation(
        &self,
        expr: Node<'t>,
        site: Node<'t>,
        requirement: &DerivationRequirement,
    ) -> DerivationOutcome {
        let test = DeriveTest {
            facts: self.facts,
            requirement,
        };
        Search::new(self.facts, &test).closure_value(expr, site, 0)
    }

    pub fn callback_derivation(
        &self,
        spawn: &SpawnSite<'_, 't>,
        callback: &Callback<'t>,
        site: Node<'t>,
        requirement: &DerivationRequirement,
    ) -> DerivationOutcome {
        let test = DeriveTest {
            facts: self.facts,
            requirement,
        };
        Search::new(self.facts, &test).callback(spawn, callback, site)
    }
}

/// A write that may supply a value: the expression to follow and where it happens.
#[derive(Debug, Clone, Copy)]
struct Write<'t> {
    site: Node<'t>,
    value: Option<Node<'t>>,
    conditional: bool,
    /// Adds to a collection instead of replacing it (`xs = append(xs, ...)`).
    accumulates: bool,
}

/// Writes visible at `site`: the last replacing unconditional write before it
/// and everything after that one.
fn reaching<'t>(mut writes: Vec<Write<'t>>, site: Node<'_>) -> Vec<Write<'t>> {
    writes.retain(|w| w.site.start_byte() < site.start_byte() && !contains(w.site, site));
    writes.sort_by_key(|w| w.site.start_byte());
    match writes
        .iter()
        .rposition(|w| !w.conditional && !w.accumulates)
    {
        Some(i) => writes.split_off(i),
        None => writes,
    }
}

#[derive(Debug, Clone, Copy)]
enum Element<'c> {
    Closure,
    Task(&'c TaskConstructor),
}

enum MemberKey<'t> {
    Field(&'t str),
    Index(Node<'t>),
}

struct Search<'a, 't, T> {
    facts: &'a FileFacts<'t>,
    test: &'a T,
    visited: HashSet<usize>,
}

impl<'a, 't, T: ClosureTest<'t>> Search<'a, 't, T> {
    fn new(facts: &'a FileFacts<'t>, test: &'a T) -> Self {
        Self {
            facts,
            test,
            visited: HashSet::new(),
        }
    }

    fn callback(
        &mut self,
        spawn: &SpawnSite<'_, 't>,
        callback: &Callback<'t>,
        site: Node<'t>,
    ) -> T::Verdict {
        let element = match &spawn.api.constructor {
            Some(ctor) => Element::Task(ctor),
            None => Element::Closure,
        };
        if callback.spread {
            self.collection(callback.expr, site, element, 0)
        } else {
            self.element(callback.expr, site, element, 0)
        }
    }

    fn element(&mut self, expr: Node<'t>, site: Node<'t>, element: Element<'_>, depth: usize) -> T::Verdict {
        match element {
            Element::Closure => self.closure_value(expr, site, depth),
            Element::Task(ctor) => self.constructed(expr, ctor, site, depth),
        }
    }

    fn closure_value(&mut self, expr: Node<'t>, site: Node<'t>, depth: usize) -> T::Verdict {
        if depth > MAX_DEPTH {
            trace!("fallback depth limit reached");
            return T::Verdict::assumed();
        }
        let expr = strip_parens(expr);
        match expr.kind() {
            "func_literal" => self.test.closure(expr),
            "identifier" => self.identifier(expr, site, depth),
            "call_expression" => self.factory_call(expr, depth),
            "selector_expression" | "index_expression" => self.member(expr, site, depth),
            kind => {
                trace!(kind, "untraceable closure shape");
                T::Verdict::assumed()
            }
        }
    }

    /// Follow writes of the binding behind `ident` with `follow`.
    fn through_binding(
        &mut self,
        ident: Node<'t>,
        site: Node<'t>,
        depth: usize,
        extra: impl FnOnce(&Self, usize) -> Vec<Write<'t>>,
        mut follow: impl FnMut(&mut Self, Node<'t>, Node<'t>, usize) -> T::Verdict,
    ) -> T::Verdict {
        let facts = self.facts;
        let Some(id) = facts.binding_of(ident) else {
            return T::Verdict::assumed();
        };
        let binding = facts.binding(id);
        if !matches!(binding.kind, BindingKind::Local | BindingKind::PackageVar) {
            return T::Verdict::assumed();
        }
        let key = binding.decl.id();
        if !self.visited.insert(key) {
            return T::Verdict::assumed();
        }

        let mut writes: Vec<Write<'t>> = binding
            .assignments
            .iter()
            .map(|a| Write {
                site: a.site,
                value: a.value,
                conditional: a.conditional,
                accumulates: false,
            })
            .collect();
        writes.extend(extra(&*self, id));

        let mut verdict: Option<T::Verdict> = None;
        for write in reaching(writes, site) {
            let v = match write.value {
                Some(value) => follow(self, value, write.site, depth + 1),
                None => T::Verdict::assumed(),
            };
            verdict = Some(verdict.map_or(v, |acc| acc.both(v)));
        }

        self.visited.remove(&key);
        verdict.unwrap_or_else(T::Verdict::assumed)
    }

    fn identifier(&mut self, ident: Node<'t>, site: Node<'t>, depth: usize) -> T::Verdict {
        if let Some(id) = self.facts.binding_of(ident) {
            let binding = self.facts.binding(id);
            if binding.kind == BindingKind::Func {
                return binding
                    .func_decl
                    .map_or_else(T::Verdict::assumed, |decl| self.test.closure(decl));
            }
        }
        self.through_binding(ident, site, depth, |_, _| Vec::new(), |s, value, at, d| {
            s.closure_value(value, at, d)
        })
    }

    /// `makeWorker(...)` used as the closure: look at what the factory returns.
    fn factory_call(&mut self, call: Node<'t>, depth: usize) -> T::Verdict {
        if let Some(v) = self.test.factory_arguments(call) {
            return v;
        }
        let Some(callee) = call.child_by_field_name("function") else {
            return T::Verdict::assumed();
        };
        if callee.kind() == "parenthesized_expression"
            && strip_parens(callee).kind() == "func_literal"
        {
            // Known gap: a parenthesized immediately invoked closure is not inspected.
            trace!("parenthesized immediately invoked closure left unresolved");
            return T::Verdict::assumed();
        }

        let mut verdict: Option<T::Verdict> = None;
        for factory in self.factories(callee, depth) {
            if !self.visited.insert(factory.id()) {
                continue;
            }
            for returned in returned_values(factory) {
                let v = self.closure_value(returned, returned, depth + 1);
                verdict = Some(verdict.map_or(v, |acc| acc.either(v)));
            }
            self.visited.remove(&factory.id());
        }
        verdict.unwrap_or_else(T::Verdict::assumed)
    }

    /// Function bodies a callee expression can stand for.
    fn factories(&self, callee: Node<'t>, depth: usize) -> Vec<Node<'t>> {
        if depth > MAX_DEPTH {
            return Vec::new();
        }
        let callee = strip_parens(callee);
        match callee.kind() {
            "func_literal" => vec![callee],
            "identifier" => {
                let Some(id) = self.facts.binding_of(callee) else {
                    return Vec::new();
                };
                let binding = self.facts.binding(id);
                match (binding.kind, binding.assignments.as_slice()) {
                    (BindingKind::Func, _) => binding.func_decl.into_iter().collect(),
                    (BindingKind::Local, [only]) => only
                        .value
                        .map(strip_parens)
                        .filter(|v| v.kind() == "func_literal")
                        .into_iter()
                        .collect(),
                    _ => Vec::new(),
                }
            }
            // `outer()()`: whatever `outer` returns is the factory.
            "call_expression" => {
                let Some(inner) = callee.child_by_field_name("function") else {
                    return Vec::new();
                };
                self.factories(inner, depth + 1)
                    .into_iter()
                    .flat_map(returned_values)
                    .flat_map(|r| self.factories(r, depth + 1))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// `s.field`, `xs[i]`, `m["k"]`: find the element in the composite literal
    /// the base was built from, or a later direct write to the same member.
    fn member(&mut self, expr: Node<'t>, site: Node<'t>, depth: usize) -> T::Verdict {
        let Some(base) = expr.child_by_field_name("operand") else {
            return T::Verdict::assumed();
        };
        let key = match expr.kind() {
            "selector_expression" => match expr.child_by_field_name("field") {
                Some(field) => MemberKey::Field(self.facts.text(field)),
                None => return T::Verdict::assumed(),
            },
            _ => match expr.child_by_field_name("index") {
                Some(index) => MemberKey::Index(index),
                None => return T::Verdict::assumed(),
            },
        };

        let base = strip_parens(base);
        match base.kind() {
            "composite_literal" => match self.element_of(base, &key) {
                Some(value) => self.closure_value(value, base, depth + 1),
                None => T::Verdict::assumed(),
            },
            "identifier" => {
                // Swap each whole-value write for the member it holds.
                let member_writes = |s: &Self, id| s.member_writes(id, &key);
                self.through_binding(base, site, depth, member_writes, |s, value, at, d| {
                    let value = strip_address(value);
                    if value.kind() == "composite_literal" {
                        return match s.element_of(value, &key) {
                            Some(element) => s.closure_value(element, at, d),
                            None => T::Verdict::assumed(),
                        };
                    }
                    if is_member_write(at) {
                        return s.closure_value(value, at, d);
                    }
                    T::Verdict::assumed()
                })
            }
            _ => T::Verdict::assumed(),
        }
    }

    /// `base.field = value` / `base[k] = value` statements for a binding.
    fn member_writes(&self, id: usize, key: &MemberKey<'t>) -> Vec<Write<'t>> {
        let binding = self.facts.binding(id);
        let mut out = Vec::new();
        walk(self.facts.root, &mut |node| {
            if node.kind() != "assignment_statement" {
                return;
            }
            let (Some(left), Some(right)) = (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) else {
                return;
            };
            let left = expression_list(left);
            let right = expression_list(right);
            if left.len() != right.len() {
                return;
            }
            for (target, value) in left.iter().zip(&right) {
                let target = strip_parens(*target);
                let Some(operand) = target.child_by_field_name("operand") else {
                    continue;
                };
                let operand = strip_parens(operand);
                if operand.kind() != "identifier" || self.facts.binding_of(operand) != Some(id) {
                    continue;
                }
                if self.key_matches(target, key) {
                    out.push(Write {
                        site: node,
                        value: Some(*value),
                        conditional: is_conditional(node, binding.scope),
                        accumulates: false,
                    });
                }
            }
        });
        out
    }

    fn key_matches(&self, target: Node<'t>, key: &MemberKey<'t>) -> bool {
        match (target.kind(), key) {
            ("selector_expression", MemberKey::Field(name)) => target
                .child_by_field_name("field")
                .is_some_and(|f| self.facts.text(f) == *name),
            ("index_expression", MemberKey::Index(index)) => target
                .child_by_field_name("index")
                .is_some_and(|i| self.facts.text(i) == self.facts.text(*index)),
            _ => false,
        }
    }

    fn element_of(&self, literal: Node<'t>, key: &MemberKey<'t>) -> Option<Node<'t>> {
        let body = literal.child_by_field_name("body")?;
        let elements = named_children(body);
        let wanted = match key {
            MemberKey::Field(name) => *name,
            MemberKey::Index(index) => self.facts.text(*index),
        };

        let keyed = elements.iter().find_map(|el| {
            if el.kind() != "keyed_element" {
                return None;
            }
            let parts = named_children(*el);
            let (k, v) = (parts.first()?, parts.get(1)?);
            (self.facts.text(unwrap_element(*k)) == wanted).then(|| unwrap_element(*v))
        });
        if keyed.is_some() {
            return keyed;
        }

        match key {
            MemberKey::Index(index) if index.kind() == "int_literal" => {
                let position: usize = self.facts.text(*index).parse().ok()?;
                elements
                    .iter()
                    .filter(|el| el.kind() != "keyed_element")
                    .nth(position)
                    .map(|el| unwrap_element(*el))
            }
            _ => None,
        }
    }

    /// A task value: follow it back to the constructor call and check the
    /// callback argument of that call.
    fn constructed(
        &mut self,
        expr: Node<'t>,
        ctor: &TaskConstructor,
        site: Node<'t>,
        depth: usize,
    ) -> T::Verdict {
        if depth > MAX_DEPTH {
            return T::Verdict::assumed();
        }
        let expr = strip_parens(expr);
        match expr.kind() {
            "call_expression" if call_matches(self.facts, expr, &ctor.target) => {
                match call_arguments(expr).get(ctor.callback) {
                    Some(arg) => self.closure_value(*arg, expr, depth + 1),
                    None => T::Verdict::assumed(),
                }
            }
            "identifier" => self.through_binding(expr, site, depth, |_, _| Vec::new(), |s, value, at, d| {
                s.constructed(value, ctor, at, d)
            }),
            _ => T::Verdict::assumed(),
        }
    }

    /// A spread collection: every element must pass.
    fn collection(
        &mut self,
        expr: Node<'t>,
        site: Node<'t>,
        element: Element<'_>,
        depth: usize,
    ) -> T::Verdict {
        if depth > MAX_DEPTH {
            return T::Verdict::assumed();
        }
        let expr = strip_parens(expr);
        match expr.kind() {
            "composite_literal" => {
                let Some(body) = expr.child_by_field_name("body") else {
                    return T::Verdict::assumed();
                };
                let mut verdict = T::Verdict::assumed();
                for el in named_children(body) {
                    let value = if el.kind() == "keyed_element" {
                        match named_children(el).get(1) {
                            Some(v) => unwrap_element(*v),
                            None => continue,
                        }
                    } else {
                        unwrap_element(el)
                    };
                    verdict = verdict.both(self.element(value, expr, element, depth + 1));
                }
                verdict
            }
            "call_expression" if self.is_append(expr) => {
                let mut verdict = T::Verdict::assumed();
                for arg in call_arguments(expr).into_iter().skip(1) {
                    let v = if arg.kind() == "variadic_argument" {
                        match named_children(arg).first() {
                            Some(inner) => self.collection(*inner, expr, element, depth + 1),
                            None => T::Verdict::assumed(),
                        }
                    } else {
                        self.element(arg, expr, element, depth + 1)
                    };
                    verdict = verdict.both(v);
                }
                verdict
            }
            "identifier" => {
                let facts = self.facts;
                let Some(id) = facts.binding_of(expr) else {
                    return T::Verdict::assumed();
                };
                let binding = facts.binding(id);
                if !matches!(binding.kind, BindingKind::Local | BindingKind::PackageVar) {
                    return T::Verdict::assumed();
                }
                let key = binding.decl.id();
                if !self.visited.insert(key) {
                    return T::Verdict::assumed();
                }
                let writes: Vec<Write<'t>> = binding
                    .assignments
                    .iter()
                    .map(|a| Write {
                        site: a.site,
                        value: a.value,
                        conditional: a.conditional,
                        accumulates: a.value.is_some_and(|v| self.is_append(strip_parens(v))),
                    })
                    .collect();
                let mut verdict = T::Verdict::assumed();
                for write in reaching(writes, site) {
                    let v = match write.value {
                        Some(value) => self.collection(value, write.site, element, depth + 1),
                        None => T::Verdict::assumed(),
                    };
                    verdict = verdict.both(v);
                }
                self.visited.remove(&key);
                verdict
            }
            _ => T::Verdict::assumed(),
        }
    }

    fn is_append(&self, call: Node<'t>) -> bool {
        call.kind() == "call_expression"
            && call
                .child_by_field_name("function")
                .map(strip_parens)
                .is_some_and(|f| {
                    f.kind() == "identifier"
                        && self.facts.text(f) == "append"
                        && self.facts.binding_of(f).is_none()
                })
    }
}

fn strip_address(node: Node<'_>) -> Node<'_> {
    let node = strip_parens(node);
    if node.kind() == "unary_expression"
        && let Some(operand) = node.child_by_field_name("operand")
    {
        return strip_parens(operand);
    }
    node
}

fn is_member_write(site: Node<'_>) -> bool {
    site.kind() == "assignment_statement"
        && site.child_by_field_name("left").is_some_and(|left| {
            expression_list(left).iter().any(|t| {
                matches!(
                    strip_parens(*t).kind(),
                    "selector_expression" | "index_expression"
                )
            })
        })
}

/// First returned expression of every `return` in a function body, not
/// counting returns of nested functions.
fn returned_values(func: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let Some(body) = func.child_by_field_name("body") else {
        return out;
    };
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        if is_function_like(node.kind()) {
            continue;
        }
        if node.kind() == "return_statement" {
            if let Some(first) = named_children(node)
                .first()
                .and_then(|list| expression_list(*list).first().copied())
            {
                out.push(first);
            }
            continue;
        }
        stack.extend(named_children(node));
    }
    out.sort_by_key(|n| n.start_byte());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::registry::Registry;
    use crate::syntax::{named_children, slice};
    use std::collections::BTreeSet;

    /// Run the capture fallback on the callee of every `go` statement in `run`.
    fn go_verdicts(src: &str) -> Vec<bool> {
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let tokens = TokenTypes::default();
        let fallback = Fallback::new(&facts, &tokens);
        let mut out = Vec::new();
        walk(tree.root_node(), &mut |n| {
            if n.kind() == "go_statement" {
                let call = named_children(n)[0];
                let callee = call.child_by_field_name("function").unwrap();
                out.push(fallback.captures(callee, n));
            }
        });
        out
    }

    /// Run the capture fallback on every callback of every matched spawn call.
    fn spawn_verdicts(src: &str) -> Vec<bool> {
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let tokens = TokenTypes::default();
        let fallback = Fallback::new(&facts, &tokens);
        let registry = Registry::builtin();
        let view = registry.for_file(&facts, &BTreeSet::new());
        let mut out = Vec::new();
        walk(tree.root_node(), &mut |n| {
            if n.kind() != "call_expression" {
                return;
            }
            if let Some(site) = view.match_call(&facts, n) {
                for callback in &site.callbacks {
                    out.push(fallback.callback_captures(&site, callback, n));
                }
            }
        });
        out
    }

    #[test]
    fn literal_closures_are_scanned_without_nested_literals() {
        let src = r#"package p

import "context"

func run(ctx context.Context) {
	go func() { <-ctx.Done() }()
	go func() {
		f := func() { _ = ctx }
		_ = f
	}()
}
"#;
        assert_eq!(go_verdicts(src), vec![true, false]);
    }

    #[test]
    fn conditional_reassignment_requires_every_candidate() {
        let src = r#"package p

import "context"

func run(ctx context.Context, flag bool) {
	f := func() { _ = ctx }
	if flag {
		f = func() {}
	}
	go f()

	g := func() {}
	g = func() { _ = ctx }
	go g()
}
"#;
        assert_eq!(go_verdicts(src), vec![false, true]);
    }

    #[test]
    fn struct_fields_and_map_entries_resolve_to_their_literal() {
        let src = r#"package p

import "context"

type jobs struct {
	run func()
}

func run(ctx context.Context) {
	j := jobs{run: func() {}}
	go j.run()

	m := map[string]func(){"ok": func() { _ = ctx }, "bad": func() {}}
	go m["ok"]()
	go m["bad"]()

	k := &jobs{}
	k.run = func() { _ = ctx }
	go k.run()
}
"#;
        assert_eq!(go_verdicts(src), vec![false, true, false, true]);
    }

    #[test]
    fn factories_pass_on_token_arguments_or_any_satisfying_return() {
        let src = r#"package p

import "context"

func makeWorker(ctx context.Context) func() {
	return func() { _ = ctx }
}

func makeIdle() func() {
	return func() {}
}

func run(ctx context.Context) {
	go makeWorker(ctx)()
	go makeIdle()()
	go (func() func() { return func() {} })()()
}
"#;
        assert_eq!(go_verdicts(src), vec![true, false, true]);
    }

    #[test]
    fn unknown_origins_are_assumed_satisfied() {
        let src = r#"package p

import "context"

func run(ctx context.Context, fn func(), ch chan func(), v interface{}) {
	go fn()
	go (<-ch)()
	go v.(func())()
}
"#;
        assert_eq!(go_verdicts(src), vec![true, true, true]);
    }

    #[test]
    fn shadowed_token_is_checked_against_the_inner_binding() {
        let src = r#"package p

import "context"

func run(ctx context.Context) {
	go func() {
		ctx := 42
		_ = ctx
	}()
}
"#;
        assert_eq!(go_verdicts(src), vec![false]);
    }

    #[test]
    fn derivation_candidates_combine_all_of_for_reassignment() {
        let src = r#"package p

func run(flag bool) {
	f := func() { X() }
	if flag {
		f = func() { defer X() }
	}
	go f()
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let tokens = TokenTypes::default();
        let fallback = Fallback::new(&facts, &tokens);
        let requirement = DerivationRequirement::parse("X").unwrap();
        let mut outcome = None;
        walk(tree.root_node(), &mut |n| {
            if n.kind() == "go_statement" {
                let call = named_children(n)[0];
                let callee = call.child_by_field_name("function").unwrap();
                assert_eq!(slice(src, callee), "f");
                outcome = Some(fallback.derivation(callee, n, &requirement));
            }
        });
        assert_eq!(outcome, Some(DerivationOutcome::SatisfiedOnlyInDefer));
    }

    #[test]
    fn cyclic_bindings_and_recursive_factories_terminate() {
        let src = r#"package p

import "context"

func loop() func() {
	return loop()()
}

func run(ctx context.Context) {
	a := func() {}
	b := a
	a = b
	go a()
	go loop()()
}
"#;
        assert_eq!(go_verdicts(src), vec![true, true]);
    }

    #[test]
    fn self_appending_collections_terminate() {
        let src = r#"package p

import (
	"context"

	"github.com/newmo-oss/gotask"
)

func run(ctx context.Context) error {
	tasks := []gotask.Task{gotask.NewTask(func(ctx context.Context) error { return nil })}
	tasks = append(tasks, tasks...)
	return gotask.DoAll(ctx, tasks...)
}

func lost(ctx context.Context) error {
	tasks := []gotask.Task{gotask.NewTask(func(context.Context) error { return nil })}
	tasks = append(tasks, tasks...)
	return gotask.DoAll(ctx, tasks...)
}
"#;
        assert_eq!(spawn_verdicts(src), vec![true, false]);
    }
}
