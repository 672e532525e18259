//! Precise tier: answers from the flow graph, or `Indeterminate` when the
//! closure is not a unit the graph knows.

use crate::derive::{DerivationOutcome, DerivationRequirement};
use crate::flow::{FlowGraph, FuncUnit};
use crate::resolve::{BindingKind, FileFacts};
use crate::scope::declares_token;
use crate::syntax::{strip_parens, walk};
use crate::types::TokenTypes;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureResult {
    Satisfied,
    Unsatisfied,
    Indeterminate,
}

pub struct Tracer<'a, 't> {
    facts: &'a FileFacts<'t>,
    graph: Option<&'a FlowGraph<'t>>,
    tokens: &'a TokenTypes,
}

impl<'a, 't> Tracer<'a, 't> {
    pub fn new(
        facts: &'a FileFacts<'t>,
        graph: Option<&'a FlowGraph<'t>>,
        tokens: &'a TokenTypes,
    ) -> Self {
        Self {
            facts,
            graph,
            tokens,
        }
    }

    /// Find the unit behind a closure expression.
    ///
    /// Only func literals, same-file function names, and locals assigned
    /// exactly once from a func literal are located.
    pub fn locate(&self, expr: Node<'_>) -> Option<&'a FuncUnit<'t>> {
        let graph = self.graph?;
        let expr = strip_parens(expr);
        match expr.kind() {
            "func_literal" => graph.unit_for(expr),
            "identifier" => {
                let binding = self.facts.binding(self.facts.binding_of(expr)?);
                match binding.kind {
                    BindingKind::Func => graph.unit_for(binding.func_decl?),
                    BindingKind::Local => match binding.assignments.as_slice() {
                        [only] => {
                            let value = strip_parens(only.value?);
                            (value.kind() == "func_literal")
                                .then(|| graph.unit_for(value))
                                .flatten()
                        }
                        _ => None,
                    },
                    BindingKind::PackageVar | BindingKind::Param => None,
                }
            }
            _ => None,
        }
    }

    pub fn trace(&self, expr: Node<'_>) -> CaptureResult {
        let Some(unit) = self.locate(expr) else {
            return CaptureResult::Indeterminate;
        };
        if declares_token(unit.node, self.facts, self.tokens) {
            return CaptureResult::Satisfied;
        }
        let captured = unit
            .captures
            .iter()
            .any(|id| self.facts.may_hold_token(*id, self.tokens));
        if captured || self.reads_token_field(unit.node) {
            CaptureResult::Satisfied
        } else {
            CaptureResult::Unsatisfied
        }
    }

    /// `s.ctx` anywhere in the unit, nested literals included.
    fn reads_token_field(&self, unit: Node<'_>) -> bool {
        let mut found = false;
        walk(unit, &mut |n| {
            found = found || self.facts.is_token_field(n, self.tokens);
        });
        found
    }

    /// Derivation outcome of the located unit, `None` when it cannot be located.
    pub fn trace_derivation(
        &self,
        expr: Node<'_>,
        requirement: &DerivationRequirement,
    ) -> Option<DerivationOutcome> {
        let unit = self.locate(expr)?;
        Some(requirement.evaluate(self.facts, &unit.calls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::literals_under;
    use crate::parser::parse_source;

    fn go_callee<'t>(root: Node<'t>, nth: usize) -> Node<'t> {
        let mut calls = Vec::new();
        walk(root, &mut |n| {
            if n.kind() == "go_statement" {
                let call = crate::syntax::named_children(n)[0];
                calls.push(call.child_by_field_name("function").unwrap());
            }
        });
        calls[nth]
    }

    fn with_tracer(src: &str, check: impl FnOnce(Node<'_>, &Tracer<'_, '_>)) {
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let graph = FlowGraph::build(&facts);
        let tokens = TokenTypes::default();
        let tracer = Tracer::new(&facts, graph.as_ref(), &tokens);
        check(tree.root_node(), &tracer);
    }

    #[test]
    fn literal_capturing_the_token_is_satisfied() {
        let src = r#"package p

import "context"

func run(ctx context.Context) {
	go func() {
		<-ctx.Done()
	}()
	go func() {
		work()
	}()
}
"#;
        with_tracer(src, |root, tracer| {
            assert_eq!(tracer.trace(go_callee(root, 0)), CaptureResult::Satisfied);
            assert_eq!(tracer.trace(go_callee(root, 1)), CaptureResult::Unsatisfied);
        });
    }

    #[test]
    fn nested_capture_counts_for_the_outer_literal() {
        let src = r#"package p

import "context"

func run(ctx context.Context) {
	go func() {
		defer func() {
			_ = ctx
		}()
	}()
}
"#;
        with_tracer(src, |root, tracer| {
            assert_eq!(tracer.trace(go_callee(root, 0)), CaptureResult::Satisfied);
        });
    }

    #[test]
    fn locals_and_declarations_are_located() {
        let src = r#"package p

import "context"

func worker(ctx context.Context) {}

func idle() {}

func run(ctx context.Context) {
	f := func() { _ = ctx }
	go f()
	go idle()
	g := func() {}
	g = func() {}
	go g()
}
"#;
        with_tracer(src, |root, tracer| {
            assert_eq!(tracer.trace(go_callee(root, 0)), CaptureResult::Satisfied);
            assert_eq!(tracer.trace(go_callee(root, 1)), CaptureResult::Unsatisfied);
            assert_eq!(tracer.trace(go_callee(root, 2)), CaptureResult::Indeterminate);
        });
    }

    #[test]
    fn untyped_captures_and_token_fields_are_satisfied() {
        let src = r#"package p

import (
	"context"
	"net/http"

	"github.com/acme/trace"
)

type server struct {
	ctx context.Context
}

func (s *server) run(ctx context.Context, r *http.Request) {
	rctx := r.Context()
	go func() {
		<-rctx.Done()
	}()
	go func() {
		<-s.ctx.Done()
	}()
	n := 3
	go func() {
		println(n)
	}()
	sctx := trace.Detach(ctx)
	go func() {
		_ = sctx
	}()
}
"#;
        with_tracer(src, |root, tracer| {
            assert_eq!(tracer.trace(go_callee(root, 0)), CaptureResult::Satisfied);
            assert_eq!(tracer.trace(go_callee(root, 1)), CaptureResult::Satisfied);
            assert_eq!(tracer.trace(go_callee(root, 2)), CaptureResult::Unsatisfied);
            assert_eq!(tracer.trace(go_callee(root, 3)), CaptureResult::Satisfied);
        });
    }

    #[test]
    fn without_a_graph_everything_is_indeterminate() {
        let src = r#"package p

import "context"

func run(ctx context.Context) {
	go func() {}()
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let tokens = TokenTypes::default();
        let tracer = Tracer::new(&facts, None, &tokens);
        let literal = literals_under(tree.root_node())[0];
        assert_eq!(tracer.trace(literal), CaptureResult::Indeterminate);
    }
}
