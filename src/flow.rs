//! Closure/capture graph of one file.
//!
//! One unit per function declaration, method declaration and func literal.
//! Each unit knows the bindings it captures from outside (transitively through
//! the units nested in it) and the calls its body makes on the way from entry
//! to the first `return`.

use crate::resolve::{BindingId, FileFacts};
use crate::syntax::{contains, is_function_like, named_children, strip_parens};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use tree_sitter::Node;

pub type UnitId = usize;

/// A call reachable from a unit's entry.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'t> {
    pub node: Node<'t>,
    /// Registered for deferred execution rather than run in order.
    pub deferred: bool,
}

#[derive(Debug)]
pub struct FuncUnit<'t> {
    pub node: Node<'t>,
    pub parent: Option<UnitId>,
    pub children: Vec<UnitId>,
    pub captures: BTreeSet<BindingId>,
    pub calls: Vec<CallSite<'t>>,
}

#[derive(Debug, Default)]
pub struct FlowGraph<'t> {
    units: Vec<FuncUnit<'t>>,
    by_node: HashMap<usize, UnitId>,
}

impl<'t> FlowGraph<'t> {
    /// Build the graph, or `None` when the file has syntax errors.
    pub fn build(facts: &FileFacts<'t>) -> Option<Self> {
        if facts.root.has_error() {
            debug!("syntax errors present; skipping flow graph");
            return None;
        }

        let mut graph = FlowGraph::default();
        graph.collect_units(facts.root, None);

        for id in 0..graph.units.len() {
            let node = graph.units[id].node;
            graph.units[id].captures = direct_captures(facts, node);
            graph.units[id].calls = node
                .child_by_field_name("body")
                .map(collect_calls)
                .unwrap_or_default();
        }

        // Children always follow their parent in preorder, so a reverse sweep
        // folds captures all the way up.
        for id in (0..graph.units.len()).rev() {
            let Some(parent) = graph.units[id].parent else {
                continue;
            };
            let parent_node = graph.units[parent].node;
            let inherited: Vec<BindingId> = graph.units[id]
                .captures
                .iter()
                .copied()
                .filter(|b| !contains(parent_node, facts.binding(*b).decl))
                .collect();
            graph.units[parent].captures.extend(inherited);
        }

        debug!(units = graph.units.len(), "flow graph built");
        Some(graph)
    }

    fn collect_units(&mut self, node: Node<'t>, parent: Option<UnitId>) {
        let mut parent = parent;
        if is_function_like(node.kind()) {
            let id = self.units.len();
            self.units.push(FuncUnit {
                node,
                parent,
                children: Vec::new(),
                captures: BTreeSet::new(),
                calls: Vec::new(),
            });
            self.by_node.insert(node.id(), id);
            if let Some(p) = parent {
                self.units[p].children.push(id);
            }
            parent = Some(id);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.collect_units(child, parent);
        }
    }

    #[cfg(test)]
    pub fn unit(&self, id: UnitId) -> &FuncUnit<'t> {
        &self.units[id]
    }

    pub fn unit_for(&self, node: Node<'_>) -> Option<&FuncUnit<'t>> {
        self.by_node.get(&node.id()).map(|id| &self.units[*id])
    }
}

/// Non-package-level bindings used directly in `unit` (not in nested units)
/// and declared outside it.
fn direct_captures(facts: &FileFacts<'_>, unit: Node<'_>) -> BTreeSet<BindingId> {
    let mut out = BTreeSet::new();
    let mut stack: Vec<Node<'_>> = named_children(unit);
    while let Some(node) = stack.pop() {
        if is_function_like(node.kind()) {
            continue;
        }
        if node.kind() == "identifier"
            && let Some(id) = facts.binding_of(node)
        {
            let binding = facts.binding(id);
            if !binding.is_package_level() && !contains(unit, binding.decl) {
                out.insert(id);
            }
        }
        stack.extend(named_children(node));
    }
    out
}

/// Calls made by a function body in execution order up to the first `return`
/// of each statement list.
///
/// Immediately invoked func literals are inlined. Other nested literals and
/// the callee of a `go` statement run elsewhere and are left out.
pub fn collect_calls(body: Node<'_>) -> Vec<CallSite<'_>> {
    let mut out = Vec::new();
    collect_in(body, false, &mut out);
    out
}

fn collect_in<'t>(node: Node<'t>, deferred: bool, out: &mut Vec<CallSite<'t>>) {
    match node.kind() {
        "block" | "statement_list" => {
            for stmt in named_children(node) {
                collect_in(stmt, deferred, out);
                if stmt.kind() == "return_statement" {
                    break;
                }
            }
        }
        "func_literal" => {}
        "go_statement" => {
            // Arguments are evaluated by the spawning goroutine; the callee is not.
            if let Some(call) = named_children(node).first()
                && call.kind() == "call_expression"
                && let Some(args) = call.child_by_field_name("arguments")
            {
                collect_in(args, deferred, out);
            }
        }
        "defer_statement" => {
            if let Some(expr) = named_children(node).first() {
                collect_in(*expr, true, out);
            }
        }
        "call_expression" => {
            if let Some(args) = node.child_by_field_name("arguments") {
                collect_in(args, deferred, out);
            }
            let Some(callee) = node.child_by_field_name("function") else {
                return;
            };
            let inner = strip_parens(callee);
            if inner.kind() == "func_literal" {
                if let Some(body) = inner.child_by_field_name("body") {
                    collect_in(body, deferred, out);
                }
            } else {
                collect_in(callee, deferred, out);
                out.push(CallSite { node, deferred });
            }
        }
        _ => {
            for child in named_children(node) {
                collect_in(child, deferred, out);
            }
        }
    }
}

/// Func literals (and the root itself) found under `node`, outermost first.
#[cfg(test)]
pub fn literals_under(node: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    crate::syntax::walk(node, &mut |n| {
        if n.kind() == "func_literal" {
            out.push(n);
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::syntax::slice;

    fn graph_for(src: &str, check: impl FnOnce(&FileFacts<'_>, &FlowGraph<'_>)) {
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let graph = FlowGraph::build(&facts).expect("clean source builds a graph");
        check(&facts, &graph);
    }

    fn capture_names(facts: &FileFacts<'_>, unit: &FuncUnit<'_>) -> Vec<String> {
        unit.captures
            .iter()
            .map(|id| facts.binding(*id).name.clone())
            .collect()
    }

    #[test]
    fn captures_propagate_from_nested_literals() {
        let src = r#"package p

import "context"

func run(ctx context.Context) {
	go func() {
		n := 1
		f := func() {
			<-ctx.Done()
		}
		_ = n
		f()
	}()
}
"#;
        graph_for(src, |facts, graph| {
            let outer_literal = literals_under(facts.root)[0];
            let unit = graph.unit_for(outer_literal).unwrap();
            assert_eq!(capture_names(facts, unit), vec!["ctx"]);
            assert_eq!(unit.children.len(), 1);
            let run = graph.unit(unit.parent.unwrap());
            assert!(run.captures.is_empty());
        });
    }

    #[test]
    fn calls_after_return_and_in_go_callees_are_excluded() {
        let src = r#"package p

func run() {
	defer cleanup()
	go spawned(arg())
	func() {
		inlined()
	}()
	later := func() { notCalled() }
	_ = later
	return
	unreachable()
}
"#;
        graph_for(src, |facts, graph| {
            let run = graph
                .unit_for(facts.func_decl_named("run").unwrap())
                .unwrap();
            let calls: Vec<(String, bool)> = run
                .calls
                .iter()
                .map(|c| {
                    let callee = c.node.child_by_field_name("function").unwrap();
                    (slice(facts.source, callee).to_string(), c.deferred)
                })
                .collect();
            assert_eq!(
                calls,
                vec![
                    ("cleanup".to_string(), true),
                    ("arg".to_string(), false),
                    ("inlined".to_string(), false),
                ]
            );
        });
    }

    #[test]
    fn deferred_literal_bodies_are_deferred() {
        let src = r#"package p

func run() {
	defer func() {
		derive()
	}()
	work()
}
"#;
        graph_for(src, |facts, graph| {
            let run = graph
                .unit_for(facts.func_decl_named("run").unwrap())
                .unwrap();
            let flags: Vec<bool> = run.calls.iter().map(|c| c.deferred).collect();
            assert_eq!(flags, vec![true, false]);
        });
    }

    #[test]
    fn syntax_errors_disable_the_graph() {
        let src = "package p\n\nfunc run( {\n";
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        assert!(FlowGraph::build(&facts).is_none());
    }
}
