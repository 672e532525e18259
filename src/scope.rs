//! Token scopes: which function-like nodes declare a token parameter, and the
//! nearest such scope for any node.

use crate::resolve::FileFacts;
use crate::syntax::{field_children, is_function_like, named_children, walk};
use crate::types::{TokenTypes, type_name_of};
use std::collections::HashMap;
use tree_sitter::Node;

#[derive(Debug, Clone)]
pub struct Scope<'t> {
    pub owner: Node<'t>,
    pub token_names: Vec<String>,
}

/// Scopes of one file keyed by owner node id.
#[derive(Debug, Default)]
pub struct ScopeMap<'t> {
    scopes: HashMap<usize, Scope<'t>>,
}

impl<'t> ScopeMap<'t> {
    pub fn build(facts: &FileFacts<'t>, tokens: &TokenTypes) -> Self {
        let mut scopes = HashMap::new();
        walk(facts.root, &mut |node| {
            if !is_function_like(node.kind()) {
                return;
            }
            let token_names = token_parameters(node, facts, tokens)
                .into_iter()
                .flatten()
                .collect::<Vec<_>>();
            if !token_names.is_empty() {
                scopes.insert(
                    node.id(),
                    Scope {
                        owner: node,
                        token_names,
                    },
                );
            }
        });
        Self { scopes }
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Nearest scope at or above `node`. An inner owner fully replaces outer ones.
    pub fn scope_for(&self, node: Node<'_>) -> Option<&Scope<'t>> {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if let Some(scope) = self.scopes.get(&n.id()) {
                return Some(scope);
            }
            cur = n.parent();
        }
        None
    }
}

/// Token-typed parameters of a function-like node, one entry per parameter.
/// Unnamed (or `_`) parameters appear as `None`.
pub fn token_parameters(
    func: Node<'_>,
    facts: &FileFacts<'_>,
    tokens: &TokenTypes,
) -> Vec<Option<String>> {
    let Some(list) = func.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for decl in named_children(list) {
        if !matches!(
            decl.kind(),
            "parameter_declaration" | "variadic_parameter_declaration"
        ) {
            continue;
        }
        let is_token = decl
            .child_by_field_name("type")
            .and_then(|t| type_name_of(t, facts.source, &facts.imports))
            .is_some_and(|ty| tokens.is_token(&ty));
        if !is_token {
            continue;
        }
        let names = field_children(decl, "name");
        if names.is_empty() {
            out.push(None);
        }
        for name in names {
            let text = facts.text(name);
            out.push((text != "_").then(|| text.to_string()));
        }
    }
    out
}

/// True if the function-like node declares a named token-typed parameter.
/// A blank `_` token cannot be forwarded and does not count.
pub fn declares_token(func: Node<'_>, facts: &FileFacts<'_>, tokens: &TokenTypes) -> bool {
    token_parameters(func, facts, tokens)
        .iter()
        .any(Option::is_some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn go_statements(root: Node<'_>) -> Vec<Node<'_>> {
        let mut out = Vec::new();
        walk(root, &mut |n| {
            if n.kind() == "go_statement" {
                out.push(n);
            }
        });
        out
    }

    #[test]
    fn nested_literal_inherits_outer_scope() {
        let src = r#"package p

import "context"

func run(ctx context.Context) {
	f := func() {
		go work()
	}
	f()
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let map = ScopeMap::build(&facts, &TokenTypes::default());
        assert_eq!(map.len(), 1);
        let site = go_statements(tree.root_node())[0];
        let scope = map.scope_for(site).unwrap();
        assert_eq!(scope.token_names, vec!["ctx".to_string()]);
        assert_eq!(scope.owner.kind(), "function_declaration");
    }

    #[test]
    fn inner_token_parameter_replaces_outer_scope() {
        let src = r#"package p

import "context"

func run(ctx context.Context) {
	handle(func(c context.Context, n int) {
		go work()
	})
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let map = ScopeMap::build(&facts, &TokenTypes::default());
        let site = go_statements(tree.root_node())[0];
        let scope = map.scope_for(site).unwrap();
        assert_eq!(scope.owner.kind(), "func_literal");
        assert_eq!(scope.token_names, vec!["c".to_string()]);
    }

    #[test]
    fn functions_without_tokens_have_no_scope() {
        let src = r#"package p

func run() {
	go work()
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let map = ScopeMap::build(&facts, &TokenTypes::default());
        assert!(map.is_empty());
        assert!(map.scope_for(go_statements(tree.root_node())[0]).is_none());
    }

    #[test]
    fn carrier_parameters_open_a_scope() {
        let src = r#"package p

import "github.com/labstack/echo/v4"

func handler(c echo.Context) error {
	go work()
	return nil
}
"#;
        let tree = parse_source(src).unwrap();
        let facts = FileFacts::resolve(tree.root_node(), src);
        let tokens = TokenTypes::new(vec![
            crate::qualname::QualifiedName::parse("github.com/labstack/echo/v4.Context").unwrap(),
        ]);
        let map = ScopeMap::build(&facts, &tokens);
        let scope = map.scope_for(go_statements(tree.root_node())[0]).unwrap();
        assert_eq!(scope.token_names, vec!["c".to_string()]);
    }
}
