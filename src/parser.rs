use anyhow::{Context, Result};
use tree_sitter::{Language, Parser, Tree};

fn go_language() -> Language {
    tree_sitter_go::language()
}

/// Parse Go source into a tree-sitter tree.
///
/// A tree is returned even when the source has syntax errors; callers decide
/// how much of an erroneous tree they trust (see `FlowGraph::build`).
pub fn parse_source(source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(go_language())
        .context("failed to load Go grammar")?;

    parser
        .parse(source, None)
        .context("tree-sitter failed to parse source")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains_error_node(node: tree_sitter::Node) -> bool {
        if node.is_error() || node.is_missing() {
            return true;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if contains_error_node(child) {
                return true;
            }
        }
        false
    }

    #[test]
    fn parses_goroutine_with_context_without_error_nodes() {
        let src = r#"package p

import "context"

func run(ctx context.Context) {
	go func() {
		<-ctx.Done()
	}()
}
"#;

        let tree = parse_source(src).expect("parse should succeed");
        assert!(!contains_error_node(tree.root_node()));
        assert_eq!(tree.root_node().kind(), "source_file");
    }

    #[test]
    fn broken_source_still_yields_a_tree() {
        let src = "package p\n\nfunc run( {\n";
        let tree = parse_source(src).expect("parse should succeed");
        assert!(tree.root_node().has_error());
    }
}
