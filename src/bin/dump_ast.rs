#!/usr/bin/env rust
//! AST dumping tool for checking how tree-sitter-go shapes a Go file.

use std::env;
use std::fs;

fn print_tree(node: tree_sitter::Node, source: &str, indent: usize, field: Option<&str>) {
    let indent_str = "  ".repeat(indent);

    let text = source.get(node.byte_range()).unwrap_or("");
    let text_display = if text.chars().count() > 50 {
        format!("{}...", text.chars().take(50).collect::<String>())
    } else {
        text.to_string()
    };
    let text_display = text_display.replace('\n', "\\n");

    match field {
        Some(field) => println!(
            "{}{}: {} [{}] \"{}\"",
            indent_str,
            field,
            node.kind(),
            node.start_position().row + 1,
            text_display
        ),
        None => println!(
            "{}{} [{}] \"{}\"",
            indent_str,
            node.kind(),
            node.start_position().row + 1,
            text_display
        ),
    }

    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            if child.is_named() {
                print_tree(child, source, indent + 1, cursor.field_name());
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: dump_ast <file.go>");
        std::process::exit(1);
    }

    let file_path = &args[1];
    let source = fs::read_to_string(file_path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", file_path, e);
        std::process::exit(1);
    });

    let tree = ctxflow::parser::parse_source(&source).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {e:#}", file_path);
        std::process::exit(1);
    });

    println!("AST for {}:", file_path);
    println!("================");
    print_tree(tree.root_node(), &source, 0, None);
}
