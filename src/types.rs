//! Type names as far as a single file can resolve them.

use crate::qualname::{QualifiedName, default_package_name, same_package};
use crate::syntax::{field_children, named_children, slice, unquote};
use std::collections::HashMap;
use tree_sitter::Node;

/// A named type, pointer indirection and generic arguments stripped.
///
/// `package` is the import path, or `""` for types declared in the file's own
/// package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    pub package: String,
    pub name: String,
}

impl TypeName {
    pub fn new(package: &str, name: &str) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
        }
    }

    pub fn local(name: &str) -> Self {
        Self::new("", name)
    }

    pub fn is_local(&self) -> bool {
        self.package.is_empty()
    }

    /// Match against a configured `pkg.Type` name (package version tolerant).
    pub fn matches(&self, package: Option<&str>, name: &str) -> bool {
        if self.name != name {
            return false;
        }
        match package {
            Some(pkg) => same_package(&self.package, pkg),
            None => self.is_local(),
        }
    }
}

/// Import aliases of one file: local name → import path.
#[derive(Debug, Default, Clone)]
pub struct Imports {
    aliases: HashMap<String, String>,
}

impl Imports {
    pub fn collect(root: Node<'_>, source: &str) -> Self {
        let mut imports = Self::default();
        for decl in named_children(root) {
            if decl.kind() != "import_declaration" {
                continue;
            }
            for spec in import_specs(decl) {
                let Some(path) = spec.child_by_field_name("path") else {
                    continue;
                };
                let path = unquote(slice(source, path)).to_string();
                let alias = match spec.child_by_field_name("name") {
                    Some(name) => match name.kind() {
                        "package_identifier" | "identifier" => slice(source, name).to_string(),
                        // `_` and `.` imports introduce no usable name.
                        _ => continue,
                    },
                    None => default_package_name(&path).to_string(),
                };
                imports.aliases.insert(alias, path);
            }
        }
        imports
    }

    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }
}

fn import_specs(decl: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    for child in named_children(decl) {
        match child.kind() {
            "import_spec" => out.push(child),
            "import_spec_list" => out.extend(
                named_children(child)
                    .into_iter()
                    .filter(|c| c.kind() == "import_spec"),
            ),
            _ => {}
        }
    }
    out
}

/// Resolve a type expression node to a `TypeName`.
///
/// Returns `None` for unnamed types (func, map, slice, interface literals...).
pub fn type_name_of(node: Node<'_>, source: &str, imports: &Imports) -> Option<TypeName> {
    match node.kind() {
        "type_identifier" => Some(TypeName::local(slice(source, node))),
        "qualified_type" => {
            let pkg = node.child_by_field_name("package")?;
            let name = node.child_by_field_name("name")?;
            let path = imports.resolve(slice(source, pkg))?;
            Some(TypeName::new(path, slice(source, name)))
        }
        "pointer_type" | "parenthesized_type" => {
            let inner = named_children(node).into_iter().next()?;
            type_name_of(inner, source, imports)
        }
        "generic_type" => {
            let origin = node.child_by_field_name("type")?;
            type_name_of(origin, source, imports)
        }
        _ => None,
    }
}

/// Types of the parameters (or results) declared by a `parameter_list`, one
/// entry per declared name (or per unnamed parameter).
pub fn parameter_types(list: Node<'_>, source: &str, imports: &Imports) -> Vec<Option<TypeName>> {
    let mut out = Vec::new();
    for decl in named_children(list) {
        if !matches!(
            decl.kind(),
            "parameter_declaration" | "variadic_parameter_declaration"
        ) {
            continue;
        }
        let ty = decl
            .child_by_field_name("type")
            .and_then(|t| type_name_of(t, source, imports));
        let names = field_children(decl, "name").len().max(1);
        out.extend(std::iter::repeat_n(ty, names));
    }
    out
}

/// Recognizes the capability token type and configured carrier types.
#[derive(Debug, Clone)]
pub struct TokenTypes {
    carriers: Vec<QualifiedName>,
}

pub const TOKEN_PACKAGE: &str = "context";
pub const TOKEN_TYPE: &str = "Context";

impl Default for TokenTypes {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TokenTypes {
    pub fn new(carriers: Vec<QualifiedName>) -> Self {
        Self { carriers }
    }

    pub fn carriers(&self) -> &[QualifiedName] {
        &self.carriers
    }

    pub fn is_token(&self, ty: &TypeName) -> bool {
        if ty.matches(Some(TOKEN_PACKAGE), TOKEN_TYPE) {
            return true;
        }
        self.carriers
            .iter()
            .any(|c| ty.matches(c.package.as_deref(), &c.name))
    }
}

/// Result types of well-known constructors, by `(package, function)`.
pub fn known_results(package: &str, func: &str) -> Option<Vec<Option<TypeName>>> {
    let ctx = || Some(TypeName::new(TOKEN_PACKAGE, TOKEN_TYPE));
    let results = match (package, func) {
        ("context", "Background" | "TODO" | "WithValue" | "WithoutCancel") => vec![ctx()],
        (
            "context",
            "WithCancel" | "WithTimeout" | "WithDeadline" | "WithCancelCause" | "WithTimeoutCause"
            | "WithDeadlineCause",
        ) => vec![ctx(), None],
        ("golang.org/x/sync/errgroup", "WithContext") => vec![
            Some(TypeName::new("golang.org/x/sync/errgroup", "Group")),
            ctx(),
        ],
        ("github.com/sourcegraph/conc/pool", "New") => {
            vec![Some(TypeName::new("github.com/sourcegraph/conc/pool", "Pool"))]
        }
        ("github.com/sourcegraph/conc", "NewWaitGroup") => {
            vec![Some(TypeName::new("github.com/sourcegraph/conc", "WaitGroup"))]
        }
        _ => return None,
    };
    Some(results)
}
