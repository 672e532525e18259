//! Package-qualified names as written in configuration.
//!
//! Accepted forms: `Func`, `pkg/path.Func`, `pkg/path.Type.Method`. Package
//! paths compare tolerant of a trailing major-version element, so
//! `github.com/x/y/v2` and `github.com/x/y` name the same package.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub package: Option<String>,
    pub receiver: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn function(package: &str, name: &str) -> Self {
        Self {
            package: Some(package.to_string()),
            receiver: None,
            name: name.to_string(),
        }
    }

    pub fn method(package: &str, receiver: &str, name: &str) -> Self {
        Self {
            package: Some(package.to_string()),
            receiver: Some(receiver.to_string()),
            name: name.to_string(),
        }
    }

    /// Parse a qualified name. Returns `None` for malformed text.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let (prefix, last) = match text.rfind('/') {
            Some(idx) => (&text[..=idx], &text[idx + 1..]),
            None => ("", text),
        };

        let mut parts: Vec<&str> = last.split('.').collect();
        // gopkg.in style `yaml.v3` belongs to the package element.
        if parts.len() >= 3 && is_major_version(parts[1]) {
            let joined_len = parts[0].len() + 1 + parts[1].len();
            let merged = &last[..joined_len];
            let rest = parts.split_off(2);
            parts = std::iter::once(merged).chain(rest).collect();
        }

        let parsed = match parts.as_slice() {
            [name] if prefix.is_empty() => Self {
                package: None,
                receiver: None,
                name: (*name).to_string(),
            },
            [pkg, name] => Self {
                package: Some(format!("{prefix}{pkg}")),
                receiver: None,
                name: (*name).to_string(),
            },
            [pkg, receiver, name] => Self {
                package: Some(format!("{prefix}{pkg}")),
                receiver: Some(trim_receiver(receiver).to_string()),
                name: (*name).to_string(),
            },
            _ => return None,
        };

        let idents_ok = is_ident(&parsed.name)
            && parsed.receiver.as_deref().is_none_or(is_ident)
            && parsed
                .package
                .as_deref()
                .is_none_or(|p| !p.is_empty() && !p.ends_with('/'));
        idents_ok.then_some(parsed)
    }

    /// Short label used in messages, e.g. `errgroup.Group.Go`.
    pub fn short_label(&self) -> String {
        let mut out = String::new();
        if let Some(pkg) = &self.package {
            out.push_str(default_package_name(pkg));
            out.push('.');
        }
        if let Some(recv) = &self.receiver {
            out.push_str(recv);
            out.push('.');
        }
        out.push_str(&self.name);
        out
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pkg) = &self.package {
            write!(f, "{pkg}.")?;
        }
        if let Some(recv) = &self.receiver {
            write!(f, "{recv}.")?;
        }
        f.write_str(&self.name)
    }
}

fn trim_receiver(receiver: &str) -> &str {
    receiver
        .trim_start_matches('(')
        .trim_start_matches('*')
        .trim_end_matches(')')
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn is_major_version(s: &str) -> bool {
    s.strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Drop a trailing `/vN` major-version element from an import path.
pub fn strip_major_version(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((head, tail)) if is_major_version(tail) => head,
        _ => path,
    }
}

/// True if two import paths name the same package, ignoring major versions.
pub fn same_package(a: &str, b: &str) -> bool {
    strip_major_version(a) == strip_major_version(b)
}

/// The name a package is referred to by when imported without an alias.
pub fn default_package_name(path: &str) -> &str {
    let path = strip_major_version(path);
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.split_once('.') {
        Some((head, tail)) if is_major_version(tail) => head,
        _ => last,
    }
}
