//! Ignore directives and their bookkeeping.
//!
//! ```go
//! //ctxflow:ignore
//! //ignore goroutine,errgroup free text
//! //ctxflow:spawner
//! ```
//!
//! A directive on line L covers findings on lines L and L+1. Each directive
//! remembers which checkers it actually silenced so dead or mistaken ones can
//! be reported once the walk is done.

use crate::checker::{Checker, CheckerSet};
use crate::diagnostics::{Diagnostic, Span};
use crate::syntax::{line_of, slice, walk};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::LazyLock;
use tree_sitter::Node;

static IGNORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^//(?:ctxflow:)?ignore(?:\s+([a-z0-9_,-]+))?(?:\s.*)?$")
        .expect("ignore directive regex is valid")
});

const SPAWNER_MARK: &str = "//ctxflow:spawner";

#[derive(Debug, Clone)]
pub struct IgnoreEntry {
    pub line: usize,
    pub span: Span,
    /// Names listed after the directive, empty names dropped. `None` when no
    /// list was given, which silences every checker.
    pub checkers: Option<Vec<String>>,
    /// The list contained an empty name (`a,,b` or a trailing comma).
    pub malformed: bool,
    used: BTreeSet<Checker>,
}

impl IgnoreEntry {
    fn covers(&self, checker: Checker) -> bool {
        match &self.checkers {
            None => !self.malformed,
            Some(names) => names.iter().any(|n| n == checker.name()),
        }
    }

    pub fn is_used(&self) -> bool {
        !self.used.is_empty()
    }

    pub fn used_for(&self, checker: Checker) -> bool {
        self.used.contains(&checker)
    }
}

/// Why a directive is reported after the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveProblem {
    Unused,
    UnusedFor(Checker),
    UnknownChecker(String),
    NotEnabled(Checker),
    Malformed,
}

impl fmt::Display for DirectiveProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveProblem::Unused => f.write_str("unused ignore directive"),
            DirectiveProblem::UnusedFor(c) => {
                write!(f, "unused ignore directive for checker \"{c}\"")
            }
            DirectiveProblem::UnknownChecker(name) => {
                write!(f, "unknown checker \"{name}\" in ignore directive")
            }
            DirectiveProblem::NotEnabled(c) => {
                write!(f, "checker \"{c}\" in ignore directive is not enabled")
            }
            DirectiveProblem::Malformed => {
                f.write_str("malformed ignore directive: empty checker name")
            }
        }
    }
}

/// Per-file directive ledger.
#[derive(Debug, Default)]
pub struct IgnoreLedger {
    entries: Vec<IgnoreEntry>,
    by_line: HashMap<usize, usize>,
    spawner_lines: BTreeSet<usize>,
}

impl IgnoreLedger {
    pub fn build(root: Node<'_>, source: &str) -> Self {
        let mut ledger = Self::default();
        walk(root, &mut |node| {
            if node.kind() != "comment" {
                return;
            }
            let text = slice(source, node).trim_end();
            let line = line_of(node);
            if text == SPAWNER_MARK
                || text
                    .strip_prefix(SPAWNER_MARK)
                    .is_some_and(|rest| rest.starts_with(char::is_whitespace))
            {
                ledger.spawner_lines.insert(line);
                return;
            }
            let Some(caps) = IGNORE_RE.captures(text) else {
                return;
            };
            let (checkers, malformed) = match caps.get(1) {
                Some(list) => {
                    let raw: Vec<&str> = list.as_str().split(',').collect();
                    let malformed = raw.iter().any(|n| n.is_empty());
                    let names = raw
                        .into_iter()
                        .filter(|n| !n.is_empty())
                        .map(str::to_string)
                        .collect();
                    (Some(names), malformed)
                }
                None => (None, false),
            };
            if ledger.by_line.contains_key(&line) {
                return;
            }
            ledger.by_line.insert(line, ledger.entries.len());
            ledger.entries.push(IgnoreEntry {
                line,
                span: Span::from_range(node.range()),
                checkers,
                malformed,
                used: BTreeSet::new(),
            });
        });
        ledger
    }

    /// Lines carrying a `//ctxflow:spawner` mark.
    pub fn spawner_lines(&self) -> &BTreeSet<usize> {
        &self.spawner_lines
    }

    pub fn entries(&self) -> &[IgnoreEntry] {
        &self.entries
    }

    /// True if a directive silences `checker` on `line`; marks that directive used.
    ///
    /// A directive on the same line wins over one on the line above.
    pub fn should_ignore(&mut self, line: usize, checker: Checker) -> bool {
        for candidate in [Some(line), line.checked_sub(1)].into_iter().flatten() {
            let Some(&idx) = self.by_line.get(&candidate) else {
                continue;
            };
            let entry = &mut self.entries[idx];
            if entry.covers(checker) {
                entry.used.insert(checker);
                return true;
            }
        }
        false
    }

    /// Problems with each directive, in source order.
    pub fn problems(&self, enabled: &CheckerSet) -> Vec<(&IgnoreEntry, DirectiveProblem)> {
        let mut out = Vec::new();
        for entry in &self.entries {
            if entry.malformed {
                out.push((entry, DirectiveProblem::Malformed));
            }
            match &entry.checkers {
                None if !entry.malformed && !entry.is_used() => {
                    out.push((entry, DirectiveProblem::Unused));
                }
                None => {}
                Some(names) => {
                    for name in names {
                        let problem = match Checker::from_name(name) {
                            None => DirectiveProblem::UnknownChecker(name.clone()),
                            Some(c) if !enabled.is_enabled(c) => DirectiveProblem::NotEnabled(c),
                            Some(c) if !entry.used_for(c) => DirectiveProblem::UnusedFor(c),
                            Some(_) => continue,
                        };
                        out.push((entry, problem));
                    }
                }
            }
        }
        out
    }

    /// Directive problems as diagnostics under `unused-ignore`.
    pub fn unused_directives(&self, enabled: &CheckerSet) -> Vec<Diagnostic> {
        if !enabled.is_enabled(Checker::UnusedIgnore) {
            return Vec::new();
        }
        self.problems(enabled)
            .into_iter()
            .map(|(entry, problem)| {
                Diagnostic::new(Checker::UnusedIgnore, entry.span, problem.to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn ledger_for(src: &str) -> IgnoreLedger {
        let tree = parse_source(src).unwrap();
        IgnoreLedger::build(tree.root_node(), src)
    }

    #[test]
    fn parses_unscoped_and_scoped_directives() {
        let src = r#"package p

//ignore
var a = 1

//ctxflow:ignore goroutine,errgroup flaky on purpose
var b = 2

// ignore: not a directive
var c = 3

//ignored
var d = 4
"#;
        let ledger = ledger_for(src);
        let entries = ledger.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].line, 3);
        assert_eq!(entries[0].checkers, None);
        assert_eq!(
            entries[1].checkers,
            Some(vec!["goroutine".to_string(), "errgroup".to_string()])
        );
        assert!(!entries[1].malformed);
    }

    #[test]
    fn same_line_directive_wins_and_only_it_is_marked() {
        let src = "package p\n\n//ignore\nvar a = 1 //ignore\n";
        let mut ledger = ledger_for(src);
        assert!(ledger.should_ignore(4, Checker::Goroutine));
        assert!(!ledger.entries()[0].is_used());
        assert!(ledger.entries()[1].used_for(Checker::Goroutine));
    }

    #[test]
    fn ignoring_twice_is_the_same_as_once() {
        let src = "package p\n\n//ignore goroutine\nvar a = 1\n";
        let mut ledger = ledger_for(src);
        assert!(ledger.should_ignore(4, Checker::Goroutine));
        assert!(ledger.should_ignore(4, Checker::Goroutine));
        assert!(!ledger.should_ignore(4, Checker::Errgroup));
        assert!(ledger.unused_directives(&CheckerSet::all()).is_empty());
    }

    #[test]
    fn directives_do_not_reach_two_lines_down() {
        let src = "package p\n\n//ignore\n\nvar a = 1\n";
        let mut ledger = ledger_for(src);
        assert!(!ledger.should_ignore(5, Checker::Goroutine));
        let problems: Vec<String> = ledger
            .unused_directives(&CheckerSet::all())
            .into_iter()
            .map(|d| d.message)
            .collect();
        assert_eq!(problems, vec!["unused ignore directive"]);
    }

    #[test]
    fn reports_unknown_disabled_unused_and_malformed_names() {
        let src = "package p\n\n//ignore bogus,errgroup,goroutine\nvar a = 1\n\n//ignore goroutine,\nvar b = 2\n";
        let mut ledger = ledger_for(src);
        assert!(ledger.should_ignore(4, Checker::Goroutine));
        let enabled = CheckerSet::all().without(Checker::Errgroup);
        let messages: Vec<String> = ledger
            .unused_directives(&enabled)
            .into_iter()
            .map(|d| d.message)
            .collect();
        assert_eq!(
            messages,
            vec![
                "unknown checker \"bogus\" in ignore directive",
                "checker \"errgroup\" in ignore directive is not enabled",
                "malformed ignore directive: empty checker name",
                "unused ignore directive for checker \"goroutine\"",
            ]
        );
    }

    #[test]
    fn disabled_unused_ignore_reports_nothing() {
        let src = "package p\n\n//ignore\nvar a = 1\n";
        let ledger = ledger_for(src);
        let enabled = CheckerSet::all().without(Checker::UnusedIgnore);
        assert!(ledger.unused_directives(&enabled).is_empty());
    }

    #[test]
    fn records_spawner_marks() {
        let src = "package p\n\n//ctxflow:spawner\nfunc run(fn func()) {}\n";
        let ledger = ledger_for(src);
        assert!(ledger.spawner_lines().contains(&3));
        assert!(ledger.entries().is_empty());
    }
}
