//! Checker categories and the set of categories enabled for a run.
//!
//! Each category owns its name, its description, and the wording of the
//! diagnostics it produces. The driver dispatches on the variant rather than
//! on trait objects.

use crate::error::{CtxflowError, CtxflowResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What a checker looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckerKind {
    /// Token capture in spawned closures.
    Propagation,
    /// Derivation calls at the start of spawned closures.
    Derivation,
    /// Bookkeeping over the ignore directives themselves.
    Directive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Checker {
    /// `go` statements.
    Goroutine,
    /// `errgroup.Group.Go` / `TryGo`.
    Errgroup,
    /// `sync.WaitGroup.Go`.
    Waitgroup,
    /// Third-party pools, configured spawners, and `//ctxflow:spawner` functions.
    Spawner,
    /// gotask-style APIs taking task values built by a constructor.
    Gotask,
    /// Configured derivation requirement at every spawn site.
    Derive,
    /// Ignore directives that silenced nothing or name bad checkers.
    UnusedIgnore,
}

impl Checker {
    pub const ALL: [Checker; 7] = [
        Checker::Goroutine,
        Checker::Errgroup,
        Checker::Waitgroup,
        Checker::Spawner,
        Checker::Gotask,
        Checker::Derive,
        Checker::UnusedIgnore,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Checker::Goroutine => "goroutine",
            Checker::Errgroup => "errgroup",
            Checker::Waitgroup => "waitgroup",
            Checker::Spawner => "spawner",
            Checker::Gotask => "gotask",
            Checker::Derive => "derive",
            Checker::UnusedIgnore => "unused-ignore",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Checker::Goroutine => "go statements must use the context of the enclosing function",
            Checker::Errgroup => "errgroup.Group.Go closures must use the enclosing context",
            Checker::Waitgroup => "sync.WaitGroup.Go closures must use the enclosing context",
            Checker::Spawner => {
                "closures handed to goroutine-spawning APIs must use the enclosing context"
            }
            Checker::Gotask => "gotask task functions must use the enclosing context",
            Checker::Derive => {
                "spawned closures must call the configured derivation function at their start"
            }
            Checker::UnusedIgnore => "ignore directives must suppress something",
        }
    }

    pub fn kind(&self) -> CheckerKind {
        match self {
            Checker::Goroutine
            | Checker::Errgroup
            | Checker::Waitgroup
            | Checker::Spawner
            | Checker::Gotask => CheckerKind::Propagation,
            Checker::Derive => CheckerKind::Derivation,
            Checker::UnusedIgnore => CheckerKind::Directive,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Message for a closure that does not use any token in scope.
    ///
    /// `api` is the display label of the spawning API (ignored for `go`
    /// statements); `ordinal` is the 1-based position of a variadic callback
    /// when it is known.
    pub fn propagation_message(
        &self,
        api: &str,
        tokens: &[String],
        ordinal: Option<usize>,
    ) -> String {
        let names = quote_names(tokens);
        match (self, ordinal) {
            (Checker::Goroutine, _) => format!("goroutine does not propagate context {names}"),
            (Checker::Errgroup | Checker::Waitgroup, _) => {
                format!("{api}() closure should use context {names}")
            }
            (_, Some(n)) => format!(
                "{api}() {} argument should use context {names}",
                ordinal_word(n)
            ),
            (_, None) => format!("{api}() func argument should use context {names}"),
        }
    }

    /// Message for a closure that never calls the derivation requirement.
    pub fn derivation_missing_message(site: &str, requirement: &str) -> String {
        format!("{site} should call {requirement} to derive new context")
    }

    /// Message for a closure that calls the derivation requirement only in `defer`.
    pub fn derivation_deferred_message(site: &str, requirement: &str) -> String {
        format!("{site} calls {requirement} in defer, but it should be called at goroutine start")
    }
}

impl fmt::Display for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn quote_names(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// English ordinal for a 1-based position ("1st", "2nd", "11th", ...).
pub fn ordinal_word(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// The checker categories enabled for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerSet {
    enabled: BTreeSet<Checker>,
}

impl Default for CheckerSet {
    fn default() -> Self {
        Self::all()
    }
}

impl CheckerSet {
    pub fn all() -> Self {
        Self {
            enabled: Checker::ALL.into_iter().collect(),
        }
    }

    pub fn none() -> Self {
        Self {
            enabled: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, checker: Checker) -> Self {
        self.enabled.insert(checker);
        self
    }

    #[must_use]
    pub fn without(mut self, checker: Checker) -> Self {
        self.enabled.remove(&checker);
        self
    }

    /// Build the enabled set from `--only`, `--skip`, and config `disabled` lists.
    ///
    /// # Errors
    ///
    /// Returns an error if any name is not a known checker.
    pub fn filtered(only: &[String], skip: &[String], disabled: &[String]) -> CtxflowResult<Self> {
        let resolve = |names: &[String]| -> CtxflowResult<Vec<Checker>> {
            names
                .iter()
                .map(|n| {
                    Checker::from_name(n.trim())
                        .ok_or_else(|| CtxflowError::config(format!("unknown checker: {n}")))
                })
                .collect()
        };

        let only = resolve(only)?;
        let skip = resolve(skip)?;
        let disabled = resolve(disabled)?;

        let mut set = if only.is_empty() {
            Self::all()
        } else {
            let mut set = Self::none();
            for c in only {
                set = set.with(c);
            }
            set
        };
        for c in skip.into_iter().chain(disabled) {
            set = set.without(c);
        }
        Ok(set)
    }

    pub fn is_enabled(&self, checker: Checker) -> bool {
        self.enabled.contains(&checker)
    }

    pub fn iter(&self) -> impl Iterator<Item = Checker> + '_ {
        self.enabled.iter().copied()
    }
}
