//! Known task-spawning APIs and call matching.
//!
//! The built-in table is static data. Extra entries come from configuration,
//! and each file adds its own `//ctxflow:spawner` functions through a
//! [`RegistryView`].

use crate::checker::Checker;
use crate::error::{CtxflowError, CtxflowResult};
use crate::qualname::{QualifiedName, same_package};
use crate::resolve::{BindingKind, FileFacts};
use crate::syntax::{call_arguments, field_children, line_of, named_children, strip_parens};
use std::collections::BTreeSet;
use tree_sitter::Node;

const ERRGROUP: &str = "golang.org/x/sync/errgroup";
const CONC: &str = "github.com/sourcegraph/conc";
const CONC_POOL: &str = "github.com/sourcegraph/conc/pool";
const ANTS: &str = "github.com/panjf2000/ants/v2";
const GOTASK: &str = "github.com/newmo-oss/gotask";

/// The call that builds a task value whose callback lives in one of its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskConstructor {
    pub target: QualifiedName,
    pub callback: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnApi {
    pub checker: Checker,
    /// `package: None` names a function declared in the analyzed file.
    pub target: QualifiedName,
    /// Fixed callback argument positions.
    pub callbacks: Vec<usize>,
    /// Every argument from this position on is a callback.
    pub variadic_from: Option<usize>,
    pub constructor: Option<TaskConstructor>,
}

impl SpawnApi {
    pub fn new(checker: Checker, target: QualifiedName, callback: usize) -> Self {
        Self {
            checker,
            target,
            callbacks: vec![callback],
            variadic_from: None,
            constructor: None,
        }
    }

    pub fn variadic(checker: Checker, target: QualifiedName, from: usize) -> Self {
        Self {
            checker,
            target,
            callbacks: Vec::new(),
            variadic_from: Some(from),
            constructor: None,
        }
    }

    #[must_use]
    pub fn with_constructor(mut self, target: QualifiedName, callback: usize) -> Self {
        self.constructor = Some(TaskConstructor { target, callback });
        self
    }

    /// Build a configured spawner entry.
    ///
    /// # Errors
    ///
    /// Returns `CtxflowError::Spawner` if a name does not parse.
    pub fn from_spec(
        target: &str,
        callback: usize,
        variadic: bool,
        constructor: Option<(&str, usize)>,
    ) -> CtxflowResult<Self> {
        let parsed = QualifiedName::parse(target)
            .ok_or_else(|| CtxflowError::spawner(target, "expected pkg/path.Func or pkg/path.Type.Method"))?;
        if parsed.package.is_none() {
            return Err(CtxflowError::spawner(
                target,
                "configured spawners need a package path; mark local functions with //ctxflow:spawner",
            ));
        }
        let api = if variadic {
            Self::variadic(Checker::Spawner, parsed, callback)
        } else {
            Self::new(Checker::Spawner, parsed, callback)
        };
        match constructor {
            Some((ctor, ctor_callback)) => {
                let ctor_name = QualifiedName::parse(ctor)
                    .ok_or_else(|| CtxflowError::spawner(ctor, "invalid constructor name"))?;
                Ok(api.with_constructor(ctor_name, ctor_callback))
            }
            None => Ok(api),
        }
    }

    /// Label used in messages, e.g. `errgroup.Group.Go`.
    pub fn label(&self) -> String {
        self.target.short_label()
    }
}

/// A callback argument picked out of a matched call.
#[derive(Debug, Clone, Copy)]
pub struct Callback<'t> {
    pub expr: Node<'t>,
    /// 1-based argument position, for variadic callbacks that were enumerated.
    pub ordinal: Option<usize>,
    /// The expression is a spread collection (`xs...`) holding the callbacks.
    pub spread: bool,
}

#[derive(Debug, Clone)]
pub struct SpawnSite<'a, 't> {
    pub api: &'a SpawnApi,
    pub callbacks: Vec<Callback<'t>>,
}

/// Immutable table of spawn-like APIs, built once per run.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    apis: Vec<SpawnApi>,
}

impl Registry {
    pub fn builtin() -> Self {
        let method = QualifiedName::method;
        let func = QualifiedName::function;
        let gotask_task = || func(GOTASK, "NewTask");

        let mut apis = vec![
            SpawnApi::new(Checker::Waitgroup, method("sync", "WaitGroup", "Go"), 0),
            SpawnApi::new(Checker::Errgroup, method(ERRGROUP, "Group", "Go"), 0),
            SpawnApi::new(Checker::Errgroup, method(ERRGROUP, "Group", "TryGo"), 0),
            SpawnApi::new(Checker::Spawner, method(CONC, "WaitGroup", "Go"), 0),
            SpawnApi::new(Checker::Spawner, func(ANTS, "Submit"), 0),
            SpawnApi::new(Checker::Spawner, method(ANTS, "Pool", "Submit"), 0),
        ];
        for pool in ["Pool", "ErrorPool", "ContextPool"] {
            apis.push(SpawnApi::new(Checker::Spawner, method(CONC_POOL, pool, "Go"), 0));
        }
        for name in ["DoAll", "DoAllSettled", "DoRace"] {
            apis.push(
                SpawnApi::variadic(Checker::Gotask, func(GOTASK, name), 1)
                    .with_constructor(gotask_task(), 0),
            );
        }
        for name in ["DoAllFns", "DoAllFnsSettled", "DoRaceFns"] {
            apis.push(SpawnApi::variadic(Checker::Gotask, func(GOTASK, name), 1));
        }
        Self { apis }
    }

    #[must_use]
    pub fn with_entries(mut self, extra: impl IntoIterator<Item = SpawnApi>) -> Self {
        self.apis.extend(extra);
        self
    }

    /// Per-file view adding the file's own marked spawner functions.
    pub fn for_file<'r>(&'r self, facts: &FileFacts<'_>, marks: &BTreeSet<usize>) -> RegistryView<'r> {
        RegistryView {
            base: self,
            local: local_spawners(facts, marks),
        }
    }
}

pub struct RegistryView<'r> {
    base: &'r Registry,
    local: Vec<SpawnApi>,
}

impl<'r> RegistryView<'r> {
    /// Match a call expression against the table.
    pub fn match_call<'a, 't>(
        &'a self,
        facts: &FileFacts<'t>,
        call: Node<'t>,
    ) -> Option<SpawnSite<'a, 't>> {
        let callee = strip_parens(call.child_by_field_name("function")?);
        let api = self
            .base
            .apis
            .iter()
            .chain(self.local.iter())
            .find(|api| callee_matches(facts, callee, &api.target))?;
        Some(extract_callbacks(api, call))
    }
}

fn callee_matches(facts: &FileFacts<'_>, callee: Node<'_>, target: &QualifiedName) -> bool {
    match callee.kind() {
        "identifier" => {
            target.package.is_none()
                && target.receiver.is_none()
                && facts.text(callee) == target.name
                && facts
                    .binding_of(callee)
                    .is_some_and(|id| facts.binding(id).kind == BindingKind::Func)
        }
        "selector_expression" => {
            let (Some(operand), Some(field)) = (
                callee.child_by_field_name("operand"),
                callee.child_by_field_name("field"),
            ) else {
                return false;
            };
            if facts.text(field) != target.name {
                return false;
            }
            let Some(pkg) = target.package.as_deref() else {
                return false;
            };
            match &target.receiver {
                None => facts
                    .package_of(operand)
                    .is_some_and(|path| same_package(path, pkg)),
                Some(recv) => facts
                    .expr_type(operand)
                    .is_some_and(|ty| ty.matches(Some(pkg), recv)),
            }
        }
        _ => false,
    }
}

fn extract_callbacks<'a, 't>(api: &'a SpawnApi, call: Node<'t>) -> SpawnSite<'a, 't> {
    let args = call_arguments(call);
    let mut callbacks: Vec<Callback<'t>> = api
        .callbacks
        .iter()
        .filter_map(|i| args.get(*i))
        .map(|expr| Callback {
            expr: spread_inner(*expr),
            ordinal: None,
            spread: false,
        })
        .collect();

    if let Some(from) = api.variadic_from {
        let rest = args.get(from..).unwrap_or_default();
        match rest.last() {
            Some(last) if last.kind() == "variadic_argument" => {
                callbacks.push(Callback {
                    expr: spread_inner(*last),
                    ordinal: None,
                    spread: true,
                });
            }
            _ => callbacks.extend(rest.iter().enumerate().map(|(i, expr)| Callback {
                expr: *expr,
                ordinal: Some(from + i + 1),
                spread: false,
            })),
        }
    }

    SpawnSite { api, callbacks }
}

fn spread_inner(node: Node<'_>) -> Node<'_> {
    if node.kind() == "variadic_argument" {
        named_children(node).first().copied().unwrap_or(node)
    } else {
        node
    }
}

/// Entries for same-file functions preceded by a `//ctxflow:spawner` mark:
/// every func-typed parameter is a callback.
fn local_spawners(facts: &FileFacts<'_>, marks: &BTreeSet<usize>) -> Vec<SpawnApi> {
    if marks.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for decl in named_children(facts.root) {
        if decl.kind() != "function_declaration" {
            continue;
        }
        let line = line_of(decl);
        if !marks.contains(&line) && !marks.contains(&(line.saturating_sub(1))) {
            continue;
        }
        let (Some(name), Some(params)) = (
            decl.child_by_field_name("name"),
            decl.child_by_field_name("parameters"),
        ) else {
            continue;
        };

        let mut api = SpawnApi {
            checker: Checker::Spawner,
            target: QualifiedName {
                package: None,
                receiver: None,
                name: facts.text(name).to_string(),
            },
            callbacks: Vec::new(),
            variadic_from: None,
            constructor: None,
        };
        let mut index = 0;
        for param in named_children(params) {
            let count = field_children(param, "name").len().max(1);
            let is_func = param
                .child_by_field_name("type")
                .is_some_and(|t| t.kind() == "function_type");
            if is_func {
                if param.kind() == "variadic_parameter_declaration" {
                    api.variadic_from = Some(index);
                } else {
                    api.callbacks.extend(index..index + count);
                }
            }
            index += count;
        }
        if !api.callbacks.is_empty() || api.variadic_from.is_some() {
            out.push(api);
        }
    }
    out
}
