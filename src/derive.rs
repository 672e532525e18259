//! Derivation requirements: `A+B,C` means "call A and B, or call C".

use crate::error::{CtxflowError, CtxflowResult};
use crate::flow::CallSite;
use crate::qualname::{QualifiedName, same_package};
use crate::resolve::FileFacts;
use crate::syntax::strip_parens;
use itertools::Itertools;
use tree_sitter::Node;

/// OR of AND-groups of functions that must be called at closure start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationRequirement {
    groups: Vec<Vec<QualifiedName>>,
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DerivationOutcome {
    Unsatisfied,
    SatisfiedOnlyInDefer,
    SatisfiedAtStart,
}

impl DerivationRequirement {
    /// Parse requirement text.
    ///
    /// # Errors
    ///
    /// Returns `CtxflowError::Derivation` for empty text, empty groups or
    /// members, and members that are not qualified names.
    pub fn parse(text: &str) -> CtxflowResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CtxflowError::derivation(text, "requirement is empty"));
        }

        let mut groups = Vec::new();
        for group in trimmed.split(',') {
            let mut members = Vec::new();
            for member in group.split('+') {
                let member = member.trim();
                if member.is_empty() {
                    return Err(CtxflowError::derivation(text, "empty function name"));
                }
                let name = QualifiedName::parse(member).ok_or_else(|| {
                    CtxflowError::derivation(text, format!("invalid function name `{member}`"))
                })?;
                members.push(name);
            }
            groups.push(members);
        }

        Ok(Self {
            groups,
            text: trimmed.to_string(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn groups(&self) -> &[Vec<QualifiedName>] {
        &self.groups
    }

    /// Short form used in messages, e.g. `apm.NewGoroutineContext`.
    pub fn label(&self) -> String {
        self.groups
            .iter()
            .map(|g| g.iter().map(QualifiedName::short_label).join("+"))
            .join(",")
    }

    /// Decide the outcome for the calls of one closure body.
    ///
    /// A group counts at start only when all of its members are called
    /// outside `defer`; otherwise any fully matched group means the calls
    /// happen, just too late.
    pub fn evaluate(&self, facts: &FileFacts<'_>, calls: &[CallSite<'_>]) -> DerivationOutcome {
        let group_met = |group: &[QualifiedName], immediate_only: bool| {
            group.iter().all(|spec| {
                calls
                    .iter()
                    .filter(|c| !immediate_only || !c.deferred)
                    .any(|c| call_matches(facts, c.node, spec))
            })
        };

        if self.groups.iter().any(|g| group_met(g, true)) {
            DerivationOutcome::SatisfiedAtStart
        } else if self.groups.iter().any(|g| group_met(g, false)) {
            DerivationOutcome::SatisfiedOnlyInDefer
        } else {
            DerivationOutcome::Unsatisfied
        }
    }
}

/// True if `call` invokes the function named by `spec`.
pub fn call_matches(facts: &FileFacts<'_>, call: Node<'_>, spec: &QualifiedName) -> bool {
    let Some(callee) = call.child_by_field_name("function") else {
        return false;
    };
    let callee = strip_parens(callee);

    let (operand, name) = match callee.kind() {
        "identifier" => (None, facts.text(callee)),
        "selector_expression" => {
            let (Some(operand), Some(field)) = (
                callee.child_by_field_name("operand"),
                callee.child_by_field_name("field"),
            ) else {
                return false;
            };
            (Some(operand), facts.text(field))
        }
        _ => return false,
    };
    if name != spec.name {
        return false;
    }

    match (&spec.package, &spec.receiver, operand) {
        // Bare names match any callee with that name.
        (None, _, _) => true,
        (Some(pkg), None, Some(operand)) => facts
            .package_of(operand)
            .is_some_and(|path| same_package(path, pkg)),
        (Some(pkg), Some(recv), Some(operand)) => facts
            .expr_type(operand)
            .is_some_and(|ty| ty.matches(Some(pkg), recv)),
        (Some(_), _, None) => false,
    }
}
