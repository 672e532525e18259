//! One walk per file: find spawn sites, decide each callback, gate the
//! findings through the ignore ledger.

use crate::AnalyzerSettings;
use crate::checker::{Checker, ordinal_word};
use crate::derive::{DerivationOutcome, DerivationRequirement};
use crate::diagnostics::Diagnostic;
use crate::fallback::{Fallback, mentions_token};
use crate::ledger::IgnoreLedger;
use crate::registry::{Callback, RegistryView, SpawnSite};
use crate::resolve::FileFacts;
use crate::scope::{Scope, ScopeMap};
use crate::syntax::{call_arguments, line_of, named_children, walk};
use crate::trace::{CaptureResult, Tracer};
use tracing::debug;
use tree_sitter::Node;

pub struct Driver<'a, 't> {
    facts: &'a FileFacts<'t>,
    scopes: &'a ScopeMap<'t>,
    registry: &'a RegistryView<'a>,
    tracer: Tracer<'a, 't>,
    fallback: Fallback<'a, 't>,
    settings: &'a AnalyzerSettings,
    ledger: IgnoreLedger,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, 't> Driver<'a, 't> {
    pub fn new(
        facts: &'a FileFacts<'t>,
        scopes: &'a ScopeMap<'t>,
        registry: &'a RegistryView<'a>,
        tracer: Tracer<'a, 't>,
        settings: &'a AnalyzerSettings,
        ledger: IgnoreLedger,
    ) -> Self {
        Self {
            facts,
            scopes,
            registry,
            tracer,
            fallback: Fallback::new(facts, &settings.tokens),
            settings,
            ledger,
            diagnostics: Vec::new(),
        }
    }

    /// Walk the file and return sorted diagnostics, directive problems included.
    pub fn run(mut self) -> Vec<Diagnostic> {
        let mut sites = Vec::new();
        walk(self.facts.root, &mut |node| {
            if matches!(node.kind(), "go_statement" | "call_expression") {
                sites.push(node);
            }
        });

        let (facts, scopes, registry) = (self.facts, self.scopes, self.registry);
        for node in sites {
            let Some(scope) = scopes.scope_for(node) else {
                continue;
            };
            match node.kind() {
                "go_statement" => self.check_go(node, scope),
                _ => {
                    if let Some(site) = registry.match_call(facts, node) {
                        self.check_spawn(node, &site, scope);
                    }
                }
            }
        }

        let mut diagnostics = self.diagnostics;
        diagnostics.extend(self.ledger.unused_directives(&self.settings.checkers));
        diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        diagnostics
    }

    fn enabled(&self, checker: Checker) -> bool {
        self.settings.checkers.is_enabled(checker)
    }

    fn requirement(&self) -> Option<&'a DerivationRequirement> {
        if !self.enabled(Checker::Derive) {
            return None;
        }
        self.settings.derivation.as_ref()
    }

    fn check_go(&mut self, stmt: Node<'t>, scope: &Scope<'t>) {
        let Some(call) = named_children(stmt).into_iter().next() else {
            return;
        };
        if call.kind() != "call_expression" {
            return;
        }
        let Some(callee) = call.child_by_field_name("function") else {
            return;
        };

        if self.enabled(Checker::Goroutine) {
            let passes_token = call_arguments(call)
                .into_iter()
                .any(|arg| mentions_token(self.facts, &self.settings.tokens, arg, true));
            let satisfied = passes_token
                || match self.tracer.trace(callee) {
                    CaptureResult::Satisfied => true,
                    CaptureResult::Unsatisfied => false,
                    CaptureResult::Indeterminate => self.fallback.captures(callee, stmt),
                };
            if !satisfied {
                let message = Checker::Goroutine.propagation_message("", &scope.token_names, None);
                self.report(Checker::Goroutine, stmt, message);
            }
        }

        if let Some(requirement) = self.requirement() {
            let outcome = self
                .tracer
                .trace_derivation(callee, requirement)
                .unwrap_or_else(|| self.fallback.derivation(callee, stmt, requirement));
            self.report_derivation(stmt, "goroutine", requirement, outcome);
        }
    }

    fn check_spawn(&mut self, call: Node<'t>, site: &SpawnSite<'_, 't>, scope: &Scope<'t>) {
        let checker = site.api.checker;
        let label = site.api.label();
        debug!(api = %label, callbacks = site.callbacks.len(), "spawn site");

        for callback in &site.callbacks {
            if self.enabled(checker) && !self.callback_captures(site, callback, call) {
                let message =
                    checker.propagation_message(&label, &scope.token_names, callback.ordinal);
                self.report(checker, callback.expr, message);
            }

            if let Some(requirement) = self.requirement() {
                let outcome = self.callback_derivation(site, callback, call, requirement);
                let place = match callback.ordinal {
                    Some(n) => format!("{label}() {} argument", ordinal_word(n)),
                    None => format!("{label}() func argument"),
                };
                self.report_derivation(callback.expr, &place, requirement, outcome);
            }
        }
    }

    /// Precise tier first; the fallback only runs on `Indeterminate`.
    fn callback_captures(
        &self,
        site: &SpawnSite<'_, 't>,
        callback: &Callback<'t>,
        call: Node<'t>,
    ) -> bool {
        if callback.spread || site.api.constructor.is_some() {
            return self.fallback.callback_captures(site, callback, call);
        }
        match self.tracer.trace(callback.expr) {
            CaptureResult::Satisfied => true,
            CaptureResult::Unsatisfied => false,
            CaptureResult::Indeterminate => self.fallback.callback_captures(site, callback, call),
        }
    }

    fn callback_derivation(
        &self,
        site: &SpawnSite<'_, 't>,
        callback: &Callback<'t>,
        call: Node<'t>,
        requirement: &DerivationRequirement,
    ) -> DerivationOutcome {
        if !callback.spread
            && site.api.constructor.is_none()
            && let Some(outcome) = self.tracer.trace_derivation(callback.expr, requirement)
        {
            return outcome;
        }
        self.fallback
            .callback_derivation(site, callback, call, requirement)
    }

    fn report_derivation(
        &mut self,
        node: Node<'t>,
        place: &str,
        requirement: &DerivationRequirement,
        outcome: DerivationOutcome,
    ) {
        let message = match outcome {
            DerivationOutcome::SatisfiedAtStart => return,
            DerivationOutcome::SatisfiedOnlyInDefer => {
                Checker::derivation_deferred_message(place, &requirement.label())
            }
            DerivationOutcome::Unsatisfied => {
                Checker::derivation_missing_message(place, &requirement.label())
            }
        };
        self.report(Checker::Derive, node, message);
    }

    fn report(&mut self, checker: Checker, node: Node<'t>, message: String) {
        let line = line_of(node);
        if self.ledger.should_ignore(line, checker) {
            debug!(line, checker = checker.name(), "suppressed by directive");
            return;
        }
        self.diagnostics
            .push(Diagnostic::at_node(checker, node, message));
    }
}
