#![allow(dead_code)]

use ctxflow::checker::CheckerSet;
use ctxflow::derive::DerivationRequirement;
use ctxflow::diagnostics::Diagnostic;
use ctxflow::qualname::QualifiedName;
use ctxflow::registry::{Registry, SpawnApi};
use ctxflow::types::TokenTypes;
use ctxflow::{Analyzer, AnalyzerSettings};

/// One line per diagnostic: `checker:row:col: message`, in output order.
pub fn format_diags(diags: &[Diagnostic]) -> String {
    diags
        .iter()
        .map(|d| {
            format!(
                "{}:{}:{}: {}",
                d.checker.name(),
                d.span.start.row,
                d.span.start.column,
                d.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builder over `AnalyzerSettings` so each test states only what it changes.
#[derive(Default)]
pub struct Setup {
    settings: AnalyzerSettings,
    spawners: Vec<SpawnApi>,
}

impl Setup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn derive(mut self, text: &str) -> Self {
        self.settings.derivation =
            Some(DerivationRequirement::parse(text).expect("derivation text should parse"));
        self
    }

    pub fn carrier(mut self, spec: &str) -> Self {
        let mut carriers = self.settings.tokens.carriers().to_vec();
        carriers.push(QualifiedName::parse(spec).expect("carrier should parse"));
        self.settings.tokens = TokenTypes::new(carriers);
        self
    }

    pub fn checkers(mut self, checkers: CheckerSet) -> Self {
        self.settings.checkers = checkers;
        self
    }

    pub fn imprecise(mut self) -> Self {
        self.settings.precise = false;
        self
    }

    pub fn spawner(mut self, api: SpawnApi) -> Self {
        self.spawners.push(api);
        self
    }

    pub fn build(self) -> Analyzer {
        let registry = Registry::builtin().with_entries(self.spawners);
        Analyzer::new_with_settings(registry, self.settings)
    }

    pub fn check(self, src: &str) -> String {
        let diags = self
            .build()
            .check_source(src)
            .expect("analysis should succeed");
        format_diags(&diags)
    }
}

/// Run the default analyzer over `src` and format the findings.
pub fn check(src: &str) -> String {
    let diags = ctxflow::create_default_analyzer()
        .check_source(src)
        .expect("analysis should succeed");
    format_diags(&diags)
}
