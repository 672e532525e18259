//! Core ctxflow analyzer.
//!
//! The crate parses Go source with tree-sitter and reports spawned closures
//! (`go` statements, errgroup / WaitGroup / pool APIs, configured spawners)
//! that drop the `context.Context` in scope. An optional derivation
//! requirement additionally checks that each spawned closure starts by
//! deriving a fresh context through one of the configured calls.

#![allow(clippy::type_complexity)] // tree-sitter nodes carry lifetimes through tuples
#![allow(clippy::should_implement_trait)] // from_name lookups return Option, not Result

pub mod checker;
pub mod cli;
pub mod config;
pub mod derive;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod fallback;
pub mod flow;
pub mod ledger;
pub mod parser;
pub mod qualname;
pub mod registry;
pub mod resolve;
pub mod scope;
mod syntax;
pub mod telemetry;
pub mod trace;
pub mod types;

use anyhow::Result;
use tracing::debug;

use crate::checker::CheckerSet;
use crate::derive::DerivationRequirement;
use crate::diagnostics::Diagnostic;
use crate::driver::Driver;
use crate::flow::FlowGraph;
use crate::ledger::IgnoreLedger;
use crate::parser::parse_source;
use crate::registry::Registry;
use crate::resolve::FileFacts;
use crate::scope::ScopeMap;
use crate::trace::Tracer;
use crate::types::TokenTypes;

/// Everything that changes what a run reports, apart from the spawner registry.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub checkers: CheckerSet,
    pub derivation: Option<DerivationRequirement>,
    pub tokens: TokenTypes,
    /// Consult the flow graph before the syntactic fallback.
    pub precise: bool,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            checkers: CheckerSet::all(),
            derivation: None,
            tokens: TokenTypes::default(),
            precise: true,
        }
    }
}

/// Analyzer orchestrates one file at a time: parse, resolve, build the
/// graph, then hand the walk to the driver.
pub struct Analyzer {
    registry: Registry,
    settings: AnalyzerSettings,
}

impl Analyzer {
    /// Create a new analyzer with default settings.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            settings: AnalyzerSettings::default(),
        }
    }

    /// Create a new analyzer with explicit settings (e.g. from config).
    pub fn new_with_settings(registry: Registry, settings: AnalyzerSettings) -> Self {
        Self { registry, settings }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Check a single in-memory source string and return sorted diagnostics.
    pub fn check_source(&self, source: &str) -> Result<Vec<Diagnostic>> {
        let tree = crate::instrument_block!("parse", { parse_source(source) })?;
        let root = tree.root_node();

        let facts = crate::instrument_block!("resolve", { FileFacts::resolve(root, source) });
        let ledger = IgnoreLedger::build(root, source);
        let marks = ledger.spawner_lines().clone();
        let view = self.registry.for_file(&facts, &marks);
        let scopes = ScopeMap::build(&facts, &self.settings.tokens);
        if scopes.is_empty() {
            debug!("no token scopes in file");
        }

        let graph = if self.settings.precise {
            crate::instrument_block!("flow", { FlowGraph::build(&facts) })
        } else {
            None
        };
        let tracer = Tracer::new(&facts, graph.as_ref(), &self.settings.tokens);

        let diagnostics = crate::instrument_block!("check", {
            Driver::new(&facts, &scopes, &view, tracer, &self.settings, ledger).run()
        });
        Ok(diagnostics)
    }
}

/// Construct an `Analyzer` with the built-in spawner APIs and every checker enabled.
pub fn create_default_analyzer() -> Analyzer {
    Analyzer::new(Registry::builtin())
}
