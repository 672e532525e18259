use crate::checker::CheckerSet;
use crate::derive::DerivationRequirement;
use crate::error::{CtxflowError, CtxflowResult};
use crate::qualname::QualifiedName;
use crate::registry::{Registry, SpawnApi};
use crate::types::TokenTypes;
use crate::{Analyzer, AnalyzerSettings};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CtxflowConfig {
    #[serde(default)]
    pub checkers: CheckersConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub spawners: Vec<SpawnerConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckersConfig {
    #[serde(default)]
    pub disabled: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Derivation requirement, e.g. `"pkg/apm.NewGoroutineContext"`.
    pub derive: Option<String>,

    #[serde(default)]
    pub carriers: Vec<String>,

    /// Use the flow graph before falling back to syntax. Defaults to true.
    pub precise: Option<bool>,

    /// Include `_test.go` files when walking directories.
    #[serde(default)]
    pub tests: bool,
}

/// One `[[spawners]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpawnerConfig {
    pub target: String,

    #[serde(default)]
    pub callback: usize,

    #[serde(default)]
    pub variadic: bool,

    pub constructor: Option<String>,

    #[serde(default)]
    pub constructor_callback: usize,
}

impl SpawnerConfig {
    /// # Errors
    ///
    /// Returns `CtxflowError::Spawner` when a name does not parse.
    pub fn to_api(&self) -> CtxflowResult<SpawnApi> {
        SpawnApi::from_spec(
            &self.target,
            self.callback,
            self.variadic,
            self.constructor
                .as_deref()
                .map(|ctor| (ctor, self.constructor_callback)),
        )
    }
}

impl CtxflowConfig {
    /// Registry entries for every configured spawner.
    ///
    /// # Errors
    ///
    /// Fails on the first spawner whose names do not parse.
    pub fn spawner_apis(&self) -> CtxflowResult<Vec<SpawnApi>> {
        self.spawners.iter().map(SpawnerConfig::to_api).collect()
    }

    pub fn precise(&self) -> bool {
        self.analysis.precise.unwrap_or(true)
    }

    /// Merge this config with command-line overrides into an analyzer.
    ///
    /// Checker lists combine (`only`, then `skip` and `disabled` removed);
    /// carriers accumulate; a `derive` override replaces the configured one.
    ///
    /// # Errors
    ///
    /// Fails on unknown checker names, bad derivation text, unparsable
    /// carrier types, or bad spawner entries.
    pub fn analyzer(&self, overrides: &Overrides) -> CtxflowResult<Analyzer> {
        let checkers =
            CheckerSet::filtered(&overrides.only, &overrides.skip, &self.checkers.disabled)?;

        let derivation = overrides
            .derive
            .as_deref()
            .or(self.analysis.derive.as_deref())
            .map(DerivationRequirement::parse)
            .transpose()?;

        let carriers = self
            .analysis
            .carriers
            .iter()
            .chain(&overrides.carriers)
            .map(|spec| {
                QualifiedName::parse(spec)
                    .ok_or_else(|| CtxflowError::config(format!("invalid carrier type: {spec}")))
            })
            .collect::<CtxflowResult<Vec<_>>>()?;

        let settings = AnalyzerSettings {
            checkers,
            derivation,
            tokens: TokenTypes::new(carriers),
            precise: self.precise() && !overrides.no_precise,
        };
        let registry = Registry::builtin().with_entries(self.spawner_apis()?);
        Ok(Analyzer::new_with_settings(registry, settings))
    }
}

/// Command-line values layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub only: Vec<String>,
    pub skip: Vec<String>,
    pub derive: Option<String>,
    pub carriers: Vec<String>,
    pub no_precise: bool,
}

pub const DEFAULT_CONFIG_FILE_NAME: &str = "ctxflow.toml";

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut cur = Some(start_dir);
    while let Some(dir) = cur {
        let candidate = dir.join(DEFAULT_CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        cur = dir.parent();
    }
    None
}

pub fn load_config_file(path: &Path) -> Result<CtxflowConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse_config(&raw)
        .map_err(CtxflowError::into_anyhow)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Parse config text.
///
/// # Errors
///
/// Returns `CtxflowError::Config` for TOML that does not fit the schema.
pub fn parse_config(raw: &str) -> CtxflowResult<CtxflowConfig> {
    toml::from_str(raw).map_err(|e| CtxflowError::config(e.to_string()))
}

pub fn load_config(
    explicit_path: Option<&Path>,
    start_dir: &Path,
) -> Result<Option<(PathBuf, CtxflowConfig)>> {
    if let Some(p) = explicit_path {
        let cfg = load_config_file(p)?;
        return Ok(Some((p.to_path_buf(), cfg)));
    }

    let Some(p) = find_config_file(start_dir) else {
        return Ok(None);
    };
    let cfg = load_config_file(&p)?;
    Ok(Some((p, cfg)))
}
