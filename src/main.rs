use clap::Parser;
use ctxflow::Analyzer;
use ctxflow::checker::{Checker, CheckerKind};
use ctxflow::cli::{Args, CheckArgs, Command, OutputFormat};
use ctxflow::config::{self, CtxflowConfig, Overrides};
use ctxflow::diagnostics::Diagnostic;
use regex::Regex;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::LazyLock;
use tracing::{debug, info};
use walkdir::WalkDir;

static GENERATED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^// Code generated .* DO NOT EDIT\.$")
        .expect("generated header regex is valid")
});

fn main() -> ExitCode {
    ctxflow::telemetry::init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    match args.command {
        Some(Command::ListCheckers) => {
            list_checkers();
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Explain { checker }) => {
            explain_checker(&checker)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Check(check)) => check_command(check),
        None => check_command(args.check),
    }
}

fn list_checkers() {
    for c in Checker::ALL {
        println!("{}\t{}", c.name(), c.description());
    }
}

fn explain_checker(name: &str) -> anyhow::Result<()> {
    let Some(c) = Checker::from_name(name) else {
        anyhow::bail!("unknown checker: {name}");
    };
    let kind = match c.kind() {
        CheckerKind::Propagation => "propagation",
        CheckerKind::Derivation => "derivation",
        CheckerKind::Directive => "directive",
    };
    println!("name: {}", c.name());
    println!("kind: {kind}");
    println!("description: {}", c.description());
    Ok(())
}

fn check_command(args: CheckArgs) -> anyhow::Result<ExitCode> {
    let start_dir = infer_start_dir(&args)?;
    let loaded_cfg = config::load_config(args.config.as_deref(), &start_dir)?;
    let cfg = match loaded_cfg {
        Some((path, cfg)) => {
            debug!(path = %path.display(), "loaded config");
            cfg
        }
        None => CtxflowConfig::default(),
    };

    let analyzer = cfg.analyzer(&overrides(&args))?;
    let include_tests = args.tests || cfg.analysis.tests;

    let mut diagnostics = Vec::new();
    if args.paths.is_empty() {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        diagnostics.extend(check_one(&analyzer, "stdin", &source)?);
    } else {
        let files = collect_go_files(&args.paths, include_tests)?;
        for path in files {
            let source = std::fs::read_to_string(&path)?;
            if GENERATED_RE.is_match(&source) {
                debug!(path = %path.display(), "skipping generated file");
                continue;
            }
            diagnostics.extend(check_one(&analyzer, &path.display().to_string(), &source)?);
        }
    }
    info!(count = diagnostics.len(), "analysis finished");

    match args.format {
        OutputFormat::Json => print_json(&diagnostics)?,
        OutputFormat::Pretty => print_pretty(&diagnostics),
        OutputFormat::Github => print_github(&diagnostics, args.deny_warnings),
    }

    if args.deny_warnings && !diagnostics.is_empty() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn overrides(args: &CheckArgs) -> Overrides {
    Overrides {
        only: args.only.clone(),
        skip: args.skip.clone(),
        derive: args.derive.clone(),
        carriers: args.carriers.clone(),
        no_precise: args.no_precise,
    }
}

fn check_one(analyzer: &Analyzer, file: &str, source: &str) -> anyhow::Result<Vec<Diagnostic>> {
    let mut diagnostics = analyzer.check_source(source)?;
    for d in &mut diagnostics {
        d.file.get_or_insert_with(|| file.to_string());
    }
    debug!(file, count = diagnostics.len(), "checked file");
    Ok(diagnostics)
}

fn print_pretty(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        println!(
            "{}:{}:{}: {}: {}",
            diag.file.as_deref().unwrap_or("stdin"),
            diag.span.start.row,
            diag.span.start.column,
            diag.checker.name(),
            diag.message
        );
    }
    println!("{} diagnostics", diagnostics.len());
}

fn print_github(diagnostics: &[Diagnostic], deny_warnings: bool) {
    let kind = if deny_warnings { "error" } else { "warning" };
    for diag in diagnostics {
        println!(
            "::{} file={},line={},col={},title={}::{}",
            kind,
            github_escape(diag.file.as_deref().unwrap_or("stdin")),
            diag.span.start.row,
            diag.span.start.column,
            diag.checker.name(),
            github_escape(&diag.message)
        );
    }
}

#[derive(Debug, Serialize)]
struct JsonDiagnostic<'a> {
    file: &'a str,
    row: usize,
    column: usize,
    checker: &'static str,
    message: &'a str,
}

fn print_json(diagnostics: &[Diagnostic]) -> anyhow::Result<()> {
    let mut out: Vec<JsonDiagnostic<'_>> = diagnostics
        .iter()
        .map(|d| JsonDiagnostic {
            file: d.file.as_deref().unwrap_or("stdin"),
            row: d.span.start.row,
            column: d.span.start.column,
            checker: d.checker.name(),
            message: &d.message,
        })
        .collect();
    out.sort_by(|a, b| {
        (a.file, a.row, a.column, a.checker).cmp(&(b.file, b.row, b.column, b.checker))
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn github_escape(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn collect_go_files(paths: &[PathBuf], include_tests: bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_file() {
            out.push(path.clone());
            continue;
        }
        let walker = WalkDir::new(path)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && should_skip_dir(e.path())));
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && is_go_source(entry.path(), include_tests) {
                out.push(entry.into_path());
            }
        }
    }

    out.sort();
    out.dedup();
    Ok(out)
}

fn is_go_source(path: &Path, include_tests: bool) -> bool {
    let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
        return false;
    };
    name.ends_with(".go") && (include_tests || !name.ends_with("_test.go"))
}

fn should_skip_dir(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
        return false;
    };

    matches!(name, "vendor" | "testdata" | ".git")
}

fn infer_start_dir(args: &CheckArgs) -> anyhow::Result<PathBuf> {
    let base = match args.paths.first() {
        Some(p) => p.clone(),
        None => std::env::current_dir()?,
    };

    let base = if base.is_file() {
        base.parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        base
    };

    Ok(base)
}
