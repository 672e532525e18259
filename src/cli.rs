use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ctxflow CLI options.
#[derive(Debug, Parser)]
#[command(
    name = "ctxflow",
    version,
    about = "Check that goroutines and task spawners carry the caller's context.Context",
    args_conflicts_with_subcommands = true,
    subcommand_precedence_over_arg = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub check: CheckArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check files or directories.
    Check(CheckArgs),

    /// List available checkers.
    ListCheckers,

    /// Explain a checker.
    Explain {
        /// Checker name.
        checker: String,
    },
}

#[derive(Debug, Clone, ClapArgs)]
pub struct CheckArgs {
    /// Files/directories to check. Defaults to stdin when absent.
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Only run these checkers (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Skip these checkers (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Derivation requirement, e.g. `pkg/apm.NewGoroutineContext` or `A+B,C`.
    #[arg(long, value_name = "TEXT")]
    pub derive: Option<String>,

    /// Extra type treated as a context carrier (`pkg/path.Type`). Repeatable.
    #[arg(long = "carrier", value_name = "SPEC")]
    pub carriers: Vec<String>,

    /// Path to a ctxflow.toml; discovered from the first PATH when absent.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Include `_test.go` files.
    #[arg(long)]
    pub tests: bool,

    /// Skip the flow graph and use only the syntactic checks.
    #[arg(long)]
    pub no_precise: bool,

    /// Exit with code 1 if any diagnostics are emitted.
    #[arg(long)]
    pub deny_warnings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
    Github,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_paths_parse_as_check() {
        let args = Args::try_parse_from(["ctxflow", "--tests", "./pkg"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.check.tests);
        assert_eq!(args.check.paths, vec![PathBuf::from("./pkg")]);
    }

    #[test]
    fn carriers_repeat_and_lists_split() {
        let args = Args::try_parse_from([
            "ctxflow",
            "check",
            "--carrier",
            "github.com/labstack/echo/v4.Context",
            "--carrier",
            "github.com/gin-gonic/gin.Context",
            "--skip",
            "spawner,gotask",
            "--format",
            "json",
        ])
        .unwrap();
        let Some(Command::Check(check)) = args.command else {
            panic!("expected check subcommand");
        };
        assert_eq!(check.carriers.len(), 2);
        assert_eq!(check.skip, vec!["spawner", "gotask"]);
        assert_eq!(check.format, OutputFormat::Json);
    }

    #[test]
    fn explain_takes_a_checker() {
        let args = Args::try_parse_from(["ctxflow", "explain", "errgroup"]).unwrap();
        assert!(matches!(args.command, Some(Command::Explain { checker }) if checker == "errgroup"));
    }
}
