use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "procmol developers",
    version,
    about = "procmol CLI - Build, validate and run node-graph procedures that generate and analyse molecular configurations.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a procedure against a configuration as described by a run file.
    Run(RunArgs),
    /// Parse and validate a procedure file, then print its node tree.
    Check(CheckArgs),
    /// Evaluate a single expression.
    Eval(EvalArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the run file in TOML format.
    #[arg(required = true, value_name = "PATH")]
    pub run_file: PathBuf,

    // --- Run Overrides ---
    /// Override the number of iterations.
    #[arg(short = 'n', long, value_name = "INT")]
    pub iterations: Option<u64>,

    /// Override the random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the data-store prefix.
    #[arg(long, value_name = "NAME")]
    pub prefix: Option<String>,

    /// What to do when an iteration fails ('abort' or 'continue').
    #[arg(long, value_name = "POLICY")]
    pub on_failure: Option<String>,

    // --- Output Overrides ---
    /// Write the final configuration to this XYZ file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write every dataset produced by the run as CSV into this directory.
    #[arg(short, long, value_name = "DIR")]
    pub data_directory: Option<PathBuf>,

    /// Set a specific configuration value, overriding the run file.
    /// Can be used multiple times. Example: -S run.iterations=50
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the procedure file in TOML format.
    #[arg(required = true, value_name = "PATH")]
    pub procedure: PathBuf,

    /// Also print every node's keywords.
    #[arg(short, long)]
    pub keywords: bool,
}

/// Arguments for the `eval` subcommand.
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// The expression to evaluate, e.g. "sqrt(x) * 2".
    #[arg(required = true, value_name = "EXPR", allow_hyphen_values = true)]
    pub expression: String,

    /// Define a variable. Can be used multiple times. Example: -D x=4
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    pub definitions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_parses_overrides() {
        let cli = Cli::parse_from([
            "procmol", "-vv", "run", "rdf.toml", "-n", "25", "--seed", "7", "--on-failure",
            "continue", "-S", "run.prefix=RDF", "-S", "output.data-directory=out",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(args.run_file, PathBuf::from("rdf.toml"));
        assert_eq!(args.iterations, Some(25));
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.on_failure.as_deref(), Some("continue"));
        assert_eq!(args.set_values, ["run.prefix=RDF", "output.data-directory=out"]);
        assert!(args.output.is_none());
    }

    #[test]
    fn check_takes_a_procedure_path() {
        let cli = Cli::parse_from(["procmol", "check", "--keywords", "gen.toml", "-q"]);
        assert!(cli.quiet);
        let Commands::Check(args) = cli.command else {
            panic!("expected the check command");
        };
        assert!(args.keywords);
        assert_eq!(args.procedure, PathBuf::from("gen.toml"));
    }

    #[test]
    fn eval_collects_definitions() {
        let cli = Cli::parse_from(["procmol", "eval", "-D", "x=2", "-D", "y=0.5", "x * y"]);
        let Commands::Eval(args) = cli.command else {
            panic!("expected the eval command");
        };
        assert_eq!(args.expression, "x * y");
        assert_eq!(args.definitions, ["x=2", "y=0.5"]);
    }

    #[test]
    fn eval_accepts_a_leading_minus() {
        let cli = Cli::parse_from(["procmol", "eval", "-3 + 1"]);
        let Commands::Eval(args) = cli.command else {
            panic!("expected the eval command");
        };
        assert_eq!(args.expression, "-3 + 1");
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["procmol", "-q", "-v", "check", "a.toml"]).is_err());
    }

    #[test]
    fn run_file_is_required() {
        assert!(Cli::try_parse_from(["procmol", "run"]).is_err());
    }
}
