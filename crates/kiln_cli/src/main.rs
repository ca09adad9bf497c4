//! Kiln CLI, the command-line interface for the Kiln site compiler.
//!
//! Provides `kiln compile` to compile the site incrementally, `kiln
//! show-outdated` to explain what the next compilation would redo, and
//! `kiln show-rules` to print the action sequence of every rep and layout.

#![warn(missing_docs)]

mod compile;
mod pipeline;
mod show;

use std::io::IsTerminal;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter, e.g. `KILN_LOG=kiln_compiler=trace`.
const LOG_ENV: &str = "KILN_LOG";

/// Kiln, an incremental static-site compiler.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln static-site compiler")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to the site directory or its `kiln.toml`.
    #[arg(long, global = true)]
    pub site: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile the site.
    Compile,
    /// List outdated item reps and why they are outdated.
    ShowOutdated(ShowArgs),
    /// Print the action sequence of every item rep and layout.
    ShowRules,
}

/// Arguments for the `kiln show-outdated` subcommand.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to the site directory.
    pub site: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        site: cli.site,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Compile => compile::run(&global),
        Command::ShowOutdated(ref args) => show::outdated(args, &global),
        Command::ShowRules => show::rules(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the `tracing` subscriber writing to stderr.
///
/// `KILN_LOG` takes precedence over `--quiet` and `--verbose`.
fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(global)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(global.color)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_log_level(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "warn"
    }
}
