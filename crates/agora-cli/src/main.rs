//! Agora CLI - run and inspect multi-agent debates
//!
//! # Usage
//!
//! ```bash
//! # Run a debate (set 1, per-agent mode, 3 rounds)
//! agora run --participants residents.json --prompts prompts/ --output out/
//!
//! # Shared-context mode with a compromise proposal and vote
//! agora run --participants residents.json --prompts prompts/ --output out/ \
//!     --level 1 --model gpt-5-mini --synthesis
//!
//! # Test connections to every enabled model
//! agora check
//!
//! # Show the model catalog and defaults
//! agora info
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

mod commands;

use commands::{check, info, run};

/// Agora - phase-sequenced LLM debates
#[derive(Parser)]
#[command(
    name = "agora",
    version,
    about = "Agora CLI - Multi-agent debate engine",
    long_about = "Agora runs structured debates between LLM-backed participants.\n\n\
                  Every utterance and private reasoning step is written to\n\
                  reconstructible CSV logs as the debate progresses."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one debate
    #[command(name = "run")]
    Run(run::RunArgs),

    /// Test connections to enabled models
    #[command(name = "check")]
    Check(check::CheckArgs),

    /// Show the model catalog and defaults
    #[command(name = "info")]
    Info(info::InfoArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            std::fs::create_dir_all(&args.output)
                .with_context(|| format!("Cannot create output directory {}", args.output.display()))?;
            setup_logging(cli.verbose, Some(&args.log_path()))?;
            run::run(args).await
        }
        Commands::Check(args) => {
            setup_logging(cli.verbose, None)?;
            check::run(args).await
        }
        Commands::Info(args) => {
            setup_logging(cli.verbose, None)?;
            info::run(args)
        }
    }
}

/// Setup logging based on verbosity level. A run also mirrors every event,
/// without colors, into its log file.
fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Cannot create log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_target(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

/// Print a success message with a checkmark
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message with an X
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}
