//! Info command - Show the model catalog and run defaults
//!
//! Usage:
//! ```bash
//! agora info
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use agora_debate::tasks::stance_legend;
use agora_llm::{LlmConfig, ProviderKind, RetryPolicy, MODEL_CATALOG};
use agora_runtime::{ModelAssignment, RunConfig};

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs;

/// Run the info command
pub fn run(_args: InfoArgs) -> Result<()> {
    let config = LlmConfig::from_env().context("Invalid provider configuration")?;
    let version = env!("CARGO_PKG_VERSION");

    println!("{}", "Agora - Multi-agent debate engine".bold().cyan());
    println!("{}", "═".repeat(50).cyan());
    println!();
    println!("  {} {}", "CLI Version:".dimmed(), version.green());
    println!();

    println!("{}", "Model Catalog:".bold());
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Key").fg(Color::Cyan),
            Cell::new("Provider").fg(Color::Cyan),
            Cell::new("Model id").fg(Color::Cyan),
            Cell::new("Enabled").fg(Color::Cyan),
        ]);
    for spec in MODEL_CATALOG {
        let enabled = config.is_enabled(spec.provider);
        table.add_row(vec![
            Cell::new(spec.key).fg(Color::Green),
            Cell::new(spec.provider),
            Cell::new(config.model_id(spec)),
            if enabled {
                Cell::new("yes").fg(Color::Green)
            } else {
                Cell::new("no").fg(Color::DarkGrey)
            },
        ]);
    }
    println!("{table}");
    println!();

    println!("{}", "Providers:".bold());
    for provider in ProviderKind::ALL {
        let Some(flag) = provider.enable_var() else {
            continue;
        };
        let key = match (provider.key_var(), config.api_key(provider)) {
            (Some(var), Some(_)) => format!("{} set", var).as_str().green(),
            (Some(var), None) => format!("{} missing", var).as_str().yellow(),
            (None, _) => "no key".normal(),
        };
        let state = if config.is_enabled(provider) {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!("  {} {:<10} {:<8} {} ({})", "•".cyan(), provider.as_str(), state, key, flag.dimmed());
    }
    println!();

    let defaults = RunConfig::default();
    let retry = RetryPolicy::default();
    let model = match &defaults.model_assignment {
        ModelAssignment::Fixed(model) => model.clone(),
        ModelAssignment::Random { seed } => format!("random (seed {})", seed),
    };

    println!("{}", "Run Defaults:".bold());
    println!("  {} {}", "Level:".dimmed(), defaults.level);
    println!("  {} {}", "Rounds:".dimmed(), defaults.rounds);
    println!("  {} {}", "Model:".dimmed(), model);
    println!("  {} {}", "Repair retries:".dimmed(), defaults.repair_retries);
    println!("  {} {}", "Temperature:".dimmed(), config.temperature);
    println!(
        "  {} {} attempts, {}s base delay, {}s timeout",
        "Gateway:".dimmed(),
        retry.max_attempts,
        retry.base_delay.as_secs(),
        retry.request_timeout.as_secs()
    );
    println!();

    println!("{}", "Labels:".bold());
    println!("  {} {}", "ℹ".blue(), stance_legend());
    println!();

    Ok(())
}
