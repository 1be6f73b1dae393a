//! Check command - Test connections to enabled models
//!
//! Usage:
//! ```bash
//! agora check
//! agora check --model claude-haiku-4.5
//! ```

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use futures::future::join_all;
use std::time::Duration;

use agora_core::PromptBundle;
use agora_llm::{model_spec, Gateway, LlmConfig, ProviderRegistry, RetryPolicy};

/// Arguments for the check command
#[derive(Args)]
pub struct CheckArgs {
    /// Only test this model key
    #[arg(long)]
    model: Option<String>,

    /// Seconds to wait for each model
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

struct Outcome {
    model: String,
    provider: String,
    result: Result<(u64, String), String>,
}

/// Run the check command
pub async fn run(args: CheckArgs) -> Result<()> {
    let config = LlmConfig::from_env().context("Invalid provider configuration")?;
    let models: Vec<String> = match &args.model {
        Some(model) => vec![model.clone()],
        None => config.enabled_models().into_iter().map(str::to_string).collect(),
    };

    println!("{}", "Connection check".bold().cyan());
    println!();

    let policy = RetryPolicy {
        max_attempts: 1,
        request_timeout: Duration::from_secs(args.timeout),
        ..Default::default()
    };
    let outcomes = join_all(models.iter().map(|model| check_model(&config, model, policy.clone()))).await;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Model").fg(Color::Cyan),
            Cell::new("Provider").fg(Color::Cyan),
            Cell::new("Status").fg(Color::Cyan),
            Cell::new("Latency").fg(Color::Cyan),
            Cell::new("Reply").fg(Color::Cyan),
        ]);

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok((latency_ms, reply)) => table.add_row(vec![
                Cell::new(&outcome.model).fg(Color::Green),
                Cell::new(&outcome.provider),
                Cell::new("ok").fg(Color::Green),
                Cell::new(format!("{}ms", latency_ms)),
                Cell::new(reply),
            ]),
            Err(error) => {
                failed += 1;
                table.add_row(vec![
                    Cell::new(&outcome.model).fg(Color::Red),
                    Cell::new(&outcome.provider),
                    Cell::new("failed").fg(Color::Red),
                    Cell::new("-"),
                    Cell::new(error),
                ])
            }
        };
    }

    println!("{table}");
    println!();

    if failed > 0 {
        crate::print_error(&format!("{} of {} models unreachable", failed, outcomes.len()));
        bail!("connection check failed");
    }
    crate::print_success(&format!("{} models reachable", outcomes.len()));
    Ok(())
}

async fn check_model(config: &LlmConfig, model: &str, policy: RetryPolicy) -> Outcome {
    let provider = model_spec(model)
        .map(|spec| spec.provider.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let result = match ProviderRegistry::from_config(config, &[model]) {
        Ok(registry) => {
            let gateway = Gateway::new(registry, policy);
            let bundle = PromptBundle::new(
                "You are answering a connectivity check.",
                "",
                "Reply with the single word OK.",
            );
            gateway
                .invoke(model, &bundle)
                .await
                .map(|response| (response.latency_ms, preview(&response.content)))
                .map_err(|e| e.to_string())
        }
        Err(e) => Err(e.to_string()),
    };

    if let Err(error) = &result {
        tracing::warn!(model, error = %error, "Connection check failed");
    }
    Outcome {
        model: model.to_string(),
        provider,
        result,
    }
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() > 40 {
        format!("{}...", line.chars().take(40).collect::<String>())
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_model_is_reachable() {
        let outcome = check_model(&LlmConfig::default(), "mock", RetryPolicy::immediate()).await;
        assert_eq!(outcome.provider, "mock");
        assert!(outcome.result.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_model_reports_failure() {
        let outcome = check_model(&LlmConfig::default(), "gpt-2", RetryPolicy::immediate()).await;
        assert_eq!(outcome.provider, "unknown");
        assert!(outcome.result.is_err());
    }

    #[test]
    fn test_preview_truncates_first_line() {
        assert_eq!(preview("OK\nsecond line"), "OK");
        assert_eq!(preview(&"x".repeat(50)), format!("{}...", "x".repeat(40)));
    }
}
