//! Run command - Execute one debate and write its logs
//!
//! Usage:
//! ```bash
//! agora run --participants residents.json --prompts prompts/ --output out/ --set 2 --level 3
//! agora run --participants residents.json --prompts prompts/ --output out/ --seed 42 --synthesis
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use std::path::PathBuf;
use std::sync::Arc;

use agora_core::ParticipantRecord;
use agora_llm::{Gateway, LlmConfig, ProviderRegistry, RetryPolicy};
use agora_persist::{Artifact, FileStore};
use agora_runtime::{
    assign_models, load_participants, models_in_use, run_debate, shared_model, ModelAssignment, RunConfig,
    RunSummary, StaticPrompts, SynthesisConfig,
};

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON array of participant records
    #[arg(long, env = "AGORA_PARTICIPANTS")]
    pub participants: PathBuf,

    /// Directory holding system_guide.md, debate_rule.md, local_context.md
    #[arg(long, env = "AGORA_PROMPTS")]
    pub prompts: PathBuf,

    /// Directory the CSV logs and run log are written to
    #[arg(long, env = "AGORA_OUTPUT")]
    pub output: PathBuf,

    /// Persona set id used in output file names
    #[arg(long = "set", env = "AGORA_SET", default_value_t = 1)]
    pub set_id: u32,

    /// Information level (1 = shared context, 2-4 = per-agent)
    #[arg(long, env = "AGORA_LEVEL", default_value_t = 2,
          value_parser = clap::value_parser!(u8).range(1..=4))]
    pub level: u8,

    /// Number of debate rounds
    #[arg(long, env = "AGORA_ROUNDS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub rounds: u32,

    /// Give every participant without a preassigned model this model key
    #[arg(long, env = "AGORA_MODEL", conflicts_with = "seed")]
    pub model: Option<String>,

    /// Assign models at random over the enabled catalog, reproducibly
    #[arg(long, env = "AGORA_SEED")]
    pub seed: Option<u64>,

    /// Repair attempts for unparseable model output
    #[arg(long, env = "AGORA_REPAIR_RETRIES", default_value_t = 2)]
    pub repair_retries: u32,

    /// Run the planner compromise and vote after the final opinions
    #[arg(long, env = "AGORA_SYNTHESIS")]
    pub synthesis: bool,

    /// Model key for the planner (defaults to the first participant's model)
    #[arg(long, env = "AGORA_PLANNER_MODEL", requires = "synthesis")]
    pub planner_model: Option<String>,

    /// Cap on concurrent model calls in parallel phases
    #[arg(long, env = "AGORA_MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    /// Print the run summary as JSON (no table)
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Per-run log file inside the output directory
    pub fn log_path(&self) -> PathBuf {
        self.output.join(format!("set{}_lv{}.log", self.set_id, self.level))
    }

    fn model_assignment(&self) -> ModelAssignment {
        match (self.seed, &self.model) {
            (Some(seed), _) => ModelAssignment::Random { seed },
            (None, Some(model)) => ModelAssignment::Fixed(model.clone()),
            (None, None) => RunConfig::default().model_assignment,
        }
    }

    fn run_config(&self, synthesis: Option<SynthesisConfig>) -> RunConfig {
        RunConfig {
            set_id: self.set_id,
            level: self.level,
            rounds: self.rounds,
            model_assignment: self.model_assignment(),
            repair_retries: self.repair_retries,
            synthesis,
            max_concurrency: self.max_concurrency,
        }
    }
}

/// Run the run command
pub async fn run(args: RunArgs) -> Result<()> {
    let specs = load_participants(&args.participants)
        .with_context(|| format!("Cannot load participants from {}", args.participants.display()))?;
    let prompts = StaticPrompts::load(&args.prompts)
        .with_context(|| format!("Cannot load prompts from {}", args.prompts.display()))?;
    let llm = LlmConfig::from_env().context("Invalid provider configuration")?;
    let available = llm.enabled_models();

    let assignment = args.model_assignment();
    let records: Vec<ParticipantRecord> = if args.level == 1 {
        let model = shared_model(&assignment, &available)?;
        specs.into_iter().map(|spec| spec.assign(&model)).collect()
    } else {
        assign_models(specs, &assignment, &available)?
    };

    let synthesis = if args.synthesis {
        let planner_model = match &args.planner_model {
            Some(model) => model.clone(),
            None => records
                .first()
                .map(|r| r.assigned_model.clone())
                .context("participant list is empty")?,
        };
        Some(SynthesisConfig {
            planner_model,
            planner_guide: StaticPrompts::load_planner_guide(&args.prompts)
                .context("Synthesis needs planner_guide.md")?,
        })
    } else {
        None
    };

    let models = models_in_use(&records, synthesis.as_ref().map(|s| s.planner_model.as_str()));
    let registry = ProviderRegistry::from_config(&llm, &models).context("Cannot create provider clients")?;
    let gateway = Arc::new(Gateway::new(registry, RetryPolicy::default()));
    let store = Arc::new(FileStore::new(&args.output));

    if !args.json {
        let run_name = format!("set {} level {}", args.set_id, args.level);
        println!(
            "{} {} with {} participants, {} rounds",
            "▶".cyan().bold(),
            run_name.as_str().green(),
            records.len(),
            args.rounds
        );
        println!("  {} {}", "Models:".dimmed(), models.join(", "));
        println!();
    }

    let config = args.run_config(synthesis);
    let summary = tokio::select! {
        result = run_debate(config, prompts, records, gateway, store) => result?,
        _ = tokio::signal::ctrl_c() => {
            crate::print_warning("Interrupted; logs up to the last completed phase are on disk");
            anyhow::bail!("run interrupted");
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_summary(&summary);
    println!("{}", "Output:".bold());
    for artifact in Artifact::ALL {
        let path = args.output.join(artifact.file_name(args.set_id, args.level));
        if path.exists() {
            println!("  {} {}", "•".cyan(), path.display());
        }
    }
    println!("  {} {}", "•".cyan(), args.log_path().display());
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.degraded == 0 && summary.skipped_rounds.is_empty() {
        crate::print_success("Debate completed");
    } else {
        crate::print_warning(&format!(
            "Debate completed with {} degraded records and {} skipped rounds",
            summary.degraded,
            summary.skipped_rounds.len()
        ));
    }
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Metric").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let skipped = if summary.skipped_rounds.is_empty() {
        "none".to_string()
    } else {
        summary
            .skipped_rounds
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let degraded_color = if summary.degraded == 0 { Color::Green } else { Color::Yellow };

    table.add_row(vec![Cell::new("Utterances"), Cell::new(summary.utterances)]);
    table.add_row(vec![Cell::new("Think records"), Cell::new(summary.think_records)]);
    table.add_row(vec![
        Cell::new("Degraded records"),
        Cell::new(summary.degraded).fg(degraded_color),
    ]);
    table.add_row(vec![Cell::new("Skipped rounds"), Cell::new(skipped)]);
    table.add_row(vec![
        Cell::new("Model calls"),
        Cell::new(format!(
            "{} ({} retries, {} failed)",
            summary.gateway.calls, summary.gateway.retries, summary.gateway.failures
        )),
    ]);
    table.add_row(vec![
        Cell::new("Tokens"),
        Cell::new(format!(
            "{} prompt ({} cached), {} completion",
            summary.tokens.prompt_tokens, summary.tokens.cached_tokens, summary.tokens.completion_tokens
        )),
    ]);

    if let Some(tally) = &summary.votes {
        table.add_row(vec![
            Cell::new("Votes"),
            Cell::new(format!(
                "{} accept, {} conditional, {} reject, {} no-response",
                tally.accept, tally.conditional_accept, tally.reject, tally.no_response
            )),
        ]);
        let (decision, color) = match summary.adopted() {
            Some(true) => ("adopted", Color::Green),
            Some(false) => ("rejected", Color::Red),
            None => ("undecided", Color::Yellow),
        };
        table.add_row(vec![Cell::new("Compromise"), Cell::new(decision).fg(color)]);
    }

    println!("{table}");
    println!();
}
