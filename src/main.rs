//! niwa - CLI surface.
//!
//! Three modes, matching how the engine is actually operated:
//! - `run` — one wake cycle now (the scheduler invokes this)
//! - `analyze` — selection only: report what would change, touch nothing
//! - `init` — write the default config and template
//!
//! Scheduling itself is external (cron or a systemd timer calls `niwa
//! run`); the engine guarantees no two cycles interleave on one document.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use niwa::config::NiwaConfig;
use niwa::generate::SimGenerator;
use niwa::pipeline::Pipeline;
use niwa::selection::{SelectionDecision, SelectionReason};

#[derive(Parser)]
#[command(name = "niwa", version, about = "A site-tending engine")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "niwa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one wake cycle now.
    Run,
    /// Report which sections would be rewritten, without changing anything.
    Analyze,
    /// Write a default configuration (and template, if the site is empty).
    Init,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "cycle aborted");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Init => init(&cli.config),
        Command::Analyze => {
            let config = NiwaConfig::load(&cli.config)?;
            let pipeline = Pipeline::new(config, SimGenerator::with_seed(0));
            let decision = pipeline.analyze()?;
            print_decision(&decision);
            Ok(())
        }
        Command::Run => {
            let config = NiwaConfig::load(&cli.config)?;
            run_once(config).await
        }
    }
}

/// Write the default config; seed the template only when no document
/// exists yet.
fn init(config_path: &Path) -> anyhow::Result<()> {
    NiwaConfig::write_default(config_path)?;
    println!("wrote {}", config_path.display());

    let config = NiwaConfig::load(config_path)?;
    let index = config.index_path();
    if index.exists() {
        println!("site already present at {}, leaving it alone", index.display());
    } else {
        std::fs::create_dir_all(&config.website.path)?;
        std::fs::write(&index, niwa::DEFAULT_TEMPLATE)?;
        println!("wrote default template to {}", index.display());
    }
    Ok(())
}

#[cfg(feature = "anthropic")]
async fn run_once(config: NiwaConfig) -> anyhow::Result<()> {
    use niwa::generate::AnthropicGenerator;

    let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") else {
        anyhow::bail!("ANTHROPIC_API_KEY is not set; refusing to run with a simulated backend");
    };
    let generator = AnthropicGenerator::new(api_key).with_model(&config.generation.model);
    let pipeline = Pipeline::new(config, generator);
    report(pipeline.run_cycle().await?);
    Ok(())
}

#[cfg(not(feature = "anthropic"))]
async fn run_once(config: NiwaConfig) -> anyhow::Result<()> {
    tracing::warn!("built without a production backend; using the simulation generator");
    let pipeline = Pipeline::new(config, SimGenerator::with_seed(0));
    report(pipeline.run_cycle().await?);
    Ok(())
}

fn report(report: niwa::pipeline::CycleReport) {
    if report.bootstrapped {
        println!("bootstrapped the default template");
    }
    if report.applied.is_empty() {
        println!("no sections changed this cycle");
    } else {
        println!("tended: {}", report.applied.join(", "));
    }
    for (section, reason) in &report.skipped {
        println!("skipped {section}: {reason}");
    }
    if let Some(backup) = &report.backup {
        println!("backup: {}", backup.display());
    }
}

fn print_decision(decision: &SelectionDecision) {
    if decision.is_empty() {
        println!("nothing to tend (no identifiable sections or zero budget)");
        return;
    }
    println!("{} section(s) would be rewritten:", decision.len());
    for choice in decision.iter() {
        let why = match &choice.reason {
            SelectionReason::OperatorMessage { filename } => {
                format!("named by message {filename}")
            }
            SelectionReason::Stale { age_secs: Some(s) } => {
                format!("stale for {:.1} day(s)", *s as f64 / 86_400.0)
            }
            SelectionReason::Stale { age_secs: None } => "never tended".to_string(),
        };
        println!("  {:<24} {:<18} {}", choice.section_id, choice.kind.label(), why);
    }
}

/// Human-readable tracing to stderr; `RUST_LOG` controls the filter.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
