//! # delve-cli
//!
//! The `delve` binary: submit a deep-research job, follow its lifecycle,
//! and save the synthesized report as markdown.
//!
//! Logging goes to stderr only — stdout carries the user-facing output.

#![deny(unsafe_code)]

mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use delve_core::{ResearchOptions, SessionState};
use delve_research::{OpenAiConfig, OpenAiResearcher};
use delve_runtime::{Orchestrator, OrchestratorConfig};
use delve_settings::DelveSettings;
use delve_store::{FsResultStore, ResultStore};

/// Comprehensive research from the command line.
#[derive(Parser, Debug)]
#[command(
    name = "delve",
    about = "Deep research via a remote synthesis engine",
    version
)]
struct Cli {
    /// The research question or topic to investigate.
    query: String,

    /// Output file path (e.g. research.md).
    #[arg(short, long)]
    output: PathBuf,

    /// Synthesis model to use (defaults to the configured model).
    #[arg(long)]
    model: Option<String>,

    /// Output format preference (flexible, e.g. "executive summary").
    #[arg(long)]
    format: Option<String>,

    /// Background context for the research query.
    #[arg(long)]
    context: Option<String>,

    /// Source focus: academic, business, news, reports, technical, or any
    /// custom description.
    #[arg(long)]
    focus: Option<String>,

    /// Use synchronous mode instead of background mode.
    #[arg(long)]
    sync: bool,

    /// Disable prompt enhancement with the intermediate model.
    #[arg(long)]
    no_enhance: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize the stderr tracing subscriber.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "delve=debug,info" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Map CLI flags onto the opaque options snapshot.
fn build_options(cli: &Cli) -> ResearchOptions {
    ResearchOptions {
        context: cli.context.clone(),
        focus: cli.focus.clone(),
        format: cli.format.clone(),
        model: cli.model.clone(),
        enhance: !cli.no_enhance,
        ..ResearchOptions::default()
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Clip a query for log lines.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_owned()
    } else {
        let clipped: String = s.chars().take(max_chars).collect();
        format!("{clipped}...")
    }
}

async fn run(cli: Cli, settings: DelveSettings) -> Result<i32> {
    let Some(api_key) = settings.research.api_key.clone() else {
        bail!(
            "OPENAI_API_KEY environment variable is required\n\n\
             Set your API key:\n  export OPENAI_API_KEY=your-key-here"
        );
    };

    let background = settings.research.background && !cli.sync;
    let research_config = OpenAiConfig {
        api_key,
        base_url: settings.research.base_url.clone(),
        model: settings.research.model.clone(),
        enhance_model: settings.research.enhance_model.clone(),
        background,
        poll_interval: Duration::from_secs(settings.research.poll_interval_secs),
    };

    let model = cli
        .model
        .clone()
        .unwrap_or_else(|| settings.research.model.clone());

    let researcher = Arc::new(OpenAiResearcher::new(research_config));
    let store = Arc::new(FsResultStore::new(settings.storage.reports_dir.clone()));
    let orchestrator = Orchestrator::new(
        researcher,
        store.clone(),
        OrchestratorConfig::from(&settings.orchestrator),
    );

    info!(query = %truncate(&cli.query, 100), %model, "starting research session");
    if background {
        info!("using background mode (research may take 5-20 minutes)");
    }

    let id = orchestrator.start(cli.query.clone(), build_options(&cli))?;

    // Follow lifecycle notifications while waiting.
    let mut events = orchestrator.subscribe(Some(id.clone()));
    let progress = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            info!(event = event.event_type(), "session update");
            if event.is_terminal() {
                break;
            }
        }
    });

    let record = tokio::select! {
        record = orchestrator.wait(&id) => record?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupt received, cancelling session");
            let _ = orchestrator.cancel(&id);
            orchestrator.wait(&id).await?
        }
    };
    progress.abort();

    match record.state {
        SessionState::Completed => {
            let location = record
                .result_location
                .context("completed session is missing a result location")?;
            let artifact = store.get(&location).await?;

            let generated_at = record.ended_at.unwrap_or_else(Utc::now);
            let rendered = report::render(&cli.query, &model, generated_at, &artifact);

            ensure_parent_dir(&cli.output)?;
            std::fs::write(&cli.output, rendered)
                .with_context(|| format!("Failed to write {}", cli.output.display()))?;

            println!("Research completed successfully.");
            println!("Results saved to: {}", cli.output.display());
            Ok(0)
        }
        SessionState::Failed => {
            let failure = record
                .error
                .map_or_else(|| "unknown failure".to_owned(), |f| f.to_string());
            eprintln!("Research failed: {failure}");
            Ok(1)
        }
        SessionState::Cancelled => {
            eprintln!("Research cancelled.");
            Ok(130)
        }
        SessionState::Queued | SessionState::Running => {
            bail!("session ended in non-terminal state {}", record.state)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = delve_settings::load_settings().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load settings, using defaults");
        DelveSettings::default()
    });

    let code = run(cli, settings).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
