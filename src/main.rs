use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use perfcheck::config::{Config, ConfigOverrides};
use perfcheck::gather::{cutoff_from_weeks, GatherService};
use perfcheck::output::json::{json_report, render_json};
use perfcheck::output::table::render_findings_table;
use perfcheck::output::text::render_text_report;
use perfcheck::reconcile::reconcile;
use perfcheck::sources::cedar::CedarClient;
use perfcheck::sources::evergreen::EvergreenClient;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "perfcheck",
    about = "Compare Evergreen and Cedar performance results for a build"
)]
struct Cli {
    #[arg(long = "build-id")]
    build_id: String,
    #[arg(short, long)]
    verbose: bool,
    #[arg(long = "weeks-back")]
    weeks_back: Option<u32>,
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        weeks_back: cli.weeks_back,
    });

    let credentials = config.credentials();
    let evergreen = EvergreenClient::with_host(config.evergreen.host.as_str(), &credentials)?;
    let cedar = CedarClient::with_host(config.cedar.host.as_str(), &credentials)?;
    let cutoff = cutoff_from_weeks(Utc::now(), config.gather.weeks_back)?;

    let service = GatherService::new(Arc::new(evergreen), Arc::new(cedar), cutoff)
        .with_skip_tasks(config.gather.skip_tasks.iter().cloned());
    let data = service.gather_build(&cli.build_id).await?;

    let result = reconcile(&data.task_runner, &data.rollup, &config.reconcile_options())?;
    if result.summary.is_clean() {
        info!(
            floor = result.floor,
            correct = result.summary.correct,
            "task runner and rollup results agree"
        );
    } else {
        warn!(
            floor = result.floor,
            findings = result.findings.len(),
            "task runner and rollup results disagree"
        );
    }

    match cli.output {
        OutputFormat::Text => print!(
            "{}",
            render_text_report(&result, &data.task_runner, &data.revisions)
        ),
        OutputFormat::Table => print!("{}", render_findings_table(&result, &data.revisions)),
        OutputFormat::Json => println!("{}", render_json(&json_report(&result, &data.revisions))?),
    }

    Ok(())
}

/// Filter used when `RUST_LOG` is unset.
fn default_log_directive(verbose: bool) -> &'static str {
    if verbose {
        "perfcheck=debug"
    } else {
        "perfcheck=info"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_directive(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
