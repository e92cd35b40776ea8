use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod config;
mod db;
mod error;
mod evaluator;
mod export;
mod models;
mod pipeline;
mod report;
mod throttle;
mod transcripts;

use config::EvaluatorConfig;
use db::{DateWindow, WindowPreset};
use error::EvalError;
use evaluator::HttpEvaluator;
use pipeline::{Progress, ScoreObserver};
use throttle::RateLimit;

#[derive(Parser)]
#[command(name = "smart-review")]
#[command(about = "Score conversation transcripts with a language model and summarise the results", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull transcripts for one bot from the warehouse
    #[command(group(
        ArgGroup::new("range")
            .args(["window", "start"])
            .multiple(false)
    ))]
    Fetch {
        #[arg(long, default_value = "SupportBot")]
        bot_name: String,
        #[arg(long, value_enum)]
        window: Option<WindowPreset>,
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
        /// Write the built-in demo transcripts instead of querying the warehouse
        #[arg(long)]
        sample: bool,
        #[arg(long, default_value = "transcripts.json")]
        out: PathBuf,
    },
    /// Score every conversation in a CSV or JSON transcript file
    Score {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "scores.json")]
        out: PathBuf,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        min_interval_ms: Option<u64>,
        #[arg(long)]
        max_chars: Option<usize>,
    },
    /// Generate a markdown dashboard from a score file
    Report {
        #[arg(long, default_value = "scores.json")]
        scores: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export a score file as a single JSON blob
    Export {
        #[arg(long, default_value = "scores.json")]
        scores: PathBuf,
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        key: Option<String>,
    },
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct ConsoleObserver;

impl ScoreObserver for ConsoleObserver {
    fn on_progress(&mut self, progress: Progress) {
        eprintln!(
            "Processed conversation {} of {} ({:.0}%)",
            progress.processed,
            progress.total,
            progress.fraction() * 100.0
        );
    }

    fn on_skipped(&mut self, conversation_id: &str, error: &EvalError) {
        eprintln!("Skipped {conversation_id}: {error}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Fetch {
            bot_name,
            window,
            start,
            end,
            sample,
            out,
        } => {
            let rows = if sample {
                transcripts::sample_rows(Utc::now())
            } else {
                let window = match (start, end) {
                    (Some(start), Some(end)) => DateWindow::custom(start, end)?,
                    _ => DateWindow::preset(window.unwrap_or(WindowPreset::Last24Hours), Utc::now()),
                };
                let database_url = std::env::var("DATABASE_URL")
                    .context("DATABASE_URL must be set to the transcript warehouse")?;
                let pool = db::connect(&database_url).await?;
                db::fetch_transcripts(&pool, &bot_name, window).await?
            };

            transcripts::save_transcripts(&out, &rows)?;
            println!("Loaded {} transcripts into {}.", rows.len(), out.display());
        }
        Commands::Score {
            input,
            out,
            model,
            min_interval_ms,
            max_chars,
        } => {
            let rows = transcripts::load_transcripts(&input)?;
            if rows.is_empty() {
                export::save_scores(&out, &[])?;
                println!(
                    "No transcripts found in {}; cleared {}.",
                    input.display(),
                    out.display()
                );
                return Ok(());
            }

            let mut config = EvaluatorConfig::from_env();
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(ms) = min_interval_ms {
                config.min_interval = Duration::from_millis(ms);
            }
            if let Some(max_chars) = max_chars {
                config.max_chars = max_chars;
            }

            let run = pipeline::score_transcripts(
                &rows,
                || HttpEvaluator::connect(&config, RateLimit::new(config.min_interval)),
                &mut ConsoleObserver,
            )
            .await?;

            export::save_scores(&out, &run.records)?;
            println!("{}", run.summary_line());
            if !run.skipped.is_empty() {
                let ids: Vec<String> = run
                    .skipped
                    .iter()
                    .map(|s| format!("{} ({})", s.conversation_id, s.error.kind()))
                    .collect();
                println!("Skipped conversations: {}", ids.join(", "));
            }

            match report::mean_scores(&run.records) {
                Some(means) => {
                    println!("Mean scores:");
                    println!("- satisfaction {:.2}", means.satisfaction);
                    println!("- accuracy {:.2}", means.accuracy);
                    println!("- relevancy {:.2}", means.relevancy);
                    println!("- containment {:.2}", means.containment);
                }
                None => println!("No conversations were scored."),
            }
            println!("Scores written to {}.", out.display());
        }
        Commands::Report { scores, out } => {
            let records = export::load_scores(&scores)?;
            let report = report::build_report(&records);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { scores, dir, key } => {
            let records = export::load_scores(&scores)?;
            if records.is_empty() {
                println!("No scores available in {}.", scores.display());
                return Ok(());
            }
            let key = key.unwrap_or_else(|| export::default_export_key(Utc::now()));
            let sink = export::DirectorySink::new(dir);
            let location = export::export_scores(&sink, &key, &records)?;
            println!("Exported {} scores to {}.", records.len(), location);
        }
    }

    Ok(())
}
