use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use studydb_answer::{Answer, Engine, SourceOrigin};
use studydb_core::config::Config;
use studydb_vector::build_progress_bar;

/// Ask course questions against a local document collection.
#[derive(Debug, Parser)]
#[command(name = "studydb", version)]
struct Cli {
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer a question from the indexed documents or the curated knowledge base.
    Ask {
        question: String,
        /// Restrict retrieval to one subject (e.g. Electricity).
        #[arg(long, short)]
        subject: Option<String>,
    },
    /// Re-ingest files or directories and replace the index.
    Reload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show index and cache statistics.
    Stats,
    /// List suggested questions from the curated knowledge base.
    Suggest {
        #[arg(long, short)]
        subject: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    let engine = Engine::new(settings)?;

    match cli.command {
        Command::Ask { question, subject } => {
            let answer = engine.ask(&question, subject.as_deref()).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Command::Reload { paths } => {
            let progress = if cli.json { indicatif::ProgressBar::hidden() } else { build_progress_bar(0) };
            let report = engine.reload_with_progress(&paths, progress).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "✅ Indexed {} documents ({} chunks), index v{}",
                    report.documents_indexed, report.chunks_indexed, report.index_version
                );
                for skipped in &report.skipped {
                    println!("⚠️  skipped {skipped}");
                }
            }
        }
        Command::Stats => {
            let stats = engine.stats();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("documents:      {}", stats.documents);
                println!("chunks:         {}", stats.chunks);
                println!("index ready:    {}", stats.index_ready);
                println!("model version:  {}", stats.model_version);
                println!("index version:  {}", stats.index_version);
                println!("cached answers: {}", stats.cached_answers);
                println!("generator:      {}", stats.generator);
                if let Some(warning) = &stats.warning {
                    println!("warning:        {warning}");
                }
            }
        }
        Command::Suggest { subject } => {
            let questions = engine.suggested_questions(subject.as_deref());
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&questions)?);
            } else {
                for q in questions {
                    println!("- {q}");
                }
            }
        }
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}\n", answer.answer);
    println!("confidence: {:.2} ({:?}, {} ms)", answer.confidence, answer.kind, answer.processing_time_ms);
    if answer.sources.is_empty() {
        return;
    }
    println!("sources:");
    for (i, source) in answer.sources.iter().enumerate() {
        let origin = match &source.origin {
            SourceOrigin::Document { document_id, offset, .. } => format!("{document_id} @{offset}"),
            SourceOrigin::Fallback { entry_id } => format!("knowledge base: {entry_id}"),
        };
        println!("  {}. [{}] {} ({:.2})", i + 1, source.subject, origin, source.score);
        println!("     {}", source.excerpt);
    }
}
