use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lc_ai::derivatives::add_derivatives;
use lc_ai::embeddings::ollama_embed::OllamaEmbedder;
use lc_ai::llm::ollama_llm::OllamaLlm;
use lc_ai::ollama::OllamaClient;
use lc_ai::pipeline::QuestionIndex;
use lc_ai::retrieve::{format_results, SearchOptions};
use lc_ai::scenario::ScenarioGenerator;
use lc_ai::structure::TranscriptStructurer;
use lc_core::config::AppConfig;
use lc_core::dataset::save_dataset;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hoeren", about = "Retrieval over German A1 listening comprehension questions")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "hoeren.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print results as pretty JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index if the dataset changed (or always, with --force)
    Index {
        #[arg(long)]
        force: bool,
    },
    /// Find dialogues and statements similar to a query
    Search {
        query: String,
        /// Maximum number of results (overrides config)
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
        /// Drop results scoring at or below this value (overrides config)
        #[arg(long)]
        threshold: Option<f32>,
        /// Exclude generated variations
        #[arg(long)]
        originals_only: bool,
    },
    /// List dataset questions for a topic
    Topic { topic: String },
    /// Show entry counts and index status
    Stats,
    /// Generate variations of every dataset question
    Derive {
        #[arg(long, default_value_t = 3)]
        variations: usize,
    },
    /// Generate a three-part practice exam for a topic
    Scenario { topic: String },
    /// Turn a listening-test transcript into a dataset file
    Structure {
        /// Plain-text transcript
        transcript: PathBuf,
        /// Where to write the dataset (defaults to the configured dataset path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check that the local Ollama instance answers
    Health,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn open_index(cfg: &AppConfig, client: &OllamaClient) -> anyhow::Result<QuestionIndex> {
    let embedder = OllamaEmbedder::new(client.clone())
        .with_timeout(Duration::from_secs(cfg.ollama.timeout_secs));
    QuestionIndex::from_config(cfg, Arc::new(embedder))
        .with_context(|| format!("opening index at {}", cfg.index_dir.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let cfg = AppConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let client = OllamaClient::new(&cfg.ollama.base_url)?;
    let llm_timeout = Duration::from_secs(cfg.ollama.timeout_secs);

    match cli.command {
        Commands::Index { force } => {
            let index = open_index(&cfg, &client)?;
            let rebuilt = if force {
                index.rebuild()?;
                true
            } else {
                index.ensure_fresh()?
            };
            let status = index.status()?;
            info!(rebuilt, entries = status.entry_count, "index ready");
            print(cli.json, &status, || {
                let verb = if rebuilt { "Rebuilt" } else { "Index is up to date:" };
                format!("{verb} {} entries", status.entry_count)
            })?;
        }
        Commands::Search {
            query,
            max_results,
            threshold,
            originals_only,
        } => {
            let index = open_index(&cfg, &client)?;
            let opts = SearchOptions {
                max_results: max_results.unwrap_or(cfg.search.max_results),
                similarity_threshold: threshold.or(cfg.search.similarity_threshold),
                include_derivatives: !originals_only,
                oversample: cfg.search.oversample,
            };
            let results = index.search(&query, &opts)?;
            print(cli.json, &results, || format_results(&results))?;
        }
        Commands::Topic { topic } => {
            let index = open_index(&cfg, &client)?;
            let records = index.questions_for_topic(&topic)?;
            print(cli.json, &records, || {
                if records.is_empty() {
                    return format!("No questions found for topic '{topic}'.");
                }
                records
                    .iter()
                    .map(|r| {
                        let answer = r.correct_answer.as_deref().unwrap_or("-");
                        format!("Teil {}: {}\n{}\n  Antwort: {answer}\n", r.part, r.question, r.text)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Commands::Stats => {
            let index = open_index(&cfg, &client)?;
            let stats = index.collection_stats()?;
            let status = index.status()?;
            let value = serde_json::json!({ "collection": stats, "index": status });
            print(cli.json, &value, || {
                format!(
                    "Total entries: {}\nOriginal: {}\nDerivative: {}\nModel: {}\nLast indexed: {}",
                    stats.total,
                    stats.original,
                    stats.derivative,
                    status.model.as_deref().unwrap_or("-"),
                    status.last_indexed_at.as_deref().unwrap_or("never"),
                )
            })?;
        }
        Commands::Derive { variations } => {
            let index = open_index(&cfg, &client)?;
            index.ensure_fresh()?;
            let llm = OllamaLlm::new(client.clone()).with_timeout(llm_timeout);
            let report = add_derivatives(index.store(), &llm, &cfg.ollama.llm_model, variations)?;
            print(cli.json, &report, || {
                format!(
                    "Added {} derivative entries ({} questions, {} already derived, {} failed)",
                    report.added, report.seeds, report.skipped_existing, report.failed
                )
            })?;
        }
        Commands::Scenario { topic } => {
            let index = open_index(&cfg, &client)?;
            index.ensure_fresh()?;
            let llm = OllamaLlm::new(client.clone()).with_timeout(llm_timeout);
            let scenarios = ScenarioGenerator::new(&llm, cfg.ollama.llm_model.clone())
                .generate(index.store(), &topic)?;
            print(cli.json, &scenarios, || {
                scenarios
                    .iter()
                    .map(|s| {
                        let options = s
                            .options
                            .iter()
                            .enumerate()
                            .map(|(i, o)| {
                                let mark = if i == s.correct_index { "*" } else { " " };
                                format!("  {mark} {o}")
                            })
                            .collect::<Vec<_>>()
                            .join("\n");
                        format!("Teil {}\n{}\n{}\n{options}\n", s.part, s.dialogue, s.question)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Commands::Structure { transcript, output } => {
            let text = std::fs::read_to_string(&transcript)
                .with_context(|| format!("reading transcript {}", transcript.display()))?;
            let llm = OllamaLlm::new(client.clone()).with_timeout(llm_timeout);
            let dataset = TranscriptStructurer::new(&llm, cfg.ollama.llm_model.clone()).structure(&text)?;
            let output = output.unwrap_or_else(|| cfg.dataset_path.clone());
            save_dataset(&output, &dataset)?;
            let value = serde_json::json!({
                "path": output.display().to_string(),
                "parts": dataset.parts.len(),
                "questions": dataset.question_count(),
            });
            print(cli.json, &value, || {
                format!(
                    "Wrote {} questions in {} parts to {}",
                    dataset.question_count(),
                    dataset.parts.len(),
                    output.display()
                )
            })?;
        }
        Commands::Health => {
            client.health_check()?;
            let value = serde_json::json!({ "ok": true, "base_url": client.base_url() });
            print(cli.json, &value, || format!("Ollama is reachable at {}", client.base_url()))?;
        }
    }

    Ok(())
}
