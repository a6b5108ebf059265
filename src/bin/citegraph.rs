use std::path::PathBuf;

use clap::{Parser, Subcommand};
use citegraph::retrieval::{ContextMode, PipelineResult, RetrievedEvidence};
use citegraph::{CitegraphConfig, CitegraphError, GraphRagPipeline};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "citegraph")]
#[command(author, version, about = "Graph-grounded work intake with verified citations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (yaml, toml or json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Graph snapshot (JSON) to use instead of HelixDB
    #[arg(short, long, global = true)]
    graph: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one or more intake requests
    Answer {
        /// Request text; several may be given
        #[arg(required = true)]
        queries: Vec<String>,
        /// Context mode
        #[arg(short, long, value_enum, default_value_t)]
        mode: ContextMode,
        /// Queries in flight at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Show the evidence retrieved for a request
    Evidence {
        /// Request text
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,citegraph=info")))
        .init();

    let cli = Cli::parse();
    let config = CitegraphConfig::load(cli.config.as_deref())?;
    let pipeline = GraphRagPipeline::from_config(config, cli.graph.as_deref())?;

    match cli.command {
        Commands::Answer {
            queries,
            mode,
            concurrency,
        } => {
            let results = pipeline.run_many(&queries, mode, concurrency).await;
            let mut failures = 0;
            for (query, result) in queries.iter().zip(results) {
                match result {
                    Ok(result) => print_answer(&result, cli.format)?,
                    Err(e) => {
                        failures += 1;
                        report_failure(query, &e);
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} of {} queries failed", queries.len());
            }
        }
        Commands::Evidence { query } => {
            let evidence = pipeline.retrieve(&query).await?;
            print_evidence(&evidence, cli.format)?;
        }
    }

    Ok(())
}

fn print_answer(result: &PipelineResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            println!("# {}", result.query);
            println!("{}", result.output);
            println!();
            println!(
                "nodes={} edges={} evidence=[{}] stage={} regenerated={} latency={}ms",
                result.num_nodes,
                result.num_edges,
                result.evidence_ids.join(", "),
                result.final_stage,
                result.was_regenerated,
                result.latency_ms
            );
            if !result.invalid_citations.is_empty() {
                println!("invalid citations in first answer: {}", result.invalid_citations.join(", "));
            }
        }
    }
    Ok(())
}

fn print_evidence(evidence: &RetrievedEvidence, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(evidence)?),
        OutputFormat::Text => {
            println!("{}", evidence.evidence.context);
            println!();
            println!(
                "seeds={} visited={} kept={} pruned={} failed_fetches={}",
                evidence.seeds.len(),
                evidence.traversal.nodes_visited,
                evidence.nodes.len(),
                evidence.pruned_nodes,
                evidence.traversal.failed_fetches
            );
        }
    }
    Ok(())
}

fn report_failure(query: &str, err: &CitegraphError) {
    error!("Query '{}' failed: {}", query, err);
    if let Some(context) = err.partial_context() {
        eprintln!("Evidence assembled before the failure:\n{context}");
    }
}
