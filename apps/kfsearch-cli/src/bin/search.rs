use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use kfsearch_cli::{init_logging, load_settings};
use kfsearch_core::types::{ImageInput, SearchQuery};
use kfsearch_embed::CandleEncoderLoader;
use kfsearch_hybrid::{ModelRegistry, QueryOrchestrator, SearchRequest, SearchResponse};

/// Query the keyframe indexes.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fused search over the selected models and auxiliary sources
    Search {
        /// Free-text query
        text: Option<String>,
        /// Query image
        #[clap(long)]
        image: Option<PathBuf>,
        /// Text expected to appear on screen
        #[clap(long)]
        ocr: Option<String>,
        /// Model id, repeatable; every loaded model when omitted
        #[clap(short, long = "model")]
        models: Vec<String>,
        /// Detected-object label filter, repeatable
        #[clap(short, long = "object")]
        objects: Vec<String>,
        /// Results requested from each source
        #[clap(short = 'k', long)]
        top_k: Option<usize>,
        /// Maximum number of fused results to print
        #[clap(short, long)]
        limit: Option<usize>,
        /// Print the JSON response instead of a table
        #[clap(long, default_value = "false")]
        json: bool,
    },
    /// Loaded models, their index sizes, and models that failed to load
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let settings = load_settings()?;
    let database_dir = settings.paths.database_dir.clone();
    let loader = Arc::new(CandleEncoderLoader::from_env());
    let registry = Arc::new(tokio::task::spawn_blocking(move || ModelRegistry::init(settings, loader)).await?);

    match cli.command {
        Command::Search { text, image, ocr, models, objects, top_k, limit, json } => {
            let models = if models.is_empty() { registry.available_models() } else { models };
            let request = SearchRequest {
                query: SearchQuery { text, image: image.map(ImageInput::Path), ocr_text: ocr },
                models,
                object_filters: objects,
                top_k,
                result_limit: limit,
            };
            let orchestrator = QueryOrchestrator::new(registry.clone());
            let outcome = orchestrator.handle_search(&request).await?;
            let response = SearchResponse::from_outcome(&request, &outcome, database_dir.as_deref());

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else if let Some(message) = &response.search_info.message {
                println!("{}", message);
            } else {
                println!("{} results from [{}]", response.paths.len(), response.search_info.sources.join(", "));
                if !response.search_info.degraded_sources.is_empty() {
                    println!("degraded: [{}]", response.search_info.degraded_sources.join(", "));
                }
                if response.search_info.filters_skipped {
                    println!("object filters skipped: no detection catalog loaded");
                }
                for (i, (path, score)) in response.paths.iter().zip(&response.scores).enumerate() {
                    println!("{:>4}. {:.6}  {}", i + 1, score, path);
                }
            }
        }
        Command::Stats => {
            let snapshot = registry.snapshot()?;
            for id in snapshot.available_models() {
                if let Some(model) = snapshot.model(&id) {
                    let stats = model.index.stats();
                    println!("{:<16} {:>10} vectors  dim {}", id, stats.num_vectors, stats.dimension);
                }
            }
            for (id, reason) in snapshot.unavailable_models() {
                println!("{:<16} not loaded: {}", id, reason);
            }
            let aux: Vec<&str> = snapshot.auxiliary_sources().iter().map(|s| s.name()).collect();
            println!("auxiliary sources: [{}]", aux.join(", "));
            println!("object filters: {}", if snapshot.catalog().is_some() { "enabled" } else { "disabled" });
        }
    }
    registry.shutdown();
    Ok(())
}
