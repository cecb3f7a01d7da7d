use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use kfsearch_cli::{init_logging, load_settings, model_spec};
use kfsearch_core::traits::EncoderLoader;
use kfsearch_embed::CandleEncoderLoader;
use kfsearch_text::{load_annotations, AnnotationIndexer};
use kfsearch_vector::index_build::{build_from_dir, build_from_mapping, build_mapping_json, collect_keyframes};

/// Offline index builder for keyframe search.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the id→path mapping shared by every model
    Mapping {
        /// Keyframe root; defaults to paths.keyframes_dir
        #[clap(long)]
        keyframes: Option<PathBuf>,
        #[clap(short, long)]
        output: PathBuf,
    },
    /// Build vector stores for one or all configured models
    Vectors {
        /// Model id; every configured model when omitted
        #[clap(short, long)]
        model: Option<String>,
        /// Walk this directory and write a fresh mapping instead of reusing
        /// the configured one
        #[clap(long)]
        keyframes: Option<PathBuf>,
    },
    /// Build the caption/OCR/object index from an annotation file
    Annotations {
        #[clap(short, long)]
        input: PathBuf,
        /// Defaults to annotations.text_index_dir
        #[clap(long)]
        index_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let settings = load_settings()?;

    match cli.command {
        Command::Mapping { keyframes, output } => {
            let dir = keyframes
                .or_else(|| settings.paths.keyframes_dir.clone())
                .context("no keyframe directory: pass --keyframes or set paths.keyframes_dir")?;
            let frames = collect_keyframes(&dir);
            anyhow::ensure!(!frames.is_empty(), "no keyframes found under {}", dir.display());
            build_mapping_json(&frames, &output)?;
            println!("Wrote {} keyframes to {}", frames.len(), output.display());
        }
        Command::Vectors { model, keyframes } => {
            let ids: Vec<String> = match model {
                Some(id) => vec![id],
                None => settings.models.keys().cloned().collect(),
            };
            anyhow::ensure!(!ids.is_empty(), "no models configured");
            let loader = CandleEncoderLoader::from_env();
            for id in ids {
                let spec = model_spec(&settings, &id)?;
                let encoder = loader.load(&id, spec)?;
                info!(model = %id, vectors = %spec.vector_path.display(), "building vector store");
                let stats = match keyframes.as_deref() {
                    Some(dir) => build_from_dir(encoder.as_ref(), dir, &spec.vector_path, &spec.mapping_path)?,
                    None => build_from_mapping(encoder.as_ref(), &spec.mapping_path, &spec.vector_path)?,
                };
                println!("{}: {} vectors of dimension {} -> {}", id, stats.num_vectors, stats.dimension, spec.vector_path.display());
            }
        }
        Command::Annotations { input, index_dir } => {
            let dir = index_dir
                .or_else(|| settings.annotations.text_index_dir.clone())
                .context("no index directory: pass --index-dir or set annotations.text_index_dir")?;
            let annotations = load_annotations(&input)?;
            let count = AnnotationIndexer::create_in_dir(&dir)?.index(&annotations)?;
            println!("Indexed {} annotated keyframes into {}", count, dir.display());
        }
    }
    Ok(())
}
