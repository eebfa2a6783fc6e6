use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inkcheck::shape::render;
use inkcheck::{AssessmentConfig, AssessmentEngine, BuiltinModel, EmbedderKind, EvaluationMode, ModelManager};
use log::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Template root directory (overrides the configuration)
    #[arg(long, global = true)]
    templates: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Embedding provider: onnx or pixel-grid
    #[arg(long, global = true)]
    embedder: Option<EmbedderKind>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assess one drawing and print the result as JSON
    Assess {
        /// alphabet, digit-argmax, digit-verify, sentence or shape
        #[arg(long)]
        mode: EvaluationMode,
        /// Expected letter, digit, sentence id or shape
        #[arg(long)]
        expected: String,
        image: PathBuf,
    },
    /// Write canonical shape references into a directory
    RenderShapes { dir: PathBuf },
    /// Download and verify the image encoder model
    Download {
        /// Force a fresh download of the model files
        #[arg(short, long)]
        fresh: bool,
    },
}

fn load_config(args: &Args) -> Result<AssessmentConfig> {
    let mut config = match &args.config {
        Some(path) => AssessmentConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AssessmentConfig::from_env()?,
    };
    if let Some(root) = &args.templates {
        config.template_root = root.clone();
    }
    if let Some(embedder) = args.embedder {
        config.embedder = embedder;
    }
    Ok(config)
}

async fn download(config: &AssessmentConfig, fresh: bool) -> Result<()> {
    let manager = match &config.model_dir {
        Some(dir) => ModelManager::new(dir)?,
        None => ModelManager::new_default()?,
    };
    let model = BuiltinModel::ClipVitB32;

    if fresh {
        info!("Fresh download requested - removing any existing model files...");
        manager.remove_download(model)?;
    }
    manager.ensure_model_downloaded(model).await?;
    println!("{}", manager.get_model_path(model).display());
    Ok(())
}

fn assess(config: AssessmentConfig, mode: EvaluationMode, expected: &str, image: &Path) -> Result<()> {
    let bytes = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;

    let start_time = Instant::now();
    let engine = AssessmentEngine::new(config);
    engine.warm_up().context("warming up the assessment engine")?;
    info!("Engine ready in {:?}", start_time.elapsed());

    let start_time = Instant::now();
    let result = engine.assess_bytes(&bytes, expected, mode)?;
    info!("Assessment took {:?}", start_time.elapsed());

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;

    match args.command {
        Command::Assess { mode, expected, image } => {
            // warm-up and classification block; keep them off the async workers
            tokio::task::spawn_blocking(move || assess(config, mode, &expected, &image)).await??
        }
        Command::RenderShapes { dir } => {
            for path in render::write_canonical_shapes(&dir)? {
                println!("{}", path.display());
            }
        }
        Command::Download { fresh } => download(&config, fresh).await?,
    }
    Ok(())
}
