#![recursion_limit = "256"]

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{Level, instrument};
use traffic_signs::backend::{Backend, default_device};
use traffic_signs::config::Overrides;
use traffic_signs::core::architecture::Architecture;
use traffic_signs::core::dataset::SignDataset;
use traffic_signs::core::ingestion::{ImageFolder, Ingestable};
use traffic_signs::core::sweep::{self, Sweep};
use traffic_signs::core::train_config::{Loss, TrainConfig};
use traffic_signs::core::zoo;
use traffic_signs::report;

/// Train every candidate architecture on one shared split and compare their test accuracy
#[derive(Debug, Parser)]
#[command(name = "validation", version)]
struct Args {
    /// Directory with one numerically named subdirectory of images per category
    data_directory: PathBuf,

    /// Write the comparison to this file instead of stdout
    output_filename: Option<PathBuf>,

    /// Number of passes over the training subset per architecture
    #[arg(long)]
    epochs: Option<usize>,

    /// Samples per optimizer step
    #[arg(long)]
    batch_size: Option<usize>,

    /// Adam learning rate
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Fraction of the samples held out for evaluation
    #[arg(long)]
    test_size: Option<f64>,

    /// Objective minimized during fitting
    #[arg(long, value_enum)]
    loss: Option<Loss>,

    /// JSON file with the architectures to compare instead of the built-in candidates
    #[arg(long)]
    architectures: Option<PathBuf>,

    /// Log per-epoch progress
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            test_size: self.test_size,
            loss: self.loss,
        }
    }
}

fn main() {
    let args = Args::parse();

    dotenv::dotenv().ok();

    // Log diagnostics to stderr, stdout may carry the report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .pretty()
        .with_thread_ids(true)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = args
        .overrides()
        .or(Overrides::from_env()?)
        .apply(TrainConfig::sweep())?;

    let architectures = match &args.architectures {
        Some(path) => Architecture::load_all(path)?,
        None => zoo::architectures(),
    };
    let sweep = Sweep::new(architectures, config.clone())?;

    let (training, test) = prepare(&args.data_directory, &config)?;

    let device = default_device();
    let mut out = report::open(args.output_filename.as_deref())?;
    let results = sweep.run::<Backend>(&device, &training, &test, &mut out, &mut rand::rng())?;

    if let Some(best) = sweep::best(&results) {
        tracing::info!(
            message = "Sweep complete",
            best = %best.name,
            accuracy = best.accuracy,
        );
    }

    Ok(())
}

#[instrument(level = "info", skip(config))]
fn prepare(
    data_directory: &Path,
    config: &TrainConfig,
) -> anyhow::Result<(SignDataset, SignDataset)> {
    let dataset =
        ImageFolder::new(data_directory, config.geometry, config.num_categories).ingest()?;

    // Unseeded, every run draws a new partition
    let (training, test) = dataset.split(config.test_size, &mut rand::rng())?;

    tracing::info!(
        message = "Dataset split",
        training = training.items().len(),
        test = test.items().len(),
    );

    Ok((training, test))
}
