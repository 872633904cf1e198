#![recursion_limit = "256"]

use clap::Parser;
use std::path::PathBuf;
use traffic_signs::backend::{InnerBackend, default_device};
use traffic_signs::core::inference::InferenceEngine;

/// Classify images with a model saved by `train`
#[derive(Debug, Parser)]
#[command(name = "predict", version)]
struct Args {
    /// Path the model was saved to, without the `.mpk` extension
    model_path: String,

    /// Images to classify
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn main() {
    let args = Args::parse();

    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .pretty()
        .with_thread_ids(true)
        .with_max_level(tracing::Level::INFO)
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let device = default_device();
    let engine = InferenceEngine::<InnerBackend>::load(&args.model_path, &device)?;

    tracing::info!(
        message = "Model loaded",
        architecture = %engine.manifest.architecture.name,
        model_path = %args.model_path,
    );

    for image in &args.images {
        let prediction = engine.predict_file(image)?;
        println!(
            "{}: {} ({:.4})",
            image.display(),
            prediction.category,
            prediction.confidence
        );
    }

    Ok(())
}
