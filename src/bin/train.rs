#![recursion_limit = "256"]

use burn::module::AutodiffModule;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{Level, instrument};
use traffic_signs::backend::{Backend, default_device};
use traffic_signs::config::Overrides;
use traffic_signs::core::dataset::SignDataset;
use traffic_signs::core::inference::{self, ModelManifest};
use traffic_signs::core::ingestion::{ImageFolder, Ingestable};
use traffic_signs::core::metrics::{ClassificationReport, ConfusionMatrix};
use traffic_signs::core::train::{Evaluation, evaluate, fit};
use traffic_signs::core::train_config::{Loss, TrainConfig};
use traffic_signs::core::zoo;
use traffic_signs::report::{self, mosaic};

/// Train the deployment classifier, report per-category scores and save the model
#[derive(Debug, Parser)]
#[command(name = "train", version)]
struct Args {
    /// Directory with one numerically named subdirectory of images per category
    #[arg(default_value = "gtsrb")]
    data_directory: PathBuf,

    /// Where to save the trained model, `.mpk` is appended
    #[arg(default_value = "model")]
    model_path: String,

    /// Where to write the classification report and confusion matrix
    #[arg(default_value = "classification_report.txt")]
    report_path: PathBuf,

    /// Directory for the confusion matrix and prediction mosaics
    #[arg(long, default_value = ".")]
    figures: PathBuf,

    /// Number of passes over the training subset
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

    /// Log per-epoch progress
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    dotenv::dotenv().ok();

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
    let cli = Overrides {
        epochs: args.epochs,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        test_size: args.test_size,
        loss: args.loss,
    };
    let config = cli
        .or(Overrides::from_env()?)
        .apply(TrainConfig::deployment())?;

    let dataset = ImageFolder::new(&args.data_directory, config.geometry, config.num_categories)
        .ingest()?;
    let (training, test) = dataset.split(config.test_size, &mut rand::rng())?;

    let (manifest, evaluation) = train(&args.model_path, config, &training, &test)?;
    let matrix = ConfusionMatrix::new(
        manifest.train_config.num_categories,
        &test.labels(),
        &evaluation.predictions,
    )?;

    let scores = ClassificationReport::new(&matrix);
    report::write_classification(&mut report::open(None)?, &scores, &matrix)?;

    let mut file = report::open(Some(&args.report_path))?;
    report::write_classification(&mut file, &scores, &matrix)?;
    println!("Report written to {}", args.report_path.display());

    render_figures(&args.figures, &test, &evaluation, &matrix)?;

    println!(
        "Model {} saved to {}.mpk",
        manifest.architecture.name, args.model_path
    );
    Ok(())
}

#[instrument(level = "info", skip(config, training, test))]
fn train(
    model_path: &str,
    config: TrainConfig,
    training: &SignDataset,
    test: &SignDataset,
) -> anyhow::Result<(ModelManifest, Evaluation)> {
    let device = default_device();
    let architecture = zoo::best();

    let model = architecture.init::<Backend>(&device, config.geometry, config.num_categories)?;
    let model = fit(&device, training, model, &config, &mut rand::rng());

    let valid_model = model.valid();
    let evaluation = evaluate(&device, test, &valid_model, &config);
    tracing::info!(
        message = "Training complete",
        test_loss = evaluation.loss,
        test_accuracy = evaluation.accuracy,
    );

    let manifest = ModelManifest {
        architecture,
        train_config: config,
    };
    inference::save(&valid_model, model_path, &manifest)?;

    Ok((manifest, evaluation))
}

#[instrument(level = "info", skip(test, evaluation, matrix))]
fn render_figures(
    directory: &Path,
    test: &SignDataset,
    evaluation: &Evaluation,
    matrix: &ConfusionMatrix,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(directory)?;
    let geometry = test.geometry();
    let count = mosaic::GRID * mosaic::GRID;

    let path = directory.join("confusion_matrix.png");
    mosaic::render_confusion_matrix(matrix).save(&path)?;
    println!("Confusion matrix saved to {}", path.display());

    let predictions = &evaluation.predictions;
    let tiles = mosaic::sample_tiles(test.items(), predictions, count, &mut rand::rng());
    let path = directory.join("prediction_results.png");
    mosaic::render_mosaic(&tiles, geometry).save(&path)?;
    println!("Prediction results saved to {}", path.display());

    let tiles = mosaic::misclassified_tiles(test.items(), predictions, count);
    if tiles.is_empty() {
        tracing::info!("Every test image was classified correctly");
    }
    let path = directory.join("misclassified_results.png");
    mosaic::render_mosaic(&tiles, geometry).save(&path)?;
    println!("Misclassified results saved to {}", path.display());

    Ok(())
}
