use super::architecture::{Architecture, ArchitectureError};
use super::dataset::SignDataset;
use super::train::fit_and_evaluate;
use super::train_config::TrainConfig;
use burn::tensor::backend::AutodiffBackend;
use rand::Rng;
use std::io::{self, Write};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No architectures to compare")]
    NoArchitectures,
    #[error("Architecture error: {0}")]
    Architecture(#[from] ArchitectureError),
    #[error("Could not write report: {0}")]
    Report(#[from] io::Error),
}

/// Test-set score of one architecture.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    pub name: String,
    pub accuracy: f32,
    pub loss: f32,
}

/// Trains and scores a list of architectures on one shared split.
pub struct Sweep {
    architectures: Vec<Architecture>,
    config: TrainConfig,
}

impl Sweep {
    pub fn new(architectures: Vec<Architecture>, config: TrainConfig) -> Result<Self, Error> {
        if architectures.is_empty() {
            return Err(Error::NoArchitectures);
        }

        // Fail before any training starts
        for architecture in &architectures {
            architecture.validate(config.geometry)?;
        }

        Ok(Self {
            architectures,
            config,
        })
    }

    /// Evaluate every architecture in order, writing progress lines to `out`.
    ///
    /// Any failure aborts the remaining architectures.
    pub fn run<B: AutodiffBackend>(
        &self,
        device: &B::Device,
        training: &SignDataset,
        test: &SignDataset,
        out: &mut impl Write,
        rng: &mut impl Rng,
    ) -> Result<Vec<SweepResult>, Error> {
        let mut results = Vec::with_capacity(self.architectures.len());

        for architecture in &self.architectures {
            writeln!(out, "Evaluating {}", architecture.name)?;
            out.flush()?;

            let model = architecture.init::<B>(
                device,
                self.config.geometry,
                self.config.num_categories,
            )?;

            let (_model, evaluation) =
                fit_and_evaluate(device, training, test, model, &self.config, rng);

            tracing::info!(
                architecture = %architecture.name,
                accuracy = evaluation.accuracy,
                loss = evaluation.loss,
                "Architecture evaluated",
            );

            writeln!(
                out,
                "Accuracy for {}: {}",
                architecture.name, evaluation.accuracy
            )?;
            out.flush()?;

            results.push(SweepResult {
                name: architecture.name.clone(),
                accuracy: evaluation.accuracy,
                loss: evaluation.loss,
            });
        }

        Ok(results)
    }
}

/// The result with the highest accuracy; the earlier one wins a tie.
pub fn best(results: &[SweepResult]) -> Option<&SweepResult> {
    results.iter().reduce(|best, r| if r.accuracy > best.accuracy { r } else { best })
}
