use super::architecture::Architecture;
use super::dataset::CHANNELS;
use super::ingestion::load_image;
use super::model::Classifier;
use super::train_config::TrainConfig;
use burn::prelude::*;
use burn::record::{CompactRecorder, Recorder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Everything besides the weights needed to rebuild a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub architecture: Architecture,
    pub train_config: TrainConfig,
}

impl ModelManifest {
    fn path(model_path: &str) -> String {
        format!("{}.config.json", model_path)
    }
}

/// Persist trained weights to `{model_path}.mpk` and the manifest to
/// `{model_path}.config.json`. Both must succeed.
pub fn save<B: Backend>(
    model: &Classifier<B>,
    model_path: &str,
    manifest: &ModelManifest,
) -> anyhow::Result<()> {
    model
        .clone()
        .save_file(model_path, &CompactRecorder::new())
        .map_err(|e| anyhow::anyhow!("Failed to save model to {}: {}", model_path, e))?;

    let config_path = ModelManifest::path(model_path);
    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(&config_path, json)
        .map_err(|e| anyhow::anyhow!("Failed to save config to {}: {}", config_path, e))?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub category: usize,
    pub confidence: f32,
}

pub struct InferenceEngine<B: Backend> {
    pub model: Classifier<B>,
    pub manifest: ModelManifest,
    device: B::Device,
}

impl<B: Backend> InferenceEngine<B> {
    /// Load model and manifest from disk
    pub fn load(model_path: &str, device: &B::Device) -> anyhow::Result<Self> {
        let config_path = ModelManifest::path(model_path);
        let json = fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", config_path, e))?;
        let manifest: ModelManifest = serde_json::from_str(&json)?;
        manifest.train_config.validate()?;

        let record = CompactRecorder::new()
            .load(model_path.into(), device)
            .map_err(|e| anyhow::anyhow!("Failed to load model from {}: {}", model_path, e))?;

        let model = manifest
            .architecture
            .init::<B>(
                device,
                manifest.train_config.geometry,
                manifest.train_config.num_categories,
            )?
            .load_record(record);

        Ok(Self {
            model,
            manifest,
            device: device.clone(),
        })
    }

    /// Classify one CHW pixel buffer laid out like the training samples.
    pub fn predict(&self, pixels: Vec<f32>) -> anyhow::Result<Prediction> {
        let geometry = self.manifest.train_config.geometry;
        if pixels.len() != geometry.pixel_count() {
            anyhow::bail!(
                "Expected {} values for a {}x{} image, got {}",
                geometry.pixel_count(),
                geometry.width,
                geometry.height,
                pixels.len()
            );
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [1, CHANNELS, geometry.height, geometry.width]),
            &self.device,
        );

        let probabilities = self
            .model
            .probabilities(images)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Failed to convert tensor to vec: {:?}", e))?;

        let (category, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .ok_or_else(|| anyhow::anyhow!("Model produced no scores"))?;

        Ok(Prediction {
            category,
            confidence,
        })
    }

    /// Decode, resize and classify an image file.
    pub fn predict_file(&self, path: &Path) -> anyhow::Result<Prediction> {
        let pixels = load_image(path, self.manifest.train_config.geometry)?;
        self.predict(pixels)
    }
}
