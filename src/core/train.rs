use super::batcher::{SignBatch, SignBatcher};
use super::dataset::SignItem;
use super::model::Classifier;
use super::train_config::{Loss, TrainConfig};
use burn::data::dataloader::Dataset;
use burn::data::dataloader::batcher::Batcher;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation::{log_softmax, softmax};
use burn::tensor::backend::AutodiffBackend;
use rand::Rng;
use rand::seq::SliceRandom;

/// Keeps `ln` finite for saturated softmax outputs.
const EPSILON: f32 = 1e-7;

/// Outcome of running a model over a held-out dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Mean loss over the batches
    pub loss: f32,
    /// Fraction of samples whose highest scoring category is the true one, in [0, 1]
    pub accuracy: f32,
    /// Predicted category per sample, in dataset order
    pub predictions: Vec<usize>,
}

/// Compute average loss by dividing total accumulated loss by number of batches.
/// If no batches were processed, returns 0.0 to avoid division by zero.
fn compute_average_loss(total_loss: f32, num_batches: usize) -> f32 {
    if num_batches > 0 {
        total_loss / num_batches as f32
    } else {
        0.0
    }
}

/// Mean loss of a batch, shape [1].
pub fn compute_loss<B: Backend>(
    loss: Loss,
    logits: Tensor<B, 2>,
    one_hot: Tensor<B, 2>,
) -> Tensor<B, 1> {
    match loss {
        Loss::CategoricalCrossEntropy => (log_softmax(logits, 1) * one_hot)
            .sum_dim(1)
            .mean()
            .neg(),
        Loss::BinaryCrossEntropy => {
            let probabilities = softmax(logits, 1).clamp(EPSILON, 1.0 - EPSILON);
            let positive = one_hot.clone() * probabilities.clone().log();
            let negative =
                one_hot.neg().add_scalar(1.0) * probabilities.neg().add_scalar(1.0).log();
            (positive + negative).mean().neg()
        }
    }
}

/// Run a single training batch through forward, backward, and optimizer step.
/// Returns the updated model and the loss value for this batch.
fn process_training_batch<B, O>(
    model: Classifier<B>,
    optimizer: &mut O,
    batch: SignBatch<B>,
    loss: Loss,
    learning_rate: f64,
) -> (Classifier<B>, f32)
where
    B: AutodiffBackend,
    O: Optimizer<Classifier<B>, B>,
{
    let logits = model.forward(batch.images);
    let loss = compute_loss(loss, logits, batch.one_hot);

    // Extract scalar BEFORE backward to avoid keeping the loss tensor
    let loss_value = loss.clone().into_scalar().elem::<f32>();

    let grads = loss.backward();
    let grads_params = GradientsParams::from_grads(grads, &model);
    let updated_model = optimizer.step(learning_rate, model, grads_params);

    (updated_model, loss_value)
}

/// Run one pass over the training set in a freshly shuffled order.
/// Returns (updated_model, average_training_loss).
fn run_training_epoch<B, O>(
    dataset: &impl Dataset<SignItem>,
    batcher: &SignBatcher,
    device: &B::Device,
    model: Classifier<B>,
    optimizer: &mut O,
    config: &TrainConfig,
    rng: &mut impl Rng,
) -> (Classifier<B>, f32)
where
    B: AutodiffBackend,
    O: Optimizer<Classifier<B>, B>,
{
    let mut current_model = model;
    let mut total_loss = 0.0;
    let mut num_batches = 0;

    let mut order: Vec<usize> = (0..dataset.len()).collect();
    order.shuffle(rng);

    for indices in order.chunks(config.batch_size) {
        let items: Vec<_> = indices.iter().filter_map(|i| dataset.get(*i)).collect();

        if items.is_empty() {
            continue;
        }

        let batch = batcher.batch(items, device);

        let (updated_model, loss_value) = process_training_batch(
            current_model,
            optimizer,
            batch,
            config.loss,
            config.learning_rate,
        );
        current_model = updated_model;

        total_loss += loss_value;
        num_batches += 1;
    }

    (current_model, compute_average_loss(total_loss, num_batches))
}

/// Train `model` on `dataset` for the configured number of epochs.
///
/// Progress is only reported at debug level, fitting is otherwise silent.
pub fn fit<B>(
    device: &B::Device,
    dataset: &impl Dataset<SignItem>,
    mut model: Classifier<B>,
    config: &TrainConfig,
    rng: &mut impl Rng,
) -> Classifier<B>
where
    B: AutodiffBackend,
{
    let mut optimizer = AdamConfig::new().init();
    let batcher = SignBatcher::new(config.geometry, config.num_categories);

    for epoch in 0..config.epochs {
        let (updated_model, avg_train_loss) = run_training_epoch(
            dataset,
            &batcher,
            device,
            model,
            &mut optimizer,
            config,
            rng,
        );
        model = updated_model;

        tracing::debug!(
            epoch = epoch + 1,
            total_epochs = config.epochs,
            train_loss = avg_train_loss,
            "Epoch completed",
        );
    }

    model
}

/// Score `model` on `dataset` without tracking gradients.
pub fn evaluate<B>(
    device: &B::Device,
    dataset: &impl Dataset<SignItem>,
    model: &Classifier<B>,
    config: &TrainConfig,
) -> Evaluation
where
    B: Backend,
{
    let batcher = SignBatcher::new(config.geometry, config.num_categories);
    let dataset_len = dataset.len();

    let mut total_loss = 0.0;
    let mut num_batches = 0;
    let mut correct = 0usize;
    let mut predictions = Vec::with_capacity(dataset_len);

    for start_idx in (0..dataset_len).step_by(config.batch_size) {
        let end_idx = (start_idx + config.batch_size).min(dataset_len);

        let items: Vec<_> = (start_idx..end_idx)
            .filter_map(|i| dataset.get(i))
            .collect();

        if items.is_empty() {
            continue;
        }

        let batch: SignBatch<B> = batcher.batch(items, device);
        let batch_size = batch.targets.dims()[0];

        let logits = model.forward(batch.images);
        let loss_value = compute_loss(config.loss, logits.clone(), batch.one_hot)
            .into_scalar()
            .elem::<f32>();

        let predicted = logits.argmax(1).reshape([batch_size]);
        correct += predicted
            .clone()
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>() as usize;
        predictions.extend(predicted.into_data().iter::<i64>().map(|p| p as usize));

        total_loss += loss_value;
        num_batches += 1;
    }

    let accuracy = if predictions.is_empty() {
        0.0
    } else {
        correct as f32 / predictions.len() as f32
    };

    Evaluation {
        loss: compute_average_loss(total_loss, num_batches),
        accuracy,
        predictions,
    }
}

/// Fit on `training`, then evaluate the inference copy of the model on `test`.
pub fn fit_and_evaluate<B>(
    device: &B::Device,
    training: &impl Dataset<SignItem>,
    test: &impl Dataset<SignItem>,
    model: Classifier<B>,
    config: &TrainConfig,
    rng: &mut impl Rng,
) -> (Classifier<B>, Evaluation)
where
    B: AutodiffBackend,
{
    let model = fit(device, training, model, config, rng);
    let evaluation = evaluate::<B::InnerBackend>(device, test, &model.valid(), config);
    (model, evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend as TrainBackend, Device, InnerBackend};
    use crate::core::dataset::{ImageGeometry, SignDataset};
    use crate::core::zoo;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Solid images whose brightness encodes the label.
    fn create_dataset(len: usize, num_categories: usize, geometry: ImageGeometry) -> SignDataset {
        let items = (0..len)
            .map(|i| {
                let label = i % num_categories;
                SignItem {
                    pixels: vec![label as f32 / num_categories as f32; geometry.pixel_count()],
                    label,
                }
            })
            .collect();
        SignDataset::new(geometry, items)
    }

    fn create_config(geometry: ImageGeometry, num_categories: usize) -> TrainConfig {
        TrainConfig::sweep()
            .with_epochs(2)
            .and_then(|c| c.with_batch_size(4))
            .and_then(|c| c.with_geometry(geometry))
            .and_then(|c| c.with_num_categories(num_categories))
            .expect("Failed to build config")
    }

    #[test]
    fn test_compute_average_loss_handles_zero_batches() {
        assert_eq!(compute_average_loss(3.0, 0), 0.0);
        assert_eq!(compute_average_loss(3.0, 2), 1.5);
    }

    #[test]
    fn test_categorical_loss_of_uniform_scores_is_log_of_categories() {
        let device = Device::default();
        let logits = Tensor::<InnerBackend, 2>::zeros([2, 4], &device);
        let one_hot = Tensor::<InnerBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0], [2, 4]),
            &device,
        );

        let loss = compute_loss(Loss::CategoricalCrossEntropy, logits, one_hot)
            .into_scalar()
            .elem::<f32>();
        assert!((loss - 4f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_binary_loss_is_finite_for_confident_predictions() {
        let device = Device::default();
        let logits = Tensor::<InnerBackend, 2>::from_data(
            TensorData::new(vec![100.0f32, -100.0], [1, 2]),
            &device,
        );
        let one_hot = Tensor::<InnerBackend, 2>::from_data(
            TensorData::new(vec![0.0f32, 1.0], [1, 2]),
            &device,
        );

        let loss = compute_loss(Loss::BinaryCrossEntropy, logits, one_hot)
            .into_scalar()
            .elem::<f32>();
        assert!(loss.is_finite());
        assert!(loss > 1.0);
    }

    #[test]
    fn test_evaluate_reports_accuracy_in_unit_interval() {
        let device = Device::default();
        let geometry = ImageGeometry::new(8, 8);
        let config = create_config(geometry, 3);
        let dataset = create_dataset(10, 3, geometry);
        let model = zoo::architectures()[2]
            .init::<InnerBackend>(&device, geometry, 3)
            .unwrap();

        let evaluation = evaluate(&device, &dataset, &model, &config);

        assert_eq!(evaluation.predictions.len(), 10);
        assert!(evaluation.predictions.iter().all(|p| *p < 3));
        assert!((0.0..=1.0).contains(&evaluation.accuracy));
        assert!(evaluation.loss.is_finite());
    }

    #[test]
    fn test_fit_and_evaluate_runs_every_loss() {
        let device = Device::default();
        let geometry = ImageGeometry::new(12, 12);
        let training = create_dataset(12, 3, geometry);
        let test = create_dataset(6, 3, geometry);
        let mut rng = StdRng::seed_from_u64(3);

        for loss in [Loss::CategoricalCrossEntropy, Loss::BinaryCrossEntropy] {
            let config = create_config(geometry, 3).with_loss(loss);
            let model = zoo::best()
                .init::<TrainBackend>(&device, geometry, 3)
                .unwrap();

            let (_model, evaluation) =
                fit_and_evaluate(&device, &training, &test, model, &config, &mut rng);

            assert_eq!(evaluation.predictions.len(), 6);
            assert!((0.0..=1.0).contains(&evaluation.accuracy));
        }
    }

    #[test]
    fn test_linear_model_learns_separable_data() {
        let device = Device::default();
        let geometry = ImageGeometry::new(4, 4);
        let dataset = create_dataset(40, 2, geometry);
        let config = create_config(geometry, 2)
            .with_epochs(30)
            .and_then(|c| c.with_learning_rate(0.05))
            .unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let model = zoo::architectures()[0]
            .init::<TrainBackend>(&device, geometry, 2)
            .unwrap();
        let before = evaluate::<InnerBackend>(&device, &dataset, &model.valid(), &config);

        let (_model, after) =
            fit_and_evaluate(&device, &dataset, &dataset, model, &config, &mut rng);

        assert!(after.loss < before.loss);
    }
}
