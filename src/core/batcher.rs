use super::dataset::{CHANNELS, ImageGeometry, SignItem};
use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;

/// A batch of samples, ready for the model.
#[derive(Clone, Debug)]
pub struct SignBatch<B: Backend> {
    /// Stacked images: shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Category indices: shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
    /// One-hot categories: shape [batch_size, num_categories]
    pub one_hot: Tensor<B, 2>,
}

#[derive(Clone, Debug)]
pub struct SignBatcher {
    geometry: ImageGeometry,
    num_categories: usize,
}

impl SignBatcher {
    pub fn new(geometry: ImageGeometry, num_categories: usize) -> Self {
        Self {
            geometry,
            num_categories,
        }
    }
}

impl<B: Backend> Batcher<B, SignItem, SignBatch<B>> for SignBatcher {
    fn batch(&self, items: Vec<SignItem>, device: &B::Device) -> SignBatch<B> {
        let batch_size = items.len();
        assert!(batch_size > 0, "Cannot create a batch from an empty Vec");

        let mut pixels = Vec::with_capacity(batch_size * self.geometry.pixel_count());
        let mut labels = Vec::with_capacity(batch_size);
        let mut one_hot = vec![0.0f32; batch_size * self.num_categories];

        for (row, item) in items.iter().enumerate() {
            pixels.extend_from_slice(&item.pixels);
            labels.push(item.label as i64);
            one_hot[row * self.num_categories + item.label] = 1.0;
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(
                pixels,
                [batch_size, CHANNELS, self.geometry.height, self.geometry.width],
            ),
            device,
        );

        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(labels, [batch_size]), device);

        let one_hot = Tensor::<B, 2>::from_data(
            TensorData::new(one_hot, [batch_size, self.num_categories]),
            device,
        );

        SignBatch {
            images,
            targets,
            one_hot,
        }
    }
}
