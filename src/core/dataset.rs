use burn::data::dataset::Dataset;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Every sample is an RGB image.
pub const CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Test fraction must lie strictly between 0 and 1, got {0}")]
    FactorOutOfBounds(f64),
    #[error("Splitting {total} samples at {test_size} leaves an empty subset")]
    EmptySplit { total: usize, test_size: f64 },
}

/// Fixed width and height every image is resized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub width: usize,
    pub height: usize,
}

impl ImageGeometry {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Number of values in one channel plane.
    pub fn plane(&self) -> usize {
        self.width * self.height
    }

    /// Number of values in one CHW sample.
    pub fn pixel_count(&self) -> usize {
        CHANNELS * self.plane()
    }
}

impl Default for ImageGeometry {
    fn default() -> Self {
        Self::new(30, 30)
    }
}

/// One labeled image, stored channel-major with values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignItem {
    pub pixels: Vec<f32>,
    pub label: usize,
}

/// An ordered, in-memory collection of samples sharing one geometry.
#[derive(Debug, Clone)]
pub struct SignDataset {
    geometry: ImageGeometry,
    items: Vec<SignItem>,
}

impl SignDataset {
    pub fn new(geometry: ImageGeometry, items: Vec<SignItem>) -> Self {
        debug_assert!(
            items.iter().all(|i| i.pixels.len() == geometry.pixel_count()),
            "every item must match the dataset geometry"
        );
        Self { geometry, items }
    }

    pub fn geometry(&self) -> ImageGeometry {
        self.geometry
    }

    pub fn items(&self) -> &[SignItem] {
        &self.items
    }

    pub fn labels(&self) -> Vec<usize> {
        self.items.iter().map(|i| i.label).collect()
    }

    /// Shuffle and cut into `(train, test)`.
    ///
    /// The test subset receives `ceil(len * test_size)` items. Categories are
    /// not stratified.
    pub fn split(
        self,
        test_size: f64,
        rng: &mut impl Rng,
    ) -> Result<(SignDataset, SignDataset), Error> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(Error::FactorOutOfBounds(test_size));
        }

        let total = self.items.len();
        let test_len = ((total as f64) * test_size).ceil() as usize;
        if test_len == 0 || test_len >= total {
            return Err(Error::EmptySplit { total, test_size });
        }

        let mut items = self.items;
        items.shuffle(rng);
        let train = items.split_off(test_len);

        Ok((
            SignDataset::new(self.geometry, train),
            SignDataset::new(self.geometry, items),
        ))
    }
}

impl Dataset<SignItem> for SignDataset {
    fn get(&self, index: usize) -> Option<SignItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
