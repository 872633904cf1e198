use super::architecture::{Architecture, ConvSpec, DenseSpec};
use burn::nn;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::*;
use burn::tensor::activation::softmax;

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    activation: nn::Relu,
    pool: MaxPool2d,
    norm: Option<nn::BatchNorm<B>>,
}

impl<B: Backend> ConvBlock<B> {
    fn new(device: &B::Device, in_channels: usize, spec: &ConvSpec) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, spec.filters], [spec.kernel, spec.kernel])
                .init(device),
            activation: nn::Relu::new(),
            pool: MaxPool2dConfig::new([spec.pool, spec.pool])
                .with_strides([spec.pool, spec.pool])
                .init(),
            norm: spec
                .batch_norm
                .then(|| nn::BatchNormConfig::new(spec.filters).init(device)),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.activation.forward(self.conv.forward(input));
        let x = self.pool.forward(x);

        match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        }
    }
}

#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    linear: nn::Linear<B>,
    activation: nn::Relu,
    dropout: Option<nn::Dropout>,
}

impl<B: Backend> DenseBlock<B> {
    fn new(device: &B::Device, input_size: usize, spec: &DenseSpec) -> Self {
        Self {
            linear: nn::LinearConfig::new(input_size, spec.units).init(device),
            activation: nn::Relu::new(),
            dropout: spec.dropout.map(|rate| nn::DropoutConfig::new(rate).init()),
        }
    }

    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.linear.forward(input));

        match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        }
    }
}

/// An image classifier assembled from an [`Architecture`].
///
/// Built through [`Architecture::init`], which checks the layout against the
/// image geometry first.
#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    conv: Vec<ConvBlock<B>>,
    dense: Vec<DenseBlock<B>>,
    output: nn::Linear<B>,
}

impl<B: Backend> Classifier<B> {
    pub(crate) fn new(
        device: &B::Device,
        architecture: &Architecture,
        flattened_size: usize,
        num_categories: usize,
    ) -> Self {
        let mut channels = super::dataset::CHANNELS;
        let mut conv = Vec::with_capacity(architecture.conv.len());
        for spec in &architecture.conv {
            conv.push(ConvBlock::new(device, channels, spec));
            channels = spec.filters;
        }

        let mut width = flattened_size;
        let mut dense = Vec::with_capacity(architecture.dense.len());
        for spec in &architecture.dense {
            dense.push(DenseBlock::new(device, width, spec));
            width = spec.units;
        }

        Self {
            conv,
            dense,
            output: nn::LinearConfig::new(width, num_categories).init(device),
        }
    }

    /// Unnormalized class scores, shape `[batch, num_categories]`.
    ///
    /// Input is a batch of CHW images, shape `[batch, 3, height, width]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.conv {
            x = block.forward(x);
        }

        let [batch_size, channels, height, width] = x.dims();
        let mut x = x.reshape([batch_size, channels * height * width]);
        for block in &self.dense {
            x = block.forward(x);
        }

        self.output.forward(x)
    }

    /// Softmax over [`Classifier::forward`].
    pub fn probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }

    pub fn num_categories(&self) -> usize {
        self.output.weight.dims()[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend as TrainBackend, InnerBackend};
    use crate::core::dataset::ImageGeometry;
    use crate::core::zoo;
    use burn::module::AutodiffModule;

    #[test]
    fn test_every_candidate_maps_images_to_categories() {
        let device = Default::default();
        let geometry = ImageGeometry::default();

        for architecture in zoo::architectures() {
            let model = architecture
                .init::<InnerBackend>(&device, geometry, 43)
                .unwrap();
            let images = Tensor::<InnerBackend, 4>::zeros([2, 3, 30, 30], &device);

            assert_eq!(
                model.forward(images).dims(),
                [2, 43],
                "{}",
                architecture.name
            );
            assert_eq!(model.num_categories(), 43);
        }
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let device = Default::default();
        let model = zoo::best()
            .init::<InnerBackend>(&device, ImageGeometry::default(), 5)
            .unwrap();
        let images = Tensor::<InnerBackend, 4>::random(
            [3, 3, 30, 30],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let sums = model
            .probabilities(images)
            .sum_dim(1)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(sums.len(), 3);
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-4));
    }

    #[test]
    fn test_custom_geometry_is_respected() {
        let device = Default::default();
        let geometry = ImageGeometry::new(48, 32);
        let model = zoo::architectures()[3]
            .init::<TrainBackend>(&device, geometry, 43)
            .unwrap()
            .valid();

        let images = Tensor::<InnerBackend, 4>::ones([1, 3, 32, 48], &device);
        assert_eq!(model.forward(images).dims(), [1, 43]);
    }

    #[test]
    fn test_zero_categories_is_rejected() {
        let device = Default::default();
        let result = zoo::best().init::<InnerBackend>(&device, ImageGeometry::default(), 0);
        assert!(result.is_err());
    }
}
