use super::dataset::{CHANNELS, ImageGeometry};
use super::model::Classifier;
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ArchitectureError {
    #[error("{name}: {message}")]
    Invalid { name: String, message: String },
    #[error("{name}: block {block} does not fit a {height}x{width} feature map")]
    Geometry {
        name: String,
        block: usize,
        width: usize,
        height: usize,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convolution with ReLU, followed by max pooling and optionally batch normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvSpec {
    pub filters: usize,
    pub kernel: usize,
    pub pool: usize,
    #[serde(default)]
    pub batch_norm: bool,
}

impl ConvSpec {
    pub fn new(filters: usize) -> Self {
        Self {
            filters,
            kernel: 3,
            pool: 2,
            batch_norm: false,
        }
    }

    pub fn with_batch_norm(mut self) -> Self {
        self.batch_norm = true;
        self
    }
}

/// Hidden dense layer with ReLU, optionally followed by dropout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseSpec {
    pub units: usize,
    #[serde(default)]
    pub dropout: Option<f64>,
}

impl DenseSpec {
    pub fn new(units: usize) -> Self {
        Self {
            units,
            dropout: None,
        }
    }

    pub fn with_dropout(mut self, rate: f64) -> Self {
        self.dropout = Some(rate);
        self
    }
}

/// A named network layout.
///
/// Images flow through `conv` blocks, are flattened, pass the `dense` hidden
/// layers and end in a softmax layer with one output per category. The output
/// layer is implied, so every architecture classifies into the same categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    pub name: String,
    #[serde(default)]
    pub conv: Vec<ConvSpec>,
    #[serde(default)]
    pub dense: Vec<DenseSpec>,
}

impl Architecture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            conv: Vec::new(),
            dense: Vec::new(),
        }
    }

    pub fn with_conv(mut self, spec: ConvSpec) -> Self {
        self.conv.push(spec);
        self
    }

    pub fn with_dense(mut self, spec: DenseSpec) -> Self {
        self.dense.push(spec);
        self
    }

    /// Shape `[channels, height, width]` of the feature map handed to the dense layers.
    pub fn feature_shape(&self, geometry: ImageGeometry) -> Result<[usize; 3], ArchitectureError> {
        let [mut channels, mut height, mut width] = [CHANNELS, geometry.height, geometry.width];

        for (block, spec) in self.conv.iter().enumerate() {
            if spec.filters == 0 || spec.kernel == 0 || spec.pool == 0 {
                return Err(self.invalid(format!(
                    "conv block {block} needs non-zero filters, kernel and pool"
                )));
            }

            // Valid convolution, then non-overlapping pooling that drops the remainder
            let fits = |size: usize| size >= spec.kernel && (size - spec.kernel + 1) >= spec.pool;
            if !fits(height) || !fits(width) {
                return Err(ArchitectureError::Geometry {
                    name: self.name.clone(),
                    block,
                    width,
                    height,
                });
            }

            height = (height - spec.kernel + 1) / spec.pool;
            width = (width - spec.kernel + 1) / spec.pool;
            channels = spec.filters;
        }

        Ok([channels, height, width])
    }

    /// Width of the flattened feature vector.
    pub fn flattened_size(&self, geometry: ImageGeometry) -> Result<usize, ArchitectureError> {
        let [channels, height, width] = self.feature_shape(geometry)?;
        Ok(channels * height * width)
    }

    pub fn validate(&self, geometry: ImageGeometry) -> Result<(), ArchitectureError> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("name must not be empty".to_string()));
        }

        for (index, spec) in self.dense.iter().enumerate() {
            if spec.units == 0 {
                return Err(self.invalid(format!("dense layer {index} needs at least one unit")));
            }
            if let Some(rate) = spec.dropout {
                if !(0.0..1.0).contains(&rate) {
                    return Err(self.invalid(format!(
                        "dropout of dense layer {index} must lie in [0, 1), got {rate}"
                    )));
                }
            }
        }

        self.feature_shape(geometry).map(|_| ())
    }

    /// Build the untrained network for images of `geometry`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
        geometry: ImageGeometry,
        num_categories: usize,
    ) -> Result<Classifier<B>, ArchitectureError> {
        self.validate(geometry)?;
        if num_categories == 0 {
            return Err(self.invalid("num_categories must be greater than 0".to_string()));
        }

        Ok(Classifier::new(
            device,
            self,
            self.flattened_size(geometry)?,
            num_categories,
        ))
    }

    /// Load a JSON list of architectures.
    pub fn load_all(path: &Path) -> Result<Vec<Self>, ArchitectureError> {
        let json = fs::read_to_string(path)?;
        let architectures: Vec<Self> = serde_json::from_str(&json)?;
        Ok(architectures)
    }

    fn invalid(&self, message: String) -> ArchitectureError {
        ArchitectureError::Invalid {
            name: self.name.clone(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_shape_tracks_conv_and_pool() {
        let architecture = Architecture::new("two blocks")
            .with_conv(ConvSpec::new(64).with_batch_norm())
            .with_conv(ConvSpec::new(64));

        // 30 -> conv 28 -> pool 14 -> conv 12 -> pool 6
        let shape = architecture.feature_shape(ImageGeometry::default()).unwrap();
        assert_eq!(shape, [64, 6, 6]);
        assert_eq!(
            architecture.flattened_size(ImageGeometry::default()).unwrap(),
            64 * 36
        );
    }

    #[test]
    fn test_feature_shape_without_conv_is_the_image() {
        let architecture = Architecture::new("linear");
        let shape = architecture
            .feature_shape(ImageGeometry::new(32, 20))
            .unwrap();
        assert_eq!(shape, [3, 20, 32]);
    }

    #[test]
    fn test_too_small_geometry_is_rejected() {
        let architecture = Architecture::new("deep")
            .with_conv(ConvSpec::new(8))
            .with_conv(ConvSpec::new(8));

        let result = architecture.validate(ImageGeometry::new(6, 6));
        assert!(matches!(
            result,
            Err(ArchitectureError::Geometry { block: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_dropout_is_rejected() {
        let architecture =
            Architecture::new("dropout").with_dense(DenseSpec::new(8).with_dropout(1.0));
        assert!(architecture.validate(ImageGeometry::default()).is_err());
    }

    #[test]
    fn test_zero_units_and_filters_are_rejected() {
        let dense = Architecture::new("dense").with_dense(DenseSpec::new(0));
        assert!(dense.validate(ImageGeometry::default()).is_err());

        let conv = Architecture::new("conv").with_conv(ConvSpec::new(0));
        assert!(conv.validate(ImageGeometry::default()).is_err());
    }

    #[test]
    fn test_json_defaults_optional_fields() {
        let json = r#"[
            {
                "name": "tiny",
                "conv": [{"filters": 4, "kernel": 3, "pool": 2}],
                "dense": [{"units": 8}]
            },
            {"name": "linear"}
        ]"#;
        let architectures: Vec<Architecture> = serde_json::from_str(json).unwrap();

        assert_eq!(
            architectures[0],
            Architecture::new("tiny")
                .with_conv(ConvSpec::new(4))
                .with_dense(DenseSpec::new(8))
        );
        assert_eq!(architectures[1], Architecture::new("linear"));
    }
}
