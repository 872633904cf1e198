use super::dataset::ImageGeometry;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::{fs, io};

/// Number of traffic-sign categories in GTSRB.
pub const NUM_CATEGORIES: usize = 43;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Objective minimized during fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Loss {
    /// Negative log-likelihood of the true category under the softmax output
    CategoricalCrossEntropy,
    /// Element-wise binary cross-entropy between the softmax output and one-hot targets
    #[default]
    BinaryCrossEntropy,
}

impl FromStr for Loss {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "categorical-cross-entropy" => Ok(Self::CategoricalCrossEntropy),
            "binary-cross-entropy" => Ok(Self::BinaryCrossEntropy),
            other => Err(Error::Validation(format!("unknown loss \"{other}\""))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Fraction of the samples held out for evaluation
    pub test_size: f64,
    pub geometry: ImageGeometry,
    pub num_categories: usize,
    pub loss: Loss,
}

impl TrainConfig {
    pub fn new(
        epochs: usize,
        batch_size: usize,
        learning_rate: f64,
        test_size: f64,
    ) -> Result<Self, Error> {
        Self::validate_epochs(&epochs)?;
        Self::validate_batch_size(&batch_size)?;
        Self::validate_learning_rate(&learning_rate)?;
        Self::validate_test_size(&test_size)?;

        Ok(Self {
            epochs,
            batch_size,
            learning_rate,
            test_size,
            geometry: ImageGeometry::default(),
            num_categories: NUM_CATEGORIES,
            loss: Loss::default(),
        })
    }

    /// Settings of the architecture comparison: half of the data is held out.
    pub fn sweep() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            learning_rate: 1e-3,
            test_size: 0.5,
            geometry: ImageGeometry::default(),
            num_categories: NUM_CATEGORIES,
            loss: Loss::default(),
        }
    }

    /// Settings of the deployed model: 30% of the data is held out.
    pub fn deployment() -> Self {
        Self {
            test_size: 0.3,
            ..Self::sweep()
        }
    }

    pub fn with_epochs(mut self, epochs: usize) -> Result<Self, Error> {
        Self::validate_epochs(&epochs)?;
        self.epochs = epochs;
        Ok(self)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, Error> {
        Self::validate_batch_size(&batch_size)?;
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Result<Self, Error> {
        Self::validate_learning_rate(&learning_rate)?;
        self.learning_rate = learning_rate;
        Ok(self)
    }

    pub fn with_test_size(mut self, test_size: f64) -> Result<Self, Error> {
        Self::validate_test_size(&test_size)?;
        self.test_size = test_size;
        Ok(self)
    }

    pub fn with_geometry(mut self, geometry: ImageGeometry) -> Result<Self, Error> {
        Self::validate_geometry(&geometry)?;
        self.geometry = geometry;
        Ok(self)
    }

    pub fn with_num_categories(mut self, num_categories: usize) -> Result<Self, Error> {
        Self::validate_num_categories(&num_categories)?;
        self.num_categories = num_categories;
        Ok(self)
    }

    pub fn with_loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    pub fn save(&self, path: &str) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<Self, Error> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        Self::validate_epochs(&self.epochs)?;
        Self::validate_batch_size(&self.batch_size)?;
        Self::validate_learning_rate(&self.learning_rate)?;
        Self::validate_test_size(&self.test_size)?;
        Self::validate_geometry(&self.geometry)?;
        Self::validate_num_categories(&self.num_categories)?;
        Ok(())
    }

    fn validate_epochs(epochs: &usize) -> Result<(), Error> {
        if *epochs < 1 {
            return Err(Error::Validation(
                "epochs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_batch_size(batch_size: &usize) -> Result<(), Error> {
        if *batch_size < 1 {
            return Err(Error::Validation(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_learning_rate(learning_rate: &f64) -> Result<(), Error> {
        if !learning_rate.is_finite() || *learning_rate <= 0.0 {
            return Err(Error::Validation(
                "learning_rate must be a finite number greater than 0.0".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_test_size(test_size: &f64) -> Result<(), Error> {
        if !(*test_size > 0.0 && *test_size < 1.0) {
            return Err(Error::Validation(
                "test_size must lie strictly between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_geometry(geometry: &ImageGeometry) -> Result<(), Error> {
        if geometry.width < 1 || geometry.height < 1 {
            return Err(Error::Validation(
                "image width and height must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_num_categories(num_categories: &usize) -> Result<(), Error> {
        if *num_categories < 1 {
            return Err(Error::Validation(
                "num_categories must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_temp_path() -> String {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!(
            "/tmp/train_config_test_{}_{}.json",
            std::process::id(),
            timestamp
        )
    }

    #[test]
    fn test_new_creates_config_with_correct_values() {
        let config = TrainConfig::new(5, 16, 0.01, 0.25).expect("Failed to create config");

        assert_eq!(config.epochs, 5);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.test_size, 0.25);
        assert_eq!(config.geometry, ImageGeometry::new(30, 30));
        assert_eq!(config.num_categories, NUM_CATEGORIES);
        assert_eq!(config.loss, Loss::BinaryCrossEntropy);
    }

    #[test]
    fn test_presets_are_valid() {
        let sweep = TrainConfig::sweep();
        let deployment = TrainConfig::deployment();

        sweep.validate().expect("sweep preset must be valid");
        deployment.validate().expect("deployment preset must be valid");
        assert_eq!(sweep.epochs, 10);
        assert_eq!(sweep.test_size, 0.5);
        assert_eq!(deployment.test_size, 0.3);
        assert_eq!(sweep.loss, Loss::BinaryCrossEntropy);
        assert_eq!(deployment.loss, Loss::BinaryCrossEntropy);
    }

    #[test]
    fn test_roundtrip_save_load_preserves_all_fields() {
        let config = TrainConfig::sweep()
            .with_geometry(ImageGeometry::new(48, 32))
            .and_then(|c| c.with_num_categories(5))
            .expect("Failed to build config")
            .with_loss(Loss::CategoricalCrossEntropy);
        let path = create_temp_path();

        config.save(&path).expect("Failed to save");
        let loaded = TrainConfig::load(&path).expect("Failed to load");

        assert_eq!(config, loaded);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut config = TrainConfig::sweep();
        config.batch_size = 0;
        let path = create_temp_path();
        fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        assert!(matches!(TrainConfig::load(&path), Err(Error::Validation(_))));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_zero_epochs_returns_error() {
        assert!(TrainConfig::new(0, 32, 1e-3, 0.5).is_err());
        assert!(TrainConfig::sweep().with_epochs(0).is_err());
    }

    #[test]
    fn test_invalid_test_size_returns_error() {
        for test_size in [0.0, 1.0, -0.5, 2.0] {
            assert!(TrainConfig::sweep().with_test_size(test_size).is_err());
        }
    }

    #[test]
    fn test_invalid_learning_rate_returns_error() {
        assert!(TrainConfig::sweep().with_learning_rate(0.0).is_err());
        assert!(TrainConfig::sweep().with_learning_rate(f64::NAN).is_err());
    }

    #[test]
    fn test_loss_parses_from_either_spelling() {
        assert_eq!(
            "binary_cross_entropy".parse::<Loss>().unwrap(),
            Loss::BinaryCrossEntropy
        );
        assert_eq!(
            "Categorical-Cross-Entropy".parse::<Loss>().unwrap(),
            Loss::CategoricalCrossEntropy
        );
        assert!("mse".parse::<Loss>().is_err());
    }
}
