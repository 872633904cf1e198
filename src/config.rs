use crate::core::train_config::{self, Loss, TrainConfig};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not parse environment variable: {key}\n\tGot: {value}\n\tMessage: {message}")]
    Invalid {
        key: String,
        value: String,
        message: String,
    },
    #[error("Invalid training configuration: {0}")]
    Train(#[from] train_config::Error),
}

/// An optional environment variable.
pub trait Var {
    const NAME: &'static str;
    type Type;

    fn from_env() -> Result<Option<Self::Type>, ConfigError>;
}

/// Read `name` and parse it, unset or empty meaning `None`.
fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = std::env::var(name).ok().filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };

    value
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|err| ConfigError::Invalid {
            key: name.to_string(),
            value,
            message: err.to_string(),
        })
}

pub struct Epochs;
pub struct BatchSize;
pub struct LearningRate;
pub struct TestSize;
pub struct LossVar;

impl Var for Epochs {
    const NAME: &'static str = "GTSRB_EPOCHS";
    type Type = usize;

    fn from_env() -> Result<Option<usize>, ConfigError> {
        parse_var(Self::NAME)
    }
}

impl Var for BatchSize {
    const NAME: &'static str = "GTSRB_BATCH_SIZE";
    type Type = usize;

    fn from_env() -> Result<Option<usize>, ConfigError> {
        parse_var(Self::NAME)
    }
}

impl Var for LearningRate {
    const NAME: &'static str = "GTSRB_LEARNING_RATE";
    type Type = f64;

    fn from_env() -> Result<Option<f64>, ConfigError> {
        parse_var(Self::NAME)
    }
}

impl Var for TestSize {
    const NAME: &'static str = "GTSRB_TEST_SIZE";
    type Type = f64;

    fn from_env() -> Result<Option<f64>, ConfigError> {
        parse_var(Self::NAME)
    }
}

impl Var for LossVar {
    const NAME: &'static str = "GTSRB_LOSS";
    type Type = Loss;

    fn from_env() -> Result<Option<Loss>, ConfigError> {
        parse_var(Self::NAME)
    }
}

/// Training settings that may replace the defaults of a [`TrainConfig`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overrides {
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub test_size: Option<f64>,
    pub loss: Option<Loss>,
}

impl Overrides {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            epochs: Epochs::from_env()?,
            batch_size: BatchSize::from_env()?,
            learning_rate: LearningRate::from_env()?,
            test_size: TestSize::from_env()?,
            loss: LossVar::from_env()?,
        })
    }

    /// Keep values set on `self`, fill the rest from `fallback`.
    pub fn or(self, fallback: Overrides) -> Self {
        Self {
            epochs: self.epochs.or(fallback.epochs),
            batch_size: self.batch_size.or(fallback.batch_size),
            learning_rate: self.learning_rate.or(fallback.learning_rate),
            test_size: self.test_size.or(fallback.test_size),
            loss: self.loss.or(fallback.loss),
        }
    }

    pub fn apply(&self, mut config: TrainConfig) -> Result<TrainConfig, ConfigError> {
        if let Some(epochs) = self.epochs {
            config = config.with_epochs(epochs)?;
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size)?;
        }
        if let Some(learning_rate) = self.learning_rate {
            config = config.with_learning_rate(learning_rate)?;
        }
        if let Some(test_size) = self.test_size {
            config = config.with_test_size(test_size)?;
        }
        if let Some(loss) = self.loss {
            config = config.with_loss(loss);
        }

        tracing::info!(
            message = "Configuration loaded",
            epochs = config.epochs,
            batch_size = config.batch_size,
            learning_rate = config.learning_rate,
            test_size = config.test_size,
            loss = ?config.loss,
        );

        Ok(config)
    }
}
