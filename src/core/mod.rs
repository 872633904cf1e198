pub mod architecture;
pub mod batcher;
pub mod dataset;
pub mod inference;
pub mod ingestion;
pub mod metrics;
pub mod model;
pub mod sweep;
pub mod train;
pub mod train_config;
pub mod zoo;
