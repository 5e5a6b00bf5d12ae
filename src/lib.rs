//! Next-day closing price regression with a stacked LSTM.
//!
//! Bars are downloaded (or read from CSV), trimmed to the rows where every
//! moving average is defined, split chronologically, min-max scaled with bounds
//! from the training part, cut into fixed windows and fed to a four-layer LSTM.
//! [`pipeline::run`] composes the stages.

pub mod cli;
pub mod config;
pub mod csv_source;
pub mod dataset;
pub mod error;
pub mod layers;
pub mod market_data;
pub mod metrics;
pub mod model;
pub mod moving_average;
pub mod optimizer;
pub mod persistence;
pub mod pipeline;
pub mod report;
pub mod scaler;
pub mod training;
pub mod utils;
pub mod yahoo;

pub use config::{DataSource, ModelConfig, PipelineConfig, TrainingConfig};
pub use error::PipelineError;
pub use persistence::ModelArtifact;
pub use pipeline::{PipelineOutcome, run, run_on_series};
