use crate::error::PipelineError;

pub const DEFAULT_SYMBOL: &str = "GOOG";
pub const DEFAULT_START: &str = "2012-01-01";
pub const DEFAULT_END: &str = "2022-12-21";
pub const DEFAULT_MODEL_PATH: &str = "Stock_Predictions_Model.bin";

/// Trailing closes fed to the model for each prediction.
pub const WINDOW_SIZE: usize = 100;
/// Trend lines computed for charting. The largest one decides how many leading rows are trimmed.
pub const MOVING_AVERAGE_WINDOWS: [usize; 2] = [100, 200];
pub const TRAIN_RATIO: f64 = 0.8;

pub const EPOCHS: usize = 50;
pub const BATCH_SIZE: usize = 32;
pub const PATIENCE: usize = 10;
pub const LEARNING_RATE: f64 = 0.001;
pub const GRADIENT_CLIP: f64 = 1.0;
pub const SEED: u64 = 42;

/// (units, dropout) for each stacked recurrent layer, input side first.
pub const RECURRENT_LAYERS: [(usize, f64); 4] = [(50, 0.2), (60, 0.3), (80, 0.4), (120, 0.5)];

/// Where the daily bars come from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Yahoo Finance chart endpoint.
    Yahoo,
    /// Local CSV export with the usual `Date,Open,High,Low,Close,Adj Close,Volume` header.
    Csv(std::path::PathBuf),
}

/// One recurrent layer followed by its dropout.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecurrentLayerSpec {
    pub units: usize,
    pub dropout: f64,
}

/// Shape of the stacked LSTM regressor.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelConfig {
    pub input_size: usize,
    pub layers: Vec<RecurrentLayerSpec>,
    pub output_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: 1,
            layers: RECURRENT_LAYERS
                .iter()
                .map(|&(units, dropout)| RecurrentLayerSpec { units, dropout })
                .collect(),
            output_size: 1,
        }
    }
}

impl ModelConfig {
    /// Small stack used by tests and quick experiments.
    pub fn with_layers(layers: &[(usize, f64)]) -> Self {
        Self {
            input_size: 1,
            layers: layers
                .iter()
                .map(|&(units, dropout)| RecurrentLayerSpec { units, dropout })
                .collect(),
            output_size: 1,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.layers.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "model needs at least one recurrent layer".to_string(),
            ));
        }
        if self.input_size == 0 || self.output_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "model input and output sizes must be positive".to_string(),
            ));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.units == 0 {
                return Err(PipelineError::InvalidConfig(format!("layer {} has zero units", i)));
            }
            if !(0.0..1.0).contains(&layer.dropout) {
                return Err(PipelineError::InvalidConfig(format!(
                    "layer {} dropout {} outside [0, 1)",
                    i, layer.dropout
                )));
            }
        }
        Ok(())
    }
}

/// Optimisation and early-stopping knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub patience: usize,
    pub learning_rate: f64,
    pub gradient_clip: Option<f64>,
    pub seed: u64,
    pub show_progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: EPOCHS,
            batch_size: BATCH_SIZE,
            patience: PATIENCE,
            learning_rate: LEARNING_RATE,
            gradient_clip: Some(GRADIENT_CLIP),
            seed: SEED,
            show_progress: true,
        }
    }
}

/// Everything one pipeline run needs, resolved and validated up front.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub symbol: String,
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
    pub source: DataSource,
    pub window_size: usize,
    pub moving_average_windows: Vec<usize>,
    pub train_ratio: f64,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub output: std::path::PathBuf,
    pub chart_dir: Option<std::path::PathBuf>,
    pub threads: Option<usize>,
}

impl PipelineConfig {
    pub fn new(symbol: &str, start: chrono::NaiveDate, end: chrono::NaiveDate) -> Self {
        Self {
            symbol: symbol.to_string(),
            start,
            end,
            source: DataSource::Yahoo,
            window_size: WINDOW_SIZE,
            moving_average_windows: MOVING_AVERAGE_WINDOWS.to_vec(),
            train_ratio: TRAIN_RATIO,
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
            output: std::path::PathBuf::from(DEFAULT_MODEL_PATH),
            chart_dir: None,
            threads: None,
        }
    }

    /// Rejects settings that would make a later stage meaningless.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.symbol.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("ticker symbol is empty".to_string()));
        }
        if self.end <= self.start {
            return Err(PipelineError::InvalidConfig(format!(
                "end date {} must be after start date {}",
                self.end, self.start
            )));
        }
        if self.window_size == 0 {
            return Err(PipelineError::InvalidConfig("window size must be positive".to_string()));
        }
        if self.moving_average_windows.iter().any(|&w| w == 0) {
            return Err(PipelineError::InvalidConfig(
                "moving average windows must be positive".to_string(),
            ));
        }
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "train ratio {} must lie strictly between 0 and 1",
                self.train_ratio
            )));
        }
        if self.training.epochs == 0 || self.training.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "epochs and batch size must be positive".to_string(),
            ));
        }
        if self.training.learning_rate <= 0.0 {
            return Err(PipelineError::InvalidConfig("learning rate must be positive".to_string()));
        }
        self.model.validate()
    }
}
