use ndarray::{Array1, Array3, ArrayView2, s};

use crate::error::PipelineError;
use crate::moving_average::ClosingPrices;
use crate::scaler::MinMaxScaler;

/// Training prefix and test suffix of a close series, in time order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChronologicalSplit {
    pub train: ClosingPrices,
    pub test: ClosingPrices,
}

/// Splits `prices` into the first `floor(len * train_ratio)` points and the rest.
///
/// # Errors
/// * `PipelineError::InsufficientData` if the training part is shorter than `window`.
pub fn split_chronological(
    prices: &ClosingPrices,
    train_ratio: f64,
    window: usize,
) -> Result<ChronologicalSplit, PipelineError> {
    let train_size = (prices.len() as f64 * train_ratio) as usize;
    if train_size < window {
        return Err(PipelineError::InsufficientData {
            available: train_size,
            required: window,
        });
    }
    Ok(ChronologicalSplit {
        train: ClosingPrices {
            dates: prices.dates[..train_size].to_vec(),
            closes: prices.closes[..train_size].to_vec(),
        },
        test: ClosingPrices {
            dates: prices.dates[train_size..].to_vec(),
            closes: prices.closes[train_size..].to_vec(),
        },
    })
}

/// Supervised examples cut from a scaled series.
///
/// `inputs` is laid out as (example, time step, feature) with a single feature;
/// `targets[k]` is the value right after `inputs[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedDataset {
    pub inputs: Array3<f64>,
    pub targets: Array1<f64>,
}

impl WindowedDataset {
    /// Cuts every `(sequence[k..k + window], sequence[k + window])` pair.
    ///
    /// Yields `len - window` examples, or none when the sequence is not longer
    /// than the window.
    pub fn from_sequence(sequence: &[f64], window: usize) -> Self {
        let count = sequence.len().saturating_sub(window);
        let inputs = Array3::from_shape_fn((count, window, 1), |(k, t, _)| sequence[k + t]);
        let targets = Array1::from_shape_fn(count, |k| sequence[k + window]);
        Self { inputs, targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Input window of example `k` as a (time step, feature) view.
    pub fn input(&self, k: usize) -> ArrayView2<'_, f64> {
        self.inputs.slice(s![k, .., ..])
    }
}

/// Everything the model needs, scaled with bounds learned from training data only.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub scaler: MinMaxScaler,
    pub train: WindowedDataset,
    pub test: WindowedDataset,
    /// Trading date of each test target.
    pub test_dates: Vec<chrono::NaiveDate>,
    pub train_points: usize,
    pub test_points: usize,
}

/// Splits, scales and windows the trimmed close series.
///
/// The test sequence is preceded by the last `window` training closes so the first
/// test target already has a full window behind it; every test example therefore
/// predicts a test-period close.
///
/// # Errors
/// * `PipelineError::InsufficientData` if the training part is shorter than `window`.
/// * `PipelineError::NumericIntegrity` if scaling yields a non-finite value.
pub fn prepare(prices: &ClosingPrices, train_ratio: f64, window: usize) -> Result<PreparedData, PipelineError> {
    let split = split_chronological(prices, train_ratio, window)?;

    let scaler = MinMaxScaler::fit(&split.train.closes)?;
    let train_scaled = scaler.transform(&split.train.closes, "training data scaling")?;

    let context_start = split.train.len() - window;
    let mut test_context = split.train.closes[context_start..].to_vec();
    test_context.extend_from_slice(&split.test.closes);
    let test_scaled = scaler.transform(&test_context, "test data scaling")?;

    let train = WindowedDataset::from_sequence(&train_scaled, window);
    let test = WindowedDataset::from_sequence(&test_scaled, window);
    let test_dates = split.test.dates[split.test.len() - test.len()..].to_vec();

    Ok(PreparedData {
        scaler,
        train,
        test,
        test_dates,
        train_points: split.train.len(),
        test_points: split.test.len(),
    })
}
