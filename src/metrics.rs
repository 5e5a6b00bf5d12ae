use chrono::NaiveDate;
use ndarray::Array1;

use crate::dataset::WindowedDataset;
use crate::model::StackedLstm;
use crate::scaler::MinMaxScaler;

/// Examples handed to each rayon task during evaluation.
const INFERENCE_CHUNK: usize = 16;

/// Mean squared error over paired values; zero for empty input.
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let sum: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    sum / actual.len() as f64
}

/// Mean absolute error over paired values; zero for empty input.
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let sum: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();
    sum / actual.len() as f64
}

/// Test-period predictions in price units together with their errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub dates: Vec<NaiveDate>,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub mse: f64,
    pub mae: f64,
}

impl Evaluation {
    /// Runs `model` over every test window and maps the results back to prices.
    ///
    /// Inference is chunked across the current rayon pool, so call it inside
    /// `ThreadPool::install` to bound the thread count.
    pub fn evaluate(
        model: &StackedLstm,
        scaler: &MinMaxScaler,
        test: &WindowedDataset,
        dates: &[NaiveDate],
    ) -> Self {
        let scaled: Array1<f64> = model.predict_batched(&test.inputs, INFERENCE_CHUNK);
        let predicted = scaler.inverse_transform(&scaled.to_vec());
        let actual = scaler.inverse_transform(&test.targets.to_vec());
        let mse = mean_squared_error(&actual, &predicted);
        let mae = mean_absolute_error(&actual, &predicted);
        Self {
            dates: dates.to_vec(),
            actual,
            predicted,
            mse,
            mae,
        }
    }

    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }
}
