use crate::error::PipelineError;

/// Min-max transform into `[0, 1]`, learned from one sample and reused unchanged.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MinMaxScaler {
    data_min: f64,
    data_max: f64,
}

impl MinMaxScaler {
    /// Learns the bounds of `values`.
    ///
    /// # Errors
    /// * `PipelineError::InsufficientData` if `values` is empty.
    /// * `PipelineError::NumericIntegrity` if `values` holds NaN or infinity.
    pub fn fit(values: &[f64]) -> Result<Self, PipelineError> {
        if values.is_empty() {
            return Err(PipelineError::InsufficientData {
                available: 0,
                required: 1,
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::numeric("scaler fitting"));
        }
        let (data_min, data_max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Ok(Self { data_min, data_max })
    }

    pub fn data_min(&self) -> f64 {
        self.data_min
    }

    pub fn data_max(&self) -> f64 {
        self.data_max
    }

    /// A flat sample maps to 0 instead of dividing by zero.
    fn range(&self) -> f64 {
        let range = self.data_max - self.data_min;
        if range == 0.0 { 1.0 } else { range }
    }

    pub fn scale(&self, value: f64) -> f64 {
        (value - self.data_min) / self.range()
    }

    pub fn unscale(&self, value: f64) -> f64 {
        value * self.range() + self.data_min
    }

    /// Scales every value with the fitted bounds.
    ///
    /// Values outside the fitted range land outside `[0, 1]`; they are not clipped.
    ///
    /// # Errors
    /// * `PipelineError::NumericIntegrity` naming `stage` if any output is not finite.
    pub fn transform(&self, values: &[f64], stage: &str) -> Result<Vec<f64>, PipelineError> {
        let scaled: Vec<f64> = values.iter().map(|&v| self.scale(v)).collect();
        if scaled.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::numeric(stage));
        }
        Ok(scaled)
    }

    pub fn inverse_transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.unscale(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn training_sample_spans_the_unit_interval() {
        let scaler = MinMaxScaler::fit(&[10.0, 20.0, 15.0]).unwrap();
        let scaled = scaler.transform(&[10.0, 20.0, 15.0], "train").unwrap();
        assert_eq!(scaled, vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn round_trip_restores_the_input() {
        let values: Vec<f64> = (0..500).map(|i| 100.0 + (i as f64 * 0.37).sin() * 40.0).collect();
        let scaler = MinMaxScaler::fit(&values).unwrap();
        let restored = scaler.inverse_transform(&scaler.transform(&values, "train").unwrap());
        for (a, b) in values.iter().zip(&restored) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn bounds_ignore_whatever_is_transformed_later() {
        let scaler = MinMaxScaler::fit(&[1.0, 3.0]).unwrap();
        let before = scaler;
        let scaled = scaler.transform(&[-100.0, 5.0, 1000.0], "test").unwrap();
        assert_eq!(scaler, before);
        assert_eq!(scaler.data_min(), 1.0);
        assert_eq!(scaler.data_max(), 3.0);
        assert_eq!(scaled, vec![-50.5, 2.0, 499.5]);
    }

    #[test]
    fn constant_sample_does_not_produce_nan() {
        let scaler = MinMaxScaler::fit(&[7.0; 10]).unwrap();
        let scaled = scaler.transform(&[7.0, 8.0], "train").unwrap();
        assert_eq!(scaled, vec![0.0, 1.0]);
        assert_eq!(scaler.inverse_transform(&scaled), vec![7.0, 8.0]);
    }

    #[test]
    fn nan_input_is_a_numeric_integrity_error() {
        assert_eq!(
            MinMaxScaler::fit(&[1.0, f64::NAN]),
            Err(PipelineError::numeric("scaler fitting"))
        );
        let scaler = MinMaxScaler::fit(&[1.0, 2.0]).unwrap();
        assert_eq!(
            scaler.transform(&[f64::NAN], "test scaling"),
            Err(PipelineError::numeric("test scaling"))
        );
    }
}
