use crate::market_data;

/// Simple moving average of `values` over a trailing `window`.
///
/// Position `i` holds the mean of `values[i + 1 - window ..= i]`; the first `window - 1`
/// positions have no value. Each mean is summed from its own window so no rounding
/// error accumulates along the series.
pub fn simple_moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    let mut averages = vec![None; values.len().min(window - 1)];
    averages.extend(
        values
            .windows(window)
            .map(|w| Some(w.iter().sum::<f64>() / window as f64)),
    );
    averages
}

/// A moving average aligned with the series it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverage {
    pub window: usize,
    pub values: Vec<Option<f64>>,
}

/// Closes, their dates and the trend lines derived from them.
#[derive(Debug, Clone)]
pub struct TrendFrame {
    pub dates: Vec<chrono::NaiveDate>,
    pub closes: Vec<f64>,
    pub averages: Vec<MovingAverage>,
}

/// Dates and closes left once rows without a full trend history are gone.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosingPrices {
    pub dates: Vec<chrono::NaiveDate>,
    pub closes: Vec<f64>,
}

impl ClosingPrices {
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

impl TrendFrame {
    /// Computes one moving average per entry of `windows` over the closing prices.
    pub fn compute(series: &market_data::PriceSeries, windows: &[usize]) -> Self {
        let closes = series.closes();
        let averages = windows
            .iter()
            .map(|&window| MovingAverage {
                window,
                values: simple_moving_average(&closes, window),
            })
            .collect();
        Self {
            dates: series.dates(),
            closes,
            averages,
        }
    }

    pub fn average(&self, window: usize) -> Option<&MovingAverage> {
        self.averages.iter().find(|ma| ma.window == window)
    }

    /// Keeps only the rows where every moving average is defined.
    ///
    /// The averages are for charting only; what goes on to the split is the close
    /// series, shortened by the longest window minus one.
    pub fn trimmed(&self) -> ClosingPrices {
        let keep: Vec<usize> = (0..self.closes.len())
            .filter(|&i| self.averages.iter().all(|ma| ma.values[i].is_some()))
            .collect();
        ClosingPrices {
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            closes: keep.iter().map(|&i| self.closes[i]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(closes: &[f64]) -> market_data::PriceSeries {
        let first = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        market_data::PriceSeries::from_bars(
            closes
                .iter()
                .enumerate()
                .map(|(i, &close)| market_data::PriceBar {
                    date: first + chrono::Days::new(i as u64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    adj_close: close,
                    volume: 1,
                })
                .collect(),
        )
    }

    #[test]
    fn leading_positions_are_undefined() {
        let ma = simple_moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(ma, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn window_longer_than_series_is_all_undefined() {
        let ma = simple_moving_average(&[1.0, 2.0], 5);
        assert_eq!(ma, vec![None, None]);
    }

    #[test]
    fn constant_series_averages_to_the_constant() {
        let values = vec![123.456; 350];
        for window in [1, 100, 200] {
            let ma = simple_moving_average(&values, window);
            assert_eq!(ma.len(), values.len());
            for value in ma.iter().skip(window - 1) {
                assert_relative_eq!(value.unwrap(), 123.456, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn trimming_drops_the_longest_warmup() {
        let closes: Vec<f64> = (0..300).map(|i| i as f64).collect();
        let frame = TrendFrame::compute(&series(&closes), &[100, 200]);
        let trimmed = frame.trimmed();

        assert_eq!(trimmed.len(), 300 - 199);
        assert_eq!(trimmed.closes[0], 199.0);
        assert_eq!(trimmed.dates[0], frame.dates[199]);
        assert_relative_eq!(frame.average(200).unwrap().values[199].unwrap(), 99.5);
    }
}
