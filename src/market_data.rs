use crate::error::PipelineError;

/// Column names every daily table must provide, in display order.
pub const REQUIRED_COLUMNS: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];

/// One trading day.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PriceBar {
    pub date: chrono::NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

/// Daily bars with strictly increasing dates.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Builds a series from bars in any order.
    ///
    /// Bars are sorted by date; when a date repeats, the bar seen last wins
    /// (providers append a provisional bar for the current session).
    pub fn from_bars(mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|bar| bar.date);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => {
                    log::warn!("duplicate bar for {}, keeping the later one", bar.date);
                    *last = bar;
                }
                _ => deduped.push(bar),
            }
        }
        Self { bars: deduped }
    }

    /// Drops bars outside `[start, end)`.
    pub fn within(self, start: chrono::NaiveDate, end: chrono::NaiveDate) -> Self {
        Self {
            bars: self
                .bars
                .into_iter()
                .filter(|bar| bar.date >= start && bar.date < end)
                .collect(),
        }
    }

    /// Fails with `DataUnavailable` when the series holds no rows.
    pub fn require_rows(self, symbol: &str, start: chrono::NaiveDate, end: chrono::NaiveDate) -> Result<Self, PipelineError> {
        if self.bars.is_empty() {
            return Err(PipelineError::DataUnavailable {
                symbol: symbol.to_string(),
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(self)
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> Vec<chrono::NaiveDate> {
        self.bars.iter().map(|bar| bar.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }
}

/// Returns the required columns absent from `present`, in `REQUIRED_COLUMNS` order.
pub fn missing_columns<'a, I>(present: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: std::collections::HashSet<&str> = present.into_iter().map(str::trim).collect();
    REQUIRED_COLUMNS
        .iter()
        .filter(|column| !present.contains(*column))
        .map(|column| column.to_string())
        .collect()
}

/// Fails with `SchemaViolation` unless every required column is present.
pub fn check_schema<'a, I>(present: I) -> Result<(), PipelineError>
where
    I: IntoIterator<Item = &'a str>,
{
    let missing = missing_columns(present);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::SchemaViolation { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, close: f64) -> PriceBar {
        PriceBar {
            date: chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            adj_close: close,
            volume: 100,
        }
    }

    #[test]
    fn bars_are_sorted_and_deduplicated() {
        let series = PriceSeries::from_bars(vec![
            bar("2020-01-03", 3.0),
            bar("2020-01-02", 2.0),
            bar("2020-01-03", 4.0),
        ]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![2.0, 4.0]);
        assert!(series.bars().windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn end_date_is_exclusive() {
        let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2020, 1, 3).unwrap();
        let series = PriceSeries::from_bars(vec![bar("2020-01-01", 1.0), bar("2020-01-02", 2.0), bar("2020-01-03", 3.0)])
            .within(start, end);
        assert_eq!(series.closes(), vec![2.0]);
    }

    #[test]
    fn empty_series_is_data_unavailable() {
        let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2020, 2, 1).unwrap();
        let err = PriceSeries::from_bars(Vec::new()).require_rows("XYZ", start, end).unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable { ref symbol, .. } if symbol == "XYZ"));
    }

    #[test]
    fn schema_check_reports_missing_columns_in_order() {
        let err = check_schema(["Date", "Open", "High", "Low", "Close"]).unwrap_err();
        assert_eq!(
            err,
            PipelineError::SchemaViolation {
                missing: vec!["Adj Close".to_string(), "Volume".to_string()]
            }
        );
        assert!(check_schema(REQUIRED_COLUMNS).is_ok());
    }
}
