use crate::market_data;

/// Represents a single record from an input CSV in the common daily export layout.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CsvRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: Option<f64>,
    #[serde(rename = "High")]
    high: Option<f64>,
    #[serde(rename = "Low")]
    low: Option<f64>,
    #[serde(rename = "Close")]
    close: Option<f64>,
    #[serde(rename = "Adj Close")]
    adj_close: Option<f64>,
    #[serde(rename = "Volume")]
    volume: Option<f64>,
}

impl CsvRecord {
    /// Converts the record into a bar, or `None` when a price cell is empty.
    fn into_bar(self) -> anyhow::Result<Option<market_data::PriceBar>> {
        let date = chrono::NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Failed to parse date {:?}: {}", self.date, e))?;

        match (self.open, self.high, self.low, self.close, self.adj_close, self.volume) {
            (Some(open), Some(high), Some(low), Some(close), Some(adj_close), Some(volume)) => {
                Ok(Some(market_data::PriceBar {
                    date,
                    open,
                    high,
                    low,
                    close,
                    adj_close,
                    volume: volume.max(0.0) as u64,
                }))
            }
            _ => Ok(None),
        }
    }
}

/// Reads daily bars from any CSV reader.
///
/// This function:
/// 1. Checks that the header carries every required column.
/// 2. Deserializes each row, parsing the date as `%Y-%m-%d`.
/// 3. Skips rows with empty price cells (non-trading placeholders).
/// 4. Sorts and deduplicates the bars by date.
///
/// # Arguments
/// * `reader` - CSV reader positioned at the header row.
///
/// # Returns
/// * `anyhow::Result<PriceSeries>` - The bars in date order (possibly empty).
///
/// # Errors
/// * `PipelineError::SchemaViolation` if a required column is missing.
/// * If a row cannot be deserialized or its date cannot be parsed.
pub fn read_bars<R: std::io::Read>(reader: &mut csv::Reader<R>) -> anyhow::Result<market_data::PriceSeries> {
    let headers = reader.headers()?.clone();
    market_data::check_schema(headers.iter())?;

    let mut bars = Vec::new();
    let mut skipped = 0usize;
    for result in reader.deserialize::<CsvRecord>() {
        let record: CsvRecord = result?;
        match record.into_bar()? {
            Some(bar) => bars.push(bar),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        log::warn!("skipped {} rows with empty price cells", skipped);
    }

    anyhow::Ok(market_data::PriceSeries::from_bars(bars))
}

/// Loads the bars for `[start, end)` from a CSV file.
///
/// # Arguments
/// * `path` - Path to the CSV file.
/// * `symbol` - Ticker the file belongs to, used in diagnostics.
/// * `start`, `end` - Date range, end exclusive.
///
/// # Errors
/// * If the file cannot be opened or parsed.
/// * `PipelineError::SchemaViolation` if required columns are missing.
/// * `PipelineError::DataUnavailable` if no bar falls inside the range.
pub fn load_bars<P: AsRef<std::path::Path>>(
    path: P,
    symbol: &str,
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
) -> anyhow::Result<market_data::PriceSeries> {
    let input_file = std::fs::File::open(path.as_ref())
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", path.as_ref().display(), e))?;
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(input_file);

    let series = read_bars(&mut reader)?.within(start, end);
    log::info!("loaded {} bars for {} from {}", series.len(), symbol, path.as_ref().display());

    let series = series.require_rows(symbol, start, end)?;
    anyhow::Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, as_pipeline_error};
    use std::io::Write;

    const SAMPLE: &str = "\
Date,Open,High,Low,Close,Adj Close,Volume
2020-01-03,10.0,11.0,9.5,10.5,10.4,1000
2020-01-02,9.0,10.0,8.5,9.5,9.4,900
2020-01-06,,,,,,
2020-01-07,11.0,12.0,10.5,11.5,11.4,1100.0
";

    fn reader(text: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new().has_headers(true).from_reader(text.as_bytes())
    }

    #[test]
    fn rows_are_sorted_and_blank_rows_skipped() {
        let series = read_bars(&mut reader(SAMPLE)).unwrap();
        assert_eq!(series.closes(), vec![9.5, 10.5, 11.5]);
        assert_eq!(series.bars()[2].volume, 1100);
    }

    #[test]
    fn missing_adjusted_close_is_a_schema_violation() {
        let text = "Date,Open,High,Low,Close,Volume\n2020-01-02,1,1,1,1,1\n";
        let err = read_bars(&mut reader(text)).unwrap_err();
        assert_eq!(
            as_pipeline_error(&err),
            Some(&PipelineError::SchemaViolation {
                missing: vec!["Adj Close".to_string()]
            })
        );
    }

    #[test]
    fn file_outside_range_is_data_unavailable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let start = chrono::NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let err = load_bars(file.path(), "TEST", start, end).unwrap_err();
        assert!(matches!(
            as_pipeline_error(&err),
            Some(PipelineError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn bad_date_is_reported() {
        let text = "Date,Open,High,Low,Close,Adj Close,Volume\n02/01/2020,1,1,1,1,1,1\n";
        assert!(read_bars(&mut reader(text)).is_err());
    }
}
