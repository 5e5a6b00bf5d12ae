use crate::error::PipelineError;
use crate::market_data;

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) close-price-lstm/0.2";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, serde::Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, serde::Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, serde::Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, serde::Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Default, serde::Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

/// Columns arrive as parallel arrays; `null` marks a day without a print.
#[derive(Debug, serde::Deserialize)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

#[derive(Debug, serde::Deserialize)]
struct AdjClose {
    adjclose: Option<Vec<Option<f64>>>,
}

/// Blocking client for the Yahoo Finance chart endpoint.
#[derive(Debug, Clone)]
pub struct YahooClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooClient {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(YAHOO_CHART_URL)
    }

    /// Client pointed at another host, e.g. a local mirror.
    pub fn with_base_url(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        anyhow::Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Downloads daily bars for `symbol` over `[start, end)`.
    ///
    /// # Arguments
    /// * `symbol` - Ticker, e.g. "GOOG".
    /// * `start` - First date, inclusive.
    /// * `end` - Last date, exclusive.
    ///
    /// # Returns
    /// * `anyhow::Result<PriceSeries>` - Bars in date order.
    ///
    /// # Errors
    /// * If the request fails or the body is not a chart payload.
    /// * `PipelineError::DataUnavailable` if the provider has no rows for the request.
    /// * `PipelineError::SchemaViolation` if a required column is absent.
    pub fn fetch_daily(
        &self,
        symbol: &str,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> anyhow::Result<market_data::PriceSeries> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, encode_symbol(symbol));
        let period1 = midnight_utc(start);
        let period2 = midnight_utc(end);
        log::debug!("requesting {} period1={} period2={}", url, period1, period2);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ])
            .send()
            .map_err(|e| anyhow::anyhow!("Error downloading data for {}: {}", symbol, e))?;

        let status = response.status();
        let body = response.text()?;
        match parse_chart(&body, symbol, start, end) {
            Ok(series) => {
                log::info!("downloaded {} bars for {}", series.len(), symbol);
                Ok(series)
            }
            // Not Found answers come with a 404 but still carry a typed error.
            Err(e) if e.downcast_ref::<PipelineError>().is_some() => Err(e),
            Err(e) if !status.is_success() => {
                Err(anyhow::anyhow!("Error downloading data for {}: HTTP {} ({})", symbol, status, e))
            }
            Err(e) => Err(e),
        }
    }
}

/// Parses a chart payload into bars restricted to `[start, end)`.
///
/// Rows with a null in any column are skipped. Bar dates are the exchange-local
/// calendar dates of the returned timestamps.
pub fn parse_chart(
    body: &str,
    symbol: &str,
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
) -> anyhow::Result<market_data::PriceSeries> {
    let unavailable = || PipelineError::DataUnavailable {
        symbol: symbol.to_string(),
        start: start.to_string(),
        end: end.to_string(),
    };

    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| anyhow::anyhow!("Failed to parse chart payload: {}", e))?;

    if let Some(error) = envelope.chart.error {
        if error.code == "Not Found" {
            return Err(unavailable().into());
        }
        return Err(anyhow::anyhow!(
            "Yahoo Finance returned {}: {}",
            error.code,
            error.description.unwrap_or_default()
        ));
    }

    let result = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(unavailable)?;
    let timestamps = match result.timestamp {
        Some(ts) if !ts.is_empty() => ts,
        _ => return Err(unavailable().into()),
    };
    let gmtoffset = result.meta.map(|m| m.gmtoffset).unwrap_or(0);
    let indicators = result.indicators.unwrap_or_default();
    let quote = indicators.quote.into_iter().next();
    let adjclose = indicators.adjclose.into_iter().next().and_then(|a| a.adjclose);

    let (open, high, low, close, volume) = match quote {
        Some(q) => (q.open, q.high, q.low, q.close, q.volume),
        None => (None, None, None, None, None),
    };

    let columns = [
        ("Open", open),
        ("High", high),
        ("Low", low),
        ("Close", close),
        ("Adj Close", adjclose),
        ("Volume", volume),
    ];
    let missing: Vec<String> = columns
        .iter()
        .filter(|(_, values)| values.is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::SchemaViolation { missing }.into());
    }

    let mut values: Vec<Vec<Option<f64>>> = Vec::with_capacity(columns.len());
    for (name, column) in columns {
        let column = column.unwrap_or_default();
        if column.len() != timestamps.len() {
            return Err(anyhow::anyhow!(
                "Column {} has {} values for {} timestamps",
                name,
                column.len(),
                timestamps.len()
            ));
        }
        values.push(column);
    }

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut skipped = 0usize;
    for (i, &ts) in timestamps.iter().enumerate() {
        let row: Option<Vec<f64>> = values.iter().map(|column| column[i]).collect();
        let Some(row) = row else {
            skipped += 1;
            continue;
        };
        let date = chrono::DateTime::from_timestamp(ts + gmtoffset, 0)
            .ok_or_else(|| anyhow::anyhow!("Invalid timestamp {}", ts))?
            .date_naive();
        bars.push(market_data::PriceBar {
            date,
            open: row[0],
            high: row[1],
            low: row[2],
            close: row[3],
            adj_close: row[4],
            volume: row[5].max(0.0) as u64,
        });
    }
    if skipped > 0 {
        log::warn!("skipped {} rows with null prices for {}", skipped, symbol);
    }

    let series = market_data::PriceSeries::from_bars(bars)
        .within(start, end)
        .require_rows(symbol, start, end)?;
    anyhow::Ok(series)
}

fn midnight_utc(date: chrono::NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}

/// Index tickers such as `^GSPC` need the caret escaped in the path.
fn encode_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase().replace('^', "%5E")
}
