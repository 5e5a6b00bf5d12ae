use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::{DataSource, PipelineConfig};
use crate::csv_source;
use crate::dataset;
use crate::market_data::PriceSeries;
use crate::metrics::Evaluation;
use crate::model::StackedLstm;
use crate::moving_average::TrendFrame;
use crate::persistence::ModelArtifact;
use crate::report;
use crate::training::{Trainer, TrainingHistory};
use crate::utils;
use crate::yahoo::YahooClient;

/// Rows of the raw table echoed to the console.
const HEAD_ROWS: usize = 5;

/// What one run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub bars: usize,
    pub train_points: usize,
    pub test_points: usize,
    pub train_windows: usize,
    pub test_windows: usize,
    pub parameters: usize,
    pub history: TrainingHistory,
    /// `None` when the test split produced no windows.
    pub evaluation: Option<Evaluation>,
    pub model_path: std::path::PathBuf,
    pub chart_files: Vec<std::path::PathBuf>,
}

/// Fetches the configured bars from Yahoo or a local CSV export.
pub fn acquire(config: &PipelineConfig) -> anyhow::Result<PriceSeries> {
    match &config.source {
        DataSource::Yahoo => {
            let client = YahooClient::new()?;
            client
                .fetch_daily(&config.symbol, config.start, config.end)
                .with_context(|| format!("Failed to download daily bars for {}", config.symbol))
        }
        DataSource::Csv(path) => csv_source::load_bars(path, &config.symbol, config.start, config.end),
    }
}

/// Runs every stage on bars already in memory.
///
/// # Errors
/// * `PipelineError::InvalidConfig` if `config` does not validate.
/// * `PipelineError::InsufficientData` if the trimmed series cannot fill one training window.
/// * `PipelineError::NumericIntegrity` if scaling or training produces non-finite values.
/// * If the thread pool, chart export or model save fails.
pub fn run_on_series(config: &PipelineConfig, series: &PriceSeries) -> anyhow::Result<PipelineOutcome> {
    config.validate()?;
    let threads = utils::effective_threads(config.threads)?;
    println!("🚀 Using {} thread(s) for inference", threads);
    let pool = utils::configure_thread_pool(threads)?;

    let frame = TrendFrame::compute(series, &config.moving_average_windows);
    let prices = frame.trimmed();
    log::info!(
        "{} of {} rows have every moving average defined",
        prices.len(),
        series.len()
    );

    let data = dataset::prepare(&prices, config.train_ratio, config.window_size)?;
    report::print_split(&data);

    let mut rng = StdRng::seed_from_u64(config.training.seed);
    let mut model = StackedLstm::new(config.model.clone(), &mut rng);
    report::print_model_summary(&model.summary(config.window_size), model.parameter_count());

    let train_start = std::time::Instant::now();
    let history = Trainer::new(config.training.clone()).train(&mut model, &data.train)?;
    report::print_training(&history);
    log::info!("training took {:.1}s", train_start.elapsed().as_secs_f64());

    let evaluation = if data.test.is_empty() {
        log::warn!("test split produced no windows; skipping evaluation");
        None
    } else {
        let eval = pool.install(|| Evaluation::evaluate(&model, &data.scaler, &data.test, &data.test_dates));
        report::print_evaluation(&eval);
        Some(eval)
    };

    let chart_files = match &config.chart_dir {
        Some(dir) => report::export_charts(dir, &frame, &history, evaluation.as_ref())
            .with_context(|| format!("Failed to export charts to {}", dir.display()))?,
        None => Vec::new(),
    };

    let parameters = model.parameter_count();
    let artifact = ModelArtifact {
        symbol: config.symbol.clone(),
        start: config.start,
        end: config.end,
        window_size: config.window_size,
        scaler: data.scaler,
        model,
        epochs_trained: history.epochs_run(),
        best_loss: history.best_loss,
    };
    artifact.save(&config.output)?;
    println!("💾 Model saved to {}", config.output.display());

    anyhow::Ok(PipelineOutcome {
        bars: series.len(),
        train_points: data.train_points,
        test_points: data.test_points,
        train_windows: data.train.len(),
        test_windows: data.test.len(),
        parameters,
        history,
        evaluation,
        model_path: config.output.clone(),
        chart_files,
    })
}

/// Acquires the bars, prints the head of the table and runs the remaining stages.
///
/// The configuration is checked before any download starts.
pub fn run(config: &PipelineConfig) -> anyhow::Result<PipelineOutcome> {
    config.validate()?;
    let series = acquire(config)?;
    println!("📥 Loaded {} daily bars for {}", series.len(), config.symbol);
    report::print_head(&series, HEAD_ROWS);
    run_on_series(config, &series)
}
