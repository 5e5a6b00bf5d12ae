use crate::dataset::PreparedData;
use crate::market_data::PriceSeries;
use crate::metrics::Evaluation;
use crate::model::LayerSummary;
use crate::moving_average::TrendFrame;
use crate::training::TrainingHistory;
use crate::utils;

pub const PRICE_CHART_FILE: &str = "price_moving_averages.csv";
pub const LOSS_CHART_FILE: &str = "training_loss.csv";
pub const PREDICTION_CHART_FILE: &str = "predictions.csv";

/// Prints the first `count` bars of the downloaded table.
///
/// # Example Output
/// ```text
///  - date: 2012-01-03, open: 16.26, high: 16.64, low: 16.25, close: 16.57, adj close: 16.57, vol: 147611217
/// ```
pub fn print_head(series: &PriceSeries, count: usize) {
    for bar in series.bars().iter().take(count) {
        println!(
            " - date: {}, open: {:.2}, high: {:.2}, low: {:.2}, close: {:.2}, adj close: {:.2}, vol: {}",
            utils::format_date(bar.date),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.adj_close,
            bar.volume,
        );
    }
}

/// Prints point counts and tensor shapes of both splits.
pub fn print_split(data: &PreparedData) {
    println!("📊 Training points: {}, test points: {}", data.train_points, data.test_points);
    println!(
        "   x_train {:?}, y_train {:?}",
        data.train.inputs.shape(),
        data.train.targets.shape()
    );
    println!(
        "   x_test {:?}, y_test {:?}",
        data.test.inputs.shape(),
        data.test.targets.shape()
    );
}

pub fn print_model_summary(rows: &[LayerSummary], total: usize) {
    println!("{:<20} {:<18} {:>10}", "Layer", "Output Shape", "Param #");
    println!("{}", "=".repeat(50));
    for row in rows {
        println!("{:<20} {:<18} {:>10}", row.name, row.output_shape, row.parameters);
    }
    println!("{}", "=".repeat(50));
    println!("Total params: {}", total);
}

pub fn print_training(history: &TrainingHistory) {
    let stop = if history.stopped_early { " (stopped early)" } else { "" };
    println!(
        "🧠 Trained {} epoch(s){}, best loss {:.6} at epoch {}",
        history.epochs_run(),
        stop,
        history.best_loss,
        history.best_epoch + 1
    );
}

pub fn print_evaluation(eval: &Evaluation) {
    println!("📈 Test predictions: {}", eval.len());
    println!("   MSE: {:.4}", eval.mse);
    println!("   MAE: {:.4}", eval.mae);
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes closes with their moving averages, one row per trading day.
///
/// Undefined averages are left as empty cells.
pub fn write_price_chart<P: AsRef<std::path::Path>>(path: P, frame: &TrendFrame) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["date".to_string(), "close".to_string()];
    header.extend(frame.averages.iter().map(|ma| format!("sma_{}", ma.window)));
    writer.write_record(&header)?;

    for (i, (date, close)) in frame.dates.iter().zip(&frame.closes).enumerate() {
        let mut row = vec![utils::format_date(*date), close.to_string()];
        row.extend(frame.averages.iter().map(|ma| optional_cell(ma.values[i])));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    anyhow::Ok(())
}

pub fn write_loss_chart<P: AsRef<std::path::Path>>(path: P, history: &TrainingHistory) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["epoch", "loss"])?;
    for (epoch, loss) in history.losses.iter().enumerate() {
        writer.write_record([(epoch + 1).to_string(), loss.to_string()])?;
    }
    writer.flush()?;
    anyhow::Ok(())
}

pub fn write_prediction_chart<P: AsRef<std::path::Path>>(path: P, eval: &Evaluation) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["date", "actual", "predicted"])?;
    for ((date, actual), predicted) in eval.dates.iter().zip(&eval.actual).zip(&eval.predicted) {
        writer.write_record([utils::format_date(*date), actual.to_string(), predicted.to_string()])?;
    }
    writer.flush()?;
    anyhow::Ok(())
}

/// Writes every chart series into `dir`, creating it if needed.
///
/// The prediction file is skipped when there was nothing to evaluate.
///
/// # Returns
/// * Paths of the files written.
pub fn export_charts<P: AsRef<std::path::Path>>(
    dir: P,
    frame: &TrendFrame,
    history: &TrainingHistory,
    eval: Option<&Evaluation>,
) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow::anyhow!("Failed to create chart directory {}: {}", dir.display(), e))?;

    let mut written = Vec::new();
    let price_path = dir.join(PRICE_CHART_FILE);
    write_price_chart(&price_path, frame)?;
    written.push(price_path);

    let loss_path = dir.join(LOSS_CHART_FILE);
    write_loss_chart(&loss_path, history)?;
    written.push(loss_path);

    if let Some(eval) = eval {
        let prediction_path = dir.join(PREDICTION_CHART_FILE);
        write_prediction_chart(&prediction_path, eval)?;
        written.push(prediction_path);
    }
    log::info!("wrote {} chart file(s) to {}", written.len(), dir.display());
    anyhow::Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moving_average::MovingAverage;

    fn day(d: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(2021, 3, d).unwrap()
    }

    fn frame() -> TrendFrame {
        TrendFrame {
            dates: vec![day(1), day(2), day(3)],
            closes: vec![10.0, 11.0, 12.5],
            averages: vec![
                MovingAverage {
                    window: 2,
                    values: vec![None, Some(10.5), Some(11.75)],
                },
                MovingAverage {
                    window: 3,
                    values: vec![None, None, Some(11.5)],
                },
            ],
        }
    }

    fn history() -> TrainingHistory {
        TrainingHistory {
            losses: vec![0.5, 0.25],
            best_epoch: 1,
            best_loss: 0.25,
            stopped_early: false,
        }
    }

    fn read_rows(path: &std::path::Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path).unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn price_chart_leaves_undefined_averages_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PRICE_CHART_FILE);
        write_price_chart(&path, &frame()).unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows[0], vec!["date", "close", "sma_2", "sma_3"]);
        assert_eq!(rows[1], vec!["2021-03-01", "10", "", ""]);
        assert_eq!(rows[3], vec!["2021-03-03", "12.5", "11.75", "11.5"]);
    }

    #[test]
    fn export_writes_all_three_series() {
        let dir = tempfile::tempdir().unwrap();
        let charts = dir.path().join("charts");
        let eval = Evaluation {
            dates: vec![day(3)],
            actual: vec![12.5],
            predicted: vec![12.0],
            mse: 0.25,
            mae: 0.5,
        };
        let written = export_charts(&charts, &frame(), &history(), Some(&eval)).unwrap();
        assert_eq!(written.len(), 3);

        let loss_rows = read_rows(&charts.join(LOSS_CHART_FILE));
        assert_eq!(loss_rows[1], vec!["1", "0.5"]);
        assert_eq!(loss_rows[2], vec!["2", "0.25"]);

        let prediction_rows = read_rows(&charts.join(PREDICTION_CHART_FILE));
        assert_eq!(prediction_rows[1], vec!["2021-03-03", "12.5", "12"]);
    }

    #[test]
    fn prediction_chart_is_skipped_without_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        let written = export_charts(dir.path(), &frame(), &history(), None).unwrap();
        assert_eq!(written.len(), 2);
        assert!(!dir.path().join(PREDICTION_CHART_FILE).exists());
    }
}
