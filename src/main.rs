use close_price_lstm::{cli, pipeline};

/// Initialises logging: warnings from dependencies, info from this crate.
///
/// `RUST_LOG` overrides both levels.
fn init_logging() {
    let mut builder = env_logger::Builder::new();
    builder
        .filter(None, log::LevelFilter::Warn)
        .filter(Some("close_price_lstm"), log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Main entry point of the application.
///
/// This function orchestrates the entire workflow:
/// 1. Parses and validates command-line arguments.
/// 2. Downloads or loads the daily bars.
/// 3. Trains the model and evaluates it on the held-out tail.
/// 4. Saves the model artifact and, if asked, the chart series.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Success or an error if any step fails.
fn main() -> anyhow::Result<()> {
    init_logging();
    let total_start = std::time::Instant::now();
    let config = cli::Args::parse().into_config()?;
    println!(
        "Start training for {} ({} to {})...",
        config.symbol, config.start, config.end
    );

    let outcome = pipeline::run(&config)?;

    println!(
        "✅ Finished in {:.2} seconds: {} training / {} test windows",
        total_start.elapsed().as_secs_f64(),
        outcome.train_windows,
        outcome.test_windows
    );
    for path in &outcome.chart_files {
        println!("   chart data: {}", path.display());
    }
    Ok(())
}
