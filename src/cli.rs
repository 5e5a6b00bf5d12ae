use crate::config;
use crate::error::PipelineError;
use crate::utils;

/// Structure representing command-line arguments.
#[derive(Debug)]
pub struct Args {
    pub symbol: String,
    pub start: String,
    pub end: String,
    pub input: Option<std::path::PathBuf>,
    pub output: std::path::PathBuf,
    pub window: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub patience: usize,
    pub train_ratio: f64,
    pub seed: u64,
    pub threads: Option<usize>,
    pub chart_dir: Option<std::path::PathBuf>,
    pub quiet: bool,
}

/// Command-line arguments parser using Clap.
///
/// Every flag has a default, so running without arguments trains on GOOG from
/// 2012-01-01 to 2022-12-21 with a window of 100 and up to 50 epochs.
impl Args {
    /// Parses command-line arguments using `clap`.
    ///
    /// # Returns
    /// * `Args` - Struct containing parsed arguments.
    ///
    /// # Errors
    /// * Clap prints usage and exits if an argument is malformed.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        // Numeric flags carry no clap default; absent ones fall back to the config constants.
        let string = |id: &str| matches.get_one::<String>(id).cloned().unwrap_or_default();
        Args {
            symbol: string("symbol"),
            start: string("start"),
            end: string("end"),
            input: matches.get_one::<String>("input").map(std::path::PathBuf::from),
            output: std::path::PathBuf::from(string("output")),
            window: matches.get_one::<usize>("window").copied().unwrap_or(config::WINDOW_SIZE),
            epochs: matches.get_one::<usize>("epochs").copied().unwrap_or(config::EPOCHS),
            batch_size: matches.get_one::<usize>("batch-size").copied().unwrap_or(config::BATCH_SIZE),
            patience: matches.get_one::<usize>("patience").copied().unwrap_or(config::PATIENCE),
            train_ratio: matches.get_one::<f64>("train-ratio").copied().unwrap_or(config::TRAIN_RATIO),
            seed: matches.get_one::<u64>("seed").copied().unwrap_or(config::SEED),
            threads: matches.get_one::<usize>("threads").cloned(),
            chart_dir: matches.get_one::<String>("chart-dir").map(std::path::PathBuf::from),
            quiet: matches.get_flag("quiet"),
        }
    }

    /// Resolves the raw arguments into a validated pipeline configuration.
    ///
    /// # Errors
    /// * `PipelineError::InvalidConfig` if a date does not parse or a value is out of range.
    pub fn into_config(self) -> Result<config::PipelineConfig, PipelineError> {
        let start = utils::parse_date(&self.start)?;
        let end = utils::parse_date(&self.end)?;

        let mut cfg = config::PipelineConfig::new(&self.symbol, start, end);
        if let Some(path) = self.input {
            cfg.source = config::DataSource::Csv(path);
        }
        cfg.output = self.output;
        cfg.window_size = self.window;
        cfg.train_ratio = self.train_ratio;
        cfg.training.epochs = self.epochs;
        cfg.training.batch_size = self.batch_size;
        cfg.training.patience = self.patience;
        cfg.training.seed = self.seed;
        cfg.training.show_progress = !self.quiet;
        cfg.threads = self.threads;
        cfg.chart_dir = self.chart_dir;

        cfg.validate()?;
        Ok(cfg)
    }
}

fn command() -> clap::Command {
    clap::Command::new("close-price-lstm")
        .version("0.2.0")
        .about("Train a stacked LSTM on daily closes and report its error on the held-out tail")
        .arg(
            clap::Arg::new("symbol")
                .short('s')
                .long("symbol")
                .help("Ticker symbol to download")
                .default_value(config::DEFAULT_SYMBOL)
                .num_args(1),
        )
        .arg(
            clap::Arg::new("start")
                .long("start")
                .help("First date of the range, inclusive (YYYY-MM-DD)")
                .default_value(config::DEFAULT_START)
                .num_args(1),
        )
        .arg(
            clap::Arg::new("end")
                .long("end")
                .help("Last date of the range, exclusive (YYYY-MM-DD)")
                .default_value(config::DEFAULT_END)
                .num_args(1),
        )
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("Read daily bars from a CSV file instead of downloading them")
                .num_args(1),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("Path of the saved model file")
                .default_value(config::DEFAULT_MODEL_PATH)
                .num_args(1),
        )
        .arg(
            clap::Arg::new("window")
                .short('w')
                .long("window")
                .help(format!("Number of trailing closes per training example [default: {}]", config::WINDOW_SIZE))
                .value_parser(clap::builder::ValueParser::new(parse_usize_positive)),
        )
        .arg(
            clap::Arg::new("epochs")
                .short('e')
                .long("epochs")
                .help(format!("Maximum number of training epochs [default: {}]", config::EPOCHS))
                .value_parser(clap::builder::ValueParser::new(parse_usize_positive)),
        )
        .arg(
            clap::Arg::new("batch-size")
                .short('b')
                .long("batch-size")
                .help(format!("Mini-batch size [default: {}]", config::BATCH_SIZE))
                .value_parser(clap::builder::ValueParser::new(parse_usize_positive)),
        )
        .arg(
            clap::Arg::new("patience")
                .short('p')
                .long("patience")
                .help(format!(
                    "Epochs without loss improvement before training stops [default: {}]",
                    config::PATIENCE
                ))
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            clap::Arg::new("train-ratio")
                .long("train-ratio")
                .help(format!("Fraction of the series used for training [default: {}]", config::TRAIN_RATIO))
                .value_parser(clap::builder::ValueParser::new(parse_ratio)),
        )
        .arg(
            clap::Arg::new("seed")
                .long("seed")
                .help(format!("Seed for weight initialisation, dropout and shuffling [default: {}]", config::SEED))
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("Number of threads to use for inference (default: all available)")
                .num_args(1)
                .value_parser(clap::builder::ValueParser::new(parse_usize_positive)),
        )
        .arg(
            clap::Arg::new("chart-dir")
                .long("chart-dir")
                .help("Write chart series (prices, loss, predictions) as CSV files into this directory")
                .num_args(1),
        )
        .arg(
            clap::Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Hide the training progress bar")
                .required(false)
                .action(clap::ArgAction::SetTrue),
        )
}

/// Validates that a count argument is a positive integer.
///
/// # Arguments
/// * `s` - String representation of the count.
///
/// # Returns
/// * `Result<usize>` - Validated count.
fn parse_usize_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("Must be a positive integer".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("Not a valid number: {}", e)),
    }
}

/// Validates that a ratio lies strictly between 0 and 1.
fn parse_ratio(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(r) if r > 0.0 && r < 1.0 => Ok(r),
        Ok(r) => Err(format!("Ratio {} must lie strictly between 0 and 1", r)),
        Err(e) => Err(format!("Not a valid number: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_from(argv: &[&str]) -> Args {
        let matches = command().try_get_matches_from(argv).unwrap();
        Args::from_matches(&matches)
    }

    #[test]
    fn defaults_reproduce_the_goog_run() {
        let args = parse_from(&["close-price-lstm"]);
        assert_eq!(args.symbol, "GOOG");
        assert_eq!(args.start, "2012-01-01");
        assert_eq!(args.end, "2022-12-21");
        assert_eq!(args.window, 100);
        assert_eq!(args.epochs, 50);
        assert!(args.input.is_none());

        assert_eq!(args.batch_size, config::BATCH_SIZE);
        assert_eq!(args.patience, config::PATIENCE);
        assert_eq!(args.train_ratio, config::TRAIN_RATIO);
        assert_eq!(args.seed, config::SEED);

        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.source, config::DataSource::Yahoo);
        assert_eq!(cfg.output, std::path::PathBuf::from("Stock_Predictions_Model.bin"));
    }

    #[test]
    fn input_file_switches_the_source() {
        let args = parse_from(&["close-price-lstm", "-i", "bars.csv", "-w", "20", "-q"]);
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.source, config::DataSource::Csv("bars.csv".into()));
        assert_eq!(cfg.window_size, 20);
        assert!(!cfg.training.show_progress);
    }

    #[test]
    fn zero_window_is_refused_by_the_parser() {
        assert!(command().try_get_matches_from(["close-price-lstm", "-w", "0"]).is_err());
    }

    #[test]
    fn ratio_outside_unit_interval_is_refused() {
        assert!(parse_ratio("1.0").is_err());
        assert!(parse_ratio("0").is_err());
        assert_eq!(parse_ratio("0.75"), Ok(0.75));
    }

    #[test]
    fn malformed_date_is_a_config_error() {
        let args = parse_from(&["close-price-lstm", "--start", "2012/01/01"]);
        assert!(matches!(args.into_config(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn help_shows_defaults_from_the_config_constants() {
        let help = command().render_help().to_string();
        assert!(help.contains(&format!("[default: {}]", config::WINDOW_SIZE)));
        assert!(help.contains(&format!("[default: {}]", config::TRAIN_RATIO)));
    }

    #[test]
    fn explicit_values_override_the_constants() {
        let args = parse_from(&["close-price-lstm", "-e", "7", "--train-ratio", "0.6", "--seed", "3"]);
        assert_eq!(args.epochs, 7);
        assert_eq!(args.train_ratio, 0.6);
        assert_eq!(args.seed, 3);
    }
}
