/// Fatal conditions raised by the pipeline stages.
///
/// Every variant stops the run. I/O and transport failures are not listed here;
/// they travel as `anyhow::Error` with context attached by the caller.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PipelineError {
    /// The market-data source returned no rows for the request.
    #[error("no data found for ticker {symbol} between {start} and {end}")]
    DataUnavailable {
        symbol: String,
        start: String,
        end: String,
    },

    /// One or more required fields are absent from the fetched table.
    #[error("missing columns in data: {}", .missing.join(", "))]
    SchemaViolation { missing: Vec<String> },

    /// Too few training points to form a single window.
    #[error(
        "training data is too small ({available} points, window needs {required}); \
         adjust the split ratio or the window size"
    )]
    InsufficientData { available: usize, required: usize },

    /// Scaling or training produced NaN or infinite values.
    #[error("non-finite values produced during {stage}")]
    NumericIntegrity { stage: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub fn numeric(stage: impl Into<String>) -> Self {
        PipelineError::NumericIntegrity {
            stage: stage.into(),
        }
    }
}

/// Recovers the typed pipeline error from an `anyhow` chain, if there is one.
pub fn as_pipeline_error(err: &anyhow::Error) -> Option<&PipelineError> {
    err.downcast_ref::<PipelineError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_violation_lists_every_missing_field() {
        let err = PipelineError::SchemaViolation {
            missing: vec!["Adj Close".to_string(), "Volume".to_string()],
        };
        assert_eq!(err.to_string(), "missing columns in data: Adj Close, Volume");
    }

    #[test]
    fn data_unavailable_names_the_request() {
        let err = PipelineError::DataUnavailable {
            symbol: "GOOG".to_string(),
            start: "2012-01-01".to_string(),
            end: "2022-12-21".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no data found for ticker GOOG between 2012-01-01 and 2022-12-21"
        );
    }
}
