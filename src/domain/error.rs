//! Domain error types.

use std::fmt;

use super::series::DateRange;

/// Which computation produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimator {
    Returns,
    CumulativeIndex,
    Volatility,
    Correlation,
    TrackingError,
}

impl fmt::Display for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Estimator::Returns => "returns",
            Estimator::CumulativeIndex => "cumulative index",
            Estimator::Volatility => "volatility",
            Estimator::Correlation => "correlation",
            Estimator::TrackingError => "tracking error",
        };
        f.write_str(name)
    }
}

/// Top-level error type for portfolio analytics.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("no price data for {portfolio_id} in {range}")]
    NotFound {
        portfolio_id: String,
        range: DateRange,
    },

    #[error("insufficient data for {estimator} of {subject} in {range}: have {have}, need {need}")]
    InsufficientData {
        estimator: Estimator,
        subject: String,
        range: DateRange,
        have: usize,
        need: usize,
    },

    #[error("malformed series for {portfolio_id}: {reason}")]
    MalformedSeries {
        portfolio_id: String,
        reason: String,
    },

    #[error("degenerate input for {estimator} of {subject} in {range}: {reason}")]
    DegenerateInput {
        estimator: Estimator,
        subject: String,
        range: DateRange,
        reason: String,
    },

    #[error("price repository unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    #[error("database query error: {reason}")]
    Database { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    pub(crate) fn malformed(portfolio_id: &str, reason: impl Into<String>) -> Self {
        AnalyticsError::MalformedSeries {
            portfolio_id: portfolio_id.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&AnalyticsError> for std::process::ExitCode {
    fn from(err: &AnalyticsError) -> Self {
        let code: u8 = match err {
            AnalyticsError::Io(_) => 1,
            AnalyticsError::ConfigParse { .. }
            | AnalyticsError::ConfigMissing { .. }
            | AnalyticsError::ConfigInvalid { .. } => 2,
            AnalyticsError::UpstreamUnavailable { .. } | AnalyticsError::Database { .. } => 3,
            AnalyticsError::InvalidRange { .. } | AnalyticsError::InvalidParameter { .. } => 4,
            AnalyticsError::NotFound { .. } | AnalyticsError::InsufficientData { .. } => 5,
            AnalyticsError::MalformedSeries { .. } | AnalyticsError::DegenerateInput { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
