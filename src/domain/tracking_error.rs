//! Tracking error: sample standard deviation of excess returns over a
//! benchmark, on the dates both series share.

use super::align::{AlignedPair, align};
use super::error::{AnalyticsError, Estimator};
use super::series::ReturnSeries;
use super::volatility::{MIN_RETURNS, sample_std_dev};

/// e[i] = portfolio[i] - benchmark[i]
pub fn excess_returns(pair: &AlignedPair) -> Vec<f64> {
    pair.left
        .iter()
        .zip(&pair.right)
        .map(|(p, b)| p - b)
        .collect()
}

pub fn tracking_error(
    portfolio: &ReturnSeries,
    benchmark: &ReturnSeries,
) -> Result<f64, AnalyticsError> {
    let pair = align(portfolio, benchmark)?;
    sample_std_dev(&excess_returns(&pair)).ok_or_else(|| AnalyticsError::InsufficientData {
        estimator: Estimator::TrackingError,
        subject: pair.subject.clone(),
        range: pair.range,
        have: pair.len(),
        need: MIN_RETURNS,
    })
}
