//! Pearson correlation of two return series over their common dates.
//!
//! corr = sum((x - mean_x)(y - mean_y)) / sqrt(sum((x - mean_x)^2) * sum((y - mean_y)^2))

use super::align::{AlignedPair, align};
use super::error::{AnalyticsError, Estimator};
use super::series::ReturnSeries;
use super::volatility::is_constant;

pub const MIN_ALIGNED: usize = 2;

pub fn correlation(a: &ReturnSeries, b: &ReturnSeries) -> Result<f64, AnalyticsError> {
    let pair = align(a, b)?;
    pearson(&pair)
}

/// Correlation of an already aligned pair.
pub fn pearson(pair: &AlignedPair) -> Result<f64, AnalyticsError> {
    if pair.len() < MIN_ALIGNED {
        return Err(AnalyticsError::InsufficientData {
            estimator: Estimator::Correlation,
            subject: pair.subject.clone(),
            range: pair.range,
            have: pair.len(),
            need: MIN_ALIGNED,
        });
    }
    if is_constant(&pair.left) || is_constant(&pair.right) {
        return Err(degenerate(pair));
    }

    let n = pair.len() as f64;
    let mean_x = pair.left.iter().sum::<f64>() / n;
    let mean_y = pair.right.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in pair.left.iter().zip(&pair.right) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denom = (sxx * syy).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return Err(degenerate(pair));
    }

    Ok((sxy / denom).clamp(-1.0, 1.0))
}

fn degenerate(pair: &AlignedPair) -> AnalyticsError {
    AnalyticsError::DegenerateInput {
        estimator: Estimator::Correlation,
        subject: pair.subject.clone(),
        range: pair.range,
        reason: "zero variance over the aligned window".into(),
    }
}
