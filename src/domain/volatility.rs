//! Volatility as the sample standard deviation of returns.
//!
//! mean     = sum(r) / n
//! variance = sum((r - mean)^2) / (n - 1)
//! vol      = sqrt(variance)
//!
//! Bessel's correction (n - 1) is used throughout. Values are per observation
//! interval; nothing is annualized unless a caller asks via [`annualize`].

use super::error::{AnalyticsError, Estimator};
use super::series::ReturnSeries;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const MIN_RETURNS: usize = 2;

/// Largest spread, relative to `max(1, |value|)`, still treated as constant.
pub const CONSTANT_TOLERANCE: f64 = 1e-12;

/// Sample standard deviation, `None` when fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < MIN_RETURNS {
        return None;
    }
    // Rounding noise around a constant must not surface as dispersion.
    if is_constant(values) {
        return Some(0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Returns computed from prices carry error of order `EPSILON * (1 + |r|)`,
/// so the spread is compared against a scale floored at one.
pub(crate) fn is_constant(values: &[f64]) -> bool {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let scale = lo.abs().max(hi.abs()).max(1.0);
    hi - lo <= CONSTANT_TOLERANCE * scale
}

pub fn volatility(returns: &ReturnSeries) -> Result<f64, AnalyticsError> {
    sample_std_dev(&returns.values()).ok_or_else(|| AnalyticsError::InsufficientData {
        estimator: Estimator::Volatility,
        subject: returns.portfolio_id().to_string(),
        range: returns.range(),
        have: returns.len(),
        need: MIN_RETURNS,
    })
}

/// Scale a per-period dispersion to an annual figure: `value * sqrt(periods)`.
/// Use [`TRADING_DAYS_PER_YEAR`] for daily observations.
pub fn annualize(value: f64, periods_per_year: f64) -> f64 {
    value * periods_per_year.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::{DateRange, ReturnPoint};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn returns(values: &[f64]) -> ReturnSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ReturnSeries::new(
            "P1",
            DateRange::new(start, start + chrono::Duration::days(60)).unwrap(),
            None,
            values
                .iter()
                .enumerate()
                .map(|(i, &value)| ReturnPoint {
                    date: start + chrono::Duration::days(i as i64 + 1),
                    value,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn constant_returns_have_zero_volatility() {
        let vol = volatility(&returns(&[0.01, 0.01, 0.01, 0.01])).unwrap();
        assert_eq!(vol, 0.0);
    }

    #[test]
    fn constant_growth_prices_have_zero_volatility() {
        use crate::domain::returns::simple_returns;
        use crate::domain::series::{PricePoint, PriceSeries};

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let prices = [100.0, 110.0, 121.0, 133.1, 146.41, 161.051];
        let series = PriceSeries::new(
            "CASH",
            DateRange::new(start, start + chrono::Duration::days(10)).unwrap(),
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| PricePoint::new(start + chrono::Duration::days(i as i64), p))
                .collect(),
        )
        .unwrap();
        let returns = simple_returns(&series).unwrap();
        assert_eq!(volatility(&returns).unwrap(), 0.0);
    }

    #[test]
    fn tiny_real_dispersion_is_kept() {
        let vol = volatility(&returns(&[0.01, 0.0100001, 0.01])).unwrap();
        assert!(vol > 0.0);
    }

    #[test]
    fn uses_bessel_correction() {
        // mean 5, squared deviations sum to 32, n - 1 = 7
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let vol = volatility(&returns(&values)).unwrap();
        assert_relative_eq!(vol, (32.0_f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn two_returns_is_enough() {
        let vol = volatility(&returns(&[0.02, -0.02])).unwrap();
        // mean 0, sum of squares 0.0008, / 1
        assert_relative_eq!(vol, 0.0008_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn single_return_is_insufficient() {
        match volatility(&returns(&[0.02])) {
            Err(AnalyticsError::InsufficientData {
                estimator,
                subject,
                have,
                need,
                ..
            }) => {
                assert_eq!(estimator, Estimator::Volatility);
                assert_eq!(subject, "P1");
                assert_eq!(have, 1);
                assert_eq!(need, 2);
            }
            other => panic!("expected InsufficientData, got: {other:?}"),
        }
    }

    #[test]
    fn empty_is_insufficient() {
        assert!(sample_std_dev(&[]).is_none());
        assert!(volatility(&returns(&[])).is_err());
    }

    #[test]
    fn annualize_scales_by_root_periods() {
        assert_relative_eq!(annualize(0.01, TRADING_DAYS_PER_YEAR), 0.01 * 252.0_f64.sqrt());
        assert_relative_eq!(annualize(0.02, 12.0), 0.02 * 12.0_f64.sqrt());
    }
}
