//! Simple (arithmetic) returns from a price series.
//!
//! r[t] = (P[t] - P[t-1]) / P[t-1]
//!
//! Returns span consecutive observations; calendar gaps are not interpolated,
//! so a return dated after a weekend covers the whole gap.

use super::error::{AnalyticsError, Estimator};
use super::series::{PriceSeries, ReturnPoint, ReturnSeries};

pub const MIN_PRICES: usize = 2;

/// Derive the return series of `prices`. When the series carries a look-back
/// observation the first in-range date also gets a return, so the output has
/// as many points as the input; otherwise it has one fewer.
pub fn simple_returns(prices: &PriceSeries) -> Result<ReturnSeries, AnalyticsError> {
    let usable: Vec<_> = prices.usable_points().copied().collect();
    if usable.len() < MIN_PRICES {
        return Err(AnalyticsError::InsufficientData {
            estimator: Estimator::Returns,
            subject: prices.portfolio_id().to_string(),
            range: prices.range(),
            have: usable.len(),
            need: MIN_PRICES,
        });
    }

    let points = usable
        .windows(2)
        .map(|w| ReturnPoint {
            date: w[1].date,
            value: (w[1].price - w[0].price) / w[0].price,
        })
        .collect();

    ReturnSeries::new(
        prices.portfolio_id(),
        prices.range(),
        Some(usable[0]),
        points,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::{DateRange, PricePoint};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(prices: &[(u32, f64)]) -> PriceSeries {
        PriceSeries::new(
            "P1",
            DateRange::new(jan(1), jan(31)).unwrap(),
            prices
                .iter()
                .map(|&(d, p)| PricePoint::new(jan(d), p))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn worked_example() {
        let returns = simple_returns(&series(&[(1, 100.0), (2, 102.0), (3, 99.0)])).unwrap();

        assert_eq!(returns.len(), 2);
        assert_eq!(returns.points()[0].date, jan(2));
        assert_relative_eq!(returns.points()[0].value, 0.02, epsilon = 1e-12);
        assert_eq!(returns.points()[1].date, jan(3));
        assert_relative_eq!(returns.points()[1].value, -3.0 / 102.0, epsilon = 1e-12);
        assert_eq!(returns.anchor(), Some(&PricePoint::new(jan(1), 100.0)));
    }

    #[test]
    fn gap_return_is_dated_at_later_observation() {
        // Friday 5th to Monday 8th.
        let returns = simple_returns(&series(&[(5, 100.0), (8, 110.0)])).unwrap();
        assert_eq!(returns.points()[0].date, jan(8));
        assert_relative_eq!(returns.points()[0].value, 0.10, epsilon = 1e-12);
    }

    #[test]
    fn lookback_adds_return_for_first_date() {
        let range = DateRange::new(jan(8), jan(31)).unwrap();
        let prices = PriceSeries::new(
            "P1",
            range,
            vec![PricePoint::new(jan(8), 105.0), PricePoint::new(jan(9), 84.0)],
        )
        .unwrap()
        .with_lookback(PricePoint::new(jan(5), 100.0))
        .unwrap();

        let returns = simple_returns(&prices).unwrap();
        assert_eq!(returns.len(), prices.len());
        assert_eq!(returns.points()[0].date, jan(8));
        assert_relative_eq!(returns.points()[0].value, 0.05, epsilon = 1e-12);
        assert_relative_eq!(returns.points()[1].value, -0.2, epsilon = 1e-12);
        assert_eq!(returns.anchor().map(|a| a.date), Some(jan(5)));
    }

    #[test]
    fn single_price_without_lookback_is_insufficient() {
        match simple_returns(&series(&[(1, 100.0)])) {
            Err(AnalyticsError::InsufficientData {
                estimator,
                have,
                need,
                ..
            }) => {
                assert_eq!(estimator, Estimator::Returns);
                assert_eq!(have, 1);
                assert_eq!(need, 2);
            }
            other => panic!("expected InsufficientData, got: {other:?}"),
        }
    }

    #[test]
    fn single_price_with_lookback_gives_one_return() {
        let prices = PriceSeries::new(
            "P1",
            DateRange::single(jan(2)),
            vec![PricePoint::new(jan(2), 102.0)],
        )
        .unwrap()
        .with_lookback(PricePoint::new(jan(1), 100.0))
        .unwrap();

        let returns = simple_returns(&prices).unwrap();
        assert_eq!(returns.len(), 1);
        assert_relative_eq!(returns.points()[0].value, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn empty_series_is_insufficient() {
        let err = simple_returns(&series(&[])).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::InsufficientData { have: 0, .. }
        ));
    }
}
