//! Cumulative index built by compounding returns from a base value.
//!
//! V[0] = base on the anchor date, V[t] = V[t-1] * (1 + r[t]).
//! With the base set to the anchor price the index reproduces the raw prices.

use std::fmt;
use std::str::FromStr;

use super::error::{AnalyticsError, Estimator};
use super::series::{CumulativeIndexPoint, ReturnPoint, ReturnSeries};

pub const DEFAULT_FIXED_BASE: f64 = 100.0;

/// Value the index starts from on its base date.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BaseValue {
    /// The first observed price (the return series' anchor).
    #[default]
    FirstPrice,
    Fixed(f64),
}

impl fmt::Display for BaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseValue::FirstPrice => f.write_str("first"),
            BaseValue::Fixed(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for BaseValue {
    type Err = AnalyticsError;

    /// Accepts `first` / `first_price` or a positive number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "first" | "first_price" => return Ok(BaseValue::FirstPrice),
            _ => {}
        }
        let value: f64 = trimmed.parse().map_err(|_| AnalyticsError::InvalidParameter {
            name: "base".into(),
            reason: format!("expected 'first' or a positive number, got '{trimmed}'"),
        })?;
        check_base(value)?;
        Ok(BaseValue::Fixed(value))
    }
}

fn check_base(value: f64) -> Result<(), AnalyticsError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AnalyticsError::InvalidParameter {
            name: "base".into(),
            reason: format!("base value must be positive and finite, got {value}"),
        });
    }
    Ok(())
}

/// Build the index for `returns`. The output starts with the base point on
/// the anchor date, so it has one more point than the return series.
pub fn build_index(
    returns: &ReturnSeries,
    base: BaseValue,
) -> Result<Vec<CumulativeIndexPoint>, AnalyticsError> {
    let anchor = returns
        .anchor()
        .ok_or_else(|| AnalyticsError::InsufficientData {
            estimator: Estimator::CumulativeIndex,
            subject: returns.portfolio_id().to_string(),
            range: returns.range(),
            have: 0,
            need: 1,
        })?;

    let v0 = match base {
        BaseValue::FirstPrice => anchor.price,
        BaseValue::Fixed(v) => {
            check_base(v)?;
            v
        }
    };

    let mut index = Vec::with_capacity(returns.len() + 1);
    index.push(CumulativeIndexPoint {
        date: anchor.date,
        value: v0,
    });

    let mut value = v0;
    for point in returns.points() {
        value *= 1.0 + point.value;
        index.push(CumulativeIndexPoint {
            date: point.date,
            value,
        });
    }

    Ok(index)
}

/// Inverse of [`build_index`]: r[t] = V[t] / V[t-1] - 1.
pub fn returns_from_index(index: &[CumulativeIndexPoint]) -> Vec<ReturnPoint> {
    index
        .windows(2)
        .map(|w| ReturnPoint {
            date: w[1].date,
            value: w[1].value / w[0].value - 1.0,
        })
        .collect()
}
