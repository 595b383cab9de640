//! Price and return series with their invariants.
//!
//! Every series is validated on construction: dates strictly increasing and
//! unique, prices finite and strictly positive, return values finite. Invalid
//! input is rejected with [`AnalyticsError::MalformedSeries`], never repaired.

use std::fmt;

use chrono::NaiveDate;

use super::error::AnalyticsError;

/// Closed date window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AnalyticsError> {
        if start > end {
            return Err(AnalyticsError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Smallest range covering both.
    pub fn span(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnPoint {
    /// Later date of the two prices the return spans.
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CumulativeIndexPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Ordered prices for one portfolio over a requested window, optionally with
/// the observation immediately preceding the window.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    portfolio_id: String,
    range: DateRange,
    lookback: Option<PricePoint>,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(
        portfolio_id: impl Into<String>,
        range: DateRange,
        points: Vec<PricePoint>,
    ) -> Result<Self, AnalyticsError> {
        let portfolio_id = portfolio_id.into();

        for point in &points {
            check_price(&portfolio_id, point)?;
            if !range.contains(point.date) {
                return Err(AnalyticsError::malformed(
                    &portfolio_id,
                    format!("price dated {} lies outside {}", point.date, range),
                ));
            }
        }
        check_ascending(&portfolio_id, points.iter().map(|p| p.date))?;

        Ok(Self {
            portfolio_id,
            range,
            lookback: None,
            points,
        })
    }

    /// Attach the observation immediately preceding the window.
    pub fn with_lookback(mut self, lookback: PricePoint) -> Result<Self, AnalyticsError> {
        check_price(&self.portfolio_id, &lookback)?;
        if lookback.date >= self.range.start {
            return Err(AnalyticsError::malformed(
                &self.portfolio_id,
                format!(
                    "look-back price dated {} is not before {}",
                    lookback.date, self.range.start
                ),
            ));
        }
        self.lookback = Some(lookback);
        Ok(self)
    }

    pub fn portfolio_id(&self) -> &str {
        &self.portfolio_id
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn lookback(&self) -> Option<&PricePoint> {
        self.lookback.as_ref()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn price_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].price)
    }

    /// Look-back point (if any) followed by the in-range points.
    pub fn usable_points(&self) -> impl Iterator<Item = &PricePoint> {
        self.lookback.iter().chain(self.points.iter())
    }
}

/// Ordered simple returns for one portfolio. `anchor` is the first price the
/// returns were derived from and serves as the base of a cumulative index.
#[derive(Debug, Clone)]
pub struct ReturnSeries {
    portfolio_id: String,
    range: DateRange,
    anchor: Option<PricePoint>,
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    pub fn new(
        portfolio_id: impl Into<String>,
        range: DateRange,
        anchor: Option<PricePoint>,
        points: Vec<ReturnPoint>,
    ) -> Result<Self, AnalyticsError> {
        let portfolio_id = portfolio_id.into();

        if let Some(anchor) = &anchor {
            check_price(&portfolio_id, anchor)?;
            if let Some(first) = points.first() {
                if first.date <= anchor.date {
                    return Err(AnalyticsError::malformed(
                        &portfolio_id,
                        format!(
                            "return dated {} does not follow anchor {}",
                            first.date, anchor.date
                        ),
                    ));
                }
            }
        }
        if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(AnalyticsError::malformed(
                &portfolio_id,
                format!("non-finite return on {}", bad.date),
            ));
        }
        check_ascending(&portfolio_id, points.iter().map(|p| p.date))?;

        Ok(Self {
            portfolio_id,
            range,
            anchor,
            points,
        })
    }

    pub fn portfolio_id(&self) -> &str {
        &self.portfolio_id
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn anchor(&self) -> Option<&PricePoint> {
        self.anchor.as_ref()
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn check_price(portfolio_id: &str, point: &PricePoint) -> Result<(), AnalyticsError> {
    if !point.price.is_finite() || point.price <= 0.0 {
        return Err(AnalyticsError::malformed(
            portfolio_id,
            format!("non-positive price {} on {}", point.price, point.date),
        ));
    }
    Ok(())
}

pub(crate) fn check_ascending(
    portfolio_id: &str,
    dates: impl Iterator<Item = NaiveDate>,
) -> Result<(), AnalyticsError> {
    let mut prev: Option<NaiveDate> = None;
    for date in dates {
        if let Some(p) = prev {
            if date == p {
                return Err(AnalyticsError::malformed(
                    portfolio_id,
                    format!("duplicate date {date}"),
                ));
            }
            if date < p {
                return Err(AnalyticsError::malformed(
                    portfolio_id,
                    format!("date {date} follows {p}"),
                ));
            }
        }
        prev = Some(date);
    }
    Ok(())
}
