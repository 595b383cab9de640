//! Price repository port.
//!
//! The analytics core only ever reads prices through this trait, so any store
//! (pooled SQL, flat files, an in-memory fake) can stand behind it.

use crate::domain::error::AnalyticsError;
use crate::domain::series::{DateRange, PriceSeries};
use chrono::NaiveDate;

pub trait PricePort {
    /// Prices for `portfolio_id` inside `range`, ascending.
    ///
    /// Fails with `NotFound` when no rows exist, `UpstreamUnavailable` when
    /// the store cannot be reached and `MalformedSeries` when stored rows
    /// break the series invariants.
    fn fetch_prices(
        &self,
        portfolio_id: &str,
        range: DateRange,
    ) -> Result<PriceSeries, AnalyticsError>;

    /// Like [`fetch_prices`](Self::fetch_prices), with the single observation
    /// immediately preceding `range.start()` attached as look-back (if one
    /// exists). The look-back is one observation, not one calendar day.
    fn fetch_prices_with_lookback(
        &self,
        portfolio_id: &str,
        range: DateRange,
    ) -> Result<PriceSeries, AnalyticsError>;

    /// First date, last date and number of observations stored.
    fn data_range(
        &self,
        portfolio_id: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AnalyticsError>;

    /// Cheap connectivity check.
    fn ping(&self) -> Result<(), AnalyticsError>;
}
