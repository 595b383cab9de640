//! Analytics operations behind each endpoint.
//!
//! Each operation validates its window, pulls one or two price series through
//! the injected [`PricePort`], derives returns and hands them to the relevant
//! estimator. Nothing here holds state between calls.

use chrono::NaiveDate;
use tracing::{debug, instrument};

use crate::ports::price_port::PricePort;

use super::correlation;
use super::cumulative::{BaseValue, build_index};
use super::error::AnalyticsError;
use super::returns::simple_returns;
use super::series::{
    CumulativeIndexPoint, DateRange, PricePoint, PriceSeries, ReturnPoint, ReturnSeries,
};
use super::tracking_error;
use super::volatility::volatility;

/// Price observed for `portfolio_id` on `date`.
#[instrument(skip(port))]
pub fn portfolio_price(
    port: &dyn PricePort,
    portfolio_id: &str,
    date: NaiveDate,
) -> Result<PricePoint, AnalyticsError> {
    let range = DateRange::single(date);
    let series = port.fetch_prices(portfolio_id, range)?;
    series
        .points()
        .first()
        .copied()
        .ok_or_else(|| not_found(portfolio_id, range))
}

/// Return on `date` over the immediately preceding observation.
#[instrument(skip(port))]
pub fn daily_return(
    port: &dyn PricePort,
    portfolio_id: &str,
    date: NaiveDate,
) -> Result<ReturnPoint, AnalyticsError> {
    let range = DateRange::single(date);
    let series = port.fetch_prices_with_lookback(portfolio_id, range)?;
    if series.price_on(date).is_none() {
        return Err(not_found(portfolio_id, range));
    }
    let returns = simple_returns(&series)?;
    returns
        .points()
        .last()
        .copied()
        .ok_or_else(|| not_found(portfolio_id, range))
}

/// Cumulative index over `[start, end]`, anchored at the first in-range
/// observation.
#[instrument(skip(port))]
pub fn cumulative_prices(
    port: &dyn PricePort,
    portfolio_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    base: BaseValue,
) -> Result<Vec<CumulativeIndexPoint>, AnalyticsError> {
    let range = DateRange::new(start, end)?;
    let series = port.fetch_prices(portfolio_id, range)?;
    let returns = index_returns(&series)?;
    let index = build_index(&returns, base)?;
    debug!(points = index.len(), "built cumulative index");
    Ok(index)
}

/// Sample standard deviation of daily returns over `[start, end]`.
#[instrument(skip(port))]
pub fn daily_volatility(
    port: &dyn PricePort,
    portfolio_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, AnalyticsError> {
    let range = DateRange::new(start, end)?;
    let returns = fetch_returns(port, portfolio_id, range)?;
    volatility(&returns)
}

/// Pearson correlation of two portfolios' daily returns over `[start, end]`.
/// Rejecting a portfolio paired with itself is left to the caller.
#[instrument(skip(port))]
pub fn correlation(
    port: &dyn PricePort,
    portfolio_id1: &str,
    portfolio_id2: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, AnalyticsError> {
    let range = DateRange::new(start, end)?;
    let first = fetch_returns(port, portfolio_id1, range)?;
    let second = fetch_returns(port, portfolio_id2, range)?;
    correlation::correlation(&first, &second)
}

/// Tracking error of `portfolio_id` against `benchmark_id` over `[start, end]`.
#[instrument(skip(port))]
pub fn tracking_error(
    port: &dyn PricePort,
    portfolio_id: &str,
    benchmark_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, AnalyticsError> {
    let range = DateRange::new(start, end)?;
    let portfolio = fetch_returns(port, portfolio_id, range)?;
    let benchmark = fetch_returns(port, benchmark_id, range)?;
    tracking_error::tracking_error(&portfolio, &benchmark)
}

/// Daily returns for every observation in `range`, the first one measured
/// against the look-back price when the store has one.
pub fn fetch_returns(
    port: &dyn PricePort,
    portfolio_id: &str,
    range: DateRange,
) -> Result<ReturnSeries, AnalyticsError> {
    let series = port.fetch_prices_with_lookback(portfolio_id, range)?;
    debug!(
        portfolio_id,
        prices = series.len(),
        lookback = series.lookback().is_some(),
        "fetched prices"
    );
    simple_returns(&series)
}

/// A lone price still anchors an index; it just has no returns after it.
fn index_returns(series: &PriceSeries) -> Result<ReturnSeries, AnalyticsError> {
    match series.points() {
        [only] => ReturnSeries::new(series.portfolio_id(), series.range(), Some(*only), vec![]),
        _ => simple_returns(series),
    }
}

fn not_found(portfolio_id: &str, range: DateRange) -> AnalyticsError {
    AnalyticsError::NotFound {
        portfolio_id: portfolio_id.to_string(),
        range,
    }
}
