#![allow(dead_code)]

use chrono::NaiveDate;
use portfolio_analytics::domain::error::AnalyticsError;
pub use portfolio_analytics::domain::series::{DateRange, PricePoint, PriceSeries};
use portfolio_analytics::ports::price_port::PricePort;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Clone, Copy)]
enum Failure {
    Database,
    Unavailable,
}

/// In-memory repository keyed by portfolio id.
pub struct MockPricePort {
    pub data: HashMap<String, Vec<PricePoint>>,
    errors: HashMap<String, (Failure, String)>,
    delay: Option<Duration>,
    healthy: bool,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            delay: None,
            healthy: true,
        }
    }

    pub fn with_prices(mut self, portfolio_id: &str, prices: Vec<PricePoint>) -> Self {
        self.data.insert(portfolio_id.to_string(), prices);
        self
    }

    pub fn with_error(mut self, portfolio_id: &str, reason: &str) -> Self {
        self.errors.insert(
            portfolio_id.to_string(),
            (Failure::Database, reason.to_string()),
        );
        self
    }

    pub fn with_unavailable(mut self, portfolio_id: &str, reason: &str) -> Self {
        self.errors.insert(
            portfolio_id.to_string(),
            (Failure::Unavailable, reason.to_string()),
        );
        self
    }

    /// Every fetch sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    fn check(&self, portfolio_id: &str) -> Result<(), AnalyticsError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match self.errors.get(portfolio_id) {
            Some((Failure::Database, reason)) => Err(AnalyticsError::Database {
                reason: reason.clone(),
            }),
            Some((Failure::Unavailable, reason)) => Err(AnalyticsError::UpstreamUnavailable {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl PricePort for MockPricePort {
    fn fetch_prices(
        &self,
        portfolio_id: &str,
        range: DateRange,
    ) -> Result<PriceSeries, AnalyticsError> {
        self.check(portfolio_id)?;
        let points: Vec<PricePoint> = self
            .data
            .get(portfolio_id)
            .map(|all| {
                all.iter()
                    .filter(|p| range.contains(p.date))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        if points.is_empty() {
            return Err(AnalyticsError::NotFound {
                portfolio_id: portfolio_id.to_string(),
                range,
            });
        }
        PriceSeries::new(portfolio_id, range, points)
    }

    fn fetch_prices_with_lookback(
        &self,
        portfolio_id: &str,
        range: DateRange,
    ) -> Result<PriceSeries, AnalyticsError> {
        let series = self.fetch_prices(portfolio_id, range)?;
        let lookback = self.data.get(portfolio_id).and_then(|all| {
            all.iter()
                .filter(|p| p.date < range.start())
                .max_by_key(|p| p.date)
                .copied()
        });
        match lookback {
            Some(point) => series.with_lookback(point),
            None => Ok(series),
        }
    }

    fn data_range(
        &self,
        portfolio_id: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AnalyticsError> {
        self.check(portfolio_id)?;
        match self.data.get(portfolio_id) {
            Some(prices) if !prices.is_empty() => {
                let min = prices.iter().map(|p| p.date).min().unwrap();
                let max = prices.iter().map(|p| p.date).max().unwrap();
                Ok(Some((min, max, prices.len())))
            }
            _ => Ok(None),
        }
    }

    fn ping(&self) -> Result<(), AnalyticsError> {
        if self.healthy {
            Ok(())
        } else {
            Err(AnalyticsError::UpstreamUnavailable {
                reason: "connection refused".into(),
            })
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// One price per consecutive calendar day starting at `start_date`.
pub fn make_prices(start_date: &str, prices: &[f64]) -> Vec<PricePoint> {
    let start = parse_date(start_date);
    prices
        .iter()
        .enumerate()
        .map(|(i, &price)| PricePoint::new(start + chrono::Duration::days(i as i64), price))
        .collect()
}

/// Deterministic zig-zag walk with `count` prices.
pub fn generate_prices(start_date: &str, count: usize, start_price: f64) -> Vec<PricePoint> {
    let start = parse_date(start_date);
    let mut price = start_price;
    (0..count)
        .map(|i| {
            let step = if i % 3 == 0 { 0.015 } else if i % 3 == 1 { -0.01 } else { 0.004 };
            if i > 0 {
                price *= 1.0 + step;
            }
            PricePoint::new(start + chrono::Duration::days(i as i64), price)
        })
        .collect()
}

/// The standard fixture used across tests.
pub fn sample_port() -> MockPricePort {
    MockPricePort::new()
        .with_prices("P1", make_prices("2024-01-01", &[100.0, 102.0, 99.0, 101.0, 103.0]))
        .with_prices("P2", make_prices("2024-01-01", &[50.0, 50.5, 50.0, 51.0, 51.5]))
        .with_prices("FLAT", make_prices("2024-01-01", &[10.0, 10.0, 10.0, 10.0, 10.0]))
        .with_prices("BENCH", generate_prices("2024-01-01", 5, 1000.0))
}
