//! Read-only file repository: one `<portfolio_id>.csv` per portfolio with
//! `date,price` columns.

use crate::domain::error::AnalyticsError;
use crate::domain::series::{DateRange, PricePoint, PriceSeries, check_ascending};
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, portfolio_id: &str) -> Result<PathBuf, AnalyticsError> {
        let safe = !portfolio_id.is_empty()
            && portfolio_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !portfolio_id.starts_with('.');
        if !safe {
            return Err(AnalyticsError::InvalidParameter {
                name: "portfolioId".into(),
                reason: format!("'{portfolio_id}' is not a valid portfolio identifier"),
            });
        }
        Ok(self.base_path.join(format!("{portfolio_id}.csv")))
    }

    /// Every observation in the portfolio's file, ascending.
    pub fn load_all(&self, portfolio_id: &str) -> Result<Vec<PricePoint>, AnalyticsError> {
        let path = self.csv_path(portfolio_id)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AnalyticsError::Io(e)),
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut points = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| {
                AnalyticsError::malformed(portfolio_id, format!("CSV parse error: {e}"))
            })?;

            let date_str = record
                .get(0)
                .ok_or_else(|| AnalyticsError::malformed(portfolio_id, "missing date column"))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                AnalyticsError::malformed(portfolio_id, format!("invalid date '{date_str}': {e}"))
            })?;

            let price: f64 = record
                .get(1)
                .ok_or_else(|| AnalyticsError::malformed(portfolio_id, "missing price column"))?
                .trim()
                .parse()
                .map_err(|e| {
                    AnalyticsError::malformed(
                        portfolio_id,
                        format!("invalid price on {date}: {e}"),
                    )
                })?;

            points.push(PricePoint { date, price });
        }

        check_ascending(portfolio_id, points.iter().map(|p| p.date))?;
        debug!(portfolio_id, path = %path.display(), rows = points.len(), "read csv");
        Ok(points)
    }

    /// Identifiers of every portfolio file in the directory, sorted.
    pub fn list_portfolios(&self) -> Result<Vec<String>, AnalyticsError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut ids = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name_str = name.to_string_lossy();

            if let Some(id) = name_str.strip_suffix(".csv") {
                ids.push(id.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }
}

impl PricePort for CsvAdapter {
    fn fetch_prices(
        &self,
        portfolio_id: &str,
        range: DateRange,
    ) -> Result<PriceSeries, AnalyticsError> {
        let points: Vec<PricePoint> = self
            .load_all(portfolio_id)?
            .into_iter()
            .filter(|p| range.contains(p.date))
            .collect();

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
        let all = self.load_all(portfolio_id)?;
        let lookback = all.iter().rev().find(|p| p.date < range.start()).copied();
        let points: Vec<PricePoint> = all
            .into_iter()
            .filter(|p| range.contains(p.date))
            .collect();

        if points.is_empty() {
            return Err(AnalyticsError::NotFound {
                portfolio_id: portfolio_id.to_string(),
                range,
            });
        }

        let series = PriceSeries::new(portfolio_id, range, points)?;
        match lookback {
            Some(point) => series.with_lookback(point),
            None => Ok(series),
        }
    }

    fn data_range(
        &self,
        portfolio_id: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AnalyticsError> {
        let all = self.load_all(portfolio_id)?;
        match (all.first(), all.last()) {
            (Some(first), Some(last)) => Ok(Some((first.date, last.date, all.len()))),
            _ => Ok(None),
        }
    }

    fn ping(&self) -> Result<(), AnalyticsError> {
        if self.base_path.is_dir() {
            Ok(())
        } else {
            Err(AnalyticsError::UpstreamUnavailable {
                reason: format!("{} is not a directory", self.base_path.display()),
            })
        }
    }
}
