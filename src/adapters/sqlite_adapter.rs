//! SQLite price repository.

use std::time::Duration;

use crate::domain::config_validation::DEFAULT_CONNECTION_TIMEOUT_SECS;
use crate::domain::error::AnalyticsError;
use crate::domain::series::{DateRange, PricePoint, PriceSeries};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{debug, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AnalyticsError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| AnalyticsError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4);
        let pool_size = u32::try_from(pool_size)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| AnalyticsError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: format!("{pool_size} is not a valid pool size"),
            })?;
        let timeout = config.get_int(
            "sqlite",
            "connection_timeout_secs",
            DEFAULT_CONNECTION_TIMEOUT_SECS,
        ) as u64;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(Duration::from_secs(timeout))
            .build(manager)
            .map_err(unavailable)?;

        debug!(path = %db_path, pool_size, "opened sqlite pool");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, AnalyticsError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(unavailable)?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), AnalyticsError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS portfolio_prices (
                portfolio_id TEXT NOT NULL,
                date TEXT NOT NULL,
                price REAL NOT NULL,
                PRIMARY KEY (portfolio_id, date)
            );
            CREATE INDEX IF NOT EXISTS idx_portfolio_prices_date ON portfolio_prices(date);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    /// Seed prices. Existing rows for the same (portfolio, date) are replaced.
    pub fn insert_prices(
        &self,
        portfolio_id: &str,
        points: &[PricePoint],
    ) -> Result<(), AnalyticsError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for point in points {
            tx.execute(
                "INSERT OR REPLACE INTO portfolio_prices (portfolio_id, date, price)
                 VALUES (?1, ?2, ?3)",
                params![
                    portfolio_id,
                    point.date.format(DATE_FORMAT).to_string(),
                    point.price
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, AnalyticsError> {
        self.pool.get().map_err(unavailable)
    }

    fn query_points(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<PricePoint>, AnalyticsError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(query_error)?;

        let rows = stmt
            .query_map(args, |row| {
                let date_str: String = row.get(0)?;
                let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        date_str.len(),
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(PricePoint {
                    date,
                    price: row.get(1)?,
                })
            })
            .map_err(query_error)?;

        let mut points = Vec::new();
        for row in rows {
            points.push(row.map_err(query_error)?);
        }
        Ok(points)
    }
}

impl PricePort for SqliteAdapter {
    fn fetch_prices(
        &self,
        portfolio_id: &str,
        range: DateRange,
    ) -> Result<PriceSeries, AnalyticsError> {
        let start = range.start().format(DATE_FORMAT).to_string();
        let end = range.end().format(DATE_FORMAT).to_string();

        let points = self.query_points(
            "SELECT date, price
             FROM portfolio_prices
             WHERE portfolio_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
            &[&portfolio_id, &start, &end],
        )?;
        debug!(portfolio_id, %range, rows = points.len(), "sqlite fetch");

        if points.is_empty() {
            return Err(AnalyticsError::NotFound {
                portfolio_id: portfolio_id.to_string(),
                range,
            });
        }

        PriceSeries::new(portfolio_id, range, points).inspect_err(|e| {
            warn!(portfolio_id, error = %e, "stored prices violate series invariants");
        })
    }

    fn fetch_prices_with_lookback(
        &self,
        portfolio_id: &str,
        range: DateRange,
    ) -> Result<PriceSeries, AnalyticsError> {
        let series = self.fetch_prices(portfolio_id, range)?;
        let start = range.start().format(DATE_FORMAT).to_string();

        let lookback = self.query_points(
            "SELECT date, price
             FROM portfolio_prices
             WHERE portfolio_id = ?1 AND date < ?2
             ORDER BY date DESC
             LIMIT 1",
            &[&portfolio_id, &start],
        )?;

        match lookback.into_iter().next() {
            Some(point) => series.with_lookback(point),
            None => Ok(series),
        }
    }

    fn data_range(
        &self,
        portfolio_id: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AnalyticsError> {
        let conn = self.conn()?;

        let query =
            "SELECT MIN(date), MAX(date), COUNT(*) FROM portfolio_prices WHERE portfolio_id = ?1";

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(query, params![portfolio_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(query_error)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let min = NaiveDate::parse_from_str(&min_str, DATE_FORMAT).map_err(
                    |e: chrono::ParseError| AnalyticsError::Database {
                        reason: e.to_string(),
                    },
                )?;
                let max = NaiveDate::parse_from_str(&max_str, DATE_FORMAT).map_err(
                    |e: chrono::ParseError| AnalyticsError::Database {
                        reason: e.to_string(),
                    },
                )?;
                Ok(Some((min, max, count as usize)))
            }
            _ => Ok(None),
        }
    }

    fn ping(&self) -> Result<(), AnalyticsError> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(query_error)?;
        Ok(())
    }
}

fn unavailable(e: r2d2::Error) -> AnalyticsError {
    AnalyticsError::UpstreamUnavailable {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> AnalyticsError {
    AnalyticsError::Database {
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_prices(
                "P1",
                &[
                    PricePoint::new(jan(1), 100.0),
                    PricePoint::new(jan(2), 102.0),
                    PricePoint::new(jan(3), 99.0),
                    PricePoint::new(jan(5), 101.0),
                ],
            )
            .unwrap();
        adapter
            .insert_prices("P2", &[PricePoint::new(jan(2), 50.0)])
            .unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        let config = EmptyConfig;
        let result = SqliteAdapter::from_config(&config);
        match result {
            Err(AnalyticsError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn from_config_rejects_pool_size_beyond_u32() {
        use crate::adapters::file_config_adapter::FileConfigAdapter;

        let config =
            FileConfigAdapter::from_string("[sqlite]\npath = :memory:\npool_size = 4294967296\n")
                .unwrap();
        match SqliteAdapter::from_config(&config) {
            Err(AnalyticsError::ConfigInvalid { key, .. }) => assert_eq!(key, "pool_size"),
            Err(other) => panic!("expected ConfigInvalid, got: {other}"),
            Ok(_) => panic!("expected ConfigInvalid, got Ok"),
        }
    }

    #[test]
    fn in_memory_initialization_and_ping() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter.ping().unwrap();
    }

    #[test]
    fn fetch_prices_returns_ordered_range() {
        let adapter = seeded();
        let series = adapter
            .fetch_prices("P1", DateRange::new(jan(2), jan(5)).unwrap())
            .unwrap();

        let dates: Vec<_> = series.points().iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![jan(2), jan(3), jan(5)]);
        assert_eq!(series.points()[1].price, 99.0);
        assert!(series.lookback().is_none());
    }

    #[test]
    fn fetch_prices_without_rows_is_not_found() {
        let adapter = seeded();
        let err = adapter
            .fetch_prices("P1", DateRange::new(jan(10), jan(20)).unwrap())
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::NotFound { .. }));

        let err = adapter
            .fetch_prices("UNKNOWN", DateRange::new(jan(1), jan(20)).unwrap())
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::NotFound { .. }));
    }

    #[test]
    fn lookback_is_previous_observation_across_gap() {
        let adapter = seeded();
        let series = adapter
            .fetch_prices_with_lookback("P1", DateRange::single(jan(5)))
            .unwrap();
        assert_eq!(series.lookback(), Some(&PricePoint::new(jan(3), 99.0)));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn lookback_absent_at_start_of_history() {
        let adapter = seeded();
        let series = adapter
            .fetch_prices_with_lookback("P1", DateRange::new(jan(1), jan(2)).unwrap())
            .unwrap();
        assert!(series.lookback().is_none());
    }

    #[test]
    fn stored_zero_price_is_malformed() {
        let adapter = seeded();
        adapter
            .insert_prices("BAD", &[PricePoint::new(jan(1), 0.0)])
            .unwrap();
        let err = adapter
            .fetch_prices("BAD", DateRange::single(jan(1)))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::MalformedSeries { .. }));
    }

    #[test]
    fn data_range_reports_bounds() {
        let adapter = seeded();
        let (min, max, count) = adapter.data_range("P1").unwrap().unwrap();
        assert_eq!(min, jan(1));
        assert_eq!(max, jan(5));
        assert_eq!(count, 4);
    }

    #[test]
    fn data_range_no_data() {
        let adapter = seeded();
        assert!(adapter.data_range("UNKNOWN").unwrap().is_none());
    }

    #[test]
    fn insert_replaces_existing_date() {
        let adapter = seeded();
        adapter
            .insert_prices("P2", &[PricePoint::new(jan(2), 55.0)])
            .unwrap();
        let series = adapter.fetch_prices("P2", DateRange::single(jan(2))).unwrap();
        assert_eq!(series.points(), &[PricePoint::new(jan(2), 55.0)]);
    }
}
