//! PostgreSQL price repository.

use std::time::Duration;

use crate::domain::config_validation::DEFAULT_CONNECTION_TIMEOUT_SECS;
use crate::domain::error::AnalyticsError;
use crate::domain::series::{DateRange, PricePoint, PriceSeries};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use postgres::types::ToSql;
use postgres::NoTls;
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use tracing::{debug, warn};

/// Connection settings from `[postgres]`, after environment overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub min_conn: u32,
    pub max_conn: u32,
    pub connection_timeout: Duration,
}

impl PostgresSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AnalyticsError> {
        let port = config.get_int("postgres", "port", 5432);
        let port = u16::try_from(port).map_err(|_| AnalyticsError::ConfigInvalid {
            section: "postgres".into(),
            key: "port".into(),
            reason: format!("{port} is not a valid port"),
        })?;

        Ok(Self {
            host: config
                .get_string("postgres", "host")
                .unwrap_or_else(|| "localhost".into()),
            port,
            dbname: config
                .get_string("postgres", "dbname")
                .unwrap_or_else(|| "app_db".into()),
            user: config
                .get_string("postgres", "user")
                .unwrap_or_else(|| "app_user".into()),
            password: config.get_string("postgres", "password"),
            min_conn: config.get_int("postgres", "min_conn", 1).max(0) as u32,
            max_conn: config.get_int("postgres", "max_conn", 20).max(1) as u32,
            connection_timeout: Duration::from_secs(
                config
                    .get_int(
                        "postgres",
                        "connection_timeout_secs",
                        DEFAULT_CONNECTION_TIMEOUT_SECS,
                    )
                    .max(1) as u64,
            ),
        })
    }

    fn client_config(&self) -> postgres::Config {
        let mut pg = postgres::Config::new();
        pg.host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .connect_timeout(self.connection_timeout);
        if let Some(password) = &self.password {
            pg.password(password);
        }
        pg
    }
}

pub struct PostgresAdapter {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

impl PostgresAdapter {
    /// The pool is built without waiting for the database so that the
    /// service can start and report itself unhealthy while it is down.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AnalyticsError> {
        let settings = PostgresSettings::from_config(config)?;
        let manager = PostgresConnectionManager::new(settings.client_config(), NoTls);

        let pool = Pool::builder()
            .min_idle(Some(settings.min_conn))
            .max_size(settings.max_conn)
            .connection_timeout(settings.connection_timeout)
            .build_unchecked(manager);

        debug!(
            host = %settings.host,
            port = settings.port,
            dbname = %settings.dbname,
            max_conn = settings.max_conn,
            "created postgres pool"
        );
        Ok(Self { pool })
    }

    fn conn(
        &self,
    ) -> Result<PooledConnection<PostgresConnectionManager<NoTls>>, AnalyticsError> {
        self.pool.get().map_err(|e: r2d2::Error| {
            warn!(error = %e, "postgres pool checkout failed");
            AnalyticsError::UpstreamUnavailable {
                reason: e.to_string(),
            }
        })
    }

    fn query_points(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<PricePoint>, AnalyticsError> {
        let mut conn = self.conn()?;
        let rows = conn.query(sql, params).map_err(query_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(PricePoint {
                    date: row.try_get(0).map_err(query_error)?,
                    price: row.try_get(1).map_err(query_error)?,
                })
            })
            .collect()
    }
}

impl PricePort for PostgresAdapter {
    fn fetch_prices(
        &self,
        portfolio_id: &str,
        range: DateRange,
    ) -> Result<PriceSeries, AnalyticsError> {
        let start = range.start();
        let end = range.end();

        let points = self.query_points(
            "SELECT date, price::double precision \
             FROM public.portfolio_prices \
             WHERE portfolio_id = $1 AND date >= $2 AND date <= $3 \
             ORDER BY date ASC",
            &[&portfolio_id, &start, &end],
        )?;
        debug!(portfolio_id, %range, rows = points.len(), "postgres fetch");

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
        let start = range.start();

        let lookback = self.query_points(
            "SELECT date, price::double precision \
             FROM public.portfolio_prices \
             WHERE portfolio_id = $1 AND date < $2 \
             ORDER BY date DESC \
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
        let query = "SELECT MIN(date), MAX(date), COUNT(*) \
                     FROM public.portfolio_prices WHERE portfolio_id = $1";

        let mut conn = self.conn()?;
        let rows = conn.query(query, &[&portfolio_id]).map_err(query_error)?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let min: Option<NaiveDate> = row.try_get(0).map_err(query_error)?;
        let max: Option<NaiveDate> = row.try_get(1).map_err(query_error)?;
        let count: i64 = row.try_get(2).map_err(query_error)?;

        match (min, max) {
            (Some(min), Some(max)) if count > 0 => Ok(Some((min, max, count as usize))),
            _ => Ok(None),
        }
    }

    fn ping(&self) -> Result<(), AnalyticsError> {
        let mut conn = self.conn()?;
        conn.simple_query("SELECT 1").map_err(|e| {
            warn!(error = %e, "postgres ping failed");
            AnalyticsError::UpstreamUnavailable {
                reason: e.to_string(),
            }
        })?;
        Ok(())
    }
}

fn query_error(e: postgres::Error) -> AnalyticsError {
    AnalyticsError::Database {
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn settings_defaults() {
        let config = FileConfigAdapter::from_string("[database]\nbackend = postgres\n").unwrap();
        let settings = PostgresSettings::from_config(&config).unwrap();
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 5432);
        assert_eq!(settings.dbname, "app_db");
        assert_eq!(settings.user, "app_user");
        assert_eq!(settings.password, None);
        assert_eq!(settings.min_conn, 1);
        assert_eq!(settings.max_conn, 20);
        assert_eq!(settings.connection_timeout, Duration::from_secs(5));
    }

    #[test]
    fn settings_from_section() {
        let config = FileConfigAdapter::from_string(
            "[postgres]\nhost = db.internal\nport = 6543\ndbname = prices\nuser = reader\npassword = s3cret\nmin_conn = 2\nmax_conn = 8\n",
        )
        .unwrap();
        let settings = PostgresSettings::from_config(&config).unwrap();
        assert_eq!(settings.host, "db.internal");
        assert_eq!(settings.port, 6543);
        assert_eq!(settings.dbname, "prices");
        assert_eq!(settings.user, "reader");
        assert_eq!(settings.password.as_deref(), Some("s3cret"));
        assert_eq!(settings.min_conn, 2);
        assert_eq!(settings.max_conn, 8);
    }

    #[test]
    fn settings_reject_out_of_range_port() {
        let config = FileConfigAdapter::from_string("[postgres]\nport = 99999\n").unwrap();
        match PostgresSettings::from_config(&config) {
            Err(AnalyticsError::ConfigInvalid { key, .. }) => assert_eq!(key, "port"),
            other => panic!("expected ConfigInvalid, got: {other:?}"),
        }
    }
}
