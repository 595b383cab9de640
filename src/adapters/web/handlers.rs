//! HTTP request handlers for the web adapter.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::domain::cumulative::BaseValue;
use crate::domain::error::AnalyticsError;
use crate::domain::series::CumulativeIndexPoint;
use crate::domain::service;
use crate::ports::price_port::PricePort;

use super::{AppState, WebError};

// Requests

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointQuery {
    pub portfolio_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub portfolio_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeQuery {
    pub portfolio_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub base: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationQuery {
    pub portfolio_id1: String,
    pub portfolio_id2: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingErrorQuery {
    pub portfolio_id: String,
    pub benchmark_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

// Responses

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub portfolio_id: String,
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReturnResponse {
    pub portfolio_id: String,
    pub date: NaiveDate,
    #[serde(rename = "return")]
    pub daily_return: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativePointResponse {
    pub date: NaiveDate,
    pub cumulative_price: f64,
}

impl From<CumulativeIndexPoint> for CumulativePointResponse {
    fn from(point: CumulativeIndexPoint) -> Self {
        Self {
            date: point.date,
            cumulative_price: point.value,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeResponse {
    pub portfolio_id: String,
    pub cumulative_prices: Vec<CumulativePointResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityResponse {
    pub portfolio_id: String,
    pub volatility: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResponse {
    pub portfolio_id1: String,
    pub portfolio_id2: String,
    pub correlation: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingErrorResponse {
    pub portfolio_id: String,
    pub benchmark_id: String,
    pub tracking_error: f64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// Analytics

pub async fn portfolio_price(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PointQuery>, QueryRejection>,
) -> Result<Json<PriceResponse>, WebError> {
    let Query(q) = query.map_err(rejected)?;
    let id = require_id("portfolioId", q.portfolio_id)?;

    let lookup = id.clone();
    let point = run_blocking(&state, move |port| {
        service::portfolio_price(port, &lookup, q.date)
    })
    .await?;

    Ok(Json(PriceResponse {
        portfolio_id: id,
        date: point.date,
        price: point.price,
    }))
}

pub async fn daily_return(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PointQuery>, QueryRejection>,
) -> Result<Json<DailyReturnResponse>, WebError> {
    let Query(q) = query.map_err(rejected)?;
    let id = require_id("portfolioId", q.portfolio_id)?;

    let lookup = id.clone();
    let point = run_blocking(&state, move |port| {
        service::daily_return(port, &lookup, q.date)
    })
    .await?;

    Ok(Json(DailyReturnResponse {
        portfolio_id: id,
        date: point.date,
        daily_return: point.value,
    }))
}

pub async fn cumulative_price(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CumulativeQuery>, QueryRejection>,
) -> Result<Json<CumulativeResponse>, WebError> {
    let Query(q) = query.map_err(rejected)?;
    let id = require_id("portfolioId", q.portfolio_id)?;
    let base = match q.base.as_deref() {
        Some(raw) => raw.parse::<BaseValue>()?,
        None => state.cumulative_base,
    };

    let lookup = id.clone();
    let index = run_blocking(&state, move |port| {
        service::cumulative_prices(port, &lookup, q.start_date, q.end_date, base)
    })
    .await?;

    Ok(Json(CumulativeResponse {
        portfolio_id: id,
        cumulative_prices: index.into_iter().map(Into::into).collect(),
    }))
}

pub async fn daily_volatility(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<VolatilityResponse>, WebError> {
    let Query(q) = query.map_err(rejected)?;
    let id = require_id("portfolioId", q.portfolio_id)?;

    let lookup = id.clone();
    let volatility = run_blocking(&state, move |port| {
        service::daily_volatility(port, &lookup, q.start_date, q.end_date)
    })
    .await?;

    Ok(Json(VolatilityResponse {
        portfolio_id: id,
        volatility,
    }))
}

pub async fn correlation(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CorrelationQuery>, QueryRejection>,
) -> Result<Json<CorrelationResponse>, WebError> {
    let Query(q) = query.map_err(rejected)?;
    let first = require_id("portfolioId1", q.portfolio_id1)?;
    let second = require_id("portfolioId2", q.portfolio_id2)?;
    if first == second {
        return Err(AnalyticsError::InvalidParameter {
            name: "portfolioId2".into(),
            reason: "portfolio IDs must be different".into(),
        }
        .into());
    }

    let (a, b) = (first.clone(), second.clone());
    let correlation = run_blocking(&state, move |port| {
        service::correlation(port, &a, &b, q.start_date, q.end_date)
    })
    .await?;

    Ok(Json(CorrelationResponse {
        portfolio_id1: first,
        portfolio_id2: second,
        correlation,
    }))
}

pub async fn tracking_error(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TrackingErrorQuery>, QueryRejection>,
) -> Result<Json<TrackingErrorResponse>, WebError> {
    let Query(q) = query.map_err(rejected)?;
    let id = require_id("portfolioId", q.portfolio_id)?;
    let benchmark = require_id("benchmarkId", q.benchmark_id)?;

    let (p, b) = (id.clone(), benchmark.clone());
    let tracking_error = run_blocking(&state, move |port| {
        service::tracking_error(port, &p, &b, q.start_date, q.end_date)
    })
    .await?;

    Ok(Json(TrackingErrorResponse {
        portfolio_id: id,
        benchmark_id: benchmark,
        tracking_error,
    }))
}

// Service

/// Always 200; a failed ping is reported in the body.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let timestamp = Utc::now().to_rfc3339();
    match run_blocking(&state, |port| port.ping()).await {
        Ok(()) => Json(HealthResponse {
            status: "healthy",
            database: "connected",
            timestamp,
            error: None,
        }),
        Err(e) => {
            tracing::warn!(error = %e.message, "health check failed");
            Json(HealthResponse {
                status: "unhealthy",
                database: "disconnected",
                timestamp,
                error: Some(e.message),
            })
        }
    }
}

pub async fn status() -> Json<Value> {
    Json(json!({
        "status": "running",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Portfolio Analytics API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/api/v1/health",
        "status": "/api/v1/status",
        "endpoints": {
            "portfolio_price": "/api/v1/portfolio-price",
            "daily_return": "/api/v1/daily-return",
            "cumulative_price": "/api/v1/cumulative-price",
            "daily_volatility": "/api/v1/daily-volatility",
            "correlation": "/api/v1/correlation",
            "tracking_error": "/api/v1/tracking-error",
        },
    }))
}

pub async fn not_found() -> WebError {
    WebError::not_found("no such endpoint")
}

/// Runs repository access and computation off the async runtime, bounded by
/// the configured request timeout.
async fn run_blocking<T, F>(state: &AppState, work: F) -> Result<T, WebError>
where
    F: FnOnce(&dyn PricePort) -> Result<T, AnalyticsError> + Send + 'static,
    T: Send + 'static,
{
    let prices = Arc::clone(&state.prices);
    let task = tokio::task::spawn_blocking(move || work(&*prices));

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result.map_err(WebError::from),
        Ok(Err(join_err)) => Err(WebError::internal(format!("worker task failed: {join_err}"))),
        Err(_) => Err(AnalyticsError::UpstreamUnavailable {
            reason: format!("request exceeded {:?} timeout", state.request_timeout),
        }
        .into()),
    }
}

fn rejected(rejection: QueryRejection) -> WebError {
    WebError::bad_request(rejection.body_text())
}

fn require_id(name: &str, value: String) -> Result<String, WebError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AnalyticsError::InvalidParameter {
            name: name.to_string(),
            reason: "must not be empty".into(),
        }
        .into());
    }
    Ok(trimmed.to_string())
}
