//! Web server adapter.
//!
//! JSON API over axum. Every analytics request runs its repository access and
//! computation on the blocking pool, bounded by the configured timeout.

mod error;
mod handlers;

pub use error::{WebError, status_from_error};
pub use handlers::*;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domain::config_validation::{DEFAULT_REQUEST_TIMEOUT_SECS, cumulative_base};
use crate::domain::cumulative::BaseValue;
use crate::domain::error::AnalyticsError;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;

pub struct AppState {
    pub prices: Arc<dyn PricePort + Send + Sync>,
    pub cumulative_base: BaseValue,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(prices: Arc<dyn PricePort + Send + Sync>) -> Self {
        Self {
            prices,
            cumulative_base: BaseValue::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS as u64),
        }
    }

    pub fn from_config(
        prices: Arc<dyn PricePort + Send + Sync>,
        config: &dyn ConfigPort,
    ) -> Result<Self, AnalyticsError> {
        let timeout = config.get_int("web", "request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS);
        Ok(Self {
            prices,
            cumulative_base: cumulative_base(config)?,
            request_timeout: Duration::from_secs(timeout.max(1) as u64),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/portfolio-price", get(handlers::portfolio_price))
        .route("/daily-return", get(handlers::daily_return))
        .route("/cumulative-price", get(handlers::cumulative_price))
        .route("/daily-volatility", get(handlers::daily_volatility))
        .route("/correlation", get(handlers::correlation))
        .route("/tracking-error", get(handlers::tracking_error))
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status));

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api/v1", api)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}
