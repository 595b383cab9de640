//! Core domain types and analytics.

pub mod series;
pub mod returns;
pub mod align;
pub mod cumulative;
pub mod volatility;
pub mod correlation;
pub mod tracking_error;
pub mod service;
pub mod config_validation;
pub mod error;
