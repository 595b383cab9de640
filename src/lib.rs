//! Performance analytics over stored portfolio prices.
//!
//! Hexagonal architecture: pure analytics in [`domain`], port traits in
//! [`ports`], concrete stores and the HTTP surface in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
pub mod logging;
