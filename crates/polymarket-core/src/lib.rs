//! Polymarket Core Library
//!
//! Shared types, configuration, and Data API clients for the trade mirror.

pub mod api;
pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
