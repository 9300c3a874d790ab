//! Core domain types for the trade mirror.

pub mod order;
pub mod position;
pub mod strategy;
pub mod trade;

pub use order::*;
pub use position::*;
pub use strategy::*;
pub use trade::*;
