//! HTTP handlers.

pub mod admin;
pub mod health;
pub mod invalidate;
pub mod listing;
pub mod metrics;
