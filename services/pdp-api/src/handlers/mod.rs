//! HTTP request handlers for the portal service.

pub mod agg;
pub mod counts;
pub mod health;
