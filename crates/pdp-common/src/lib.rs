//! Common types and utilities shared across all PCDS data portal services.

pub mod error;
pub mod station;
pub mod time;

pub use error::{PdpError, PdpResult};
pub use station::{StationKey, StationSummary};
pub use time::{ClipDates, PortalDate, TimeParseError};
