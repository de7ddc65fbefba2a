//! Shared test utilities for the pdp-portal workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Station summary fixtures mirroring the portal's test database
//! - Deterministic content generators for archive members
//! - A minimal zip reader for asserting on streamed archives
//! - Skip macros for tests that need a live database
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, read_zip};
//! ```

pub mod fixtures;
pub mod generators;
pub mod zip_reader;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use zip_reader::{read_zip, ZipMember, ZipReadError};

/// Environment variable naming a Postgres database loaded with the portal
/// schema, used by integration tests.
pub const TEST_DATABASE_ENV: &str = "PDP_TEST_DATABASE_URL";

/// Returns the test database URL, if configured.
pub fn test_database_url() -> Option<String> {
    std::env::var(TEST_DATABASE_ENV)
        .ok()
        .filter(|s| !s.trim().is_empty())
}

/// Macro to skip a test if no test database is configured.
///
/// # Usage
///
/// ```ignore
/// use test_utils::require_database;
///
/// #[tokio::test]
/// async fn test_station_listing() {
///     let url = require_database!();
///     // Test code using url...
/// }
/// ```
///
/// If `PDP_TEST_DATABASE_URL` is unset, the test prints a skip message and
/// returns early.
#[macro_export]
macro_rules! require_database {
    () => {{
        match $crate::test_database_url() {
            Some(url) => url,
            None => {
                eprintln!(
                    "SKIPPED: no test database. Set {} to a database with the portal schema.",
                    $crate::TEST_DATABASE_ENV
                );
                return;
            }
        }
    }};
}
