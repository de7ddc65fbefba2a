//! Station catalog for the PCDS data portal.
//!
//! Renders station filter predicates into SQL against the station summary
//! view, and reads variable metadata, observation counts and observations.
//! [`MemoryCatalog`] implements the same [`StationCatalog`] trait over
//! in-memory rows.

pub mod catalog;
pub mod error;
pub mod memory;
pub mod models;
pub mod pool;
pub mod sql;

pub use catalog::{Catalog, StationCatalog};
pub use error::{CatalogError, CatalogResult};
pub use memory::MemoryCatalog;
pub use models::{NetworkVariable, Observation, RecordLength};
pub use pool::{shared_pool, ConnectionFields, ConnectionParams, PoolCache};
