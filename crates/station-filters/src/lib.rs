//! Station filter validation for the PCDS data portal.
//!
//! Form parameters arrive as untyped strings. Each recognised parameter name
//! maps to a [`FormFilter`] that checks the value against a pattern and, when
//! it matches, builds a [`Predicate`] over the station summary view. The
//! predicates are AND-ed onto a "list all stations" query by the catalog.
//!
//! Invalid values and unknown parameter names are dropped without error:
//!
//! ```rust
//! use station_filters::{validate_vars, Predicate, RequestParams};
//!
//! let params = RequestParams::from_pairs([
//!     ("network-name", "EC_raw"),
//!     ("from-date", "2000/Jan/01"),
//!     ("unknown-param", "x"),
//! ]);
//! let predicates = validate_vars(&params);
//! assert_eq!(predicates.len(), 1);
//! assert!(matches!(predicates[0], Predicate::In { .. }));
//! ```

pub mod filters;
pub mod params;
pub mod predicate;
pub mod wkt;

pub use filters::{validate_vars, FilterKind, FilterRegistry, FormFilter};
pub use params::RequestParams;
pub use predicate::{Column, CompareOp, Predicate, Value};
pub use wkt::{Geometry, Polygon, WktError};

/// Spatial reference of polygons sent by the portal map (WGS84).
pub const PORTAL_SRID: i32 = 4326;
