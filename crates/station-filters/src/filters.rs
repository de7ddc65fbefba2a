//! The form filter registry.
//!
//! Each entry maps a form parameter name to a validation pattern and a
//! predicate builder. Filtering on variables uses the collapsed `vars` column
//! of the station summary view, which holds a `, `-separated list of variable
//! identifiers (see [`pdp_common::station::variable_identifier`]).
//!
//! Two behaviours here are relied upon by existing clients and must not be
//! tightened:
//! - a value that fails validation, or a parameter name that is not
//!   registered, is dropped without error;
//! - for the list filters (`network-name`, `input-vars`, `input-freq`) the
//!   empty string matches every station, not none.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use pdp_common::PortalDate;
use regex::Regex;
use tracing::debug;

use crate::params::RequestParams;
use crate::predicate::{Column, CompareOp, Predicate, Value};
use crate::wkt::{self, Geometry};
use crate::PORTAL_SRID;

/// Parameter names.
pub mod names {
    pub const FROM_DATE: &str = "from-date";
    pub const TO_DATE: &str = "to-date";
    pub const NETWORK_NAME: &str = "network-name";
    pub const INPUT_VAR: &str = "input-var";
    pub const INPUT_VARS: &str = "input-vars";
    pub const INPUT_FREQ: &str = "input-freq";
    pub const INPUT_POLYGON: &str = "input-polygon";
    pub const ONLY_WITH_CLIMATOLOGY: &str = "only-with-climatology";
}

const DATE_PATTERN: &str = r"[0-9]{4}/[0-9]{2}/[0-9]{2}";

/// How a validated value becomes a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Stations observed after the date: `max_obs_time > date`.
    FromDate,
    /// Stations observed before the date: `min_obs_time < date`.
    ToDate,
    /// Comma-separated network names; empty matches all.
    NetworkName,
    /// Substring match of one variable identifier.
    InputVar,
    /// Comma-separated exact variable identifiers; empty matches all.
    InputVars,
    /// Comma-separated observation frequencies; empty matches all.
    InputFreq,
    /// WKT polygon intersecting the station location.
    InputPolygon,
    /// Stations with climatological variables.
    OnlyWithClimatology,
}

/// A named filter: validates form input and maps it to a predicate on the
/// `crmp_network_geoserver` view.
#[derive(Debug, Clone)]
pub struct FormFilter {
    pub name: &'static str,
    pattern: Regex,
    pub kind: FilterKind,
}

impl FormFilter {
    /// Create a filter. The pattern must match the whole value.
    pub fn new(name: &'static str, pattern: &str, kind: FilterKind) -> Self {
        let pattern = Regex::new(&format!("^(?:{})$", pattern))
            .unwrap_or_else(|e| panic!("invalid pattern for filter {}: {}", name, e));
        Self {
            name,
            pattern,
            kind,
        }
    }

    /// The value, if it is valid input for this filter.
    pub fn validate<'a>(&self, value: &'a str) -> Option<&'a str> {
        self.pattern.is_match(value).then_some(value)
    }

    /// Validate `value` and build its predicate.
    ///
    /// Returns `None` when the value does not match the pattern, or when it
    /// matches but cannot be interpreted (e.g. `2000/02/30`).
    pub fn apply(&self, value: &str) -> Option<Predicate> {
        let value = self.validate(value)?;
        self.build(value)
    }

    fn build(&self, value: &str) -> Option<Predicate> {
        match self.kind {
            FilterKind::FromDate => {
                let date = PortalDate::parse(value).ok()?;
                Some(Predicate::compare(
                    Column::MaxObsTime,
                    CompareOp::Gt,
                    Value::Timestamp(date.start_of_day()),
                ))
            }
            FilterKind::ToDate => {
                let date = PortalDate::parse(value).ok()?;
                Some(Predicate::compare(
                    Column::MinObsTime,
                    CompareOp::Lt,
                    Value::Timestamp(date.start_of_day()),
                ))
            }
            FilterKind::NetworkName => Some(list_or_all(value, |items| {
                Predicate::is_in(Column::NetworkName, items)
            })),
            FilterKind::InputVar => Some(Predicate::like(Column::Vars, format!("%{}%", value))),
            FilterKind::InputVars => Some(list_or_all(value, |items| Predicate::VarsOverlap {
                ids: items.into_iter().map(str::to_string).collect(),
            })),
            FilterKind::InputFreq => Some(list_or_all(value, |items| {
                Predicate::is_in(Column::Freq, items)
            })),
            FilterKind::InputPolygon => match Geometry::parse(value, PORTAL_SRID) {
                Ok(geometry) => Some(Predicate::Intersects(geometry)),
                Err(e) => {
                    debug!(error = %e, "Polygon passed validation but could not be parsed");
                    None
                }
            },
            FilterKind::OnlyWithClimatology => Some(climatology_predicate()),
        }
    }
}

/// Empty input matches everything; otherwise split on commas.
fn list_or_all<F>(value: &str, build: F) -> Predicate
where
    F: FnOnce(Vec<&str>) -> Predicate,
{
    if value.is_empty() {
        Predicate::True
    } else {
        build(value.split(',').collect())
    }
}

/// Stations whose variables include a climatological cell method.
pub fn climatology_predicate() -> Predicate {
    Predicate::Or(vec![
        Predicate::like(Column::Vars, "%within%"),
        Predicate::like(Column::Vars, "%over%"),
    ])
}

/// The fixed table of form filters.
#[derive(Debug)]
pub struct FilterRegistry {
    filters: HashMap<&'static str, FormFilter>,
}

static REGISTRY: Lazy<FilterRegistry> = Lazy::new(FilterRegistry::standard);

impl FilterRegistry {
    /// The process-wide registry.
    pub fn global() -> &'static FilterRegistry {
        &REGISTRY
    }

    /// Build the portal's filter table.
    pub fn standard() -> Self {
        let polygon_pattern = wkt::polygon_pattern();
        let filters = [
            FormFilter::new(names::FROM_DATE, DATE_PATTERN, FilterKind::FromDate),
            FormFilter::new(names::TO_DATE, DATE_PATTERN, FilterKind::ToDate),
            // Does not reject empty items (",,") but those can never match.
            FormFilter::new(names::NETWORK_NAME, r"[A-Za-z_,]*", FilterKind::NetworkName),
            FormFilter::new(names::INPUT_VAR, r"[a-z: _]+", FilterKind::InputVar),
            FormFilter::new(names::INPUT_VARS, r"[a-z: _,]*", FilterKind::InputVars),
            FormFilter::new(
                names::INPUT_FREQ,
                r"(1-hourly|irregular|daily|12-hourly|,)*",
                FilterKind::InputFreq,
            ),
            FormFilter::new(names::INPUT_POLYGON, &polygon_pattern, FilterKind::InputPolygon),
            FormFilter::new(
                names::ONLY_WITH_CLIMATOLOGY,
                names::ONLY_WITH_CLIMATOLOGY,
                FilterKind::OnlyWithClimatology,
            ),
        ];

        Self {
            filters: filters.into_iter().map(|f| (f.name, f)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FormFilter> {
        self.filters.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.filters.keys().copied()
    }

    /// Convert form parameters into predicates.
    ///
    /// Each pair is tried independently, in input order. Unknown names and
    /// invalid values contribute nothing.
    pub fn validate<I, K, V>(&self, params: I) -> Vec<Predicate>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut valid = Vec::new();
        for (name, value) in params {
            let (name, value) = (name.as_ref(), value.as_ref());
            let Some(filter) = self.get(name) else {
                continue;
            };
            match filter.apply(value) {
                Some(predicate) => valid.push(predicate),
                None => debug!(param = name, value = value, "Dropping invalid filter value"),
            }
        }
        valid
    }
}

/// Convert request parameters into predicates using the global registry.
pub fn validate_vars(params: &RequestParams) -> Vec<Predicate> {
    FilterRegistry::global().validate(params.iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_is_registered() {
        let registry = FilterRegistry::standard();
        let mut names: Vec<_> = registry.names().collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "from-date",
                "input-freq",
                "input-polygon",
                "input-var",
                "input-vars",
                "network-name",
                "only-with-climatology",
                "to-date",
            ]
        );
    }

    #[test]
    fn test_validate_is_full_match() {
        let registry = FilterRegistry::standard();
        let from = registry.get(names::FROM_DATE).unwrap();
        assert_eq!(from.validate("2000/01/01"), Some("2000/01/01"));
        assert_eq!(from.validate("2000/01/01 trailing"), None);
        assert_eq!(from.validate(""), None);
    }

    #[test]
    fn test_impossible_date_builds_nothing() {
        let registry = FilterRegistry::standard();
        let from = registry.get(names::FROM_DATE).unwrap();
        assert!(from.validate("2000/13/45").is_some());
        assert!(from.apply("2000/13/45").is_none());
    }

    #[test]
    fn test_input_var_builds_substring_match() {
        let registry = FilterRegistry::standard();
        let p = registry.get(names::INPUT_VAR).unwrap().apply("air_temperature").unwrap();
        assert_eq!(p, Predicate::like(Column::Vars, "%air_temperature%"));
    }

    #[test]
    fn test_input_var_requires_value() {
        let registry = FilterRegistry::standard();
        assert!(registry.get(names::INPUT_VAR).unwrap().apply("").is_none());
    }
}
