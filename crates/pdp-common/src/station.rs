//! Station identity and summary types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Identifies one monitoring station: the owning network and the station's
/// identifier within that network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationKey {
    pub network_name: String,
    pub native_id: String,
}

impl StationKey {
    pub fn new(network_name: impl Into<String>, native_id: impl Into<String>) -> Self {
        Self {
            network_name: network_name.into(),
            native_id: native_id.into(),
        }
    }

    /// Archive member name for this station's data file.
    ///
    /// `{network}/{native_id}.{extension}`
    pub fn archive_name(&self, extension: &str) -> String {
        format!("{}/{}.{}", self.network_name, self.native_id, extension)
    }

    /// Archive member name for the owning network's variable listing.
    pub fn metadata_archive_name(network_name: &str) -> String {
        format!("{}/variables.csv", network_name)
    }
}

impl std::fmt::Display for StationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network_name, self.native_id)
    }
}

impl From<(String, String)> for StationKey {
    fn from((network_name, native_id): (String, String)) -> Self {
        Self {
            network_name,
            native_id,
        }
    }
}

/// One row of the station summary view (`crmp_network_geoserver`).
///
/// `vars` is the collapsed, comma-joined list of variable identifiers for the
/// station. An identifier is the variable's standard name followed by its cell
/// method with every `time: ` replaced by `_`, e.g.
/// `air_temperature_point` or `air_temperature_maximum_within_days`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    pub station_id: i32,
    pub network_name: String,
    pub native_id: String,
    pub station_name: Option<String>,
    pub min_obs_time: Option<NaiveDateTime>,
    pub max_obs_time: Option<NaiveDateTime>,
    pub freq: Option<String>,
    pub vars: Option<String>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

impl StationSummary {
    pub fn key(&self) -> StationKey {
        StationKey::new(self.network_name.clone(), self.native_id.clone())
    }

    /// Variable identifiers split out of the collapsed `vars` column.
    pub fn variable_ids(&self) -> Vec<&str> {
        match &self.vars {
            Some(vars) => vars
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Build a variable identifier from a standard name and cell method.
pub fn variable_identifier(standard_name: &str, cell_method: &str) -> String {
    format!("{}{}", standard_name, cell_method.replace("time: ", "_"))
}

/// Whether a cell method describes a climatological aggregate.
pub fn is_climatological(cell_method: &str) -> bool {
    cell_method.contains("within") || cell_method.contains("over")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_identifier() {
        assert_eq!(
            variable_identifier("air_temperature", "time: point"),
            "air_temperature_point"
        );
        assert_eq!(
            variable_identifier("air_temperature", "time: maximum within days time: mean over days"),
            "air_temperature_maximum within days _mean over days"
        );
    }

    #[test]
    fn test_is_climatological() {
        assert!(is_climatological("time: mean within months time: mean over years"));
        assert!(!is_climatological("time: point"));
    }
}
