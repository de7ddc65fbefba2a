//! Row types returned by catalog queries.

use chrono::NaiveDateTime;
use pdp_common::station::is_climatological;
use pdp_common::StationKey;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One variable defined by a network (`meta_vars`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NetworkVariable {
    pub variable: String,
    pub standard_name: Option<String>,
    pub cell_method: Option<String>,
    pub unit: Option<String>,
}

impl NetworkVariable {
    pub fn new(
        variable: impl Into<String>,
        standard_name: impl Into<String>,
        cell_method: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            variable: variable.into(),
            standard_name: Some(standard_name.into()),
            cell_method: Some(cell_method.into()),
            unit: Some(unit.into()),
        }
    }

    pub fn is_climatological(&self) -> bool {
        self.cell_method.as_deref().map_or(false, is_climatological)
    }
}

/// A single observed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Observation {
    pub obs_time: NaiveDateTime,
    pub variable: String,
    pub datum: f64,
}

impl Observation {
    pub fn new(obs_time: NaiveDateTime, variable: impl Into<String>, datum: f64) -> Self {
        Self {
            obs_time,
            variable: variable.into(),
            datum,
        }
    }
}

/// Estimated size of a download, in observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLength {
    pub record_length: i64,
    pub climo_length: i64,
}

#[derive(Debug, FromRow)]
pub(crate) struct StationKeyRow {
    pub network_name: String,
    pub native_id: String,
}

impl From<StationKeyRow> for StationKey {
    fn from(row: StationKeyRow) -> Self {
        StationKey::new(row.network_name, row.native_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_climatology() {
        let raw = NetworkVariable::new("TEMP", "air_temperature", "time: point", "celsius");
        let climo = NetworkVariable::new(
            "Tx_Climatology",
            "air_temperature",
            "time: maximum within days time: mean over days",
            "celsius",
        );
        assert!(!raw.is_climatological());
        assert!(climo.is_climatological());

        let unknown = NetworkVariable {
            cell_method: None,
            ..raw
        };
        assert!(!unknown.is_climatological());
    }
}
