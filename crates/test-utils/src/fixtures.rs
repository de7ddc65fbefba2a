//! Common station fixtures for portal tests.
//!
//! A handful of stations shaped like rows of the `crmp_network_geoserver`
//! view, covering the cases the filters distinguish: networks, frequencies,
//! observation ranges, raw vs. climatological variables and locations inside
//! and outside a Vancouver Island selection polygon.

use chrono::{NaiveDate, NaiveDateTime};
use pdp_common::StationSummary;

/// Selection polygon roughly covering southern Vancouver Island.
pub const VANCOUVER_ISLAND_WKT: &str = "POLYGON ((-123.240336 50.074796,-122.443323 49.762922,-121.992837 49.416394,-122.235407 48.654034,-123.725474 48.792645,-123.864085 49.728269,-123.240336 50.074796))";

/// Midnight on the given date.
pub fn ts(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_else(|| panic!("invalid fixture date {}-{}-{}", year, month, day))
}

#[allow(clippy::too_many_arguments)]
fn station(
    station_id: i32,
    network_name: &str,
    native_id: &str,
    range: (NaiveDateTime, NaiveDateTime),
    freq: &str,
    vars: &str,
    lon: f64,
    lat: f64,
) -> StationSummary {
    StationSummary {
        station_id,
        network_name: network_name.to_string(),
        native_id: native_id.to_string(),
        station_name: Some(format!("{} {}", network_name, native_id)),
        min_obs_time: Some(range.0),
        max_obs_time: Some(range.1),
        freq: Some(freq.to_string()),
        vars: Some(vars.to_string()),
        lon: Some(lon),
        lat: Some(lat),
    }
}

/// Sample station summaries.
pub fn sample_stations() -> Vec<StationSummary> {
    vec![
        station(
            13,
            "EC_raw",
            "1046332",
            (ts(1960, 1, 1), ts(2004, 12, 31)),
            "daily",
            "air_temperature_maximum, air_temperature_minimum, lwe_thickness_of_precipitation_amount_sum",
            -123.43,
            48.95,
        ),
        station(
            113,
            "EC_raw",
            "1126150",
            (ts(1995, 6, 1), ts(2010, 1, 1)),
            "1-hourly",
            "air_temperature_point, air_temperature_mean within days _mean over days",
            -119.38,
            49.95,
        ),
        station(
            213,
            "ARDA",
            "115084",
            (ts(1971, 1, 1), ts(1990, 12, 31)),
            "daily",
            "lwe_thickness_of_precipitation_amount_sum",
            -122.98,
            49.07,
        ),
        station(
            313,
            "FLNRO-WMB",
            "369",
            (ts(2001, 4, 1), ts(2012, 10, 31)),
            "1-hourly",
            "air_temperature_point, relative_humidity_mean, wind_speed_mean",
            -123.6,
            48.9,
        ),
        station(
            413,
            "MoTIe",
            "11091",
            (ts(2000, 1, 10), ts(2000, 1, 20)),
            "irregular",
            "air_temperature_point, surface_snow_thickness_point",
            -121.2,
            49.4,
        ),
        station(
            513,
            "BCH",
            "ALU",
            (ts(1950, 1, 1), ts(1999, 12, 31)),
            "12-hourly",
            "air_temperature_maximum within months _mean over years",
            -122.79,
            53.91,
        ),
    ]
}
