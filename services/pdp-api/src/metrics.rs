//! Service metrics recorded through the `metrics` facade.

use std::time::Duration;

use metrics::{counter, histogram};

pub fn record_request(endpoint: &'static str) {
    counter!("pdp_requests_total", "endpoint" => endpoint).increment(1);
}

/// Size of a filtered station selection.
pub fn record_selection(endpoint: &'static str, stations: usize) {
    histogram!("pdp_stations_selected", "endpoint" => endpoint).record(stations as f64);
}

pub fn record_archive_bytes(bytes: usize) {
    counter!("pdp_archive_bytes_total").increment(bytes as u64);
}

pub fn record_archive_complete(elapsed: Duration) {
    counter!("pdp_archives_total", "outcome" => "complete").increment(1);
    histogram!("pdp_archive_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_archive_failed() {
    counter!("pdp_archives_total", "outcome" => "failed").increment(1);
}
