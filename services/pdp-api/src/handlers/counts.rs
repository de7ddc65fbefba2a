//! Selection size estimates for the portal map.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    Json,
};
use catalog::RecordLength;
use serde::{Deserialize, Serialize};
use station_filters::{validate_vars, RequestParams};
use tracing::debug;

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct StationCount {
    pub stations_selected: i64,
}

/// GET /count_stations - Number of stations matching the filters
pub async fn count_stations_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<RequestParams>,
) -> ApiResult<Json<StationCount>> {
    metrics::record_request("count_stations");

    let predicates = validate_vars(&params);
    let stations_selected = state
        .catalog
        .count_stations(&predicates, state.config.publish_only)
        .await?;
    debug!(filters = predicates.len(), stations_selected, "Counted stations");
    metrics::record_selection("count_stations", stations_selected.max(0) as usize);

    Ok(Json(StationCount { stations_selected }))
}

/// GET /record_length - Observation counts for the stations matching the
/// filters, clipped when `cliptodate` is present
pub async fn record_length_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<RequestParams>,
) -> ApiResult<Json<RecordLength>> {
    metrics::record_request("record_length");

    let predicates = validate_vars(&params);
    let length = state
        .catalog
        .record_length(&predicates, state.config.publish_only, &params.clip_dates())
        .await?;

    Ok(Json(length))
}
