//! Aggregate download: every selected station in one streamed zip archive.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use pdp_common::PdpError;
use station_filters::params::DATA_FORMAT;
use station_filters::{validate_vars, RequestParams};
use tracing::{error, info};
use zip_stream::{stream_archive_with, ArchiveBuilder, ArchiveError};

use crate::error::ApiResult;
use crate::metrics;
use crate::responders::{aggregate_entries, DataFormat};
use crate::state::AppState;

pub const ARCHIVE_FILENAME: &str = "pcds_data.zip";

/// GET /agg/ - Zip of variable listings and station tables
///
/// Everything that can fail with a status code happens before the first
/// byte; after that, failures truncate the archive.
pub async fn agg_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<RequestParams>,
) -> ApiResult<Response> {
    metrics::record_request("agg");

    let format = params
        .extension(&state.config.data_formats)
        .and_then(|ext| DataFormat::from_extension(&ext))
        .ok_or_else(|| {
            PdpError::UnsupportedFormat(params.get(DATA_FORMAT).unwrap_or_default().to_string())
        })?;
    let climatology = params.wants_climatology();

    let predicates = validate_vars(&params);
    let stations = state
        .catalog
        .list_stations(&predicates, state.config.publish_only)
        .await?;
    metrics::record_selection("agg", stations.len());

    if let Some(limit) = state.config.max_stations {
        if stations.len() > limit {
            return Err(PdpError::TooManyStations {
                selected: stations.len(),
                limit,
            }
            .into());
        }
    }

    info!(
        stations = stations.len(),
        format = format.extension(),
        climatology,
        "Streaming aggregate archive"
    );

    let entries = aggregate_entries(
        Arc::clone(&state.catalog),
        &stations,
        format,
        climatology,
        params.clip_dates(),
    );
    let builder = ArchiveBuilder::with_spill_threshold(state.config.spill_threshold);
    let archive = record_archive(stream_archive_with(builder, futures::stream::iter(entries)));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("filename=\"{}\"", ARCHIVE_FILENAME),
        )
        .body(Body::from_stream(archive))
        .map_err(|e| PdpError::InternalError(e.to_string()).into())
}

/// Pass archive chunks through, recording bytes sent and the outcome.
fn record_archive<S>(archive: S) -> impl Stream<Item = Result<Bytes, ArchiveError>> + Send
where
    S: Stream<Item = Result<Bytes, ArchiveError>> + Send + 'static,
{
    async_stream::stream! {
        let started = Instant::now();
        let mut archive = Box::pin(archive);
        let mut sent = 0usize;

        while let Some(chunk) = archive.next().await {
            let failed = match &chunk {
                Ok(bytes) => {
                    sent += bytes.len();
                    metrics::record_archive_bytes(bytes.len());
                    false
                }
                Err(e) => {
                    error!(error = %e, bytes = sent, "Aggregate archive truncated");
                    metrics::record_archive_failed();
                    true
                }
            };
            yield chunk;
            if failed {
                return;
            }
        }

        info!(bytes = sent, elapsed_ms = started.elapsed().as_millis() as u64, "Aggregate archive complete");
        metrics::record_archive_complete(started.elapsed());
    }
}
