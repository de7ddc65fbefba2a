//! Application state for the portal service.

use std::sync::Arc;

use anyhow::Result;
use catalog::{Catalog, StationCatalog};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use crate::config::PortalConfig;

/// Shared application state.
pub struct AppState {
    /// Station metadata and observations.
    pub catalog: Arc<dyn StationCatalog>,

    pub config: PortalConfig,

    /// Renders the Prometheus exposition at `/metrics`.
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// State backed by the process-wide pool for the configured database.
    ///
    /// The pool connects lazily, so an unreachable database surfaces on the
    /// first request (and at `/ready`) rather than here.
    pub fn new(config: PortalConfig, metrics: PrometheusHandle) -> Result<Self> {
        let catalog = Catalog::shared(&config.database)?;
        info!(
            publish_only = config.publish_only,
            formats = ?config.data_formats,
            "Catalog configured"
        );
        Ok(Self::with_catalog(Arc::new(catalog), config, metrics))
    }

    pub fn with_catalog(
        catalog: Arc<dyn StationCatalog>,
        config: PortalConfig,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            catalog,
            config,
            metrics,
        }
    }
}
