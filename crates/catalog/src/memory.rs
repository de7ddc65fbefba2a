//! In-memory catalog over station summaries.
//!
//! Evaluates predicates directly against [`StationSummary`] rows. Used by the
//! service tests and for running the API without a database.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::stream::{self, BoxStream, StreamExt};
use pdp_common::{ClipDates, StationKey, StationSummary};
use station_filters::Predicate;

use crate::catalog::StationCatalog;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{NetworkVariable, Observation, RecordLength};

#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    stations: Vec<StationSummary>,
    unpublished: HashSet<String>,
    variables: HashMap<String, Vec<NetworkVariable>>,
    observations: HashMap<StationKey, Vec<Observation>>,
    monthly_counts: Vec<(i32, NaiveDateTime, i64)>,
    climo_counts: Vec<(i32, i64)>,
    failing: HashSet<StationKey>,
    unavailable: bool,
}

impl MemoryCatalog {
    pub fn new(stations: Vec<StationSummary>) -> Self {
        Self {
            stations,
            ..Default::default()
        }
    }

    /// Exclude `network` from published-only queries.
    pub fn unpublish(mut self, network: &str) -> Self {
        self.unpublished.insert(network.to_string());
        self
    }

    pub fn with_variable(mut self, network: &str, variable: NetworkVariable) -> Self {
        self.variables
            .entry(network.to_string())
            .or_default()
            .push(variable);
        self
    }

    pub fn with_observations(mut self, station: StationKey, observations: Vec<Observation>) -> Self {
        self.observations.entry(station).or_default().extend(observations);
        self
    }

    /// Record `count` observations for a station in the month starting at
    /// `month`.
    pub fn with_monthly_count(mut self, station_id: i32, month: NaiveDateTime, count: i64) -> Self {
        self.monthly_counts.push((station_id, month, count));
        self
    }

    pub fn with_climo_count(mut self, station_id: i32, count: i64) -> Self {
        self.climo_counts.push((station_id, count));
        self
    }

    /// Make the observation stream for `station` fail after its first row.
    pub fn failing_station(mut self, station: StationKey) -> Self {
        self.failing.insert(station);
        self
    }

    /// Make every query fail as if the database were down.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check_available(&self) -> CatalogResult<()> {
        if self.unavailable {
            return Err(CatalogError::Unavailable("database is down".to_string()));
        }
        Ok(())
    }

    fn selected<'a>(
        &'a self,
        predicates: &'a [Predicate],
        published_only: bool,
    ) -> impl Iterator<Item = &'a StationSummary> + 'a {
        self.stations.iter().filter(move |s| {
            predicates.iter().all(|p| p.matches(s))
                && !(published_only && self.unpublished.contains(&s.network_name))
        })
    }

    fn variable(&self, network: &str, name: &str) -> Option<&NetworkVariable> {
        self.variables
            .get(network)
            .and_then(|vars| vars.iter().find(|v| v.variable == name))
    }

    fn is_kind(&self, network: &str, name: &str, climatology: bool) -> bool {
        self.variable(network, name)
            .map_or(false, |v| v.is_climatological() == climatology)
    }
}

#[async_trait]
impl StationCatalog for MemoryCatalog {
    async fn list_stations(
        &self,
        predicates: &[Predicate],
        published_only: bool,
    ) -> CatalogResult<Vec<StationKey>> {
        self.check_available()?;
        let keys: BTreeSet<StationKey> = self
            .selected(predicates, published_only)
            .map(StationSummary::key)
            .collect();
        Ok(keys.into_iter().collect())
    }

    async fn count_stations(
        &self,
        predicates: &[Predicate],
        published_only: bool,
    ) -> CatalogResult<i64> {
        self.check_available()?;
        Ok(self.selected(predicates, published_only).count() as i64)
    }

    async fn record_length(
        &self,
        predicates: &[Predicate],
        published_only: bool,
        clip: &ClipDates,
    ) -> CatalogResult<RecordLength> {
        self.check_available()?;
        let ids: HashSet<i32> = self
            .selected(predicates, published_only)
            .map(|s| s.station_id)
            .collect();

        let start = clip.month_count_start();
        let end = clip.month_count_end();
        let record_length = self
            .monthly_counts
            .iter()
            .filter(|(id, month, _)| {
                ids.contains(id)
                    && start.map_or(true, |s| *month >= s)
                    && end.map_or(true, |e| *month <= e)
            })
            .map(|(_, _, count)| count)
            .sum();
        let climo_length = self
            .climo_counts
            .iter()
            .filter(|(id, _)| ids.contains(id))
            .map(|(_, count)| count)
            .sum();

        Ok(RecordLength {
            record_length,
            climo_length,
        })
    }

    async fn network_variables(
        &self,
        network: &str,
        climatology: bool,
    ) -> CatalogResult<Vec<NetworkVariable>> {
        self.check_available()?;
        let mut vars: Vec<NetworkVariable> = self
            .variables
            .get(network)
            .map(|vars| {
                vars.iter()
                    .filter(|v| v.is_climatological() == climatology)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        vars.sort_by(|a, b| a.variable.cmp(&b.variable));
        Ok(vars)
    }

    async fn station_variables(
        &self,
        station: &StationKey,
        climatology: bool,
    ) -> CatalogResult<Vec<String>> {
        self.check_available()?;
        let names: BTreeSet<String> = self
            .observations
            .get(station)
            .into_iter()
            .flatten()
            .filter(|o| self.is_kind(&station.network_name, &o.variable, climatology))
            .map(|o| o.variable.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    fn observations(
        &self,
        station: &StationKey,
        climatology: bool,
        clip: ClipDates,
    ) -> BoxStream<'static, CatalogResult<Observation>> {
        if let Err(e) = self.check_available() {
            return stream::once(async move { Err(e) }).boxed();
        }

        let mut rows: Vec<Observation> = self
            .observations
            .get(station)
            .into_iter()
            .flatten()
            .filter(|o| {
                clip.contains(&o.obs_time)
                    && self.is_kind(&station.network_name, &o.variable, climatology)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.obs_time
                .cmp(&b.obs_time)
                .then_with(|| a.variable.cmp(&b.variable))
        });

        let mut results: Vec<CatalogResult<Observation>> = rows.into_iter().map(Ok).collect();
        if self.failing.contains(station) {
            results.truncate(1);
            results.push(Err(CatalogError::Unavailable(format!(
                "connection lost while reading {}",
                station
            ))));
        }
        stream::iter(results).boxed()
    }

    async fn ping(&self) -> CatalogResult<()> {
        self.check_available()
    }
}
