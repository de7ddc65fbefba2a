//! Station catalog backed by the PCDS PostgreSQL database.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use pdp_common::{ClipDates, StationKey};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use station_filters::Predicate;
use tracing::{debug, instrument};

use crate::error::CatalogResult;
use crate::models::{NetworkVariable, Observation, RecordLength, StationKeyRow};
use crate::pool::{shared_pool, ConnectionParams};
use crate::sql::station_query;

/// `TRUE` when the variable's cell method is climatological.
const CLIMO_VARIABLE: &str = "COALESCE(meta_vars.cell_method LIKE '%within%' \
     OR meta_vars.cell_method LIKE '%over%', FALSE)";

/// Read access to station metadata and observations.
#[async_trait]
pub trait StationCatalog: Send + Sync {
    /// Keys of every station matching all `predicates`, ordered by network
    /// then native id.
    async fn list_stations(
        &self,
        predicates: &[Predicate],
        published_only: bool,
    ) -> CatalogResult<Vec<StationKey>>;

    /// Number of stations matching all `predicates`.
    async fn count_stations(
        &self,
        predicates: &[Predicate],
        published_only: bool,
    ) -> CatalogResult<i64>;

    /// Observation counts for the matching stations.
    ///
    /// The raw count sums monthly counts dated from midnight of `clip.start`
    /// through one month after `clip.end`; the climatology count is
    /// unclipped.
    async fn record_length(
        &self,
        predicates: &[Predicate],
        published_only: bool,
        clip: &ClipDates,
    ) -> CatalogResult<RecordLength>;

    /// Raw or climatological variables defined by `network`.
    async fn network_variables(
        &self,
        network: &str,
        climatology: bool,
    ) -> CatalogResult<Vec<NetworkVariable>>;

    /// Names of the raw or climatological variables observed at a station.
    async fn station_variables(
        &self,
        station: &StationKey,
        climatology: bool,
    ) -> CatalogResult<Vec<String>>;

    /// Observations for one station within `clip` (inclusive), ordered by
    /// time then variable name.
    fn observations(
        &self,
        station: &StationKey,
        climatology: bool,
        clip: ClipDates,
    ) -> BoxStream<'static, CatalogResult<Observation>>;

    /// Check the catalog is reachable.
    async fn ping(&self) -> CatalogResult<()>;
}

/// PostgreSQL catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: PgPool,
}

impl Catalog {
    /// Connect eagerly to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> CatalogResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Catalog over the process-wide pool for `params`.
    pub fn shared(params: &ConnectionParams) -> CatalogResult<Self> {
        Ok(Self {
            pool: shared_pool(params)?,
        })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn station_ids(
        &self,
        predicates: &[Predicate],
        published_only: bool,
    ) -> CatalogResult<Vec<i32>> {
        let mut qb = station_query("station_id", predicates, published_only);
        let ids = qb.build_query_scalar::<i32>().fetch_all(&self.pool).await?;
        Ok(ids)
    }
}

#[async_trait]
impl StationCatalog for Catalog {
    #[instrument(skip(self, predicates), fields(filters = predicates.len()))]
    async fn list_stations(
        &self,
        predicates: &[Predicate],
        published_only: bool,
    ) -> CatalogResult<Vec<StationKey>> {
        let mut qb = station_query("network_name, native_id", predicates, published_only);
        qb.push(" ORDER BY network_name, native_id");

        let rows = qb
            .build_query_as::<StationKeyRow>()
            .fetch_all(&self.pool)
            .await?;
        debug!(stations = rows.len(), "Listed stations");
        Ok(rows.into_iter().map(StationKey::from).collect())
    }

    async fn count_stations(
        &self,
        predicates: &[Predicate],
        published_only: bool,
    ) -> CatalogResult<i64> {
        let mut qb = station_query("count(*)", predicates, published_only);
        let count = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    #[instrument(skip(self, predicates), fields(filters = predicates.len()))]
    async fn record_length(
        &self,
        predicates: &[Predicate],
        published_only: bool,
        clip: &ClipDates,
    ) -> CatalogResult<RecordLength> {
        let ids = self.station_ids(predicates, published_only).await?;

        let record_length: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(c.count), 0)::bigint
            FROM obs_count_per_month_history_mv c
            JOIN meta_history h ON h.history_id = c.history_id
            WHERE h.station_id = ANY($1)
              AND ($2::timestamp IS NULL OR c.date_trunc >= $2)
              AND ($3::timestamp IS NULL OR c.date_trunc <= $3)
            "#,
        )
        .bind(&ids)
        .bind(clip.month_count_start())
        .bind(clip.month_count_end())
        .fetch_one(&self.pool)
        .await?;

        let climo_length: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(c.count), 0)::bigint
            FROM climo_obs_count_mv c
            JOIN meta_history h ON h.history_id = c.history_id
            WHERE h.station_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_one(&self.pool)
        .await?;

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
        let sql = format!(
            "SELECT meta_vars.net_var_name AS variable, meta_vars.standard_name, \
             meta_vars.cell_method, meta_vars.unit \
             FROM meta_vars JOIN meta_network USING (network_id) \
             WHERE meta_network.network_name = $1 AND {} = $2 \
             ORDER BY meta_vars.net_var_name",
            CLIMO_VARIABLE
        );
        let rows = sqlx::query_as::<_, NetworkVariable>(&sql)
            .bind(network)
            .bind(climatology)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn station_variables(
        &self,
        station: &StationKey,
        climatology: bool,
    ) -> CatalogResult<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT meta_vars.net_var_name \
             FROM meta_vars \
             JOIN vars_per_history_mv USING (vars_id) \
             JOIN meta_history USING (history_id) \
             JOIN meta_station USING (station_id) \
             JOIN meta_network ON meta_network.network_id = meta_station.network_id \
             WHERE meta_network.network_name = $1 AND meta_station.native_id = $2 \
             AND {} = $3 \
             ORDER BY meta_vars.net_var_name",
            CLIMO_VARIABLE
        );
        let names = sqlx::query_scalar::<_, String>(&sql)
            .bind(&station.network_name)
            .bind(&station.native_id)
            .bind(climatology)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    fn observations(
        &self,
        station: &StationKey,
        climatology: bool,
        clip: ClipDates,
    ) -> BoxStream<'static, CatalogResult<Observation>> {
        let pool = self.pool.clone();
        let station = station.clone();
        let sql = format!(
            "SELECT obs_raw.obs_time, meta_vars.net_var_name AS variable, obs_raw.datum \
             FROM obs_raw \
             JOIN meta_vars USING (vars_id) \
             JOIN meta_history USING (history_id) \
             JOIN meta_station USING (station_id) \
             JOIN meta_network ON meta_network.network_id = meta_station.network_id \
             WHERE meta_network.network_name = $1 AND meta_station.native_id = $2 \
             AND {} = $3 \
             AND ($4::timestamp IS NULL OR obs_raw.obs_time >= $4) \
             AND ($5::timestamp IS NULL OR obs_raw.obs_time <= $5) \
             ORDER BY obs_raw.obs_time, meta_vars.net_var_name",
            CLIMO_VARIABLE
        );

        async_stream::try_stream! {
            let mut rows = sqlx::query_as::<_, Observation>(&sql)
                .bind(&station.network_name)
                .bind(&station.native_id)
                .bind(climatology)
                .bind(clip.start)
                .bind(clip.end)
                .fetch(&pool);

            while let Some(row) = rows.try_next().await? {
                yield row;
            }
        }
        .boxed()
    }

    async fn ping(&self) -> CatalogResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
