//! Catalog behaviour exercised through the in-memory implementation.

use catalog::{CatalogError, MemoryCatalog, NetworkVariable, Observation, StationCatalog};
use futures::StreamExt;
use pdp_common::{ClipDates, StationKey};
use station_filters::{validate_vars, RequestParams};
use test_utils::{sample_stations, ts};

fn catalog() -> MemoryCatalog {
    MemoryCatalog::new(sample_stations())
        .with_variable(
            "EC_raw",
            NetworkVariable::new("MAX_TEMP", "air_temperature", "time: maximum", "celsius"),
        )
        .with_variable(
            "EC_raw",
            NetworkVariable::new("MIN_TEMP", "air_temperature", "time: minimum", "celsius"),
        )
        .with_variable(
            "EC_raw",
            NetworkVariable::new(
                "Tmean_Climatology",
                "air_temperature",
                "time: mean within days time: mean over days",
                "celsius",
            ),
        )
        .with_observations(
            StationKey::new("EC_raw", "1046332"),
            vec![
                Observation::new(ts(2000, 1, 2), "MIN_TEMP", -3.5),
                Observation::new(ts(2000, 1, 1), "MAX_TEMP", 4.0),
                Observation::new(ts(2000, 1, 1), "MIN_TEMP", -2.0),
                Observation::new(ts(2000, 1, 3), "MAX_TEMP", 6.5),
                Observation::new(ts(1971, 1, 1), "Tmean_Climatology", 3.1),
            ],
        )
        .with_monthly_count(13, ts(1999, 12, 1), 31)
        .with_monthly_count(13, ts(2000, 1, 1), 31)
        .with_monthly_count(13, ts(2000, 2, 1), 29)
        .with_monthly_count(213, ts(2000, 1, 1), 10)
        .with_climo_count(13, 12)
        .with_climo_count(513, 24)
}

fn filters(pairs: &[(&str, &str)]) -> Vec<station_filters::Predicate> {
    validate_vars(&RequestParams::from_pairs(pairs.iter().copied()))
}

#[tokio::test]
async fn test_list_all_stations_sorted() {
    let keys = catalog().list_stations(&[], false).await.unwrap();
    let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    assert_eq!(
        names,
        vec![
            "ARDA/115084",
            "BCH/ALU",
            "EC_raw/1046332",
            "EC_raw/1126150",
            "FLNRO-WMB/369",
            "MoTIe/11091",
        ]
    );
}

#[tokio::test]
async fn test_list_with_filters() {
    let keys = catalog()
        .list_stations(&filters(&[("network-name", "EC_raw")]), false)
        .await
        .unwrap();
    assert_eq!(
        keys,
        vec![
            StationKey::new("EC_raw", "1046332"),
            StationKey::new("EC_raw", "1126150"),
        ]
    );
}

#[tokio::test]
async fn test_published_only_hides_unpublished_networks() {
    let catalog = catalog().unpublish("BCH");
    assert_eq!(catalog.count_stations(&[], false).await.unwrap(), 6);
    assert_eq!(catalog.count_stations(&[], true).await.unwrap(), 5);

    let keys = catalog.list_stations(&[], true).await.unwrap();
    assert!(keys.iter().all(|k| k.network_name != "BCH"));
}

#[tokio::test]
async fn test_count_matches_listing() {
    let catalog = catalog();
    let predicates = filters(&[("input-freq", "1-hourly,daily")]);
    let listed = catalog.list_stations(&predicates, false).await.unwrap();
    let counted = catalog.count_stations(&predicates, false).await.unwrap();
    assert_eq!(counted, listed.len() as i64);
    assert_eq!(counted, 4);
}

#[tokio::test]
async fn test_record_length_unclipped() {
    let length = catalog()
        .record_length(&filters(&[("network-name", "EC_raw")]), false, &ClipDates::none())
        .await
        .unwrap();
    assert_eq!(length.record_length, 91);
    assert_eq!(length.climo_length, 12);
}

#[tokio::test]
async fn test_record_length_clipped_extends_end_by_a_month() {
    let clip = ClipDates::new(Some(ts(2000, 1, 1)), Some(ts(2000, 1, 31)));
    let length = catalog()
        .record_length(&filters(&[("network-name", "EC_raw")]), false, &clip)
        .await
        .unwrap();
    // January and February; December falls before the start.
    assert_eq!(length.record_length, 60);
    assert_eq!(length.climo_length, 12);
}

#[tokio::test]
async fn test_record_length_mid_month_start_skips_that_month() {
    let clip = ClipDates::new(Some(ts(2000, 1, 15)), Some(ts(2000, 1, 31)));
    let length = catalog()
        .record_length(&filters(&[("network-name", "EC_raw")]), false, &clip)
        .await
        .unwrap();
    // The January row is dated the 1st, before a start on the 15th.
    assert_eq!(length.record_length, 29);
}

#[tokio::test]
async fn test_record_length_no_stations() {
    let length = catalog()
        .record_length(&filters(&[("network-name", "NOPE")]), false, &ClipDates::none())
        .await
        .unwrap();
    assert_eq!(length.record_length, 0);
    assert_eq!(length.climo_length, 0);
}

#[tokio::test]
async fn test_network_variables_split_by_climatology() {
    let catalog = catalog();
    let raw = catalog.network_variables("EC_raw", false).await.unwrap();
    let names: Vec<_> = raw.iter().map(|v| v.variable.as_str()).collect();
    assert_eq!(names, vec!["MAX_TEMP", "MIN_TEMP"]);

    let climo = catalog.network_variables("EC_raw", true).await.unwrap();
    assert_eq!(climo.len(), 1);
    assert_eq!(climo[0].variable, "Tmean_Climatology");

    assert!(catalog.network_variables("ARDA", false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_station_variables() {
    let key = StationKey::new("EC_raw", "1046332");
    let catalog = catalog();
    assert_eq!(
        catalog.station_variables(&key, false).await.unwrap(),
        vec!["MAX_TEMP", "MIN_TEMP"]
    );
    assert_eq!(
        catalog.station_variables(&key, true).await.unwrap(),
        vec!["Tmean_Climatology"]
    );
}

#[tokio::test]
async fn test_observations_ordered_and_clipped() {
    let key = StationKey::new("EC_raw", "1046332");
    let catalog = catalog();

    let all: Vec<Observation> = catalog
        .observations(&key, false, ClipDates::none())
        .map(|r| r.unwrap())
        .collect()
        .await;
    let order: Vec<_> = all
        .iter()
        .map(|o| (o.obs_time, o.variable.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (ts(2000, 1, 1), "MAX_TEMP"),
            (ts(2000, 1, 1), "MIN_TEMP"),
            (ts(2000, 1, 2), "MIN_TEMP"),
            (ts(2000, 1, 3), "MAX_TEMP"),
        ]
    );

    let clip = ClipDates::new(Some(ts(2000, 1, 2)), Some(ts(2000, 1, 3)));
    let clipped: Vec<Observation> = catalog
        .observations(&key, false, clip)
        .map(|r| r.unwrap())
        .collect()
        .await;
    assert_eq!(clipped.len(), 2);
    assert_eq!(clipped[0].obs_time, ts(2000, 1, 2));
    assert_eq!(clipped[1].obs_time, ts(2000, 1, 3));
}

#[tokio::test]
async fn test_failing_station_stream() {
    let key = StationKey::new("EC_raw", "1046332");
    let catalog = catalog().failing_station(key.clone());

    let results: Vec<_> = catalog
        .observations(&key, false, ClipDates::none())
        .collect()
        .await;
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(CatalogError::Unavailable(_))));
}

#[tokio::test]
async fn test_unavailable_catalog() {
    let catalog = catalog().unavailable();
    assert!(catalog.ping().await.is_err());
    assert!(catalog.list_stations(&[], false).await.is_err());

    let first = catalog
        .observations(&StationKey::new("EC_raw", "1046332"), false, ClipDates::none())
        .next()
        .await;
    assert!(matches!(first, Some(Err(CatalogError::Unavailable(_)))));
}
