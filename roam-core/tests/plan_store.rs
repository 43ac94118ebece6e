use std::fs;
use std::path::{Path, PathBuf};

use roam_core::{BuildErrorPolicy, PlanSource, PlanStore, StoreError, StoreState};
use tempfile::TempDir;

const DATA_FILES: &[&str] = &["schema.json", "destinations.csv", "plans.csv", "rates.csv"];

fn fixture_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let data = Path::new(env!("CARGO_MANIFEST_DIR")).join("../data");
    for name in DATA_FILES {
        fs::copy(data.join(name), dir.path().join(name)).unwrap();
    }
    dir
}

fn store_in(dir: &Path, policy: BuildErrorPolicy) -> PlanStore {
    PlanStore::builder()
        .path(dir.join("plans.sqlite"))
        .schema_path(dir.join("schema.json"))
        .on_build_error(policy)
        .build()
        .unwrap()
}

fn raw_count(path: PathBuf, table: &str) -> i64 {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn build_loads_every_table() {
    let dir = fixture_dir();
    let mut store = store_in(dir.path(), BuildErrorPolicy::Recoverable);
    assert_eq!(store.state(), StoreState::Ready);

    let report = store.build().unwrap();
    assert_eq!(report.rows_for("destinations"), Some(21));
    assert_eq!(report.rows_for("plans"), Some(12));
    assert_eq!(report.rows_for("rates"), Some(3));
    assert_eq!(store.state(), StoreState::Connected);
    assert!(store.last_error().is_none());
}

#[test]
fn destination_lookup_is_case_insensitive_and_exact() {
    let dir = fixture_dir();
    let mut store = store_in(dir.path(), BuildErrorPolicy::Recoverable);
    store.build().unwrap();

    assert_eq!(store.zone_for_destination("Malaysia").unwrap(), Some(1));
    assert_eq!(store.zone_for_destination("MALAYSIA").unwrap(), Some(1));
    assert_eq!(store.zone_for_destination("japan").unwrap(), Some(2));
    assert_eq!(
        store.zone_for_destination("korea, republic of").unwrap(),
        Some(2)
    );
    assert_eq!(store.zone_for_destination("Korea").unwrap(), None);
    assert_eq!(store.zone_for_destination("Blorkistan").unwrap(), None);
}

#[test]
fn plans_and_rates_by_zone() {
    let dir = fixture_dir();
    let mut store = store_in(dir.path(), BuildErrorPolicy::Recoverable);
    store.build().unwrap();

    let plans = store.plans_for_zone(1).unwrap();
    assert_eq!(plans.len(), 6);
    assert!(plans.iter().all(|plan| plan.zone == 1));
    assert!(plans
        .iter()
        .all(|plan| matches!(plan.source, PlanSource::Stored { .. })));
    let two_day = plans.iter().find(|plan| plan.duration_days == 2).unwrap();
    assert_eq!(two_day.data_gb, 1.9);
    assert_eq!(two_day.price_sgd, 2.0);

    assert!(store.plans_for_zone(42).unwrap().is_empty());

    let rate = store.rate_for_zone(1).unwrap().unwrap();
    assert_eq!(rate.rate_data_per_10kb, 0.01);
    assert_eq!(rate.rate_calls_outgoing_per_min, 0.29);
    assert_eq!(rate.rate_calls_incoming_per_min, 0.0);
    assert_eq!(rate.rate_per_sms, 0.10);
    assert!(store.rate_for_zone(42).unwrap().is_none());
}

#[test]
fn zone_summaries_and_integrity() {
    let dir = fixture_dir();
    let mut store = store_in(dir.path(), BuildErrorPolicy::Recoverable);
    store.build().unwrap();

    let zones = store.zones().unwrap();
    assert_eq!(zones.len(), 3);
    assert_eq!(zones[0].zone, 1);
    assert_eq!(zones[0].destinations, 8);
    assert_eq!(zones[0].plans, 6);
    assert!(zones.iter().all(|zone| zone.has_rates));

    assert_eq!(store.destinations().unwrap().len(), 21);
    assert_eq!(store.integrity_check().unwrap(), "ok");
}

#[test]
fn build_is_idempotent() {
    let dir = fixture_dir();
    let mut store = store_in(dir.path(), BuildErrorPolicy::Recoverable);
    store.build().unwrap();
    let report = store.build().unwrap();
    assert_eq!(report.rows_for("plans"), Some(12));
    assert_eq!(store.plans_for_zone(2).unwrap().len(), 4);
}

#[test]
fn queries_before_build_report_not_built() {
    let dir = fixture_dir();
    let mut store = store_in(dir.path(), BuildErrorPolicy::Recoverable);
    let err = store.zone_for_destination("Malaysia").unwrap_err();
    assert!(matches!(err, StoreError::NotBuilt { .. }));
    assert_eq!(store.state(), StoreState::Ready);
}

#[test]
fn second_store_attaches_to_built_database() {
    let dir = fixture_dir();
    let mut builder = store_in(dir.path(), BuildErrorPolicy::Recoverable);
    builder.build().unwrap();
    builder.shutdown();
    assert!(!builder.is_connected());

    let mut reader = store_in(dir.path(), BuildErrorPolicy::Recoverable);
    assert_eq!(reader.zone_for_destination("Thailand").unwrap(), Some(1));
    assert_eq!(reader.state(), StoreState::Connected);

    // Closing releases the connection; the next query reconnects.
    reader.close().unwrap();
    assert_eq!(reader.plans_for_zone(3).unwrap().len(), 2);
}

#[test]
fn duplicate_key_rolls_back_and_marks_error() {
    let dir = fixture_dir();
    let mut store = store_in(dir.path(), BuildErrorPolicy::Recoverable);
    store.build().unwrap();

    fs::write(
        dir.path().join("destinations.csv"),
        "country,zone\nMalaysia,1\nmalaysia,2\n",
    )
    .unwrap();
    match store.build().unwrap_err() {
        StoreError::Constraint { table, line, .. } => {
            assert_eq!(table, "destinations");
            assert_eq!(line, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.state(), StoreState::Error);
    assert!(store.last_error().unwrap().contains("destinations"));
    assert!(matches!(
        store.zone_for_destination("Malaysia"),
        Err(StoreError::Unavailable { .. })
    ));
    assert_eq!(raw_count(dir.path().join("plans.sqlite"), "destinations"), 21);

    // Recoverable: fixing the source and rebuilding restores service.
    fs::write(
        dir.path().join("destinations.csv"),
        "country,zone\nMalaysia,1\n",
    )
    .unwrap();
    store.build().unwrap();
    assert_eq!(store.state(), StoreState::Connected);
    assert_eq!(store.destinations().unwrap().len(), 1);
}

#[test]
fn fatal_policy_seals_the_store() {
    let dir = fixture_dir();
    fs::remove_file(dir.path().join("plans.csv")).unwrap();
    let mut store = store_in(dir.path(), BuildErrorPolicy::Fatal);

    let err = store.build().unwrap_err();
    assert!(matches!(err, StoreError::SourceFile { .. }));
    assert_eq!(store.state(), StoreState::Error);
    assert!(!store.is_connected());

    fs::copy(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../data/plans.csv"),
        dir.path().join("plans.csv"),
    )
    .unwrap();
    assert!(matches!(
        store.build(),
        Err(StoreError::Unavailable { .. })
    ));
    assert!(matches!(
        store.rate_for_zone(1),
        Err(StoreError::Unavailable { .. })
    ));
}

#[test]
fn unopenable_database_is_fatal() {
    let dir = fixture_dir();
    let mut store = PlanStore::builder()
        .path(dir.path().join("missing/nested/plans.sqlite"))
        .schema_path(dir.path().join("schema.json"))
        .build()
        .unwrap();

    let err = store.build().unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(store.state(), StoreState::Error);
    assert!(matches!(store.build(), Err(StoreError::Unavailable { .. })));
}

#[test]
fn coercion_failure_names_the_row() {
    let dir = fixture_dir();
    fs::write(
        dir.path().join("rates.csv"),
        "zone,rate_data_per_10kb,rate_calls_outgoing_per_min,rate_calls_incoming_per_min,rate_per_sms\n1,0.01,S$0.29,0.00,0.10\n",
    )
    .unwrap();
    let mut store = store_in(dir.path(), BuildErrorPolicy::Recoverable);
    let message = store.build().unwrap_err().to_string();
    assert!(message.contains("rates line 2"));
    assert!(message.contains("rate_calls_outgoing_per_min"));
    assert_eq!(store.last_error(), Some(message.as_str()));
}

#[test]
fn out_of_range_plan_values_fail_the_build() {
    let dir = fixture_dir();
    fs::write(
        dir.path().join("plans.csv"),
        "zone,duration_days,data_gb,price_sgd\n1,-9223372036854775808,-4.0,-1.0\n1,5,3.0,3.0\n",
    )
    .unwrap();
    let mut store = store_in(dir.path(), BuildErrorPolicy::Recoverable);

    match store.build().unwrap_err() {
        StoreError::InvalidValue {
            table,
            line,
            column,
            ..
        } => {
            assert_eq!(table, "plans");
            assert_eq!(line, 2);
            assert_eq!(column, "duration_days");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.state(), StoreState::Error);
    assert!(store.last_error().unwrap().contains("duration_days"));
    assert!(matches!(
        store.plans_for_zone(1),
        Err(StoreError::Unavailable { .. })
    ));
}

#[test]
fn builder_requires_path_and_schema() {
    assert!(matches!(
        PlanStore::builder().build(),
        Err(StoreError::MissingStore)
    ));
    assert!(matches!(
        PlanStore::builder().path("plans.sqlite").build(),
        Err(StoreError::MissingSchema)
    ));
}
