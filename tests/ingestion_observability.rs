use std::sync::{Arc, Mutex};

use catalog_analytics::ingestion::{
    CatalogStore, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, LoadOptions, LoadSource,
};
use catalog_analytics::schema::SchemaRegistry;
use catalog_analytics::IngestionError;

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<(String, usize, usize)>>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
}

impl IngestionObserver for RecordingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.successes
            .lock()
            .unwrap()
            .push((ctx.source.clone(), stats.loaded, stats.skipped));
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn options(obs: &Arc<RecordingObserver>) -> LoadOptions {
    LoadOptions {
        observer: Some(obs.clone()),
        alert_at_or_above: IngestionSeverity::Critical,
        ..Default::default()
    }
}

#[test]
fn observer_receives_success_with_counts() {
    let obs = Arc::new(RecordingObserver::default());
    let mut store = CatalogStore::new(SchemaRegistry::products());
    store
        .load(&LoadSource::file("tests/fixtures/styles_malformed.csv"), &options(&obs))
        .unwrap();

    let successes = obs.successes.lock().unwrap().clone();
    assert_eq!(successes.len(), 1);
    assert!(successes[0].0.ends_with("styles_malformed.csv"));
    assert_eq!((successes[0].1, successes[0].2), (9, 1));
    assert!(obs.failures.lock().unwrap().is_empty());
}

#[test]
fn observer_receives_failure_and_alert_on_critical_io_error() {
    let obs = Arc::new(RecordingObserver::default());
    let mut store = CatalogStore::new(SchemaRegistry::products());

    // Missing file -> Io error -> Critical
    let _ = store
        .load(&LoadSource::file("tests/fixtures/does_not_exist.csv"), &options(&obs))
        .unwrap_err();

    let failures = obs.failures.lock().unwrap().clone();
    let alerts = obs.alerts.lock().unwrap().clone();
    assert_eq!(failures, vec![IngestionSeverity::Critical]);
    assert_eq!(alerts, vec![IngestionSeverity::Critical]);
}

#[test]
fn observer_receives_failure_without_alert_for_non_critical_error() {
    let obs = Arc::new(RecordingObserver::default());
    let mut store = CatalogStore::new(SchemaRegistry::products());

    // Schema mismatch -> Error severity (not Critical) -> should not alert
    let _ = store
        .load(
            &LoadSource::file("tests/fixtures/styles_missing_column.csv"),
            &options(&obs),
        )
        .unwrap_err();

    let failures = obs.failures.lock().unwrap().clone();
    assert_eq!(failures, vec![IngestionSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[test]
fn aborted_load_alerts_when_threshold_is_lowered() {
    let obs = Arc::new(RecordingObserver::default());
    let mut store = CatalogStore::new(SchemaRegistry::products());
    let opts = LoadOptions {
        max_bad_records: 0,
        alert_at_or_above: IngestionSeverity::Error,
        ..options(&obs)
    };

    let err = store
        .load(&LoadSource::file("tests/fixtures/styles_malformed.csv"), &opts)
        .unwrap_err();

    assert!(matches!(err, IngestionError::LoadAborted { .. }));
    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![IngestionSeverity::Error]);
}
