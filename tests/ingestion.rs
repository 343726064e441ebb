//! End-to-end ingestion through the public library API.

use std::sync::Arc;

use meter_readings::{
    Account, AccountRegistry, InMemoryReadingStore, IngestError, ReadingStore,
    ReconciliationEngine, SqliteReadingStore, ValueErrorPolicy,
};

const HEADER: &str = "AccountId,MeterReadingDateTime,MeterReadValue\n";

fn directory() -> Arc<AccountRegistry> {
    let mut registry = AccountRegistry::new();
    registry.register(Account::new(1, "Freya", "Test")).unwrap();
    registry.register(Account::new(2344, "Tommy", "Test")).unwrap();
    registry.register(Account::new(2233, "Barry", "Test")).unwrap();
    Arc::new(registry)
}

fn upload(body: &str) -> String {
    format!("{}{}", HEADER, body)
}

#[test]
fn test_scenario_a_later_reading_wins() {
    let store = InMemoryReadingStore::new();
    let engine = ReconciliationEngine::new(directory(), Arc::new(store.clone()));

    let report = engine
        .ingest_csv(upload("1,01/01/2024 08:00,10\n1,02/01/2024 08:00,12\n").as_bytes())
        .unwrap();

    assert_eq!((report.success, report.failed), (2, 0));
    let stored = store.get(1).unwrap().unwrap();
    assert_eq!(stored.account_id, 1);
    assert_eq!(stored.meter_reading_date_time, "02/01/2024 08:00");
    assert_eq!(stored.meter_read_value, "00012");
}

#[test]
fn test_scenario_b_unknown_account() {
    let store = InMemoryReadingStore::new();
    let engine = ReconciliationEngine::new(directory(), Arc::new(store.clone()));

    let report = engine
        .ingest_csv(upload("9999,01/01/2024 08:00,10\n").as_bytes())
        .unwrap();

    assert_eq!((report.success, report.failed), (0, 1));
    assert!(store.is_empty());
}

#[test]
fn test_scenario_c_non_numeric_value_aborts() {
    let store = InMemoryReadingStore::new();
    let engine = ReconciliationEngine::new(directory(), Arc::new(store.clone()));

    let result = engine.ingest_csv(
        upload("1,01/01/2024 08:00,10\n2344,22/04/2019 09:24,VOID\n2233,22/04/2019 12:25,323\n")
            .as_bytes(),
    );

    assert!(matches!(result, Err(IngestError::ValueFormat { account_id: 2344, .. })));
}

#[test]
fn test_skip_policy_counts_bad_values() {
    let store = InMemoryReadingStore::new();
    let engine = ReconciliationEngine::new(directory(), Arc::new(store.clone()))
        .with_value_errors(ValueErrorPolicy::SkipRow);

    let report = engine
        .ingest_csv(
            upload("1,01/01/2024 08:00,10\n2344,22/04/2019 09:24,VOID\n2233,22/04/2019 12:25,323\n")
                .as_bytes(),
        )
        .unwrap();

    assert_eq!((report.success, report.failed), (2, 1));
    assert!(store.get(2344).unwrap().is_none());
    assert_eq!(store.get(2233).unwrap().unwrap().meter_read_value, "00323");
}

#[test]
fn test_structural_error_aborts() {
    let engine = ReconciliationEngine::new(directory(), Arc::new(InMemoryReadingStore::new()));

    let result = engine.ingest_csv(upload("1,01/01/2024 08:00,10\nx1,01/01/2024 08:00,10\n").as_bytes());

    assert!(matches!(result, Err(IngestError::StructuralParse { line: 3, .. })));
}

#[test]
fn test_mixed_batch_counts() {
    let store = InMemoryReadingStore::new();
    let engine = ReconciliationEngine::new(directory(), Arc::new(store.clone()));

    let body = "2344,22/04/2019 09:24,1002\n\
                2344,22/04/2019 12:25,1002\n\
                2344,22/04/2019 12:25,1003\n\
                2344,21/04/2019 12:25,999\n\
                2233,22/04/2019 12:25,323\n\
                8888,22/04/2019 12:25,1\n\
                1,not a date,5\n";

    let report = engine.ingest_csv(upload(body).as_bytes()).unwrap();

    // 2344: insert, replace, equal timestamp, earlier timestamp
    // 2233: insert; 8888: unknown; 1: insert with unparsable timestamp
    assert_eq!((report.success, report.failed), (4, 3));
    assert_eq!(report.inserted, 3);
    assert_eq!(report.replaced, 1);
    assert_eq!(report.stale, 2);
    assert_eq!(report.unknown_account, 1);

    let readings = store.list().unwrap();
    let ids: Vec<i64> = readings.iter().map(|r| r.account_id).collect();
    assert_eq!(ids, vec![1, 2233, 2344]);
    assert_eq!(readings[2].meter_reading_date_time, "22/04/2019 12:25");
    assert_eq!(readings[2].meter_read_value, "01002");
}

#[test]
fn test_reupload_is_idempotent() {
    let store = InMemoryReadingStore::new();
    let engine = ReconciliationEngine::new(directory(), Arc::new(store.clone()));
    let body = upload("2344,22/04/2019 09:24,1002\n2233,22/04/2019 12:25,323\n");

    let first = engine.ingest_csv(body.as_bytes()).unwrap();
    let snapshot = store.list().unwrap();
    let second = engine.ingest_csv(body.as_bytes()).unwrap();

    assert_eq!((first.success, first.failed), (2, 0));
    assert_eq!((second.success, second.failed), (0, 2));
    assert_eq!(store.list().unwrap(), snapshot);
}

#[test]
fn test_sqlite_store_behaves_like_memory_store() {
    let store = Arc::new(SqliteReadingStore::in_memory().unwrap());
    let engine = ReconciliationEngine::new(directory(), store.clone());

    let report = engine
        .ingest_csv(upload("1,01/01/2024 08:00,10\n1,02/01/2024 08:00,12\n1,01/01/2024 09:00,11\n").as_bytes())
        .unwrap();

    assert_eq!((report.success, report.failed), (2, 1));
    let readings = store.list().unwrap();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].meter_reading_date_time, "02/01/2024 08:00");
    assert_eq!(readings[0].meter_read_value, "00012");
}

#[test]
fn test_unknown_account_with_bad_value_is_a_failed_row() {
    let store = InMemoryReadingStore::new();
    let engine = ReconciliationEngine::new(directory(), Arc::new(store.clone()));

    let report = engine
        .ingest_csv(upload("1,01/01/2024 08:00,10\n999,01/01/2024 08:00,VOID\n").as_bytes())
        .unwrap();

    assert_eq!((report.success, report.failed), (1, 1));
    assert_eq!(report.unknown_account, 1);
    assert!(store.get(999).unwrap().is_none());
}

#[test]
fn test_short_row_for_unknown_account_is_a_failed_row() {
    let store = InMemoryReadingStore::new();
    let engine = ReconciliationEngine::new(directory(), Arc::new(store.clone()));

    let report = engine
        .ingest_csv(upload("1,01/01/2024 08:00,10\n999\n").as_bytes())
        .unwrap();

    assert_eq!((report.success, report.failed), (1, 1));
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn test_short_row_for_known_account_is_a_value_error() {
    let engine = ReconciliationEngine::new(directory(), Arc::new(InMemoryReadingStore::new()));

    let result = engine.ingest_csv(upload("1,01/01/2024 08:00\n").as_bytes());

    assert!(matches!(result, Err(IngestError::ValueFormat { account_id: 1, line: 2, .. })));
}

#[test]
fn test_extra_column_absent_on_some_rows() {
    let store = InMemoryReadingStore::new();
    let engine = ReconciliationEngine::new(directory(), Arc::new(store.clone()));
    let body = "AccountId,MeterReadingDateTime,MeterReadValue,Notes\n\
                1,01/01/2024 08:00,10\n\
                2344,22/04/2019 09:24,1002,checked\n";

    let report = engine.ingest_csv(body.as_bytes()).unwrap();

    assert_eq!((report.success, report.failed), (2, 0));
    assert_eq!(store.get(1).unwrap().unwrap().meter_read_value, "00010");
    assert_eq!(store.get(2344).unwrap().unwrap().meter_read_value, "01002");
}

#[test]
fn test_single_digit_timestamp_never_replaces() {
    let store = InMemoryReadingStore::new();
    let engine = ReconciliationEngine::new(directory(), Arc::new(store.clone()));

    let report = engine
        .ingest_csv(upload("1,01/01/2024 08:00,10\n1,2/1/2024 8:00,12\n").as_bytes())
        .unwrap();

    assert_eq!((report.success, report.failed), (1, 1));
    let stored = store.get(1).unwrap().unwrap();
    assert_eq!(stored.meter_reading_date_time, "01/01/2024 08:00");
    assert_eq!(stored.meter_read_value, "00010");
}
