use std::collections::HashMap;
use std::path::Path;

use chrono::{TimeZone, Utc};
use eddy_data_lake::{DeltaTableWriter, TableSink};
use eddy_events::{EventRecord, normalize_at};
use serde_json::Value;

fn events(count: usize) -> Vec<EventRecord> {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let raw = format!(
                r#"{{"channel": "web", "event_type": "click", "user_id": "u{i}", "interaction_value": {i}}}"#
            );
            normalize_at(raw.as_bytes(), now).unwrap()
        })
        .collect()
}

fn log_entry(table: &Path, version: u64) -> Option<Vec<Value>> {
    let path = table
        .join("_delta_log")
        .join(format!("{version:020}.json"));
    let content = std::fs::read_to_string(path).ok()?;
    Some(
        content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect(),
    )
}

fn added_records(actions: &[Value]) -> u64 {
    actions
        .iter()
        .filter_map(|action| action.get("add"))
        .map(|add| {
            let stats: Value = serde_json::from_str(add["stats"].as_str().unwrap()).unwrap();
            stats["numRecords"].as_u64().unwrap()
        })
        .sum()
}

fn writer(dir: &Path) -> DeltaTableWriter {
    DeltaTableWriter::new(dir.to_str().unwrap(), HashMap::new()).unwrap()
}

#[tokio::test]
async fn test_first_append_creates_table() {
    let dir = tempfile::tempdir().unwrap();
    let writer = writer(dir.path());

    writer.append(&events(3)).await.unwrap();

    let first = log_entry(dir.path(), 0).expect("first commit exists");
    assert!(first.iter().any(|action| action.get("metaData").is_some()));
    assert_eq!(added_records(&first), 3);
}

#[tokio::test]
async fn test_appends_are_separate_commits() {
    let dir = tempfile::tempdir().unwrap();
    let writer = writer(dir.path());

    writer.append(&events(3)).await.unwrap();
    writer.append(&events(2)).await.unwrap();

    let first = log_entry(dir.path(), 0).unwrap();
    let second = log_entry(dir.path(), 1).expect("second commit exists");
    assert_eq!(added_records(&first), 3);
    assert_eq!(added_records(&second), 2);
    assert!(log_entry(dir.path(), 2).is_none());

    let commit_info = second
        .iter()
        .find_map(|action| action.get("commitInfo"))
        .unwrap();
    assert_eq!(commit_info["records"], 2);
}

#[tokio::test]
async fn test_empty_append_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let writer = writer(dir.path());

    writer.append(&[]).await.unwrap();

    assert!(log_entry(dir.path(), 0).is_none());
}

#[test]
fn test_empty_table_path_rejected() {
    let error = DeltaTableWriter::new("  ", HashMap::new()).unwrap_err();
    assert_eq!(error.kind(), eddy_observability::ErrorKind::Configuration);
}
