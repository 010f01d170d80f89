//! Property tests for key assignment and malformed-line isolation.
//!
//! `PROPTEST_CASES` overrides the default case count.

use camino::Utf8PathBuf;
use proptest::prelude::*;
use serde_json::{Map, Value, json};
use std::fs;
use tempfile::TempDir;
use wayfarer_store::{Entry, ItineraryStore, Lookup, RequestLog};

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(32);
    ProptestConfig::with_cases(cases)
}

fn trip() -> impl Strategy<Value = Map<String, Value>> {
    (
        "[A-Z]{3}",
        "[A-Za-z ]{1,12}",
        1u8..9,
        proptest::option::of("[ -~\n]{0,40}"),
    )
        .prop_map(|(from, to, people, notes)| {
            let mut map = Map::new();
            map.insert("from".into(), json!(from));
            map.insert("to".into(), json!(to));
            map.insert("people".into(), json!(people.to_string()));
            if let Some(notes) = notes {
                map.insert("additionalInfo".into(), json!(notes));
            }
            map
        })
}

fn data_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn appended_requests_read_back_in_order(requests in prop::collection::vec(trip(), 0..20)) {
        let dir = TempDir::new().unwrap();
        let log = RequestLog::open(data_path(&dir, "requests.jsonl"));

        for (expected_key, request) in requests.iter().enumerate() {
            prop_assert_eq!(log.append(request).unwrap(), expected_key);
        }

        let entries = log.read_all().unwrap();
        prop_assert_eq!(entries.len(), requests.len());
        for (k, request) in requests.iter().enumerate() {
            prop_assert_eq!(entries[k].key(), k);
            prop_assert_eq!(entries[k].value(), Some(request));
            let read_back = log.read(k).unwrap().and_then(Entry::into_value);
            prop_assert_eq!(read_back.as_ref(), Some(request));
        }
        prop_assert!(log.read(requests.len()).unwrap().is_none());
    }

    #[test]
    fn malformed_line_does_not_hide_neighbours(
        before in prop::collection::vec(trip(), 0..6),
        after in prop::collection::vec(trip(), 0..6),
        garbage in "[a-z<>{ ]{1,20}",
    ) {
        // Blank lines are not records
        prop_assume!(!garbage.trim().is_empty());
        let dir = TempDir::new().unwrap();
        let path = data_path(&dir, "requests.jsonl");

        let mut body = String::new();
        for request in &before {
            body.push_str(&serde_json::to_string(request).unwrap());
            body.push('\n');
        }
        body.push_str(&garbage);
        body.push('\n');
        for request in &after {
            body.push_str(&serde_json::to_string(request).unwrap());
            body.push('\n');
        }
        fs::write(&path, body).unwrap();

        let entries = RequestLog::open(path).read_all().unwrap();
        prop_assert_eq!(entries.len(), before.len() + 1 + after.len());
        match &entries[before.len()] {
            Entry::Malformed { key, line, raw, .. } => {
                prop_assert_eq!(*key, before.len());
                prop_assert_eq!(*line, before.len() + 1);
                prop_assert_eq!(raw.as_str(), garbage.as_str());
            }
            Entry::Valid { .. } => prop_assert!(false, "garbage parsed as valid"),
        }
        for (offset, request) in after.iter().enumerate() {
            prop_assert_eq!(entries[before.len() + 1 + offset].value(), Some(request));
        }
    }

    #[test]
    fn lookups_outside_range_are_not_found(count in 0usize..6, key in -10i64..20) {
        let dir = TempDir::new().unwrap();
        let store = ItineraryStore::open(data_path(&dir, "itineraries.jsonl"));
        let records: Vec<Map<String, Value>> = (0..count)
            .map(|i| {
                let mut map = Map::new();
                map.insert("Flights".into(), json!(format!("flight {i}")));
                map
            })
            .collect();
        store.replace_all(&records).unwrap();

        let lookup = store.read_by_key(key).unwrap();
        if key >= 0 && (key as usize) < count {
            prop_assert_eq!(lookup, Lookup::Found(records[key as usize].clone()));
        } else {
            prop_assert_eq!(lookup, Lookup::NotFound);
        }
    }
}
