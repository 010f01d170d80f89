//! End-to-end pipeline scenarios over a temporary data directory.

use async_trait::async_trait;
use camino::Utf8PathBuf;
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use wayfarer_engine::{EngineError, Pipeline};
use wayfarer_generator::{GenerationError, Generator, ReferenceGenerator};
use wayfarer_store::{Entry, ItineraryRecord, Lookup, TripRequest};
use wayfarer_utils::DataPaths;

fn object(value: Value) -> TripRequest {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn paths(dir: &TempDir) -> DataPaths {
    DataPaths::in_dir(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap())
}

fn reference(dir: &TempDir) -> Pipeline {
    Pipeline::new(paths(dir), Arc::new(ReferenceGenerator::new()), 900)
}

fn nyc_to_paris() -> TripRequest {
    object(json!({
        "from": "NYC",
        "to": "Paris",
        "start_date": "2025-06-01",
        "end_date": "2025-06-10",
        "people": "2",
    }))
}

struct Offline;

#[async_trait]
impl Generator for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    async fn produce(
        &self,
        _requests: &[Entry<TripRequest>],
    ) -> Result<Vec<ItineraryRecord>, GenerationError> {
        Err(GenerationError::Failed {
            exit_code: Some(2),
            stderr: "no route".into(),
        })
    }
}

#[derive(Default)]
struct Stamping {
    runs: AtomicUsize,
}

#[async_trait]
impl Generator for Stamping {
    fn name(&self) -> &str {
        "stamping"
    }

    async fn produce(
        &self,
        requests: &[Entry<TripRequest>],
    ) -> Result<Vec<ItineraryRecord>, GenerationError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(requests
            .iter()
            .map(|e| object(json!({"Flights": format!("run {run}"), "Hotels": e.key()})))
            .collect())
    }
}

#[tokio::test]
async fn new_trip_lands_at_prior_store_length() {
    let dir = TempDir::new().unwrap();
    let pipeline = reference(&dir);
    pipeline.submit(object(json!({"from": "SFO", "to": "London"}))).await.unwrap();
    pipeline.submit(object(json!({"from": "LAX", "to": "Tokyo"}))).await.unwrap();
    let prior = pipeline.itinerary_data().await.unwrap().len();

    let key = pipeline.submit(nyc_to_paris()).await.unwrap();
    let after = pipeline.itinerary_data().await.unwrap();

    assert_eq!(after.len(), prior + 1);
    assert_eq!(key, prior);
    let record = pipeline
        .itinerary(i64::try_from(prior).unwrap())
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(record["to"], json!("Paris"));
    assert_eq!(record["dates"], json!("2025-06-01 to 2025-06-10"));
    assert!(record.contains_key("Flights"));
    assert!(record.contains_key("Hotels"));
}

#[tokio::test]
async fn detail_past_the_end_is_no_data() {
    let dir = TempDir::new().unwrap();
    let pipeline = reference(&dir);
    for to in ["Paris", "Rome", "Oslo"] {
        pipeline.submit(object(json!({"to": to}))).await.unwrap();
    }
    pipeline.itinerary_data().await.unwrap();

    assert_eq!(pipeline.itinerary(5).await.unwrap(), Lookup::NotFound);
    assert!(pipeline.itinerary(2).await.unwrap().is_found());
}

#[tokio::test]
async fn generation_is_idempotent_without_new_requests() {
    let dir = TempDir::new().unwrap();
    let pipeline = reference(&dir);
    pipeline.submit(nyc_to_paris()).await.unwrap();
    pipeline.submit(object(json!({"to": "Rome", "people": 4}))).await.unwrap();

    pipeline.itinerary_data().await.unwrap();
    let first = fs::read(&pipeline.paths().itineraries).unwrap();
    pipeline.itinerary_data().await.unwrap();
    let second = fs::read(&pipeline.paths().itineraries).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn failed_generation_keeps_previous_itineraries() {
    let dir = TempDir::new().unwrap();
    let good = reference(&dir);
    good.submit(nyc_to_paris()).await.unwrap();
    let before = good.itinerary_data().await.unwrap();
    good.submit(object(json!({"to": "Rome"}))).await.unwrap();

    let bad = Pipeline::new(paths(&dir), Arc::new(Offline), 900);
    let err = bad.itinerary_data().await.unwrap_err();

    assert!(matches!(err, EngineError::Generation(GenerationError::Failed { .. })));
    assert!(err.is_generation());
    assert_eq!(err.kind(), "generator_failed");
    assert_eq!(good.itinerary(0).await.unwrap(), Lookup::Found(before[0].value().unwrap().clone()));
    assert_eq!(bad.status().await.unwrap().pending, 1);
}

#[tokio::test]
async fn malformed_request_keeps_alignment() {
    let dir = TempDir::new().unwrap();
    let pipeline = reference(&dir);
    pipeline.submit(object(json!({"to": "Paris"}))).await.unwrap();
    let mut log = fs::read_to_string(&pipeline.paths().requests).unwrap();
    log.push_str("{\"to\": \"Lima\"\n");
    fs::write(&pipeline.paths().requests, log).unwrap();
    pipeline.submit(object(json!({"to": "Oslo"}))).await.unwrap();

    let requests = pipeline.data().await.unwrap();
    let itineraries = pipeline.itinerary_data().await.unwrap();

    assert_eq!(requests.len(), 3);
    assert!(requests[1].is_malformed());
    assert_eq!(
        serde_json::to_value(&requests[1]).unwrap(),
        json!({"error": "Invalid JSON on line 2", "raw": "{\"to\": \"Lima\""})
    );
    assert_eq!(itineraries.len(), 3);
    assert_eq!(itineraries[1].value().unwrap()["error"], json!("Invalid JSON on line 2"));
    assert_eq!(itineraries[2].value().unwrap()["to"], json!("Oslo"));
}

#[tokio::test]
async fn regenerate_replaces_a_single_key() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(paths(&dir), Arc::new(Stamping::default()), 900);
    for to in ["Paris", "Rome", "Oslo"] {
        pipeline.submit(object(json!({"to": to}))).await.unwrap();
    }
    pipeline.itinerary_data().await.unwrap();

    let regenerated = pipeline.regenerate(2).await.unwrap().found().unwrap();
    let all = pipeline.itinerary_data().await.unwrap();

    assert_eq!(regenerated["Flights"], json!("run 1"));
    // The full read above rebuilt everything again as run 2
    assert!(all.iter().all(|e| e.value().unwrap()["Flights"] == json!("run 2")));
    assert_eq!(pipeline.regenerate(7).await.unwrap(), Lookup::NotFound);
}

#[tokio::test]
async fn refine_edits_in_place_without_logging() {
    let dir = TempDir::new().unwrap();
    let pipeline = reference(&dir);
    pipeline.submit(nyc_to_paris()).await.unwrap();
    pipeline.itinerary_data().await.unwrap();

    let refined = pipeline.refine(0, "add a day in Versailles").await.unwrap().found().unwrap();

    assert_eq!(refined["refinements"], json!(["add a day in Versailles"]));
    assert_eq!(pipeline.data().await.unwrap().len(), 1);
    assert_eq!(pipeline.last().await.unwrap(), (Some(0), Lookup::Found(refined)));
}

#[tokio::test]
async fn refine_unsupported_generator_is_an_error() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(paths(&dir), Arc::new(Stamping::default()), 900);
    pipeline.submit(nyc_to_paris()).await.unwrap();
    pipeline.itinerary_data().await.unwrap();

    let err = pipeline.refine(0, "window seat").await.unwrap_err();

    assert_eq!(err.kind(), "unsupported");
}
