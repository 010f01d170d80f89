//! Generator service endpoints, alone and behind `HttpGenerator`.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;
use wayfarer_generator::{Generator, HttpGenerator};
use wayfarer_server::generator_service::{ServiceState, router};
use wayfarer_store::Entry;

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn trip() -> Value {
    json!({
        "from": "SFO",
        "to": "London",
        "start_date": "2025-06-16",
        "end_date": "2025-06-23",
        "people": "3",
        "additionalInfo": "",
    })
}

#[tokio::test]
async fn index_lists_endpoints() {
    let app = router(ServiceState::new());
    let (status, body) = call(&app, Method::GET, "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["endpoints"].as_array().unwrap().len() >= 3);
}

#[tokio::test]
async fn submit_then_generate() {
    let state = ServiceState::new();
    let app = router(state.clone());

    let (status, body) = call(&app, Method::POST, "/submit_trip_data", Some(trip())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Trip data stored", "key": "London-2025-06-16"}));
    assert_eq!(state.trip_count().await, 1);

    let (status, itinerary) = call(&app, Method::GET, "/generate_itinerary/London-2025-06-16", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(itinerary["Flights"].as_str().unwrap().starts_with("Depart from SFO to LON on 2025-06-16:"));
    assert_eq!(itinerary["people"], json!("3"));
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let app = router(ServiceState::new());
    let mut partial = trip();
    partial.as_object_mut().unwrap().remove("people");
    partial.as_object_mut().unwrap().remove("from");

    let (status, body) = call(&app, Method::POST, "/submit_trip_data", Some(partial)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Missing required fields: from, people"));
}

#[tokio::test]
async fn bad_dates_are_rejected() {
    let app = router(ServiceState::new());
    let mut bad = trip();
    bad["start_date"] = json!("16/06/2025");

    let (status, body) = call(&app, Method::POST, "/submit_trip_data", Some(bad)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("YYYY-MM-DD"));

    let mut reversed = trip();
    reversed["end_date"] = json!("2025-06-01");
    let (status, _) = call(&app, Method::POST, "/submit_trip_data", Some(reversed)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_key_is_400() {
    let app = router(ServiceState::new());
    let (status, body) = call(&app, Method::GET, "/generate_itinerary/Nowhere-2025-01-01", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Missing or invalid key"));
}

#[tokio::test]
async fn http_generator_round_trip() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(ServiceState::new())).await.unwrap();
    });
    let generator = HttpGenerator::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();

    let entries = match (trip(), json!({"to": "Rome"})) {
        (Value::Object(a), Value::Object(b)) => vec![
            Entry::Valid { key: 0, value: a },
            Entry::Valid { key: 1, value: b },
        ],
        _ => unreachable!(),
    };
    let records = generator.produce(&entries).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["to"], json!("London"));
    assert!(records[1]["error"].as_str().unwrap().starts_with("Missing required fields"));

    let refined = generator.refine(0, &records[0], "late checkout").await.unwrap();
    assert_eq!(refined["refinements"], json!(["late checkout"]));
}
