//! Retrieval API.
//!
//! | Method | Path | |
//! |---|---|---|
//! | POST | `/submit`, `/itinerary-submit` | append a trip request |
//! | GET | `/data` | all requests |
//! | GET | `/itinerary-data` | generate, then all itineraries |
//! | GET | `/itinerary/:key` | one itinerary or the no-data sentinel |
//! | GET | `/itinerary-last` | last itinerary or the no-data sentinel |
//! | POST | `/itinerary/:key/regenerate` | regenerate one key |
//! | POST | `/itinerary/:key/refine` | refine one key with `{"message"}` |
//! | GET | `/status` | request/itinerary counts |
//! | GET | `/health` | liveness |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;
use wayfarer_engine::Pipeline;
use wayfarer_store::model::invalid_line_message;
use wayfarer_store::{Entry, ItineraryRecord, Lookup, StoreStatus, TripRequest};

use crate::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/submit", post(submit))
        .route("/itinerary-submit", post(submit))
        .route("/data", get(data))
        .route("/itinerary-data", get(itinerary_data))
        .route("/itinerary-last", get(itinerary_last))
        .route("/itinerary/:key", get(itinerary))
        .route("/itinerary/:key/regenerate", post(regenerate))
        .route("/itinerary/:key/refine", post(refine))
        .route("/status", get(status))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn submit(
    State(st): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = trip_request(payload)?;
    let key = st
        .pipeline
        .submit(request)
        .await
        .map_err(|e| ApiError::Storage(format!("Error saving data: {e}")))?;
    Ok(Json(json!({ "message": "Data saved successfully", "key": key })))
}

fn trip_request(payload: Result<Json<Value>, JsonRejection>) -> Result<TripRequest, ApiError> {
    match payload {
        Ok(Json(Value::Object(request))) => Ok(request),
        Ok(Json(_)) => Err(ApiError::BadRequest(
            "Trip request must be a JSON object".into(),
        )),
        Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
    }
}

async fn data(State(st): State<AppState>) -> Result<Json<Vec<Entry<TripRequest>>>, ApiError> {
    Ok(Json(st.pipeline.data().await?))
}

async fn itinerary_data(
    State(st): State<AppState>,
) -> Result<Json<Vec<Entry<ItineraryRecord>>>, ApiError> {
    Ok(Json(st.pipeline.itinerary_data().await?))
}

async fn itinerary(
    State(st): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let key = parse_key(&key)?;
    let lookup = match key {
        PathKey::Index(k) => st.pipeline.itinerary(k).await?,
        PathKey::OutOfRange(_) => Lookup::NotFound,
    };
    Ok(Json(lookup_body(key.wire(), lookup)))
}

async fn itinerary_last(State(st): State<AppState>) -> Result<Json<Value>, ApiError> {
    let (key, lookup) = st.pipeline.last().await?;
    Ok(Json(lookup_body(json!(key), lookup)))
}

async fn regenerate(
    State(st): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let key = parse_key(&key)?;
    let lookup = match key {
        PathKey::Index(k) => st.pipeline.regenerate(k).await?,
        PathKey::OutOfRange(_) => Lookup::NotFound,
    };
    Ok(Json(lookup_body(key.wire(), lookup)))
}

#[derive(Debug, Deserialize)]
struct RefineBody {
    message: String,
}

async fn refine(
    State(st): State<AppState>,
    Path(key): Path<String>,
    body: Result<Json<RefineBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let key = parse_key(&key)?;
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Refinement message is empty".into()));
    }
    let lookup = match key {
        PathKey::Index(k) => st.pipeline.refine(k, &body.message).await?,
        PathKey::OutOfRange(_) => Lookup::NotFound,
    };
    Ok(Json(lookup_body(key.wire(), lookup)))
}

async fn status(State(st): State<AppState>) -> Result<Json<StoreStatus>, ApiError> {
    Ok(Json(st.pipeline.status().await?))
}

/// A `:key` path segment. Integers beyond `i64` address nothing.
#[derive(Debug, PartialEq)]
enum PathKey {
    Index(i64),
    OutOfRange(Value),
}

impl PathKey {
    /// Key as echoed in the response body.
    fn wire(&self) -> Value {
        match self {
            Self::Index(k) => json!(k),
            Self::OutOfRange(raw) => raw.clone(),
        }
    }
}

fn parse_key(raw: &str) -> Result<PathKey, ApiError> {
    let trimmed = raw.trim();
    if let Ok(key) = trimmed.parse::<i64>() {
        return Ok(PathKey::Index(key));
    }
    let digits = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::BadRequest(format!("Invalid key '{raw}'")));
    }
    let echoed = serde_json::from_str(trimmed.trim_start_matches('+'))
        .unwrap_or_else(|_| Value::String(trimmed.to_string()));
    Ok(PathKey::OutOfRange(echoed))
}

/// Wire shape of a keyed read: the record, the malformed placeholder, or
/// `{"status": "no_data", "key": k}`.
fn lookup_body(key: Value, lookup: Lookup<ItineraryRecord>) -> Value {
    match lookup {
        Lookup::Found(record) => Value::Object(record),
        Lookup::Malformed { line, raw, .. } => {
            json!({ "error": invalid_line_message(line), "raw": raw })
        }
        Lookup::NotFound => {
            debug!(%key, "No itinerary for key");
            json!({ "status": "no_data", "key": key })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_parse_as_signed_integers() {
        assert_eq!(parse_key("3").unwrap(), PathKey::Index(3));
        assert_eq!(parse_key("-1").unwrap(), PathKey::Index(-1));
        assert!(matches!(parse_key("last"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_key("-"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_key("12a"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn integers_beyond_i64_are_out_of_range() {
        assert!(matches!(
            parse_key("99999999999999999999").unwrap(),
            PathKey::OutOfRange(Value::Number(_))
        ));
        assert!(matches!(
            parse_key("-99999999999999999999").unwrap(),
            PathKey::OutOfRange(Value::Number(_))
        ));
        assert!(matches!(
            parse_key("+99999999999999999999").unwrap(),
            PathKey::OutOfRange(Value::Number(_))
        ));
    }

    #[test]
    fn not_found_renders_sentinel() {
        assert_eq!(
            lookup_body(json!(5), Lookup::NotFound),
            json!({"status": "no_data", "key": 5})
        );
        assert_eq!(
            lookup_body(Value::Null, Lookup::NotFound),
            json!({"status": "no_data", "key": null})
        );
    }
}
