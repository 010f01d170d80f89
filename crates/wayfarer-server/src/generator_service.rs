//! Standalone generator service.
//!
//! Trips are validated, kept in memory under `{to}-{start_date}` and turned
//! into itineraries by the [`ReferenceGenerator`] on demand. This is the
//! service [`HttpGenerator`](wayfarer_generator::HttpGenerator) talks to.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use wayfarer_generator::ReferenceGenerator;
use wayfarer_store::{ItineraryRecord, TripFields, TripRequest};

use crate::ApiError;

pub const ENDPOINTS: [&str; 4] = [
    "/submit_trip_data (POST)",
    "/generate_itinerary/:key (GET)",
    "/refine_itinerary (POST)",
    "/ (GET)",
];

#[derive(Clone, Default)]
pub struct ServiceState {
    trips: Arc<RwLock<HashMap<String, TripRequest>>>,
    generator: ReferenceGenerator,
}

impl ServiceState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn trip_count(&self) -> usize {
        self.trips.read().await.len()
    }
}

pub fn router(state: ServiceState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/submit_trip_data", post(submit_trip_data))
        .route("/generate_itinerary/:key", get(generate_itinerary))
        .route("/refine_itinerary", post(refine_itinerary))
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({
        "status": "wayfarer generator service is running",
        "endpoints": ENDPOINTS,
    }))
}

async fn submit_trip_data(
    State(st): State<ServiceState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let trip = match payload {
        Ok(Json(Value::Object(trip))) => trip,
        Ok(Json(_)) => return Err(ApiError::BadRequest("Trip data must be a JSON object".into())),
        Err(rejection) => return Err(ApiError::BadRequest(rejection.body_text())),
    };

    let fields = TripFields::from_request(&trip);
    let missing = fields.missing_required();
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }
    fields
        .dates()
        .map_err(|reason| ApiError::BadRequest(format!("Invalid dates, use YYYY-MM-DD: {reason}")))?;

    let key = format!(
        "{}-{}",
        fields.to.as_deref().unwrap_or_default().trim(),
        fields.start_date.as_deref().unwrap_or_default().trim()
    );
    st.trips.write().await.insert(key.clone(), trip);
    info!(key = %key, "Stored trip");
    Ok(Json(json!({ "message": "Trip data stored", "key": key })))
}

async fn generate_itinerary(
    State(st): State<ServiceState>,
    Path(key): Path<String>,
) -> Result<Json<ItineraryRecord>, ApiError> {
    let trips = st.trips.read().await;
    let trip = trips
        .get(&key)
        .ok_or_else(|| ApiError::BadRequest("Missing or invalid key".into()))?;
    info!(key = %key, "Generating itinerary");
    Ok(Json(st.generator.itinerary(trip)))
}

#[derive(Debug, Deserialize)]
struct RefineRequest {
    itinerary: ItineraryRecord,
    message: String,
}

async fn refine_itinerary(
    State(st): State<ServiceState>,
    payload: Result<Json<RefineRequest>, JsonRejection>,
) -> Result<Json<ItineraryRecord>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(st.generator.refined(&request.itinerary, &request.message)))
}
