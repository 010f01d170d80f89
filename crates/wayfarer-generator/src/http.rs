//! Generator backed by a remote generator service.
//!
//! The shared [`HttpClient`] is built once and reused for every call, with a
//! connect timeout, a per-request timeout and bounded retries.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use wayfarer_store::model::invalid_line_message;
use wayfarer_store::{Entry, ItineraryRecord, Key, TripRequest};

use crate::{GenerationError, Generator, error_record};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Retries for 5xx responses and network failures; 4xx is never retried
const MAX_RETRIES: u32 = 2;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Arc<Client>,
    backoff: Duration,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns [`GenerationError::Transport`] if the client cannot be built.
    pub fn new() -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| GenerationError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client: Arc::new(client),
            backoff: INITIAL_BACKOFF,
        })
    }

    /// Base delay between retries; attempt `n` waits `n * backoff`.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Send `request` with a timeout, retrying 5xx and network failures.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::Rejected`] for any 4xx, with the body's `error` text
    /// - [`GenerationError::Timeout`] when the request times out
    /// - [`GenerationError::Transport`] for 5xx or network failures after retries
    pub async fn execute_with_retry(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<Response, GenerationError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let built = request
                .try_clone()
                .ok_or_else(|| GenerationError::Transport("Request body cannot be retried".into()))?
                .timeout(timeout)
                .build()
                .map_err(|e| GenerationError::Transport(format!("Failed to build request: {e}")))?;
            let target = built.url().path().to_string();
            debug!(attempt, path = %target, timeout_secs = timeout.as_secs(), "Calling generator service");

            let failure = match self.client.execute(built).await {
                Ok(response) if response.status().is_client_error() => {
                    return Err(rejected(response).await);
                }
                Ok(response) if response.status().is_server_error() => {
                    format!("generator service returned {}", response.status())
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() => {
                    return Err(GenerationError::Timeout {
                        seconds: timeout.as_secs(),
                    });
                }
                Err(e) => format!("request to {target} failed: {e}"),
            };

            if attempt > MAX_RETRIES {
                return Err(GenerationError::Transport(failure));
            }
            warn!(attempt, error = %failure, "Generator service call failed, will retry");
            tokio::time::sleep(self.backoff * attempt).await;
        }
    }
}

async fn rejected(response: Response) -> GenerationError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("client error").to_string()
            } else {
                body.trim().to_string()
            }
        });
    GenerationError::Rejected {
        status: status.as_u16(),
        message,
    }
}

/// Generator service client.
///
/// Each valid request is submitted with `POST /submit_trip_data` and its
/// itinerary fetched with `GET /generate_itinerary/{key}`. A request the
/// service rejects (4xx) becomes an error record so keys stay aligned.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    base_url: Url,
    client: HttpClient,
    timeout: Duration,
}

impl HttpGenerator {
    /// # Errors
    ///
    /// [`GenerationError::Transport`] for an unusable base URL or client.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GenerationError> {
        Self::with_client(base_url, HttpClient::new()?, timeout)
    }

    /// # Errors
    ///
    /// [`GenerationError::Transport`] for an unusable base URL.
    pub fn with_client(
        base_url: &str,
        client: HttpClient,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| GenerationError::Transport(format!("Invalid generator URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GenerationError::Transport(format!(
                "Invalid generator URL '{base_url}'"
            )));
        }
        Ok(Self {
            base_url,
            client,
            timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GenerationError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GenerationError::Transport(format!("Invalid generator URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_json(&self, segments: &[&str], body: &Value) -> Result<Value, GenerationError> {
        let request = self.client.inner().post(self.endpoint(segments)?).json(body);
        let response = self.client.execute_with_retry(request, self.timeout).await?;
        decode(response).await
    }

    async fn get_json(&self, segments: &[&str]) -> Result<Value, GenerationError> {
        let request = self.client.inner().get(self.endpoint(segments)?);
        let response = self.client.execute_with_retry(request, self.timeout).await?;
        decode(response).await
    }

    async fn generate(&self, key: Key, request: &TripRequest) -> Result<ItineraryRecord, GenerationError> {
        let submitted = self
            .post_json(&["submit_trip_data"], &Value::Object(request.clone()))
            .await?;
        let service_key = match submitted.get("key") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(GenerationError::MalformedOutput {
                    line: key + 1,
                    reason: "submit response has no key".into(),
                });
            }
        };
        debug!(key, service_key = %service_key, "Trip submitted to generator service");

        match self.get_json(&["generate_itinerary", &service_key]).await? {
            Value::Object(record) => Ok(record),
            other => Err(GenerationError::MalformedOutput {
                line: key + 1,
                reason: format!("expected a JSON object, found {other}"),
            }),
        }
    }
}

async fn decode(response: Response) -> Result<Value, GenerationError> {
    let status = response.status();
    response.json::<Value>().await.map_err(|e| {
        GenerationError::Transport(format!("Undecodable generator response ({status}): {e}"))
    })
}

#[async_trait]
impl Generator for HttpGenerator {
    fn name(&self) -> &str {
        "http"
    }

    async fn produce(
        &self,
        requests: &[Entry<TripRequest>],
    ) -> Result<Vec<ItineraryRecord>, GenerationError> {
        let mut records = Vec::with_capacity(requests.len());
        for entry in requests {
            let record = match entry {
                Entry::Malformed { key, line, .. } => error_record(*key, invalid_line_message(*line)),
                Entry::Valid { key, value } => match self.generate(*key, value).await {
                    Ok(record) => record,
                    Err(GenerationError::Rejected { status, message }) => {
                        warn!(key, status, %message, "Generator service rejected trip");
                        error_record(*key, message)
                    }
                    Err(e) => return Err(e),
                },
            };
            records.push(record);
        }
        Ok(records)
    }

    async fn refine(
        &self,
        key: Key,
        record: &ItineraryRecord,
        message: &str,
    ) -> Result<ItineraryRecord, GenerationError> {
        let body = json!({
            "itinerary": record,
            "message": message,
            "key": key,
        });
        match self.post_json(&["refine_itinerary"], &body).await? {
            Value::Object(record) => Ok(record),
            other => Err(GenerationError::MalformedOutput {
                line: key + 1,
                reason: format!("expected a JSON object, found {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Fake {
        hits: Arc<AtomicUsize>,
        failures_before_success: usize,
    }

    async fn submit(State(fake): State<Fake>, Json(body): Json<Value>) -> (AxumStatus, Json<Value>) {
        let n = fake.hits.fetch_add(1, Ordering::SeqCst);
        if n < fake.failures_before_success {
            return (AxumStatus::SERVICE_UNAVAILABLE, Json(json!({"error": "warming up"})));
        }
        match body.get("to").and_then(Value::as_str) {
            Some(to) => (
                AxumStatus::OK,
                Json(json!({"message": "Data received", "key": format!("{to}-2025-06-01")})),
            ),
            None => (
                AxumStatus::BAD_REQUEST,
                Json(json!({"error": "Missing required fields: to"})),
            ),
        }
    }

    async fn generate(Path(key): Path<String>) -> Json<Value> {
        Json(json!({"Flights": format!("to {key}"), "Hotels": "somewhere"}))
    }

    async fn refine(Json(body): Json<Value>) -> Json<Value> {
        let mut itinerary = body["itinerary"].clone();
        itinerary["note"] = body["message"].clone();
        Json(itinerary)
    }

    async fn serve(fake: Fake) -> String {
        let app = Router::new()
            .route("/submit_trip_data", post(submit))
            .route("/generate_itinerary/:key", get(generate))
            .route("/refine_itinerary", post(refine))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn generator(base: &str) -> HttpGenerator {
        let client = HttpClient::new().unwrap().with_backoff(Duration::from_millis(10));
        HttpGenerator::with_client(base, client, Duration::from_secs(5)).unwrap()
    }

    fn trip(value: Value) -> Entry<TripRequest> {
        match value {
            Value::Object(map) => Entry::Valid { key: 0, value: map },
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn submits_then_fetches_each_request() {
        let base = serve(Fake::default()).await;
        let mut entries = vec![trip(json!({"to": "New York"}))];
        entries.push(Entry::Malformed {
            key: 1,
            line: 2,
            raw: "nope".into(),
            reason: "expected value".into(),
        });
        if let Entry::Valid { value, .. } = trip(json!({})) {
            entries.push(Entry::Valid { key: 2, value });
        }

        let records = generator(&base).produce(&entries).await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["Flights"], json!("to New York-2025-06-01"));
        assert_eq!(records[1]["error"], json!("Invalid JSON on line 2"));
        assert_eq!(records[2]["error"], json!("Missing required fields: to"));
        assert_eq!(records[2]["key"], json!(2));
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let fake = Fake {
            hits: Arc::default(),
            failures_before_success: 2,
        };
        let hits = Arc::clone(&fake.hits);
        let base = serve(fake).await;

        let records = generator(&base)
            .produce(&[trip(json!({"to": "Rome"}))])
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn persistent_server_errors_fail_the_run() {
        let fake = Fake {
            hits: Arc::default(),
            failures_before_success: usize::MAX,
        };
        let base = serve(fake).await;

        let err = generator(&base)
            .produce(&[trip(json!({"to": "Rome"}))])
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Transport(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = generator(&format!("http://{addr}"))
            .produce(&[trip(json!({"to": "Rome"}))])
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Transport(_)));
    }

    #[tokio::test]
    async fn refine_posts_itinerary_and_message() {
        let base = serve(Fake::default()).await;
        let mut record = ItineraryRecord::new();
        record.insert("Flights".into(), json!("x"));

        let refined = generator(&base).refine(0, &record, "aisle seat").await.unwrap();

        assert_eq!(refined["note"], json!("aisle seat"));
        assert_eq!(refined["Flights"], json!("x"));
    }

    #[test]
    fn endpoint_keeps_base_path_and_escapes_key() {
        let g = generator("http://localhost:5001/api/");
        let url = g.endpoint(&["generate_itinerary", "New York-2025-06-01"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5001/api/generate_itinerary/New%20York-2025-06-01"
        );
    }
}
