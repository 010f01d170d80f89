use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;
use wayfarer_store::{ItineraryRecord, Key, StoreStatus, TripRequest};

use crate::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitResponse {
    pub message: String,
    pub key: Key,
}

/// A keyed itinerary as the API returns it.
#[derive(Debug, Clone, PartialEq)]
pub enum ItineraryView {
    Record(ItineraryRecord),
    /// Nothing stored at `key` yet; `None` for the last of an empty store
    NoData { key: Option<i64> },
    /// The stored line could not be parsed
    Malformed { error: String, raw: String },
}

impl ItineraryView {
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Self::Malformed {
                error: "Itinerary is not a JSON object".into(),
                raw: value.to_string(),
            };
        };
        if map.get("status").and_then(Value::as_str) == Some("no_data") {
            return Self::NoData {
                key: map.get("key").and_then(Value::as_i64),
            };
        }
        if let (Some(Value::String(error)), Some(Value::String(raw))) = (map.get("error"), map.get("raw")) {
            return Self::Malformed {
                error: error.clone(),
                raw: raw.clone(),
            };
        }
        Self::Record(map)
    }

    #[must_use]
    pub fn record(&self) -> Option<&ItineraryRecord> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }
}

/// Retrieval API client. Every call carries the configured timeout.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
    timeout: Duration,
}

impl ApiClient {
    /// # Errors
    ///
    /// [`ClientError::Transport`] for an unusable URL or HTTP client.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ClientError::Transport(format!("Invalid API URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Transport(format!("Invalid API URL '{base_url}'")));
        }
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url,
            client,
            timeout,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// # Errors
    ///
    /// Any [`ClientError`].
    pub async fn submit(&self, request: &TripRequest) -> Result<SubmitResponse, ClientError> {
        self.call(Method::POST, &["submit"], Some(&Value::Object(request.clone())))
            .await
    }

    /// # Errors
    ///
    /// Any [`ClientError`].
    pub async fn data(&self) -> Result<Vec<Value>, ClientError> {
        self.call(Method::GET, &["data"], None).await
    }

    /// Triggers generation on the server.
    ///
    /// # Errors
    ///
    /// Any [`ClientError`]; a generation failure arrives as `Status { 500 }`.
    pub async fn itinerary_data(&self) -> Result<Vec<Value>, ClientError> {
        self.call(Method::GET, &["itinerary-data"], None).await
    }

    /// # Errors
    ///
    /// Any [`ClientError`].
    pub async fn itinerary(&self, key: i64) -> Result<ItineraryView, ClientError> {
        let value: Value = self
            .call(Method::GET, &["itinerary", &key.to_string()], None)
            .await?;
        Ok(ItineraryView::from_value(value))
    }

    /// # Errors
    ///
    /// Any [`ClientError`].
    pub async fn last(&self) -> Result<ItineraryView, ClientError> {
        let value: Value = self.call(Method::GET, &["itinerary-last"], None).await?;
        Ok(ItineraryView::from_value(value))
    }

    /// # Errors
    ///
    /// Any [`ClientError`].
    pub async fn regenerate(&self, key: i64) -> Result<ItineraryView, ClientError> {
        let value: Value = self
            .call(Method::POST, &["itinerary", &key.to_string(), "regenerate"], None)
            .await?;
        Ok(ItineraryView::from_value(value))
    }

    /// # Errors
    ///
    /// Any [`ClientError`].
    pub async fn refine(&self, key: i64, message: &str) -> Result<ItineraryView, ClientError> {
        let body = json!({ "message": message });
        let value: Value = self
            .call(Method::POST, &["itinerary", &key.to_string(), "refine"], Some(&body))
            .await?;
        Ok(ItineraryView::from_value(value))
    }

    /// # Errors
    ///
    /// Any [`ClientError`].
    pub async fn status(&self) -> Result<StoreStatus, ClientError> {
        self.call(Method::GET, &["status"], None).await
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Transport(format!("Invalid API URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        let url = self.url(segments)?;
        debug!(%method, %url, "Calling wayfarer API");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let secs = self.timeout.as_secs();
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e, secs))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::from_reqwest(&e, secs))
    }
}
