use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Zero-based position of a record in its store
pub type Key = usize;

/// A submitted trip request: any JSON object
pub type TripRequest = Map<String, Value>;

/// A generated itinerary: any JSON object, conventionally with `Flights` and `Hotels`
pub type ItineraryRecord = Map<String, Value>;

/// One stored line as read back from disk.
///
/// Serialises the way clients have always seen it: a valid entry is the bare
/// object, a malformed one is `{"error": "Invalid JSON on line N", "raw": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry<T> {
    Valid {
        key: Key,
        value: T,
    },
    Malformed {
        key: Key,
        /// 1-based record position (`key + 1`)
        line: usize,
        raw: String,
        reason: String,
    },
}

impl<T> Entry<T> {
    #[must_use]
    pub fn key(&self) -> Key {
        match self {
            Self::Valid { key, .. } | Self::Malformed { key, .. } => *key,
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Valid { value, .. } => Some(value),
            Self::Malformed { .. } => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Valid { value, .. } => Some(value),
            Self::Malformed { .. } => None,
        }
    }

    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Message carried by the malformed-line placeholder
#[must_use]
pub fn invalid_line_message(line: usize) -> String {
    format!("Invalid JSON on line {line}")
}

impl<T: Serialize> Serialize for Entry<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valid { value, .. } => value.serialize(serializer),
            Self::Malformed { line, raw, .. } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("error", &invalid_line_message(*line))?;
                map.serialize_entry("raw", raw)?;
                map.end()
            }
        }
    }
}

/// Result of a keyed read. Absence is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Malformed {
        key: Key,
        line: usize,
        raw: String,
        reason: String,
    },
}

impl<T> Lookup<T> {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    #[must_use]
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Option<Entry<T>>> for Lookup<T> {
    fn from(entry: Option<Entry<T>>) -> Self {
        match entry {
            Some(Entry::Valid { value, .. }) => Self::Found(value),
            Some(Entry::Malformed {
                key,
                line,
                raw,
                reason,
            }) => Self::Malformed {
                key,
                line,
                raw,
                reason,
            },
            None => Self::NotFound,
        }
    }
}

/// How far the itinerary store lags the request log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub requests: usize,
    pub itineraries: usize,
    pub pending: usize,
}

impl StoreStatus {
    #[must_use]
    pub fn new(requests: usize, itineraries: usize) -> Self {
        Self {
            requests,
            itineraries,
            pending: requests.saturating_sub(itineraries),
        }
    }
}

/// Typed view of the conventional trip fields.
///
/// Nothing is required here; the generator service decides what it needs.
/// Non-string scalars (`"people": 2`) are rendered as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripFields {
    pub from: Option<String>,
    pub to: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub people: Option<String>,
    #[serde(rename = "additionalInfo")]
    pub additional_info: Option<String>,
}

/// Field names the generator service insists on, in wire spelling
pub const REQUIRED_TRIP_FIELDS: [&str; 6] = [
    "start_date",
    "end_date",
    "from",
    "to",
    "additionalInfo",
    "people",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

fn scalar(map: &Map<String, Value>, name: &str) -> Option<String> {
    match map.get(name)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

impl TripFields {
    #[must_use]
    pub fn from_request(request: &TripRequest) -> Self {
        Self {
            from: scalar(request, "from"),
            to: scalar(request, "to"),
            start_date: scalar(request, "start_date"),
            end_date: scalar(request, "end_date"),
            people: scalar(request, "people"),
            additional_info: scalar(request, "additionalInfo"),
        }
    }

    /// Required fields that are absent or blank. `additionalInfo` may be
    /// blank but must be present.
    #[must_use]
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_TRIP_FIELDS
            .into_iter()
            .filter(|name| {
                let value = match *name {
                    "start_date" => &self.start_date,
                    "end_date" => &self.end_date,
                    "from" => &self.from,
                    "to" => &self.to,
                    "additionalInfo" => return self.additional_info.is_none(),
                    _ => &self.people,
                };
                value.as_deref().is_none_or(|v| v.trim().is_empty())
            })
            .collect()
    }

    /// Parse both dates as `YYYY-MM-DD`; the end may not precede the start.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason for the first problem found.
    pub fn dates(&self) -> Result<(NaiveDate, NaiveDate), String> {
        let parse = |name: &str, value: &Option<String>| {
            let raw = value.as_deref().ok_or_else(|| format!("{name} is missing"))?;
            NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
                .map_err(|_| format!("{name} '{raw}' is not a YYYY-MM-DD date"))
        };
        let start = parse("start_date", &self.start_date)?;
        let end = parse("end_date", &self.end_date)?;
        if end < start {
            return Err(format!("end_date {end} is before start_date {start}"));
        }
        Ok((start, end))
    }
}
