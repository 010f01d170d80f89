//! Deterministic built-in generator.
//!
//! Output depends only on the trip fields, so two runs over the same log are
//! byte-identical. Good enough for demos, tests and the generator service.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::fmt::Write as _;
use wayfarer_store::model::invalid_line_message;
use wayfarer_store::{Entry, ItineraryRecord, Key, TripFields, TripRequest};

use crate::{GenerationError, Generator, error_record};

const CARRIERS: [&str; 6] = ["TP", "WS", "B6", "BA", "AF", "LH"];
const HUBS: [&str; 5] = ["LIS", "YYC", "BOS", "KEF", "FRA"];
const HOTELS: [&str; 6] = [
    "HOTEL BOHEME",
    "SIR FRANCIS DRAKE",
    "THAMES RIVIERA HOTEL",
    "PREMIER INN AIRPORT",
    "MANOR HOUSE HOTEL",
    "HARBOUR VIEW SUITES",
];
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceGenerator;

impl ReferenceGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Itinerary for one trip request.
    #[must_use]
    pub fn itinerary(&self, request: &TripRequest) -> ItineraryRecord {
        let fields = TripFields::from_request(request);
        let mut seed = Seed::of(&fields);

        let mut record = ItineraryRecord::new();
        record.insert("Flights".into(), Value::String(flights(&fields, &mut seed)));
        record.insert("Hotels".into(), Value::String(hotel(&mut seed)));
        record.insert("from".into(), echo(fields.from.as_deref()));
        record.insert("to".into(), echo(fields.to.as_deref()));
        record.insert(
            "dates".into(),
            Value::String(format!(
                "{} to {}",
                or_unknown(fields.start_date.as_deref()),
                or_unknown(fields.end_date.as_deref())
            )),
        );
        record.insert("people".into(), echo(fields.people.as_deref()));
        record.insert("additionalInfo".into(), echo(fields.additional_info.as_deref()));
        record
    }

    /// `record` with `message` appended to its `refinements` list.
    #[must_use]
    pub fn refined(&self, record: &ItineraryRecord, message: &str) -> ItineraryRecord {
        let mut record = record.clone();
        match record.get_mut("refinements") {
            Some(Value::Array(list)) => list.push(Value::String(message.to_string())),
            _ => {
                record.insert("refinements".into(), json!([message]));
            }
        }
        record
    }
}

#[async_trait]
impl Generator for ReferenceGenerator {
    fn name(&self) -> &str {
        "reference"
    }

    async fn produce(
        &self,
        requests: &[Entry<TripRequest>],
    ) -> Result<Vec<ItineraryRecord>, GenerationError> {
        Ok(requests
            .iter()
            .map(|entry| match entry {
                Entry::Valid { value, .. } => self.itinerary(value),
                Entry::Malformed { key, line, .. } => {
                    error_record(*key, invalid_line_message(*line))
                }
            })
            .collect())
    }

    async fn refine(
        &self,
        _key: Key,
        record: &ItineraryRecord,
        message: &str,
    ) -> Result<ItineraryRecord, GenerationError> {
        Ok(self.refined(record, message))
    }
}

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(UNKNOWN)
}

fn echo(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |v| Value::String(v.to_string()))
}

/// Airport-ish code: first three letters, upper-cased.
fn code(place: Option<&str>) -> String {
    let letters: String = or_unknown(place)
        .chars()
        .filter(char::is_ascii_alphabetic)
        .take(3)
        .collect::<String>()
        .to_ascii_uppercase();
    if letters.is_empty() { "XXX".into() } else { letters }
}

fn flights(fields: &TripFields, seed: &mut Seed) -> String {
    let origin = code(fields.from.as_deref());
    let destination = code(fields.to.as_deref());
    let depart = or_unknown(fields.start_date.as_deref());
    let hub = HUBS[seed.below(HUBS.len())];
    let carrier = CARRIERS[seed.below(CARRIERS.len())];
    let cents = 30_000 + seed.below(60_000);
    let first_leg = 6 + seed.below(10);
    let second_leg = (first_leg + 4 + seed.below(6)) % 24;

    let mut out = format!(
        "Depart from {origin} to {destination} on {depart}:\nPrice: ${}.{:02}\nSegments:",
        cents / 100,
        cents % 100
    );
    let _ = write!(
        out,
        "\n  - Flight {carrier}{}: {origin} at {depart}T{first_leg:02}:20:00 -> {hub}",
        100 + seed.below(900)
    );
    let _ = write!(
        out,
        "\n  - Flight {carrier}{}: {hub} at {depart}T{second_leg:02}:05:00 -> {destination}",
        100 + seed.below(900)
    );
    out
}

fn hotel(seed: &mut Seed) -> String {
    let name = HOTELS[seed.below(HOTELS.len())];
    let price = 120 + seed.below(200);
    let distance = seed.below(3000) as f64 / 100.0;
    format!("\nName: {name}\nPrice per night: ${price}\nDistance from airport: {distance:.2} km")
}

/// FNV-1a over the trip fields, then a xorshift stream.
struct Seed(u64);

impl Seed {
    fn of(fields: &TripFields) -> Self {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for part in [
            &fields.from,
            &fields.to,
            &fields.start_date,
            &fields.end_date,
            &fields.people,
        ] {
            for byte in part.as_deref().unwrap_or("").bytes().chain([0x1f]) {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
        }
        Self(hash | 1)
    }

    fn below(&mut self, bound: usize) -> usize {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 % bound as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> TripRequest {
        match json!({
            "from": "NYC",
            "to": "Paris",
            "start_date": "2025-06-01",
            "end_date": "2025-06-10",
            "people": "2",
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn itinerary_echoes_trip_fields() {
        let record = ReferenceGenerator.itinerary(&paris());

        assert_eq!(record["to"], json!("Paris"));
        assert_eq!(record["dates"], json!("2025-06-01 to 2025-06-10"));
        assert_eq!(record["additionalInfo"], Value::Null);
        let flights = record["Flights"].as_str().unwrap();
        assert!(flights.starts_with("Depart from NYC to PAR on 2025-06-01:\nPrice: $"));
        assert!(flights.contains("\nSegments:\n  - Flight "));
        let hotels = record["Hotels"].as_str().unwrap();
        assert!(hotels.starts_with("\nName: "));
        assert!(hotels.ends_with(" km"));
    }

    #[test]
    fn output_is_deterministic() {
        let a = ReferenceGenerator.itinerary(&paris());
        let b = ReferenceGenerator.itinerary(&paris());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[tokio::test]
    async fn malformed_entry_becomes_error_record() {
        let entries = vec![
            Entry::Valid { key: 0, value: paris() },
            Entry::Malformed {
                key: 1,
                line: 2,
                raw: "oops".into(),
                reason: "expected value".into(),
            },
        ];

        let records = ReferenceGenerator.produce(&entries).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            Value::Object(records[1].clone()),
            json!({"error": "Invalid JSON on line 2", "key": 1})
        );
    }

    #[tokio::test]
    async fn refine_appends_to_refinements() {
        let record = ReferenceGenerator.itinerary(&paris());
        let once = ReferenceGenerator.refine(0, &record, "more museums").await.unwrap();
        let twice = ReferenceGenerator.refine(0, &once, "fewer flights").await.unwrap();

        assert_eq!(twice["refinements"], json!(["more museums", "fewer flights"]));
        assert_eq!(twice["Flights"], record["Flights"]);
    }
}
