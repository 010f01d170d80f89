//! Truncated previews of itinerary records.

use serde_json::Value;
use std::fmt;
use wayfarer_store::ItineraryRecord;

use crate::ItineraryView;

pub const PREVIEW_FIELDS: usize = 4;
pub const PREVIEW_CHARS: usize = 40;

/// First [`PREVIEW_FIELDS`] fields of one itinerary, values cut to
/// [`PREVIEW_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub key: i64,
    pub body: PreviewBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewBody {
    Fields(Vec<(String, String)>),
    NoData,
    Unreadable(String),
}

impl Preview {
    #[must_use]
    pub fn from_view(key: i64, view: &ItineraryView) -> Self {
        let body = match view {
            ItineraryView::Record(record) => PreviewBody::Fields(preview_fields(record)),
            ItineraryView::NoData { .. } => PreviewBody::NoData,
            ItineraryView::Malformed { error, .. } => PreviewBody::Unreadable(error.clone()),
        };
        Self { key, body }
    }
}

/// Objects and arrays are JSON-encoded before truncation; strings are used as is.
#[must_use]
pub fn preview_fields(record: &ItineraryRecord) -> Vec<(String, String)> {
    record
        .iter()
        .take(PREVIEW_FIELDS)
        .map(|(name, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), truncate(&text))
        })
        .collect()
}

#[must_use]
pub fn truncate(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.key)?;
        match &self.body {
            PreviewBody::Fields(fields) => {
                for (name, value) in fields {
                    // Keep multi-line values on one line
                    writeln!(f, "  {name}: {}", value.replace('\n', " "))?;
                }
                Ok(())
            }
            PreviewBody::NoData => writeln!(f, "  (no itinerary yet)"),
            PreviewBody::Unreadable(error) => writeln!(f, "  (unreadable: {error})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> ItineraryRecord {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn long_values_are_cut_at_forty_chars() {
        let long = "x".repeat(41);
        assert_eq!(truncate(&long), format!("{}...", "x".repeat(40)));
        assert_eq!(truncate(&"y".repeat(40)), "y".repeat(40));
        assert_eq!(truncate(&"é".repeat(45)), format!("{}...", "é".repeat(40)));
    }

    #[test]
    fn only_first_four_fields_are_shown() {
        let fields = preview_fields(&record(json!({
            "a": 1, "b": {"nested": true}, "c": "three", "d": null, "e": "hidden"
        })));

        assert_eq!(
            fields,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "{\"nested\":true}".to_string()),
                ("c".to_string(), "three".to_string()),
                ("d".to_string(), "null".to_string()),
            ]
        );
    }

    #[test]
    fn sentinel_renders_as_no_data() {
        let preview = Preview::from_view(2, &ItineraryView::NoData { key: Some(2) });
        assert_eq!(preview.to_string(), "[2]\n  (no itinerary yet)\n");
    }
}
