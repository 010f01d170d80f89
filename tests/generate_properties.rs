//! Alignment properties of the `generate` filter.

use proptest::prelude::*;
use serde_json::Value;
use wayfarer::cli::generate_lines;
use wayfarer_store::ndjson;

fn line() -> impl Strategy<Value = String> {
    prop_oneof![
        ("[A-Za-z ]{0,12}", "[A-Za-z]{0,12}")
            .prop_map(|(from, to)| serde_json::json!({"from": from, "to": to}).to_string()),
        "[a-z<>{}\\[\\]:,\"]{1,16}",
        Just(String::new()),
        Just("   ".to_string()),
    ]
}

proptest! {
    #[test]
    fn one_output_line_per_record_line(lines in prop::collection::vec(line(), 0..24)) {
        let input = lines.join("\n");
        let output = generate_lines(&input).unwrap();

        let expected = ndjson::record_lines(&input).len();
        let produced: Vec<Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        prop_assert_eq!(produced.len(), expected);
        for (key, record) in produced.iter().enumerate() {
            prop_assert!(record.is_object());
            if let Some(k) = record.get("key") {
                prop_assert_eq!(k.as_u64(), Some(key as u64));
            }
        }
    }

    #[test]
    fn output_is_deterministic(lines in prop::collection::vec(line(), 0..12)) {
        let input = lines.join("\n");
        prop_assert_eq!(generate_lines(&input).unwrap(), generate_lines(&input).unwrap());
    }
}
