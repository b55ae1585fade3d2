//! Search formatting is total and deterministic

use proptest::prelude::*;
use rulekeeper::search::{format_response, NOTHING_FOUND, RESULTS_ONLY_PREAMBLE};
use serde_json::{json, Value};

fn result() -> impl Strategy<Value = Value> {
    (
        proptest::option::of("[A-Za-z0-9 ]{0,12}"),
        proptest::option::of("(gs|https)://[a-z]{1,6}/[a-z]{1,6}\\.pdf"),
        any::<bool>(),
    )
        .prop_map(|(title, link, proto)| {
            let mut fields = serde_json::Map::new();
            if let Some(title) = title {
                fields.insert("title".into(), json!(title));
            }
            if let Some(link) = link {
                fields.insert("link".into(), json!(link));
            }
            let derived = if proto {
                let wrapped: serde_json::Map<String, Value> = fields
                    .into_iter()
                    .map(|(k, v)| (k, json!({ "stringValue": v })))
                    .collect();
                json!({ "fields": wrapped })
            } else {
                Value::Object(fields)
            };
            json!({ "document": { "derivedStructData": derived } })
        })
}

#[test]
fn test_results_only_renders_one_line_per_result() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&proptest::collection::vec(result(), 0..6), |results| {
            let payload = json!({ "results": results.clone() });
            let text = format_response(&payload);

            prop_assert_eq!(&text, &format_response(&payload));
            if results.is_empty() {
                prop_assert_eq!(text, NOTHING_FOUND);
            } else {
                prop_assert!(text.starts_with(RESULTS_ONLY_PREAMBLE));
                let lines = text.lines().filter(|l| l.starts_with("- <")).count();
                prop_assert_eq!(lines, results.len());
                prop_assert!(!text.contains("gs://"));
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_arbitrary_json_never_panics() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&".{0,40}", |raw| {
            let payload = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
            let text = format_response(&payload);
            prop_assert!(!text.is_empty());
            Ok(())
        })
        .unwrap();
}
