//! Turns raw protocol content blocks into a flat list of untyped result records.
//!
//! Providers disagree on the payload shape: some return a bare JSON array, some wrap it
//! (`{"items": [...]}`, `{"results": [...]}`, `{"data": [...]}`), and some JSON-encode the
//! whole payload a second time. Anything that does not decode degrades to "no records"
//! instead of an error.

use serde_json::Value;

/// A JSON string nested inside a JSON string is tolerated; deeper nesting is not.
const MAX_DECODE_ROUNDS: usize = 2;

/// Wrapper keys probed (in order) when a payload decodes to an object.
const LIST_KEYS: [&str; 3] = ["items", "results", "data"];

/// Collect records from every `{"type":"text","text":...}` block, in block order.
pub fn extract_records(blocks: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for block in blocks {
        let Some(text) = block_text(block) else {
            continue;
        };
        if let Some(decoded) = decode_payload(text) {
            out.extend(records_of(decoded));
        }
    }
    out
}

fn block_text(block: &Value) -> Option<&str> {
    let obj = block.as_object()?;
    if obj.get("type").and_then(Value::as_str) != Some("text") {
        return None;
    }
    obj.get("text").and_then(Value::as_str)
}

fn decode_payload(text: &str) -> Option<Value> {
    let mut value: Value = serde_json::from_str(text).ok()?;
    for _ in 1..MAX_DECODE_ROUNDS {
        let Value::String(inner) = &value else {
            break;
        };
        match serde_json::from_str(inner) {
            Ok(v) => value = v,
            // Keep the string; it contributes nothing below.
            Err(_) => break,
        }
    }
    Some(value)
}

fn records_of(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            let Some(key) = LIST_KEYS
                .iter()
                .find(|k| matches!(obj.get(**k), Some(Value::Array(_))))
            else {
                return Vec::new();
            };
            match obj.remove(*key) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn text_block(text: &str) -> Value {
        json!({ "type": "text", "text": text })
    }

    #[test]
    fn bare_array_is_flattened() {
        let blocks = vec![text_block(r#"[{"url":"a"},{"url":"b"}]"#)];
        let out = extract_records(&blocks);
        assert_eq!(out, vec![json!({"url":"a"}), json!({"url":"b"})]);
    }

    #[test]
    fn double_encoded_payload_matches_single_encoding() {
        let inner = serde_json::to_string(&json!([{"url":"a"}])).unwrap();
        let once = inner.clone();
        let twice = serde_json::to_string(&Value::String(inner)).unwrap();

        let a = extract_records(&[text_block(&once)]);
        let b = extract_records(&[text_block(&twice)]);
        assert_eq!(a, b);
        assert_eq!(a, vec![json!({"url":"a"})]);
    }

    #[test]
    fn triple_encoded_payload_yields_nothing() {
        let l1 = serde_json::to_string(&json!([{"url":"a"}])).unwrap();
        let l2 = serde_json::to_string(&Value::String(l1)).unwrap();
        let l3 = serde_json::to_string(&Value::String(l2)).unwrap();
        assert!(extract_records(&[text_block(&l3)]).is_empty());
    }

    #[test]
    fn wrapper_keys_are_probed_in_priority_order() {
        let blocks = vec![text_block(
            r#"{"data":[{"url":"d"}],"results":[{"url":"r"}],"items":[{"url":"i"}]}"#,
        )];
        assert_eq!(extract_records(&blocks), vec![json!({"url":"i"})]);

        let blocks = vec![text_block(r#"{"data":[{"url":"d"}],"results":[{"url":"r"}]}"#)];
        assert_eq!(extract_records(&blocks), vec![json!({"url":"r"})]);

        let blocks = vec![text_block(r#"{"data":[{"url":"d"}]}"#)];
        assert_eq!(extract_records(&blocks), vec![json!({"url":"d"})]);
    }

    #[test]
    fn object_without_known_list_contributes_nothing() {
        let blocks = vec![text_block(r#"{"answer":"42","items":"not a list"}"#)];
        assert!(extract_records(&blocks).is_empty());
    }

    #[test]
    fn non_text_blocks_and_garbage_are_ignored() {
        let blocks = vec![
            json!({ "type": "image", "data": "...", "mimeType": "image/png" }),
            json!({ "type": "text", "text": 42 }),
            text_block("not json at all"),
            text_block(r#""just a string""#),
            json!("bare string block"),
            text_block(r#"[{"url":"ok"}]"#),
        ];
        assert_eq!(extract_records(&blocks), vec![json!({"url":"ok"})]);
    }

    #[test]
    fn records_from_multiple_blocks_keep_block_order() {
        let blocks = vec![
            text_block(r#"[{"url":"1"}]"#),
            text_block(r#"{"results":[{"url":"2"},{"url":"3"}]}"#),
        ];
        let urls: Vec<_> = extract_records(&blocks)
            .into_iter()
            .map(|r| r["url"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(urls, vec!["1", "2", "3"]);
    }

    proptest! {
        #[test]
        fn extraction_is_pure_and_never_panics(texts in prop::collection::vec(any::<String>(), 0..8)) {
            let blocks: Vec<Value> = texts.iter().map(|t| text_block(t)).collect();
            let a = extract_records(&blocks);
            let b = extract_records(&blocks);
            prop_assert_eq!(a, b);
        }
    }
}
