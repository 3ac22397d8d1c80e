//! Canonical JSON serialization
//!
//! Produces a byte-stable rendering of any JSON value:
//! - object keys sorted at every level (UTF-16 code unit order)
//! - array order preserved
//! - integral floats in the safe-integer range rendered as integers
//! - every control and non-ASCII character escaped as `\uXXXX`
//! - no insignificant whitespace
//!
//! Equal values always canonicalize to identical strings, regardless of how
//! their maps were built.

use crate::hash::HashError;
use serde::Serialize;
use serde_json::{Number, Value};

/// Largest integer an IEEE-754 double represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Canonicalize a JSON value into its stable string form
///
/// The input is only borrowed; a fresh string is returned.
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Canonicalize any serializable value
///
/// # Errors
/// Returns error if the value cannot be represented as JSON
pub fn canonicalize_serializable<T>(value: &T) -> Result<String, HashError>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(value)?;
    Ok(canonicalize(&value))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key.as_str()]);
            }
            out.push('}');
        }
    }
}

fn write_number(out: &mut String, n: &Number) {
    if n.is_i64() || n.is_u64() {
        out.push_str(&n.to_string());
        return;
    }

    match n.as_f64() {
        #[allow(clippy::cast_possible_truncation)]
        Some(f) if f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER => {
            out.push_str(&(f as i64).to_string());
        }
        _ => out.push_str(&n.to_string()),
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if !(' '..='~').contains(&c) => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_at_every_level() {
        let value = json!({"b": 1, "a": {"d": true, "c": null}});
        assert_eq!(canonicalize(&value), r#"{"a":{"c":null,"d":true},"b":1}"#);
    }

    #[test]
    fn preserves_array_order() {
        let value = json!([3, 1, {"z": 0, "y": [2, 1]}]);
        assert_eq!(canonicalize(&value), r#"[3,1,{"y":[2,1],"z":0}]"#);
    }

    #[test]
    fn empty_collections_differ_from_absent_fields() {
        let absent = json!({"id": "x"});
        let empty_list = json!({"id": "x", "tags": []});
        let empty_map = json!({"id": "x", "tags": {}});
        let null = json!({"id": "x", "tags": null});

        let rendered = [
            canonicalize(&absent),
            canonicalize(&empty_list),
            canonicalize(&empty_map),
            canonicalize(&null),
        ];
        for i in 0..rendered.len() {
            for j in (i + 1)..rendered.len() {
                assert_ne!(rendered[i], rendered[j]);
            }
        }
    }

    #[test]
    fn escapes_control_and_non_ascii() {
        let value = json!("tab\there \u{1} é 😀 \"q\" \\");
        assert_eq!(
            canonicalize(&value),
            r#""tab\there \u0001 \u00e9 \ud83d\ude00 \"q\" \\""#
        );
    }

    #[test]
    fn integral_floats_render_as_integers() {
        let value = json!({"a": 1.0, "b": 2.5, "c": -3});
        assert_eq!(canonicalize(&value), r#"{"a":1,"b":2.5,"c":-3}"#);
    }

    #[test]
    fn canonicalize_serializable_matches_value_form() {
        #[derive(Serialize)]
        struct Sample {
            zeta: u32,
            alpha: &'static str,
        }

        let rendered = canonicalize_serializable(&Sample { zeta: 7, alpha: "x" }).unwrap();
        assert_eq!(rendered, r#"{"alpha":"x","zeta":7}"#);
    }

    #[test]
    fn canonicalize_does_not_mutate_input() {
        let value = json!({"b": [1, 2], "a": "x"});
        let before = value.clone();
        let _ = canonicalize(&value);
        assert_eq!(value, before);
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z\u{e9}\u{1F600} ]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec(("[a-z]{1,4}", inner), 0..4)
                    .prop_map(|entries| Value::Object(entries.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn canonical_form_is_insertion_order_invariant(
            entries in prop::collection::vec(("[a-z]{1,6}", arb_json()), 0..6)
        ) {
            let forward: serde_json::Map<String, Value> = entries.iter().cloned().collect();
            let reversed: serde_json::Map<String, Value> = entries
                .iter()
                .rev()
                .cloned()
                .collect();

            // Duplicate keys resolve differently by insertion order; compare the
            // maps as built, which hold identical content when keys are unique.
            prop_assume!(forward == reversed);
            prop_assert_eq!(
                canonicalize(&Value::Object(forward)),
                canonicalize(&Value::Object(reversed))
            );
        }

        #[test]
        fn canonical_form_is_repeatable(value in arb_json()) {
            prop_assert_eq!(canonicalize(&value), canonicalize(&value));
        }

        #[test]
        fn canonical_form_is_ascii_and_parses_back(value in arb_json()) {
            let rendered = canonicalize(&value);
            prop_assert!(rendered.is_ascii());
            let parsed: Value = serde_json::from_str(&rendered).unwrap();
            prop_assert_eq!(parsed, value);
        }
    }
}
