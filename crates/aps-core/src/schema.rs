//! JSON Schema for plan documents
//!
//! The schema is derived from the Rust types with schemars (draft 7, all
//! subschemas inlined, optional fields without `null`) and compiled once.

use crate::plan::Plan;
use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use schemars::gen::SchemaSettings;
use serde_json::Value;

static COMPILED: Lazy<Result<JSONSchema, String>> = Lazy::new(|| {
    let schema = plan_json_schema().map_err(|e| e.to_string())?;
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|e| e.to_string())
});

/// The plan JSON Schema as a value
///
/// # Errors
/// Returns error if the generated schema cannot be converted to JSON
pub fn plan_json_schema() -> Result<Value, serde_json::Error> {
    let settings = SchemaSettings::draft07().with(|s| {
        s.option_nullable = false;
        s.option_add_null_type = false;
        s.inline_subschemas = true;
    });
    let root = settings.into_generator().into_root_schema_for::<Plan>();
    serde_json::to_value(root)
}

/// The compiled validator, built on first use
///
/// # Errors
/// Returns the compilation message if the schema failed to compile
pub(crate) fn compiled_schema() -> Result<&'static JSONSchema, &'static str> {
    COMPILED.as_ref().map_err(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_is_closed_at_top_level() {
        let schema = plan_json_schema().unwrap();
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["properties"]["schema_version"]["const"], json!("1.0"));
    }

    #[test]
    fn schema_lists_required_fields() {
        let schema = plan_json_schema().unwrap();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        for field in ["id", "schema_version", "hash", "intent", "proposed_changes", "provenance"] {
            assert!(required.contains(&field), "{field} should be required");
        }
        assert!(!required.contains(&"evidence"));
    }

    #[test]
    fn schema_inlines_subschemas() {
        let schema = plan_json_schema().unwrap();
        let text = schema.to_string();
        assert!(!text.contains("$ref"));
    }

    #[test]
    fn schema_compiles() {
        assert!(compiled_schema().is_ok());
    }
}
