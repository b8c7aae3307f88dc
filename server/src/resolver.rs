//! Country-aware resolution of configuration values for JSON consumers.

use serde_json::{Map, Value};
use shared_types::ConfigurationRecord;

/// Decodes strings that look like embedded JSON objects or arrays.
///
/// Anything that fails to parse comes back unchanged.
pub fn parse_embedded(value: &Value) -> Value {
    match value {
        Value::String(raw) if raw.starts_with('{') || raw.starts_with('[') => {
            serde_json::from_str(raw).unwrap_or_else(|_| value.clone())
        }
        other => other.clone(),
    }
}

/// The value a consumer in `country` should see for `record`
pub fn resolve(record: &ConfigurationRecord, country: Option<&str>) -> Value {
    let overridden = country.and_then(|country| record.country_overrides.get(country));
    parse_embedded(overridden.unwrap_or(&record.content))
}

/// Name -> resolved value for every record
pub fn resolve_all<'a>(
    records: impl IntoIterator<Item = &'a ConfigurationRecord>,
    country: Option<&str>,
) -> Map<String, Value> {
    records
        .into_iter()
        .map(|record| (record.id.clone(), resolve(record, country)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, content: Value, overrides: &[(&str, Value)]) -> ConfigurationRecord {
        let mut record = ConfigurationRecord::new(id);
        record.content = content;
        record.country_overrides = overrides
            .iter()
            .map(|(country, value)| ((*country).to_string(), value.clone()))
            .collect();
        record
    }

    #[test]
    fn test_plain_string_override() {
        let config = record("config1", json!("value1"), &[("US", json!("override1"))]);

        assert_eq!(resolve(&config, Some("US")), json!("override1"));
        assert_eq!(resolve(&config, Some("DE")), json!("value1"));
        assert_eq!(resolve(&config, None), json!("value1"));
    }

    #[test]
    fn test_embedded_json_override_is_parsed() {
        let config = record(
            "config2",
            json!(r#"{"key":"value"}"#),
            &[("US", json!(r#"{"key":"override"}"#))],
        );

        assert_eq!(resolve(&config, Some("US")), json!({"key": "override"}));
        assert_eq!(resolve(&config, None), json!({"key": "value"}));
    }

    #[test]
    fn test_invalid_json_falls_back_to_raw_string() {
        let config = record(
            "config1",
            json!("invalid json"),
            &[("US", json!("invalid json"))],
        );
        assert_eq!(resolve(&config, Some("US")), json!("invalid json"));

        let broken = record("config3", json!("{not json"), &[]);
        assert_eq!(resolve(&broken, Some("US")), json!("{not json"));
    }

    #[test]
    fn test_arrays_and_non_strings() {
        assert_eq!(parse_embedded(&json!("[1, 2]")), json!([1, 2]));
        assert_eq!(parse_embedded(&json!(42)), json!(42));
        assert_eq!(parse_embedded(&json!({"a": 1})), json!({"a": 1}));
        assert_eq!(parse_embedded(&Value::Null), Value::Null);
        // Only objects and arrays are decoded
        assert_eq!(parse_embedded(&json!("true")), json!("true"));
        assert_eq!(parse_embedded(&json!(" {\"a\":1}")), json!(" {\"a\":1}"));
    }

    #[test]
    fn test_resolving_twice_is_stable() {
        let configs = [
            record("a", json!("plain"), &[("US", json!("us"))]),
            record("b", json!(r#"["x"]"#), &[("US", json!(r#"{"k":1}"#))]),
            record("c", json!("{broken"), &[("US", json!("[broken"))]),
        ];

        for config in &configs {
            let once = resolve(config, Some("US"));
            let again = resolve(&record(&config.id, once.clone(), &[("US", once.clone())]), Some("US"));
            assert_eq!(again, once);
        }
    }

    #[test]
    fn test_resolve_all_keys_by_name() {
        let configs = vec![
            record("config1", json!("value1"), &[("US", json!("override1"))]),
            record(
                "config2",
                json!(r#"{"key": "value"}"#),
                &[("US", json!(r#"{"key": "override"}"#))],
            ),
        ];

        let resolved = resolve_all(&configs, Some("US"));
        assert_eq!(
            Value::Object(resolved),
            json!({
                "config1": "override1",
                "config2": {"key": "override"}
            })
        );

        let unresolved = resolve_all(&configs, None);
        assert_eq!(unresolved["config2"], json!({"key": "value"}));
    }
}
