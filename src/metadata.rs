//! Metadata parameter decoding and sanitization.
//!
//! The `metadata` request parameter is a JSON object mapping metadata
//! keys to string values.  Decoding is strict: the document must be an
//! object and every value must be a JSON string.  Entries whose value
//! is empty are dropped, so the submitted map carries only keys with
//! non-empty values.

use std::collections::HashMap;

use crate::errors::ConnectorError;

/// Decode the raw JSON metadata parameter into a string-to-string map,
/// keeping only entries with non-empty values.
pub fn parse_metadata(raw: &str) -> Result<HashMap<String, String>, ConnectorError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ConnectorError::General(anyhow::anyhow!("Invalid metadata JSON: {}", e)))?;

    let object = value.as_object().ok_or_else(|| {
        ConnectorError::General(anyhow::anyhow!(
            "Invalid metadata: expected a JSON object of string values"
        ))
    })?;

    let mut map = HashMap::with_capacity(object.len());
    for (key, value) in object {
        let value = value.as_str().ok_or_else(|| {
            ConnectorError::General(anyhow::anyhow!(
                "Invalid metadata: value for key '{}' is not a string",
                key
            ))
        })?;
        if !value.is_empty() {
            map.insert(key.clone(), value.to_string());
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_object() {
        let map = parse_metadata("{}").unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_parse_single_entry() {
        let map = parse_metadata(r#"{"k1":"v1"}"#).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("k1").map(String::as_str), Some("v1"));
    }

    #[test]
    fn test_empty_values_are_dropped() {
        let map = parse_metadata(r#"{"k1":"v1","k2":"","k3":"v3"}"#).unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("k1"));
        assert!(!map.contains_key("k2"));
        assert!(map.contains_key("k3"));
    }

    #[test]
    fn test_all_empty_values_yield_empty_map() {
        let map = parse_metadata(r#"{"a":"","b":""}"#).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_non_string_value_is_rejected() {
        let err = parse_metadata(r#"{"k1":42}"#).unwrap_err();
        assert_eq!(err.code(), "GENERAL_ERROR");
        assert!(err.to_string().contains("k1"));
    }

    #[test]
    fn test_non_object_document_is_rejected() {
        let err = parse_metadata(r#"["k1","v1"]"#).unwrap_err();
        assert_eq!(err.code(), "GENERAL_ERROR");
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let err = parse_metadata("{not json").unwrap_err();
        assert_eq!(err.code(), "GENERAL_ERROR");
    }
}
