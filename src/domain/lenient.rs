//! Forgiving field deserializers for files written by the assistant.
//!
//! The assistant edits `tasks.json` by hand, so a field with the wrong JSON
//! type falls back to its default instead of failing the whole document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize `T`, substituting `T::default()` when the value has the wrong shape.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Same as [`or_default`] but for optional fields, where anything unusable becomes `None`.
pub fn or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Record {
        #[serde(default, deserialize_with = "or_default")]
        count: u32,
        #[serde(default, deserialize_with = "or_none")]
        label: Option<String>,
    }

    #[test]
    fn test_well_typed_values_pass_through() {
        let record: Record = serde_json::from_str(r#"{"count": 7, "label": "x"}"#).unwrap();
        assert_eq!(record.count, 7);
        assert_eq!(record.label.as_deref(), Some("x"));
    }

    #[test]
    fn test_wrong_types_fall_back() {
        let record: Record = serde_json::from_str(r#"{"count": "seven", "label": 12}"#).unwrap();
        assert_eq!(record.count, 0);
        assert!(record.label.is_none());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let record: Record = serde_json::from_str("{}").unwrap();
        assert_eq!(record.count, 0);
        assert!(record.label.is_none());
    }
}
