use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared storage type for a flexible entity attribute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttributeDataType {
    String,
    Integer,
    Decimal,
    Boolean,
    Datetime,
    Json,
}

impl AttributeDataType {
    pub fn as_str(self) -> &'static str {
        match self {
            AttributeDataType::String => "string",
            AttributeDataType::Integer => "integer",
            AttributeDataType::Decimal => "decimal",
            AttributeDataType::Boolean => "boolean",
            AttributeDataType::Datetime => "datetime",
            AttributeDataType::Json => "json",
        }
    }
}

impl FromStr for AttributeDataType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "string" => Ok(AttributeDataType::String),
            "integer" => Ok(AttributeDataType::Integer),
            "decimal" => Ok(AttributeDataType::Decimal),
            "boolean" => Ok(AttributeDataType::Boolean),
            "datetime" => Ok(AttributeDataType::Datetime),
            "json" => Ok(AttributeDataType::Json),
            other => Err(format!("unknown attribute data type: {other}")),
        }
    }
}

/// A typed attribute value. Exactly one slot is populated per stored row,
/// matching the declared data type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Datetime(DateTime<Utc>),
    String(String),
    Json(Value),
}

impl AttributeValue {
    /// The slot this value occupies.
    pub fn data_type(&self) -> AttributeDataType {
        match self {
            AttributeValue::String(_) => AttributeDataType::String,
            AttributeValue::Integer(_) => AttributeDataType::Integer,
            AttributeValue::Decimal(_) => AttributeDataType::Decimal,
            AttributeValue::Boolean(_) => AttributeDataType::Boolean,
            AttributeValue::Datetime(_) => AttributeDataType::Datetime,
            AttributeValue::Json(_) => AttributeDataType::Json,
        }
    }

    /// Interprets a raw JSON value under the declared data type.
    ///
    /// The declared type wins: a JSON string under `datetime` must parse as
    /// RFC 3339, a JSON number under `integer` must be integral, and so on.
    pub fn from_declared(data_type: AttributeDataType, value: Value) -> Result<Self, String> {
        match (data_type, value) {
            (AttributeDataType::String, Value::String(text)) => Ok(AttributeValue::String(text)),
            (AttributeDataType::Integer, Value::Number(number)) => number
                .as_i64()
                .map(AttributeValue::Integer)
                .ok_or_else(|| "integer attribute requires an integral number".to_string()),
            (AttributeDataType::Decimal, Value::Number(number)) => number
                .as_f64()
                .map(AttributeValue::Decimal)
                .ok_or_else(|| "decimal attribute requires a finite number".to_string()),
            (AttributeDataType::Boolean, Value::Bool(flag)) => Ok(AttributeValue::Boolean(flag)),
            (AttributeDataType::Datetime, Value::String(text)) => text
                .parse::<DateTime<Utc>>()
                .map(AttributeValue::Datetime)
                .map_err(|err| format!("datetime attribute must be RFC 3339: {err}")),
            (AttributeDataType::Json, value) => Ok(AttributeValue::Json(value)),
            (expected, got) => Err(format!(
                "value {got} does not fit declared type {}",
                expected.as_str()
            )),
        }
    }

    /// Caller-side coercion for boolean-ish values ("true", 1, ...).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(flag) => Some(*flag),
            AttributeValue::Integer(number) => Some(*number != 0),
            AttributeValue::String(text) => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Payload for writing a single attribute value.
#[derive(Debug, Clone, Deserialize)]
pub struct SetAttributeRequest {
    pub data_type: AttributeDataType,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declared_type_accepts_matching_values() {
        let value = AttributeValue::from_declared(AttributeDataType::Boolean, json!(true))
            .expect("boolean should fit");
        assert_eq!(value, AttributeValue::Boolean(true));

        let value = AttributeValue::from_declared(AttributeDataType::Integer, json!(36))
            .expect("integer should fit");
        assert_eq!(value, AttributeValue::Integer(36));

        let value = AttributeValue::from_declared(
            AttributeDataType::Datetime,
            json!("2024-03-11T09:00:00Z"),
        )
        .expect("datetime should parse");
        assert!(matches!(value, AttributeValue::Datetime(_)));
    }

    #[test]
    fn declared_type_rejects_mismatched_values() {
        assert!(AttributeValue::from_declared(AttributeDataType::Boolean, json!("sim")).is_err());
        assert!(AttributeValue::from_declared(AttributeDataType::Integer, json!(1.5)).is_err());
        assert!(AttributeValue::from_declared(AttributeDataType::Datetime, json!("amanhã")).is_err());
    }

    #[test]
    fn json_slot_accepts_anything() {
        let value =
            AttributeValue::from_declared(AttributeDataType::Json, json!({"ports": [1, 2]}))
                .expect("json should fit");
        assert_eq!(value.data_type(), AttributeDataType::Json);
    }

    #[test]
    fn boolean_coercion_covers_stringified_flags() {
        assert_eq!(AttributeValue::Boolean(true).as_bool(), Some(true));
        assert_eq!(AttributeValue::Integer(0).as_bool(), Some(false));
        assert_eq!(AttributeValue::String("TRUE".into()).as_bool(), Some(true));
        assert_eq!(AttributeValue::String("no".into()).as_bool(), Some(false));
        assert_eq!(AttributeValue::String("talvez".into()).as_bool(), None);
        assert_eq!(AttributeValue::Decimal(1.0).as_bool(), None);
    }
}
