//! Survey records as read from the row store.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Column holding the connections list (JSON-encoded in the row store).
pub const CONNECTIONS_FIELD: &str = "conexiones";

/// Marker rendered when a depth cannot be computed.
pub const NOT_AVAILABLE: &str = "N/A";

/// One survey submission's flattened field set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: HashMap<String, Value>) -> Self {
        Self { fields }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &HashMap<String, Value> {
        &self.fields
    }

    /// String form of a field, or `None` when the field is absent, null or empty.
    pub fn text(&self, field: &str) -> Option<String> {
        self.fields.get(field).and_then(value_text)
    }

    /// Parse the connections list. Absent or empty means no connections.
    pub fn connections(&self) -> Result<Vec<Connection>> {
        let raw = match self.fields.get(CONNECTIONS_FIELD) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(Vec::new()),
            Some(Value::String(s)) => serde_json::from_str::<Value>(s)
                .map_err(|e| Error::malformed(CONNECTIONS_FIELD, e))?,
            Some(other) => other.clone(),
        };

        match raw {
            Value::Array(_) => serde_json::from_value(raw)
                .map_err(|e| Error::malformed(CONNECTIONS_FIELD, e)),
            other => Err(Error::malformed(
                CONNECTIONS_FIELD,
                format!("expected a list, found {}", json_kind(&other)),
            )),
        }
    }
}

/// Stringify a scalar the way it is matched against enumerated options.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// One pipe connection entering or leaving the well.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Connection {
    #[serde(alias = "diametro_pulgadas")]
    pub diameter: Option<Value>,
    #[serde(alias = "cota_razante")]
    pub crown_elevation: Option<Value>,
    #[serde(alias = "cota_clave")]
    pub invert_elevation: Option<Value>,
    pub material: Option<Value>,
}

impl Connection {
    /// `crown_elevation - invert_elevation` rounded to two decimals.
    pub fn depth(&self) -> Option<f64> {
        let crown = self.crown_elevation.as_ref().and_then(numeric)?;
        let invert = self.invert_elevation.as_ref().and_then(numeric)?;
        let depth = ((crown - invert) * 100.0).round() / 100.0;
        // Avoid rendering "-0".
        Some(if depth == 0.0 { 0.0 } else { depth })
    }

    pub fn depth_text(&self) -> String {
        self.depth()
            .map(|d| d.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub fn diameter_text(&self) -> String {
        self.diameter.as_ref().and_then(value_text).unwrap_or_default()
    }

    pub fn material_text(&self) -> String {
        self.material.as_ref().and_then(value_text).unwrap_or_default()
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_treats_empty_and_absent_alike() {
        let record = Record::new().with("a", "").with("b", Value::Null).with("c", "x");
        assert_eq!(record.text("a"), None);
        assert_eq!(record.text("b"), None);
        assert_eq!(record.text("missing"), None);
        assert_eq!(record.text("c"), Some("x".to_string()));
    }

    #[test]
    fn test_text_stringifies_scalars() {
        let record = Record::new().with("n", 12).with("f", 1.5).with("b", true);
        assert_eq!(record.text("n").as_deref(), Some("12"));
        assert_eq!(record.text("f").as_deref(), Some("1.5"));
        assert_eq!(record.text("b").as_deref(), Some("true"));
    }

    #[test]
    fn test_connections_from_json_string_with_spanish_keys() {
        let record = Record::new().with(
            CONNECTIONS_FIELD,
            r#"[{"diametro_pulgadas": 8, "cota_razante": "10.5", "cota_clave": 8.25, "material": "PVC"}]"#,
        );
        let connections = record.connections().unwrap();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].diameter_text(), "8");
        assert_eq!(connections[0].depth(), Some(2.25));
        assert_eq!(connections[0].material_text(), "PVC");
    }

    #[test]
    fn test_connections_from_structured_array() {
        let record = Record::new().with(
            CONNECTIONS_FIELD,
            json!([{"diameter": "6", "crown_elevation": 3, "invert_elevation": 1.111}]),
        );
        let connections = record.connections().unwrap();
        assert_eq!(connections[0].depth(), Some(1.89));
    }

    #[test]
    fn test_connections_absent_or_blank_is_empty() {
        assert!(Record::new().connections().unwrap().is_empty());
        let blank = Record::new().with(CONNECTIONS_FIELD, "  ");
        assert!(blank.connections().unwrap().is_empty());
        let empty_list = Record::new().with(CONNECTIONS_FIELD, "[]");
        assert!(empty_list.connections().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_connections() {
        let record = Record::new().with(CONNECTIONS_FIELD, "not json");
        assert!(matches!(record.connections(), Err(Error::MalformedInput { .. })));

        let record = Record::new().with(CONNECTIONS_FIELD, r#"{"a": 1}"#);
        assert!(matches!(record.connections(), Err(Error::MalformedInput { .. })));
    }

    #[test]
    fn test_depth_not_available_when_operand_missing_or_non_numeric() {
        let missing = Connection {
            crown_elevation: Some(json!(4.0)),
            ..Default::default()
        };
        assert_eq!(missing.depth(), None);
        assert_eq!(missing.depth_text(), NOT_AVAILABLE);

        let garbage = Connection {
            crown_elevation: Some(json!("abc")),
            invert_elevation: Some(json!(1)),
            ..Default::default()
        };
        assert_eq!(garbage.depth_text(), NOT_AVAILABLE);
    }

    #[test]
    fn test_depth_rounds_to_two_decimals() {
        let c = Connection {
            crown_elevation: Some(json!(10.0)),
            invert_elevation: Some(json!(7.6666)),
            ..Default::default()
        };
        assert_eq!(c.depth(), Some(2.33));

        let zero = Connection {
            crown_elevation: Some(json!(1.001)),
            invert_elevation: Some(json!(1.002)),
            ..Default::default()
        };
        assert_eq!(zero.depth_text(), "0");
    }
}
