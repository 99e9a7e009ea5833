//! Desired field values for sync records

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A desired value for one field of a remote resource.
///
/// Serializes as its plain JSON wire form.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Null/empty value, never sent
    Null,
    /// String value
    String(String),
    /// Whole number
    Int(i64),
    /// Floating point
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Ordered list (tags, VLAN lists given as arrays)
    List(Vec<FieldValue>),
    /// Nested object passed through as-is (udld settings, OSPF areas)
    Json(serde_json::Value),
}

/// Cell text that means "no value" in exported sheets
const EMPTY_MARKERS: &[&str] = &["", "nan", "NaN", "None", "null"];

impl FieldValue {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Decode a CSV cell into its native value.
    ///
    /// Exported sheets store everything as text, so booleans, numbers and
    /// nested JSON are recovered here. `tags` additionally accepts a
    /// Python-style list literal (`['a', 'b']`) and falls back to a
    /// single-element list.
    pub fn from_cell(field: &str, raw: &str) -> Self {
        let trimmed = raw.trim();
        if EMPTY_MARKERS.contains(&trimmed) {
            return FieldValue::Null;
        }

        if field == "tags" {
            return Self::parse_tags(trimmed);
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return FieldValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return FieldValue::Bool(false);
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            return FieldValue::Int(i);
        }
        if trimmed.contains('.') {
            if let Ok(f) = trimmed.parse::<f64>() {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    return FieldValue::Int(f as i64);
                }
                return FieldValue::Float(f);
            }
        }

        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
                return Self::from_json(&json);
            }
        }

        // Keep the original text, including inner whitespace
        FieldValue::String(raw.to_string())
    }

    fn parse_tags(trimmed: &str) -> Self {
        if trimmed.starts_with('[') {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
                return Self::from_json(&json);
            }
            // Python repr uses single quotes
            let requoted = trimmed.replace('\'', "\"");
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&requoted) {
                return Self::from_json(&json);
            }
        }
        FieldValue::List(vec![FieldValue::String(trimmed.to_string())])
    }

    /// Convert to JSON value for API calls
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::json!(*i),
            FieldValue::Float(f) => serde_json::json!(*f),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::List(items) => {
                serde_json::Value::Array(items.iter().map(FieldValue::to_json).collect())
            }
            FieldValue::Json(v) => v.clone(),
        }
    }

    /// Parse from JSON value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    FieldValue::Float(f)
                } else {
                    FieldValue::Null
                }
            }
            serde_json::Value::String(s) => FieldValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                FieldValue::List(items.iter().map(FieldValue::from_json).collect())
            }
            serde_json::Value::Object(_) => FieldValue::Json(json.clone()),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => write!(f, "(null)"),
            FieldValue::String(s) => write!(f, "'{}'", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::List(_) | FieldValue::Json(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(FieldValue::from_json(&json))
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Null
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_markers_are_null() {
        for raw in ["", "  ", "nan", "NaN", "None", "null"] {
            assert!(FieldValue::from_cell("name", raw).is_null(), "{raw:?}");
        }
    }

    #[test]
    fn test_booleans_and_numbers() {
        assert_eq!(FieldValue::from_cell("enabled", "TRUE"), FieldValue::Bool(true));
        assert_eq!(FieldValue::from_cell("enabled", "false"), FieldValue::Bool(false));
        assert_eq!(FieldValue::from_cell("vlan", "10"), FieldValue::Int(10));
        assert_eq!(FieldValue::from_cell("vlan", "10.0"), FieldValue::Int(10));
        assert_eq!(FieldValue::from_cell("lat", "37.5"), FieldValue::Float(37.5));
    }

    #[test]
    fn test_vlan_ranges_stay_strings() {
        assert_eq!(
            FieldValue::from_cell("allowedVlans", "1,10-20"),
            FieldValue::String("1,10-20".to_string())
        );
        assert_eq!(
            FieldValue::from_cell("allowedVlans", "all"),
            FieldValue::String("all".to_string())
        );
    }

    #[test]
    fn test_tags_python_literal() {
        let value = FieldValue::from_cell("tags", "['core', 'uplink']");
        assert_eq!(value.to_json(), serde_json::json!(["core", "uplink"]));
    }

    #[test]
    fn test_tags_plain_text_becomes_single_item_list() {
        let value = FieldValue::from_cell("tags", "core");
        assert_eq!(value.to_json(), serde_json::json!(["core"]));
    }

    #[test]
    fn test_nested_json_cell() {
        let value = FieldValue::from_cell("udld", r#"{"enabled": true, "mode": "alert only"}"#);
        assert!(matches!(value, FieldValue::Json(_)));
        assert_eq!(value.to_json()["mode"], "alert only");
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::from("X").to_string(), "'X'");
        assert_eq!(FieldValue::Int(5).to_string(), "5");
        assert_eq!(FieldValue::Null.to_string(), "(null)");
    }
}
