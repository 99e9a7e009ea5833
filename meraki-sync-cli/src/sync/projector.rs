//! Field projection: restrict a record to the fields a resource kind accepts

use serde::{Serialize, Serializer};

use super::fields::SupportedFieldSet;
use super::record::Record;
use super::value::FieldValue;

/// The exact body the engine sends (or would send) for one record.
///
/// Entries follow the order of the [`SupportedFieldSet`] they were projected
/// through, so two projections of the same record are always identical.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectedPayload {
    entries: Vec<(String, FieldValue)>,
}

impl ProjectedPayload {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object sent as the request body
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (name, value) in &self.entries {
            obj.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(obj)
    }
}

impl Serialize for ProjectedPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl std::fmt::Display for ProjectedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

/// Keep only fields present in both the record and the field set.
///
/// Unknown fields and null values are dropped silently; values are passed
/// through unchanged.
pub fn project(record: &Record, field_set: &SupportedFieldSet) -> ProjectedPayload {
    let entries = field_set
        .iter()
        .filter_map(|field| {
            record
                .fields()
                .get(field)
                .filter(|value| !value.is_null())
                .map(|value| (field.to_string(), value.clone()))
        })
        .collect();

    ProjectedPayload { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::fields::ResourceKind;
    use std::collections::BTreeMap;

    fn record(pairs: &[(&str, FieldValue)]) -> Record {
        let fields: BTreeMap<String, FieldValue> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Record::new(ResourceKind::SwitchPort, "Q2AB/1", fields, 2).unwrap()
    }

    #[test]
    fn test_unsupported_fields_dropped() {
        let set = SupportedFieldSet::new(["name", "vlan"]);
        let rec = record(&[("name", "X".into()), ("voiceVlan", FieldValue::Int(10))]);

        let payload = project(&rec, &set);

        assert_eq!(payload.to_json(), serde_json::json!({"name": "X"}));
    }

    #[test]
    fn test_null_values_dropped() {
        let set = SupportedFieldSet::new(["name", "vlan"]);
        let rec = record(&[("name", FieldValue::Null), ("vlan", FieldValue::Int(20))]);

        let payload = project(&rec, &set);

        assert_eq!(payload.to_json(), serde_json::json!({"vlan": 20}));
    }

    #[test]
    fn test_order_follows_field_set() {
        let set = SupportedFieldSet::new(["vlan", "name", "enabled"]);
        let rec = record(&[
            ("name", "uplink".into()),
            ("enabled", FieldValue::Bool(true)),
            ("vlan", FieldValue::Int(5)),
        ]);

        let payload = project(&rec, &set);

        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"vlan":5,"name":"uplink","enabled":true}"#);
        assert_eq!(payload.to_string(), "{vlan: 5, name: 'uplink', enabled: true}");
    }

    #[test]
    fn test_empty_projection() {
        let set = SupportedFieldSet::new(["name"]);
        let rec = record(&[("notes", "ignored".into())]);

        let payload = project(&rec, &set);

        assert!(payload.is_empty());
        assert_eq!(payload.to_json(), serde_json::json!({}));
    }
}
