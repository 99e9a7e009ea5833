use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;

use super::{Ingested, IngestOptions, RawRow, build_record};
use crate::api::discovery::DeviceDirectory;
use crate::sync::value::FieldValue;

/// Identifier cells may be strings or numbers (port ids often are)
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a JSON array of objects into records.
///
/// Each element is either `{"id": ..., "fields": {...}}` or a flat object
/// where the id column is one of the keys. A single top-level object (such
/// as a pulled OSPF document) counts as a one-element array. Rows are
/// numbered from 1.
pub fn read_json<R: Read>(
    reader: R,
    options: &IngestOptions,
    directory: Option<&DeviceDirectory>,
) -> Result<Ingested> {
    let document: Value = serde_json::from_reader(reader).context("Input is not valid JSON")?;
    let elements = match document {
        Value::Array(elements) => elements,
        object @ Value::Object(_) => vec![object],
        _ => anyhow::bail!("Expected a JSON array of objects"),
    };

    let mut ingested = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        let source_row = index + 1;
        let Value::Object(mut object) = element else {
            anyhow::bail!("Element {} is not an object", source_row);
        };

        let row = match object.remove("fields") {
            Some(Value::Object(mut nested)) => {
                let id = object.get("id").and_then(id_text);
                if options.kind.is_composite() {
                    // `PARENT/CHILD` ids split so that --target can replace the parent
                    let column = object
                        .remove(&options.sub_id_column)
                        .or_else(|| nested.remove(&options.sub_id_column));
                    let (parent, child) = match id.as_deref().and_then(|id| id.split_once('/')) {
                        Some((parent, child)) => (Some(parent.to_string()), Some(child.to_string())),
                        None => (id, column.as_ref().and_then(id_text)),
                    };
                    RawRow {
                        source_row,
                        id: parent,
                        sub_id: child,
                        fields: to_fields(nested, options),
                    }
                } else {
                    RawRow {
                        source_row,
                        id,
                        sub_id: None,
                        fields: to_fields(nested, options),
                    }
                }
            }
            Some(other) => {
                anyhow::bail!("Element {}: 'fields' must be an object, got {}", source_row, other)
            }
            None => {
                let id = object.remove(&options.id_column);
                let sub_id = if options.kind.is_composite() {
                    object.remove(&options.sub_id_column)
                } else {
                    None
                };
                RawRow {
                    source_row,
                    id: id.as_ref().and_then(id_text),
                    sub_id: sub_id.as_ref().and_then(id_text),
                    fields: to_fields(object, options),
                }
            }
        };

        ingested.push(build_record(options, directory, row));
    }

    Ok(ingested)
}

fn to_fields(
    object: serde_json::Map<String, Value>,
    options: &IngestOptions,
) -> BTreeMap<String, FieldValue> {
    object
        .into_iter()
        .map(|(key, value)| {
            (
                options.column_map.rename(&key).to_string(),
                FieldValue::from_json(&value),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::fields::ResourceKind;
    use crate::sync::record::InvalidRecord;

    #[test]
    fn test_nested_form() {
        let input = r#"[
            {"id": "Q2SW-0001/5", "fields": {"name": "printer", "vlan": 30, "tags": ["ops"]}}
        ]"#;
        let options = IngestOptions::new(ResourceKind::SwitchPort);
        let ingested = read_json(input.as_bytes(), &options, None).unwrap();

        let record = ingested[0].as_ref().unwrap();
        assert_eq!(record.target_id(), "Q2SW-0001/5");
        assert_eq!(record.source_row(), 1);
        assert_eq!(record.fields()["vlan"], FieldValue::Int(30));
        assert_eq!(record.fields()["tags"], FieldValue::List(vec!["ops".into()]));
    }

    #[test]
    fn test_nested_form_copied_to_target() {
        let input = r#"[
            {"id": "Q2SW-OLD/5", "fields": {"name": "printer"}},
            {"id": "Q2SW-OLD", "portId": 6, "fields": {"name": "desk"}},
            {"id": "Q2SW-OLD", "fields": {"portId": "7", "name": "ap"}},
            {"id": "Q2SW-OLD", "fields": {"name": "orphan"}}
        ]"#;
        let mut options = IngestOptions::new(ResourceKind::SwitchPort);
        options.target = Some("q2sw-new".into());
        let ingested = read_json(input.as_bytes(), &options, None).unwrap();

        let ids: Vec<_> = ingested[..3]
            .iter()
            .map(|r| r.as_ref().unwrap().target_id().to_string())
            .collect();
        assert_eq!(ids, vec!["Q2SW-NEW/5", "Q2SW-NEW/6", "Q2SW-NEW/7"]);
        assert!(!ingested[2].as_ref().unwrap().fields().contains_key("portId"));
        assert!(matches!(
            ingested[3].as_ref().unwrap_err().error,
            InvalidRecord::MalformedIdentifier { .. }
        ));
    }

    #[test]
    fn test_nested_composite_without_target() {
        let input = r#"[{"id": "q2sw-0001", "portId": "3", "fields": {"vlan": 10}}]"#;
        let options = IngestOptions::new(ResourceKind::SwitchPort);
        let ingested = read_json(input.as_bytes(), &options, None).unwrap();
        assert_eq!(ingested[0].as_ref().unwrap().target_id(), "Q2SW-0001/3");
    }

    #[test]
    fn test_flat_form_with_numeric_port() {
        let input = r#"[
            {"deviceSerial": "q2sw-0001", "portId": 7, "name": "ap", "udld": {"mode": "Alert only"}},
            {"deviceSerial": "", "portId": 8, "name": "spare"}
        ]"#;
        let options = IngestOptions::new(ResourceKind::SwitchPort);
        let ingested = read_json(input.as_bytes(), &options, None).unwrap();

        let record = ingested[0].as_ref().unwrap();
        assert_eq!(record.target_id(), "Q2SW-0001/7");
        assert!(!record.fields().contains_key("portId"));
        assert!(matches!(record.fields()["udld"], FieldValue::Json(_)));

        let rejected = ingested[1].as_ref().unwrap_err();
        assert_eq!(rejected.source_row, 2);
        assert_eq!(rejected.error, InvalidRecord::EmptyIdentifier);
    }

    #[test]
    fn test_single_object_with_target() {
        let input = r#"{"enabled": true, "helloTimerInSeconds": 10, "areas": [{"areaId": "0"}]}"#;
        let mut options = IngestOptions::new(ResourceKind::Ospf);
        options.target = Some("N_1234".into());
        let ingested = read_json(input.as_bytes(), &options, None).unwrap();

        assert_eq!(ingested.len(), 1);
        let record = ingested[0].as_ref().unwrap();
        assert_eq!(record.target_id(), "N_1234");
        assert_eq!(record.fields()["enabled"], FieldValue::Bool(true));
    }

    #[test]
    fn test_rejects_non_array_documents() {
        let options = IngestOptions::new(ResourceKind::Device);
        assert!(read_json(r#""serial""#.as_bytes(), &options, None).is_err());
        assert!(read_json(r#"[1, 2]"#.as_bytes(), &options, None).is_err());
        assert!(read_json(r#"[{"id": "A", "fields": 3}]"#.as_bytes(), &options, None).is_err());
        assert!(read_json("not json".as_bytes(), &options, None).is_err());
    }
}
