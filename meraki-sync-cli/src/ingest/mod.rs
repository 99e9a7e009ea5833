//! Input ingestion
//!
//! Reads CSV or JSON desired-state files and turns each row into a
//! [`Record`] (or a [`Rejected`] entry). Parsing problems that make the
//! whole file unusable are errors; problems with a single row are not.

mod json;
mod table;

pub use json::read_json;
pub use table::read_csv;

use anyhow::{Context, Result};
use log::info;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::api::discovery::DeviceDirectory;
use crate::sync::fields::ResourceKind;
use crate::sync::record::{InvalidRecord, Record, Rejected};
use crate::sync::value::FieldValue;

/// Result of ingesting one file: records and rejections, in file order
pub type Ingested = Vec<Result<Record, Rejected>>;

/// Column renames applied before projection (`--map SRC=DST`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pairs: Vec<(String, String)>,
}

impl ColumnMap {
    pub fn parse<S: AsRef<str>>(mappings: &[S]) -> Result<Self> {
        let mut pairs = Vec::new();
        for mapping in mappings {
            let mapping = mapping.as_ref();
            let (src, dst) = mapping
                .split_once('=')
                .with_context(|| format!("Invalid column mapping '{}', expected SRC=DST", mapping))?;
            let (src, dst) = (src.trim(), dst.trim());
            if src.is_empty() || dst.is_empty() {
                anyhow::bail!("Invalid column mapping '{}', expected SRC=DST", mapping);
            }
            pairs.push((src.to_string(), dst.to_string()));
        }
        Ok(Self { pairs })
    }

    /// Field name for a column; unmapped columns keep their name
    pub fn rename<'a>(&'a self, column: &'a str) -> &'a str {
        self.pairs
            .iter()
            .find(|(src, _)| src == column)
            .map(|(_, dst)| dst.as_str())
            .unwrap_or(column)
    }
}

/// How rows map onto records
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub kind: ResourceKind,
    /// Column holding the (parent) identifier
    pub id_column: String,
    /// Column holding the child identifier of composite kinds
    pub sub_id_column: String,
    /// Fixed parent identifier for every row, replacing the id column
    pub target: Option<String>,
    pub column_map: ColumnMap,
}

impl IngestOptions {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            id_column: default_id_column(kind).to_string(),
            sub_id_column: default_sub_id_column(kind).unwrap_or("").to_string(),
            target: None,
            column_map: ColumnMap::default(),
        }
    }

    /// Columns that address the resource rather than describe it
    fn is_identifier_column(&self, column: &str) -> bool {
        column == self.id_column || (self.kind.is_composite() && column == self.sub_id_column)
    }
}

/// Identifier column matching what `pull` writes for each kind
pub fn default_id_column(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Device => "serial",
        ResourceKind::SwitchPort | ResourceKind::L3Interface | ResourceKind::StaticRoute => {
            "deviceSerial"
        }
        ResourceKind::Ospf => "networkId",
    }
}

pub fn default_sub_id_column(kind: ResourceKind) -> Option<&'static str> {
    match kind {
        ResourceKind::SwitchPort => Some("portId"),
        ResourceKind::L3Interface => Some("interfaceId"),
        ResourceKind::StaticRoute => Some("staticRouteId"),
        ResourceKind::Device | ResourceKind::Ospf => None,
    }
}

/// One row before identifier resolution
#[derive(Debug, Default)]
pub(crate) struct RawRow {
    pub source_row: usize,
    pub id: Option<String>,
    /// `None` when the input has no sub-id column at all
    pub sub_id: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
}

/// Resolve the identifier of a raw row and build the record
pub(crate) fn build_record(
    options: &IngestOptions,
    directory: Option<&DeviceDirectory>,
    row: RawRow,
) -> Result<Record, Rejected> {
    let reject = |error| Rejected {
        source_row: row.source_row,
        error,
    };

    let parent = options
        .target
        .clone()
        .or(row.id)
        .unwrap_or_default()
        .trim()
        .to_string();
    if parent.is_empty() {
        return Err(reject(InvalidRecord::EmptyIdentifier));
    }

    let parent = match directory {
        Some(directory) => directory.serial_for(&parent).map_err(reject)?.to_string(),
        None => parent,
    };

    let raw_id = match (options.kind.is_composite(), row.sub_id) {
        (true, Some(child)) => format!("{}/{}", parent, child.trim()),
        _ => parent,
    };

    Record::from_row(options.kind, &raw_id, row.fields, row.source_row)
}

pub fn load_csv(
    path: &Path,
    options: &IngestOptions,
    directory: Option<&DeviceDirectory>,
) -> Result<Ingested> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    let ingested = read_csv(BufReader::new(file), options, directory)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    log_loaded(path, &ingested);
    Ok(ingested)
}

pub fn load_json(
    path: &Path,
    options: &IngestOptions,
    directory: Option<&DeviceDirectory>,
) -> Result<Ingested> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open JSON file: {}", path.display()))?;
    let ingested = read_json(BufReader::new(file), options, directory)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    log_loaded(path, &ingested);
    Ok(ingested)
}

fn log_loaded(path: &Path, ingested: &Ingested) {
    let rejected = ingested.iter().filter(|r| r.is_err()).count();
    info!(
        "Loaded {} record(s) from {} ({} rejected)",
        ingested.len() - rejected,
        path.display(),
        rejected
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::discovery::Device;
    use std::io::Write;

    fn row(id: Option<&str>, sub_id: Option<&str>) -> RawRow {
        RawRow {
            source_row: 7,
            id: id.map(String::from),
            sub_id: sub_id.map(String::from),
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_column_map() {
        let map = ColumnMap::parse(&["Description=name", " WAP-Name = name "]).unwrap();
        assert_eq!(map.rename("Description"), "name");
        assert_eq!(map.rename("WAP-Name"), "name");
        assert_eq!(map.rename("vlan"), "vlan");

        assert!(ColumnMap::parse(&["nothing"]).is_err());
        assert!(ColumnMap::parse(&["=name"]).is_err());
    }

    #[test]
    fn test_default_columns() {
        let options = IngestOptions::new(ResourceKind::SwitchPort);
        assert_eq!(options.id_column, "deviceSerial");
        assert_eq!(options.sub_id_column, "portId");
        assert_eq!(IngestOptions::new(ResourceKind::Device).id_column, "serial");
        assert_eq!(IngestOptions::new(ResourceKind::Ospf).id_column, "networkId");
    }

    #[test]
    fn test_build_composite_identifier() {
        let options = IngestOptions::new(ResourceKind::SwitchPort);
        let record = build_record(&options, None, row(Some("q2sw-0001"), Some(" 12 "))).unwrap();
        assert_eq!(record.target_id(), "Q2SW-0001/12");
        assert_eq!(record.source_row(), 7);
    }

    #[test]
    fn test_target_replaces_id_column() {
        let mut options = IngestOptions::new(ResourceKind::SwitchPort);
        options.target = Some("q2sw-9999".into());
        let record = build_record(&options, None, row(Some("Q2SW-0001"), Some("3"))).unwrap();
        assert_eq!(record.target_id(), "Q2SW-9999/3");
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let options = IngestOptions::new(ResourceKind::Device);
        let rejected = build_record(&options, None, row(Some("   "), None)).unwrap_err();
        assert_eq!(rejected.source_row, 7);
        assert_eq!(rejected.error, InvalidRecord::EmptyIdentifier);

        let rejected = build_record(&options, None, row(None, None)).unwrap_err();
        assert_eq!(rejected.error, InvalidRecord::EmptyIdentifier);
    }

    #[test]
    fn test_missing_port_is_malformed() {
        let options = IngestOptions::new(ResourceKind::SwitchPort);
        let rejected = build_record(&options, None, row(Some("Q2SW-0001"), Some(""))).unwrap_err();
        assert!(matches!(rejected.error, InvalidRecord::MalformedIdentifier { .. }));
    }

    #[test]
    fn test_name_resolution() {
        let directory = DeviceDirectory::new(&[Device {
            serial: "Q2SW-0001".into(),
            name: Some("IDF-2 Stack".into()),
            model: "MS225".into(),
            mac: None,
            network_id: None,
        }]);
        let options = IngestOptions::new(ResourceKind::SwitchPort);

        let record = build_record(&options, Some(&directory), row(Some("idf-2 stack"), Some("4"))).unwrap();
        assert_eq!(record.target_id(), "Q2SW-0001/4");

        let rejected =
            build_record(&options, Some(&directory), row(Some("Closet 9"), Some("4"))).unwrap_err();
        assert_eq!(
            rejected.error,
            InvalidRecord::Unresolved { name: "Closet 9".into(), reason: "device not found".into() }
        );
    }

    #[test]
    fn test_load_files() {
        let options = IngestOptions::new(ResourceKind::Device);

        let mut csv_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(csv_file, "serial,name\nQ2AA-0001,AP-1\n").unwrap();
        let ingested = load_csv(csv_file.path(), &options, None).unwrap();
        assert_eq!(ingested.len(), 1);

        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json_file, r#"[{{"serial": "Q2AA-0002", "name": "AP-2"}}]"#).unwrap();
        let ingested = load_json(json_file.path(), &options, None).unwrap();
        assert_eq!(ingested[0].as_ref().unwrap().target_id(), "Q2AA-0002");

        let err = load_csv(Path::new("/no/such/input.csv"), &options, None).unwrap_err();
        assert!(err.to_string().contains("Failed to open CSV file"));
    }
}
