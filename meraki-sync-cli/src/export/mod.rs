//! Read direction: dump a network's switch configuration to files
//!
//! Output files are shaped so `apply` can read them back: CSV headers are
//! the union of keys in first-seen order and nested values are written as
//! JSON text. The [`sfp`] inventory is read-only reporting.

pub mod sfp;

use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::api::discovery::{Device, Discovery};

type Row = Map<String, Value>;

/// What to fetch besides per-switch port CSVs
#[derive(Debug, Clone)]
pub struct PullOptions {
    pub out_dir: PathBuf,
    pub combined: bool,
    pub l3: bool,
    pub ospf: bool,
}

/// Files written and reads that failed
#[derive(Debug, Default)]
pub struct PullReport {
    pub switches: usize,
    pub files: Vec<PathBuf>,
    pub failures: Vec<String>,
}

impl PullReport {
    fn failed(&mut self, what: String) {
        warn!("{}", what);
        self.failures.push(what);
    }
}

/// Union of keys across rows, in first-seen order
pub fn union_headers(rows: &[Row]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}

/// Text form of one cell; nested values become JSON
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Write rows as CSV. Returns the number of data rows written.
pub fn write_rows_csv(path: &Path, rows: &[Row]) -> Result<usize> {
    let headers = union_headers(rows);
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(&headers)?;
    for row in rows {
        writer.write_record(
            headers
                .iter()
                .map(|h| row.get(h).map(cell_text).unwrap_or_default()),
        )?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(rows.len())
}

/// Tag each row with the switch it came from, keeping an existing value
fn with_device_serial(serial: &str, rows: &[Row]) -> Vec<Row> {
    rows.iter()
        .cloned()
        .map(|mut row| {
            row.entry("deviceSerial")
                .or_insert_with(|| Value::String(serial.to_string()));
            row
        })
        .collect()
}

fn as_rows(value: Value, path: &str) -> Result<Vec<Row>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => anyhow::bail!("Unexpected element in {}: {}", path, other),
            })
            .collect(),
        other => anyhow::bail!("Expected a list from {}, got {}", path, other),
    }
}

/// Reads for one network
pub struct Puller<'a> {
    discovery: &'a Discovery,
    options: &'a PullOptions,
}

impl<'a> Puller<'a> {
    pub fn new(discovery: &'a Discovery, options: &'a PullOptions) -> Self {
        Self { discovery, options }
    }

    async fn fetch_rows(&self, path: &str) -> Result<Vec<Row>> {
        let value = self.discovery.get_value(path).await?;
        as_rows(value, path)
    }

    fn out(&self, name: String) -> PathBuf {
        self.options.out_dir.join(name)
    }

    /// Export every switch of a network. Failed reads are logged and counted;
    /// the remaining switches still export.
    pub async fn pull(&self, network_id: &str) -> Result<PullReport> {
        std::fs::create_dir_all(&self.options.out_dir).with_context(|| {
            format!("Failed to create {}", self.options.out_dir.display())
        })?;

        let switches = self
            .discovery
            .switches(network_id)
            .await
            .context("Failed to list switches")?;
        if switches.is_empty() {
            anyhow::bail!("No switches found in network {}", network_id);
        }

        let mut report = PullReport {
            switches: switches.len(),
            ..PullReport::default()
        };
        let mut combined: Vec<Row> = Vec::new();

        for device in &switches {
            self.pull_switch(device, &mut report, &mut combined).await?;
        }

        if self.options.combined && !combined.is_empty() {
            let path = self.out(format!("{}_switch_ports_combined.csv", network_id));
            write_rows_csv(&path, &combined)?;
            info!("Wrote combined CSV {}", path.display());
            report.files.push(path);
        }

        if self.options.ospf {
            let path = format!("/networks/{}/switch/routing/ospf", urlencoding::encode(network_id));
            match self.discovery.get_value(&path).await {
                Ok(ospf) => {
                    let file = self.out(format!("{}_ospf.json", network_id));
                    let text = serde_json::to_string_pretty(&ospf)?;
                    std::fs::write(&file, text + "\n")
                        .with_context(|| format!("Failed to write {}", file.display()))?;
                    info!("Wrote OSPF config {}", file.display());
                    report.files.push(file);
                }
                Err(e) => report.failed(format!("OSPF fetch failed: {}", e)),
            }
        }

        Ok(report)
    }

    async fn pull_switch(
        &self,
        device: &Device,
        report: &mut PullReport,
        combined: &mut Vec<Row>,
    ) -> Result<()> {
        let serial = device.serial.to_ascii_uppercase();
        let encoded = urlencoding::encode(&serial).into_owned();

        let ports_path = format!("/devices/{}/switch/ports", encoded);
        match self.fetch_rows(&ports_path).await {
            Ok(ports) if ports.is_empty() => {
                report.failed(format!("{}: no ports returned", serial));
            }
            Ok(ports) => {
                let path = self.out(format!("{}_switch_ports.csv", serial));
                write_rows_csv(&path, &ports)?;
                info!(
                    "{} ({}): saved {} ports to {}",
                    device.display_name(),
                    device.model,
                    ports.len(),
                    path.display()
                );
                report.files.push(path);
                if self.options.combined {
                    combined.extend(with_device_serial(&serial, &ports));
                }
            }
            Err(e) => report.failed(format!("{}: port read failed: {:#}", serial, e)),
        }

        if self.options.l3 {
            let l3 = [
                ("interfaces", "l3_interfaces", "L3 interfaces"),
                ("staticRoutes", "static_routes", "static routes"),
            ];
            for (endpoint, suffix, label) in l3 {
                let path = format!("/devices/{}/switch/routing/{}", encoded, endpoint);
                match self.fetch_rows(&path).await {
                    Ok(rows) if rows.is_empty() => {}
                    Ok(rows) => {
                        let file = self.out(format!("{}_{}.csv", serial, suffix));
                        write_rows_csv(&file, &rows)?;
                        info!("{}: saved {} {} to {}", serial, rows.len(), label, file.display());
                        report.files.push(file);
                    }
                    Err(e) => report.failed(format!("{}: skipping {}: {:#}", serial, label, e)),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::request::ApiResponse;
    use crate::api::resilience::ResilienceConfig;
    use crate::api::transport::RateLimitedTransport;
    use crate::api::transport::testing::*;
    use crate::ingest::{IngestOptions, read_csv};
    use crate::sync::fields::ResourceKind;
    use crate::sync::value::FieldValue;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn rows(value: Value) -> Vec<Row> {
        as_rows(value, "test").unwrap()
    }

    fn discovery(script: Vec<ApiResponse>) -> Discovery {
        let exec = Arc::new(ScriptedExecutor::new(script.into_iter().map(Ok).collect()));
        let transport = RateLimitedTransport::new(exec, &ResilienceConfig::default());
        Discovery::new(transport, CancellationToken::new())
    }

    fn ports() -> Value {
        json!([
            {"portId": "1", "name": "uplink", "vlan": 1, "tags": ["core"], "udld": "Alert only"},
            {"portId": "2", "name": null, "vlan": 20, "voiceVlan": 30}
        ])
    }

    #[test]
    fn test_union_headers_first_seen_order() {
        let headers = union_headers(&rows(ports()));
        assert_eq!(headers, vec!["portId", "name", "vlan", "tags", "udld", "voiceVlan"]);
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Value::Null), "");
        assert_eq!(cell_text(&json!(true)), "true");
        assert_eq!(cell_text(&json!(["a", "b"])), r#"["a","b"]"#);
        assert_eq!(cell_text(&json!({"mode": "x"})), r#"{"mode":"x"}"#);
    }

    #[test]
    fn test_written_csv_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ports.csv");
        assert_eq!(write_rows_csv(&path, &rows(ports())).unwrap(), 2);

        let mut options = IngestOptions::new(ResourceKind::SwitchPort);
        options.target = Some("Q2SW-NEW".into());
        let file = std::fs::File::open(&path).unwrap();
        let ingested = read_csv(file, &options, None).unwrap();

        let first = ingested[0].as_ref().unwrap();
        assert_eq!(first.target_id(), "Q2SW-NEW/1");
        assert_eq!(first.fields()["tags"], FieldValue::List(vec!["core".into()]));
        assert_eq!(first.fields()["vlan"], FieldValue::Int(1));

        let second = ingested[1].as_ref().unwrap();
        assert!(second.fields()["name"].is_null());
        assert_eq!(second.fields()["voiceVlan"], FieldValue::Int(30));
    }

    #[test]
    fn test_device_serial_not_overwritten() {
        let tagged = with_device_serial(
            "Q2SW-1",
            &rows(json!([{"portId": "1"}, {"portId": "2", "deviceSerial": "OTHER"}])),
        );
        assert_eq!(tagged[0]["deviceSerial"], "Q2SW-1");
        assert_eq!(tagged[1]["deviceSerial"], "OTHER");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_network() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = discovery(vec![
            ApiResponse::new(
                200,
                json!([
                    {"serial": "q2sw-0001", "model": "MS225-24", "name": "IDF-1"},
                    {"serial": "Q2AP-0001", "model": "MR46"},
                    {"serial": "Q2SW-0002", "model": "MS120-8"}
                ]),
            ),
            ApiResponse::new(200, ports()),
            ApiResponse::new(200, json!([{"portId": "1", "name": "edge"}])),
            ApiResponse::new(200, json!({"enabled": true, "areas": [{"areaId": "0"}]})),
        ]);
        let options = PullOptions {
            out_dir: dir.path().to_path_buf(),
            combined: true,
            l3: false,
            ospf: true,
        };

        let report = Puller::new(&discovery, &options).pull("N_1").await.unwrap();

        assert_eq!(report.switches, 2);
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert!(dir.path().join("Q2SW-0001_switch_ports.csv").is_file());
        assert!(dir.path().join("Q2SW-0002_switch_ports.csv").is_file());

        let combined = std::fs::read_to_string(dir.path().join("N_1_switch_ports_combined.csv")).unwrap();
        let header = combined.lines().next().unwrap();
        assert_eq!(header, "portId,name,vlan,tags,udld,deviceSerial,voiceVlan");
        assert_eq!(combined.lines().count(), 4);
        assert!(combined.contains("Q2SW-0002"));

        let ospf: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("N_1_ospf.json")).unwrap())
                .unwrap();
        assert_eq!(ospf["enabled"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_switch_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = discovery(vec![
            ApiResponse::new(
                200,
                json!([
                    {"serial": "Q2SW-0001", "model": "MS225-24"},
                    {"serial": "Q2SW-0002", "model": "MS225-24"}
                ]),
            ),
            status(404),
            ApiResponse::new(200, ports()),
        ]);
        let options = PullOptions {
            out_dir: dir.path().to_path_buf(),
            combined: false,
            l3: false,
            ospf: false,
        };

        let report = Puller::new(&discovery, &options).pull("N_1").await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].starts_with("Q2SW-0001"));
        assert_eq!(report.files, vec![dir.path().join("Q2SW-0002_switch_ports.csv")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_l3() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = discovery(vec![
            ApiResponse::new(200, json!([{"serial": "Q2SW-0001", "model": "MS390-24"}])),
            ApiResponse::new(200, ports()),
            ApiResponse::new(
                200,
                json!([{"interfaceId": "1234", "name": "L3 VLAN 10", "vlanId": 10, "ospfSettings": {"area": "0"}}]),
            ),
            ApiResponse::new(200, json!([])),
        ]);
        let options = PullOptions {
            out_dir: dir.path().to_path_buf(),
            combined: false,
            l3: true,
            ospf: false,
        };

        let report = Puller::new(&discovery, &options).pull("N_1").await.unwrap();

        assert_eq!(report.files.len(), 2);
        let l3 = std::fs::read_to_string(dir.path().join("Q2SW-0001_l3_interfaces.csv")).unwrap();
        assert!(l3.starts_with("interfaceId,name,vlanId,ospfSettings"));
        assert!(l3.contains(r#""{""area"":""0""}""#));
        assert!(!dir.path().join("Q2SW-0001_static_routes.csv").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_switches_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = discovery(vec![ApiResponse::new(200, json!([{"serial": "Q2AP", "model": "MR46"}]))]);
        let options = PullOptions {
            out_dir: dir.path().to_path_buf(),
            combined: false,
            l3: false,
            ospf: false,
        };
        assert!(Puller::new(&discovery, &options).pull("N_1").await.is_err());
    }
}
