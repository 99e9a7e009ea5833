//! SFP module inventory across every switch of an organization
//!
//! Port configuration is merged with live port status, then narrowed to
//! SFP-capable ports that hold a module. The result can be written as a
//! flat CSV and a per-switch JSON document.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{Row, as_rows, cell_text};
use crate::api::discovery::{Device, Discovery, Network};

/// Front-panel copper ports end at 48 on the largest access switches
const LAST_COPPER_PORT: u64 = 48;

const CSV_HEADER: &[&str] = &[
    "Switch_Serial",
    "Switch_Name",
    "Switch_Model",
    "Network_Name",
    "Port_ID",
    "Speed",
    "Status",
    "Module_Type",
    "Is_Uplink",
    "Traffic_Total_Kbps",
];

#[derive(Debug, Clone)]
pub struct SfpOptions {
    pub out_dir: PathBuf,
    pub csv: bool,
    pub json: bool,
    /// Appended to output file names
    pub stamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchInfo {
    pub serial: String,
    pub name: String,
    pub model: String,
    pub network_name: String,
    pub network_id: String,
}

impl SwitchInfo {
    fn new(device: &Device, network: &Network) -> Self {
        Self {
            serial: device.serial.to_ascii_uppercase(),
            name: device
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(&device.serial)
                .to_string(),
            model: match device.model.as_str() {
                "" => "Unknown".to_string(),
                model => model.to_string(),
            },
            network_name: network.name.clone(),
            network_id: network.id.clone(),
        }
    }
}

/// Populated SFP ports of one switch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchSfps {
    pub switch: SwitchInfo,
    pub sfp_ports: Vec<Row>,
    pub sfp_count: usize,
}

#[derive(Debug, Default)]
pub struct SfpReport {
    pub networks: usize,
    pub switches_scanned: usize,
    /// Only switches holding at least one module
    pub switches: Vec<SwitchSfps>,
    pub files: Vec<PathBuf>,
    pub failures: Vec<String>,
}

impl SfpReport {
    fn failed(&mut self, what: String) {
        warn!("{}", what);
        self.failures.push(what);
    }

    pub fn module_count(&self) -> usize {
        self.switches.iter().map(|s| s.sfp_count).sum()
    }

    /// Module count per reported port speed, sorted by speed label
    pub fn by_speed(&self) -> BTreeMap<String, usize> {
        let mut totals = BTreeMap::new();
        for port in self.switches.iter().flat_map(|s| &s.sfp_ports) {
            let speed = text(port.get("speed")).unwrap_or_else(|| "Unknown Speed".to_string());
            *totals.entry(speed).or_insert(0) += 1;
        }
        totals
    }
}

/// Non-empty, non-false, non-zero
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    if truthy(value) { value.map(cell_text) } else { None }
}

/// Part number or product id of the inserted module, if the port reports one
pub fn module_part(port: &Row) -> Option<String> {
    [
        port.get("portModule"),
        port.get("sfpModulePartNumber"),
        port.get("module").and_then(|m| m.get("partNumber")),
        port.get("sfpProductId"),
    ]
    .into_iter()
    .find_map(text)
}

/// Numeric port id; module ports such as `1_MA-MOD-4X10G_1` have none
fn port_number(port: &Row) -> Option<u64> {
    match port.get("portId")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_module_port_id(port: &Row) -> bool {
    matches!(port.get("portId"), Some(Value::String(s)) if s.contains('_'))
}

/// Capabilities of a fixed-speed optical port: gigabit only, no 10/100
fn optical_capabilities(port: &Row) -> bool {
    let Some(Value::Array(caps)) = port.get("linkNegotiationCapabilities") else {
        return false;
    };
    let caps: Vec<&str> = caps.iter().filter_map(Value::as_str).collect();
    !caps.is_empty()
        && caps.len() <= 3
        && caps.iter().any(|c| c.contains("1 Gigabit full duplex"))
        && !caps
            .iter()
            .any(|c| c.contains("100 Megabit") || c.contains("10 Megabit"))
}

/// Whether a port takes a pluggable module
pub fn is_sfp_port(port: &Row) -> bool {
    let port_type = port
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_ascii_lowercase();

    module_part(port).is_some()
        || port_type.contains("sfp")
        || port_type.contains("fiber")
        || port_number(port).is_some_and(|n| n > LAST_COPPER_PORT)
        || is_module_port_id(port)
        || optical_capabilities(port)
}

/// Whether an SFP port currently holds a module
pub fn has_module(port: &Row) -> bool {
    let speed = port.get("speed").and_then(Value::as_str).unwrap_or_default();
    module_part(port).is_some()
        || port.get("status").and_then(Value::as_str) == Some("Connected")
        || (!speed.is_empty() && speed != "Auto negotiate")
}

/// Overlay live status onto port configuration, matched by `portId`
fn merge_statuses(ports: &mut [Row], statuses: Vec<Row>) {
    let mut by_port: BTreeMap<String, Row> = statuses
        .into_iter()
        .filter_map(|status| {
            let id = status.get("portId").map(cell_text)?;
            Some((id, status))
        })
        .collect();
    for port in ports.iter_mut() {
        let Some(id) = port.get("portId").map(cell_text) else {
            continue;
        };
        if let Some(status) = by_port.remove(&id) {
            port.extend(status);
        }
    }
}

fn csv_record(switch: &SwitchInfo, port: &Row) -> Vec<String> {
    let traffic = port
        .get("trafficInKbps")
        .and_then(|t| t.get("total"))
        .map(cell_text)
        .unwrap_or_else(|| "0".to_string());
    vec![
        switch.serial.clone(),
        switch.name.clone(),
        switch.model.clone(),
        switch.network_name.clone(),
        port.get("portId").map(cell_text).unwrap_or_default(),
        port.get("speed").map(cell_text).unwrap_or_else(|| "Unknown".to_string()),
        port.get("status").map(cell_text).unwrap_or_else(|| "Unknown".to_string()),
        module_part(port).unwrap_or_else(|| "Unknown Module".to_string()),
        port.get("isUplink").map(cell_text).unwrap_or_else(|| "false".to_string()),
        traffic,
    ]
}

pub struct SfpScanner<'a> {
    discovery: &'a Discovery,
    options: &'a SfpOptions,
}

impl<'a> SfpScanner<'a> {
    pub fn new(discovery: &'a Discovery, options: &'a SfpOptions) -> Self {
        Self { discovery, options }
    }

    async fn fetch_rows(&self, path: &str) -> Result<Vec<Row>> {
        let value = self.discovery.get_value(path).await?;
        as_rows(value, path)
    }

    /// Scan every network of the organization. A network or switch that
    /// cannot be read is recorded and skipped.
    pub async fn scan(&self, org_id: &str) -> Result<SfpReport> {
        let networks = self
            .discovery
            .networks(org_id)
            .await
            .context("Failed to list networks")?;

        let mut report = SfpReport {
            networks: networks.len(),
            ..SfpReport::default()
        };

        let mut switches: Vec<SwitchInfo> = Vec::new();
        for network in &networks {
            match self.discovery.switches(&network.id).await {
                Ok(found) => switches.extend(found.iter().map(|d| SwitchInfo::new(d, network))),
                Err(e) => report.failed(format!("{}: device listing failed: {}", network.name, e)),
            }
        }
        report.switches_scanned = switches.len();
        info!(
            "Scanning {} switch(es) across {} network(s)",
            switches.len(),
            networks.len()
        );

        for (i, switch) in switches.into_iter().enumerate() {
            info!(
                "[{}/{}] {} in {}",
                i + 1,
                report.switches_scanned,
                switch.serial,
                switch.network_name
            );
            let Some(ports) = self.populated_ports(&switch, &mut report).await else {
                continue;
            };
            if !ports.is_empty() {
                info!("{}: {} SFP module(s)", switch.serial, ports.len());
                report.switches.push(SwitchSfps {
                    switch,
                    sfp_count: ports.len(),
                    sfp_ports: ports,
                });
            }
        }

        self.write_files(org_id, &mut report)?;
        Ok(report)
    }

    /// `None` when the port configuration itself could not be read
    async fn populated_ports(&self, switch: &SwitchInfo, report: &mut SfpReport) -> Option<Vec<Row>> {
        let encoded = urlencoding::encode(&switch.serial).into_owned();

        let ports_path = format!("/devices/{}/switch/ports", encoded);
        let mut ports = match self.fetch_rows(&ports_path).await {
            Ok(ports) => ports,
            Err(e) => {
                report.failed(format!("{}: port read failed: {:#}", switch.serial, e));
                return None;
            }
        };

        let status_path = format!("/devices/{}/switch/ports/statuses", encoded);
        match self.fetch_rows(&status_path).await {
            Ok(statuses) => merge_statuses(&mut ports, statuses),
            Err(e) => warn!("{}: no live port status, using configuration only: {:#}", switch.serial, e),
        }

        Some(
            ports
                .into_iter()
                .filter(|port| is_sfp_port(port) && has_module(port))
                .collect(),
        )
    }

    fn write_files(&self, org_id: &str, report: &mut SfpReport) -> Result<()> {
        if report.switches.is_empty() || !(self.options.csv || self.options.json) {
            return Ok(());
        }
        std::fs::create_dir_all(&self.options.out_dir).with_context(|| {
            format!("Failed to create {}", self.options.out_dir.display())
        })?;
        let base = format!("org_{}_sfp_inventory_{}", org_id, self.options.stamp);

        if self.options.csv {
            let path = self.options.out_dir.join(format!("{}.csv", base));
            let mut writer = csv::Writer::from_path(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            writer.write_record(CSV_HEADER)?;
            for switch in &report.switches {
                for port in &switch.sfp_ports {
                    writer.write_record(csv_record(&switch.switch, port))?;
                }
            }
            writer
                .flush()
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote SFP inventory CSV {}", path.display());
            report.files.push(path);
        }

        if self.options.json {
            let path = self.options.out_dir.join(format!("{}.json", base));
            let text = serde_json::to_string_pretty(&report.switches)?;
            std::fs::write(&path, text + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote SFP inventory JSON {}", path.display());
            report.files.push(path);
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
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn discovery(script: Vec<ApiResponse>) -> Discovery {
        let exec = Arc::new(ScriptedExecutor::new(script.into_iter().map(Ok).collect()));
        let transport = RateLimitedTransport::new(exec, &ResilienceConfig::default());
        Discovery::new(transport, CancellationToken::new())
    }

    fn options(dir: &std::path::Path) -> SfpOptions {
        SfpOptions {
            out_dir: dir.to_path_buf(),
            csv: true,
            json: true,
            stamp: "20250101_120000".into(),
        }
    }

    #[test]
    fn test_sfp_port_detection() {
        assert!(is_sfp_port(&row(json!({"portId": "49", "type": "trunk"}))));
        assert!(is_sfp_port(&row(json!({"portId": 52}))));
        assert!(is_sfp_port(&row(json!({"portId": "3", "type": "SFP trunk"}))));
        assert!(is_sfp_port(&row(json!({"portId": "1_MA-MOD-4X10G_1"}))));
        assert!(is_sfp_port(&row(json!({"portId": "5", "sfpModulePartNumber": "MA-SFP-10GB-SR"}))));
        assert!(is_sfp_port(&row(json!({"portId": "5", "module": {"partNumber": "MA-SFP-1GB-SX"}}))));
        assert!(is_sfp_port(&row(json!({
            "portId": "9",
            "linkNegotiationCapabilities": ["Auto negotiate", "1 Gigabit full duplex (forced)"]
        }))));

        assert!(!is_sfp_port(&row(json!({"portId": "12", "type": "access"}))));
        assert!(!is_sfp_port(&row(json!({
            "portId": "9",
            "linkNegotiationCapabilities": ["1 Gigabit full duplex", "100 Megabit full duplex"]
        }))));
        assert!(!is_sfp_port(&row(json!({"portId": "7", "portModule": ""}))));
    }

    #[test]
    fn test_module_presence() {
        assert!(has_module(&row(json!({"portId": "49", "status": "Connected"}))));
        assert!(has_module(&row(json!({"portId": "49", "speed": "10 Gbps"}))));
        assert!(has_module(&row(json!({"portId": "49", "sfpProductId": "SFP-10G-LR"}))));

        assert!(!has_module(&row(json!({"portId": "49", "status": "Disconnected", "speed": ""}))));
        assert!(!has_module(&row(json!({"portId": "50", "speed": "Auto negotiate"}))));
    }

    #[test]
    fn test_module_part_precedence() {
        let port = row(json!({
            "sfpProductId": "last",
            "module": {"partNumber": "third"},
            "sfpModulePartNumber": "second"
        }));
        assert_eq!(module_part(&port).as_deref(), Some("second"));
        assert_eq!(module_part(&row(json!({"sfpProductId": "last"}))).as_deref(), Some("last"));
        assert_eq!(module_part(&row(json!({"portId": "1"}))), None);
    }

    #[test]
    fn test_status_merge() {
        let mut ports = vec![
            row(json!({"portId": "49", "name": "uplink", "enabled": true})),
            row(json!({"portId": "50", "name": "spare"})),
        ];
        merge_statuses(
            &mut ports,
            vec![row(json!({"portId": "49", "status": "Connected", "speed": "10 Gbps"}))],
        );
        assert_eq!(ports[0]["status"], "Connected");
        assert_eq!(ports[0]["name"], "uplink");
        assert!(ports[1].get("status").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_organization() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = discovery(vec![
            ApiResponse::new(200, json!([{"id": "N_1", "name": "HQ"}, {"id": "N_2", "name": "Lab"}])),
            ApiResponse::new(
                200,
                json!([
                    {"serial": "q2sw-0001", "model": "MS225-48", "name": "Core"},
                    {"serial": "Q2AP-0001", "model": "MR46"}
                ]),
            ),
            ApiResponse::new(200, json!([{"serial": "Q2SW-0002", "model": "MS120-8"}])),
            ApiResponse::new(
                200,
                json!([
                    {"portId": "1", "name": "desk"},
                    {"portId": "49", "name": "uplink"},
                    {"portId": "50", "name": "spare"},
                    {"portId": "51", "name": "dr"}
                ]),
            ),
            ApiResponse::new(
                200,
                json!([
                    {"portId": "1", "status": "Connected", "speed": "1 Gbps"},
                    {"portId": "49", "status": "Connected", "speed": "10 Gbps", "isUplink": true,
                     "trafficInKbps": {"total": 812.5}},
                    {"portId": "50", "status": "Disconnected", "speed": ""},
                    {"portId": "51", "status": "Connected", "speed": "10 Gbps"}
                ]),
            ),
            ApiResponse::new(200, json!([{"portId": "1", "name": "only copper"}])),
            ApiResponse::new(200, json!([{"portId": "1", "status": "Connected"}])),
        ]);
        let options = options(dir.path());

        let report = SfpScanner::new(&discovery, &options).scan("123").await.unwrap();

        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.networks, 2);
        assert_eq!(report.switches_scanned, 2);
        assert_eq!(report.switches.len(), 1);
        assert_eq!(report.module_count(), 2);
        assert_eq!(report.switches[0].switch.serial, "Q2SW-0001");
        assert_eq!(report.switches[0].switch.name, "Core");
        assert_eq!(report.by_speed(), BTreeMap::from([("10 Gbps".to_string(), 2)]));

        let csv_path = dir.path().join("org_123_sfp_inventory_20250101_120000.csv");
        let text = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(
            lines[1],
            "Q2SW-0001,Core,MS225-48,HQ,49,10 Gbps,Connected,Unknown Module,true,812.5"
        );
        assert_eq!(lines.len(), 3);

        let json_path = dir.path().join("org_123_sfp_inventory_20250101_120000.json");
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(doc[0]["switch"]["networkId"], "N_1");
        assert_eq!(doc[0]["sfp_count"], 2);
        assert_eq!(doc[0]["sfp_ports"][1]["portId"], "51");
        assert_eq!(report.files, vec![csv_path, json_path]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reads_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = discovery(vec![
            ApiResponse::new(200, json!([{"id": "N_1", "name": "HQ"}, {"id": "N_2", "name": "Lab"}])),
            status(403),
            ApiResponse::new(200, json!([{"serial": "Q2SW-0002", "model": "MS120-8"}])),
            ApiResponse::new(200, json!([{"portId": "9", "name": "uplink"}])),
            status(404),
        ]);
        let options = SfpOptions { csv: false, json: false, ..options(dir.path()) };

        let report = SfpScanner::new(&discovery, &options).scan("123").await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].starts_with("HQ: device listing failed"));
        assert_eq!(report.switches_scanned, 1);
        assert!(report.switches.is_empty());
        assert!(report.files.is_empty());
    }
}
