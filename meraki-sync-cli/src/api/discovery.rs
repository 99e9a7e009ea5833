//! Organization, network and device lookup
//!
//! Turns the human-readable names people put in spreadsheets into the
//! identifiers the API addresses resources by. All reads go through the
//! shared [`RateLimitedTransport`].

use log::{debug, info};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use super::request::ApiRequest;
use super::transport::{RateLimitedTransport, TransportError};
use crate::sync::record::InvalidRecord;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("GET {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: TransportError,
    },
    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no {what} named or with id '{wanted}'")]
    NotFound { what: &'static str, wanted: String },
    #[error("multiple {what}s match '{wanted}': {ids}; use the id instead")]
    Ambiguous {
        what: &'static str,
        wanted: String,
        ids: String,
    },
    #[error("could not find a network id after '/n/' in '{0}'")]
    NoNetworkInUrl(String),
    #[error(
        "'{0}' is a short dashboard network id, which the API cannot resolve; use a URL with the canonical N_... id or --network-name with --org-id"
    )]
    ShortNetworkId(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub serial: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
}

impl Device {
    /// MS models are switches
    pub fn is_switch(&self) -> bool {
        self.model.to_ascii_uppercase().starts_with("MS")
    }

    /// Name, else MAC, else serial
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.mac.as_deref())
            .unwrap_or(&self.serial)
    }
}

/// Something addressable by id and known by a name
pub trait Named {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

impl Named for Organization {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Network {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Match by exact id first, then by trimmed case-insensitive name.
/// More than one name match is an error.
pub fn find_by_name_or_id<'a, T: Named>(
    items: &'a [T],
    wanted: &str,
    what: &'static str,
) -> Result<&'a T, DiscoveryError> {
    let wanted_trimmed = wanted.trim();
    if let Some(item) = items.iter().find(|i| i.id() == wanted_trimmed) {
        return Ok(item);
    }

    let needle = wanted_trimmed.to_lowercase();
    let matches: Vec<&T> = items
        .iter()
        .filter(|i| i.name().trim().to_lowercase() == needle)
        .collect();

    match matches.as_slice() {
        [] => Err(DiscoveryError::NotFound {
            what,
            wanted: wanted_trimmed.to_string(),
        }),
        [single] => Ok(*single),
        many => Err(DiscoveryError::Ambiguous {
            what,
            wanted: wanted_trimmed.to_string(),
            ids: many.iter().map(|i| i.id()).collect::<Vec<_>>().join(", "),
        }),
    }
}

/// Extract the canonical `N_...` network id from a dashboard URL
pub fn network_id_from_url(url: &str) -> Result<String, DiscoveryError> {
    let parsed = Url::parse(url.trim()).map_err(|_| DiscoveryError::NoNetworkInUrl(url.to_string()))?;
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let id = segments
        .iter()
        .position(|seg| *seg == "n")
        .and_then(|idx| segments.get(idx + 1))
        .ok_or_else(|| DiscoveryError::NoNetworkInUrl(url.to_string()))?;

    if id.starts_with("N_") {
        Ok(id.to_string())
    } else {
        Err(DiscoveryError::ShortNetworkId(id.to_string()))
    }
}

/// Device name to serial lookup for one network
#[derive(Debug, Clone, Default)]
pub struct DeviceDirectory {
    by_name: HashMap<String, Vec<String>>,
}

impl DeviceDirectory {
    pub fn new(devices: &[Device]) -> Self {
        let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
        for device in devices {
            if let Some(name) = device.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                by_name
                    .entry(name.to_lowercase())
                    .or_default()
                    .push(device.serial.to_ascii_uppercase());
            }
        }
        Self { by_name }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Serial for a device name (case-insensitive)
    pub fn serial_for(&self, name: &str) -> Result<&str, InvalidRecord> {
        let unresolved = |reason: &str| InvalidRecord::Unresolved {
            name: name.trim().to_string(),
            reason: reason.to_string(),
        };

        match self.by_name.get(&name.trim().to_lowercase()).map(Vec::as_slice) {
            None | Some([]) => Err(unresolved("device not found")),
            Some([serial]) => Ok(serial.as_str()),
            Some(_) => Err(unresolved("device name is not unique in the network")),
        }
    }
}

/// Read-only dashboard queries
pub struct Discovery {
    transport: RateLimitedTransport,
    cancel: CancellationToken,
}

impl Discovery {
    pub fn new(transport: RateLimitedTransport, cancel: CancellationToken) -> Self {
        Self { transport, cancel }
    }

    /// GET a path and return the raw JSON body
    pub async fn get_value(&self, path: &str) -> Result<Value, DiscoveryError> {
        let request = ApiRequest::get(path);
        let delivered = self
            .transport
            .call(&request, &self.cancel)
            .await
            .map_err(|source| DiscoveryError::Transport {
                path: path.to_string(),
                source,
            })?;
        debug!("{} answered in {} attempt(s)", request, delivered.attempts);
        Ok(delivered.response.body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DiscoveryError> {
        let body = self.get_value(path).await?;
        serde_json::from_value(body).map_err(|source| DiscoveryError::Decode {
            path: path.to_string(),
            source,
        })
    }

    pub async fn organizations(&self) -> Result<Vec<Organization>, DiscoveryError> {
        self.get("/organizations").await
    }

    pub async fn networks(&self, org_id: &str) -> Result<Vec<Network>, DiscoveryError> {
        self.get(&format!("/organizations/{}/networks", urlencoding::encode(org_id)))
            .await
    }

    pub async fn devices(&self, network_id: &str) -> Result<Vec<Device>, DiscoveryError> {
        self.get(&format!("/networks/{}/devices", urlencoding::encode(network_id)))
            .await
    }

    pub async fn device(&self, serial: &str) -> Result<Device, DiscoveryError> {
        self.get(&format!("/devices/{}", urlencoding::encode(serial))).await
    }

    pub async fn network(&self, network_id: &str) -> Result<Network, DiscoveryError> {
        self.get(&format!("/networks/{}", urlencoding::encode(network_id)))
            .await
    }

    pub async fn resolve_organization(&self, wanted: &str) -> Result<Organization, DiscoveryError> {
        let orgs = self.organizations().await?;
        let org = find_by_name_or_id(&orgs, wanted, "organization")?;
        info!("Using organization {} ({})", org.name, org.id);
        Ok(org.clone())
    }

    pub async fn resolve_network(
        &self,
        org_id: &str,
        wanted: &str,
    ) -> Result<Network, DiscoveryError> {
        let networks = self.networks(org_id).await?;
        let network = find_by_name_or_id(&networks, wanted, "network")?;
        info!("Using network {} ({})", network.name, network.id);
        Ok(network.clone())
    }

    /// Devices in the network whose model marks them as switches
    pub async fn switches(&self, network_id: &str) -> Result<Vec<Device>, DiscoveryError> {
        let switches: Vec<Device> = self
            .devices(network_id)
            .await?
            .into_iter()
            .filter(Device::is_switch)
            .collect();
        info!("Found {} switch(es) in network {}", switches.len(), network_id);
        Ok(switches)
    }

    /// Name lookup table for every device in the network
    pub async fn directory(&self, network_id: &str) -> Result<DeviceDirectory, DiscoveryError> {
        let devices = self.devices(network_id).await?;
        Ok(DeviceDirectory::new(&devices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::request::ApiResponse;
    use crate::api::resilience::ResilienceConfig;
    use crate::api::transport::testing::*;
    use serde_json::json;
    use std::sync::Arc;

    fn discovery(script: Vec<ApiResponse>) -> (Discovery, Arc<ScriptedExecutor>) {
        let exec = Arc::new(ScriptedExecutor::new(script.into_iter().map(Ok).collect()));
        let transport = RateLimitedTransport::new(exec.clone(), &ResilienceConfig::default());
        (Discovery::new(transport, CancellationToken::new()), exec)
    }

    fn orgs() -> Vec<Organization> {
        vec![
            Organization { id: "111".into(), name: "Example Org".into() },
            Organization { id: "222".into(), name: "Lab".into() },
            Organization { id: "333".into(), name: "lab ".into() },
        ]
    }

    #[test]
    fn test_find_by_id_or_name() {
        let orgs = orgs();
        assert_eq!(find_by_name_or_id(&orgs, "222", "organization").unwrap().name, "Lab");
        assert_eq!(find_by_name_or_id(&orgs, " example org ", "organization").unwrap().id, "111");
    }

    #[test]
    fn test_find_reports_missing_and_ambiguous() {
        let orgs = orgs();
        assert!(matches!(
            find_by_name_or_id(&orgs, "Nope", "organization"),
            Err(DiscoveryError::NotFound { .. })
        ));
        match find_by_name_or_id(&orgs, "LAB", "organization") {
            Err(DiscoveryError::Ambiguous { ids, .. }) => assert_eq!(ids, "222, 333"),
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_network_id_from_url() {
        let url = "https://n123.meraki.com/HQ-switch/n/N_123456789012345678/manage/nodes/list";
        assert_eq!(network_id_from_url(url).unwrap(), "N_123456789012345678");

        assert!(matches!(
            network_id_from_url("https://n1.meraki.com/o/abc/n/Xyz12/manage"),
            Err(DiscoveryError::ShortNetworkId(id)) if id == "Xyz12"
        ));
        assert!(matches!(
            network_id_from_url("https://n1.meraki.com/o/abc/manage"),
            Err(DiscoveryError::NoNetworkInUrl(_))
        ));
        assert!(matches!(
            network_id_from_url("not a url"),
            Err(DiscoveryError::NoNetworkInUrl(_))
        ));
    }

    #[test]
    fn test_device_helpers() {
        let device: Device = serde_json::from_value(json!({
            "serial": "Q2SW-0001-AAAA",
            "model": "ms225-48",
            "mac": "e0:55:3d:00:00:01",
            "networkId": "N_1"
        }))
        .unwrap();
        assert!(device.is_switch());
        assert_eq!(device.display_name(), "e0:55:3d:00:00:01");
        assert_eq!(device.network_id.as_deref(), Some("N_1"));
    }

    #[test]
    fn test_device_directory() {
        let devices = vec![
            Device {
                serial: "q2sw-0001".into(),
                name: Some("Core-1".into()),
                model: "MS390".into(),
                mac: None,
                network_id: None,
            },
            Device {
                serial: "Q2SW-0002".into(),
                name: Some("Edge".into()),
                model: "MS120".into(),
                mac: None,
                network_id: None,
            },
            Device {
                serial: "Q2SW-0003".into(),
                name: Some("edge".into()),
                model: "MS120".into(),
                mac: None,
                network_id: None,
            },
        ];
        let directory = DeviceDirectory::new(&devices);

        assert_eq!(directory.serial_for(" core-1 ").unwrap(), "Q2SW-0001");
        assert_eq!(
            directory.serial_for("missing"),
            Err(InvalidRecord::Unresolved {
                name: "missing".into(),
                reason: "device not found".into()
            })
        );
        assert!(matches!(
            directory.serial_for("Edge"),
            Err(InvalidRecord::Unresolved { reason, .. }) if reason.contains("not unique")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_network_by_name() {
        let (discovery, exec) = discovery(vec![ApiResponse::new(
            200,
            json!([
                {"id": "N_1", "name": "Main Network", "organizationId": "111"},
                {"id": "N_2", "name": "Lab"}
            ]),
        )]);

        let network = discovery.resolve_network("111", "main network").await.unwrap();

        assert_eq!(network.id, "N_1");
        assert_eq!(exec.calls.lock().unwrap()[0].0.path, "/organizations/111/networks");
    }

    #[tokio::test(start_paused = true)]
    async fn test_switches_filters_models() {
        let (discovery, _) = discovery(vec![ApiResponse::new(
            200,
            json!([
                {"serial": "Q2SW-1", "model": "MS250-48"},
                {"serial": "Q2AP-1", "model": "MR46"},
                {"serial": "Q2SW-2", "model": "MS120-8"}
            ]),
        )]);

        let switches = discovery.switches("N_1").await.unwrap();
        let serials: Vec<_> = switches.iter().map(|d| d.serial.as_str()).collect();
        assert_eq!(serials, vec!["Q2SW-1", "Q2SW-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_errors_surface() {
        let (discovery, _) = discovery(vec![status(404)]);
        assert!(matches!(
            discovery.organizations().await,
            Err(DiscoveryError::Transport { source: TransportError::Permanent { status: 404, .. }, .. })
        ));

        let (discovery, _) = discovery_with_body(json!({"unexpected": true}));
        assert!(matches!(
            discovery.organizations().await,
            Err(DiscoveryError::Decode { .. })
        ));
    }

    fn discovery_with_body(body: Value) -> (Discovery, Arc<ScriptedExecutor>) {
        discovery(vec![ApiResponse::new(200, body)])
    }
}
