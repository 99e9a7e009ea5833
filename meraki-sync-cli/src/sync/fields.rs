//! Resource kinds and the field sets the engine may write for each

use serde::{Deserialize, Serialize};

use super::record::InvalidRecord;

/// Fields accepted by `PUT /devices/{serial}`
const DEVICE_FIELDS: &[&str] = &[
    "name",
    "tags",
    "lat",
    "lng",
    "address",
    "notes",
    "moveMapMarker",
    "floorPlanId",
];

/// Fields accepted by `PUT /devices/{serial}/switch/ports/{portId}`
const SWITCH_PORT_FIELDS: &[&str] = &[
    "name",
    "tags",
    "enabled",
    "poeEnabled",
    "type",
    "vlan",
    "voiceVlan",
    "allowedVlans",
    "isolationEnabled",
    "rstpEnabled",
    "stpGuard",
    "linkNegotiation",
    "portScheduleId",
    "accessPolicyType",
    "accessPolicyNumber",
    "daiTrusted",
    "poeFallbackEnabled",
    "udld",
];

/// Fields accepted by `PUT /devices/{serial}/switch/routing/interfaces/{interfaceId}`
const L3_INTERFACE_FIELDS: &[&str] = &[
    "name",
    "subnet",
    "interfaceIp",
    "multicastRouting",
    "vlanId",
    "defaultGateway",
    "ospfSettings",
];

/// Fields accepted by `PUT /devices/{serial}/switch/routing/staticRoutes/{staticRouteId}`
const STATIC_ROUTE_FIELDS: &[&str] = &[
    "name",
    "subnet",
    "nextHopIp",
    "advertiseViaOspfEnabled",
    "preferOverOspfRoutesEnabled",
];

/// Fields accepted by `PUT /networks/{networkId}/switch/routing/ospf`
const OSPF_FIELDS: &[&str] = &[
    "enabled",
    "helloTimerInSeconds",
    "deadTimerInSeconds",
    "areas",
    "v3",
    "md5AuthenticationEnabled",
    "md5AuthenticationKey",
];

/// Kind of remote resource a run writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Device metadata (name, tags, location)
    Device,
    /// Switch port settings
    SwitchPort,
    /// Layer 3 switch interface (SVI)
    #[serde(rename = "l3-interface")]
    #[value(name = "l3-interface")]
    L3Interface,
    /// Switch static route
    StaticRoute,
    /// Network-wide OSPF settings
    Ospf,
}

impl ResourceKind {
    /// Ordered set of fields this kind accepts
    pub fn field_set(&self) -> SupportedFieldSet {
        let fields = match self {
            ResourceKind::Device => DEVICE_FIELDS,
            ResourceKind::SwitchPort => SWITCH_PORT_FIELDS,
            ResourceKind::L3Interface => L3_INTERFACE_FIELDS,
            ResourceKind::StaticRoute => STATIC_ROUTE_FIELDS,
            ResourceKind::Ospf => OSPF_FIELDS,
        };
        SupportedFieldSet::new(fields.iter().copied())
    }

    /// Whether the identifier is `PARENT/CHILD` rather than a single segment
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            ResourceKind::SwitchPort | ResourceKind::L3Interface | ResourceKind::StaticRoute
        )
    }

    /// Trim and case-fold a raw identifier into its canonical form.
    ///
    /// Serials are upper-cased. Network IDs and child IDs (port, interface,
    /// route) keep their case since the API treats them as opaque.
    pub fn normalize_id(&self, raw: &str) -> Result<String, InvalidRecord> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidRecord::EmptyIdentifier);
        }

        match self {
            ResourceKind::Device | ResourceKind::Ospf if trimmed.contains('/') => {
                Err(InvalidRecord::MalformedIdentifier {
                    id: trimmed.to_string(),
                    expected: self.id_shape(),
                })
            }
            ResourceKind::Device => Ok(trimmed.to_uppercase()),
            ResourceKind::Ospf => Ok(trimmed.to_string()),
            _ => {
                let (serial, child) = trimmed.split_once('/').ok_or_else(|| {
                    InvalidRecord::MalformedIdentifier {
                        id: trimmed.to_string(),
                        expected: self.id_shape(),
                    }
                })?;
                let serial = serial.trim();
                let child = child.trim();
                if serial.is_empty() || child.is_empty() {
                    return Err(InvalidRecord::MalformedIdentifier {
                        id: trimmed.to_string(),
                        expected: self.id_shape(),
                    });
                }
                Ok(format!("{}/{}", serial.to_uppercase(), child))
            }
        }
    }

    fn id_shape(&self) -> &'static str {
        match self {
            ResourceKind::Device => "SERIAL",
            ResourceKind::Ospf => "NETWORK_ID",
            _ => "SERIAL/ID",
        }
    }

    /// Build the API path for an already normalized identifier.
    ///
    /// Only composite kinds split on `/`; a single-segment id is encoded whole.
    pub fn path(&self, target_id: &str) -> String {
        let (parent, child) = if self.is_composite() {
            target_id.split_once('/').unwrap_or((target_id, ""))
        } else {
            (target_id, "")
        };
        let parent = urlencoding::encode(parent);
        let child = urlencoding::encode(child);
        match self {
            ResourceKind::Device => format!("/devices/{}", parent),
            ResourceKind::SwitchPort => format!("/devices/{}/switch/ports/{}", parent, child),
            ResourceKind::L3Interface => {
                format!("/devices/{}/switch/routing/interfaces/{}", parent, child)
            }
            ResourceKind::StaticRoute => {
                format!("/devices/{}/switch/routing/staticRoutes/{}", parent, child)
            }
            ResourceKind::Ospf => format!("/networks/{}/switch/routing/ospf", parent),
        }
    }

    /// Name as typed on the command line and written in reports
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Device => "device",
            ResourceKind::SwitchPort => "switch-port",
            ResourceKind::L3Interface => "l3-interface",
            ResourceKind::StaticRoute => "static-route",
            ResourceKind::Ospf => "ospf",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ordered set of field names the engine is allowed to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedFieldSet {
    fields: Vec<String>,
}

impl SupportedFieldSet {
    /// Build a set from field names, keeping first-seen order and dropping duplicates
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !ordered.contains(&field) {
                ordered.push(field);
            }
        }
        Self { fields: ordered }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The named fields, kept in this set's order. Names outside the set are the error.
    pub fn restrict<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, Vec<String>> {
        let names: Vec<&str> = names
            .iter()
            .map(|n| n.as_ref().trim())
            .filter(|n| !n.is_empty())
            .collect();
        let unknown: Vec<String> = names
            .iter()
            .filter(|n| !self.contains(n))
            .map(|n| n.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(unknown);
        }
        Ok(Self::new(self.iter().filter(|f| names.contains(f))))
    }
}
