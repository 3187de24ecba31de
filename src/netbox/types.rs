use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// --- NetBox API types ---

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Result of draining a list endpoint. `skipped` counts records that were
/// dropped: undecodable records, and for cables, ones missing an endpoint.
#[derive(Debug, Clone)]
pub struct Records<T> {
    pub items: Vec<T>,
    pub skipped: usize,
}

impl<T> Records<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, skipped: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedRef {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceField {
    pub value: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbCluster {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub cluster_type: Option<NestedRef>,
    #[serde(default)]
    pub status: Option<ChoiceField>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub tags: Vec<Value>,
    #[serde(default)]
    pub custom_fields: Option<Map<String, Value>>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub device_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbDeviceType {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<NestedRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbDevice {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub device_type: Option<NbDeviceType>,
    #[serde(default)]
    pub role: Option<NestedRef>,
    #[serde(default)]
    pub status: Option<ChoiceField>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub tags: Vec<Value>,
    #[serde(default)]
    pub custom_fields: Option<Map<String, Value>>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbEndpoint {
    #[serde(default)]
    pub device: Option<NestedRef>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbInterface {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub iface_type: Option<ChoiceField>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub mgmt_only: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub connected_endpoints: Option<Vec<NbEndpoint>>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbTermination {
    #[serde(default)]
    pub object: Option<NbEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbCable {
    pub id: i64,
    #[serde(default)]
    pub a_terminations: Vec<NbTermination>,
    #[serde(default)]
    pub b_terminations: Vec<NbTermination>,
    #[serde(rename = "type", default)]
    pub cable_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub status: Option<ChoiceField>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub tags: Vec<Value>,
    #[serde(default)]
    pub custom_fields: Option<Map<String, Value>>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// One resolved side of a cable: the device name and interface name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CableEnd {
    pub device: String,
    pub interface: String,
}

impl NbEndpoint {
    fn as_cable_end(&self) -> Option<CableEnd> {
        let device = self.device.as_ref().map(|d| d.name.as_str()).unwrap_or("");
        let interface = self.name.as_deref().unwrap_or("");
        if device.is_empty() || interface.is_empty() {
            return None;
        }
        Some(CableEnd {
            device: device.to_string(),
            interface: interface.to_string(),
        })
    }
}

fn first_end(terminations: &[NbTermination]) -> Option<CableEnd> {
    terminations
        .first()
        .and_then(|t| t.object.as_ref())
        .and_then(NbEndpoint::as_cable_end)
}

impl NbCable {
    /// Both cable ends, or None if either side is missing or blank
    pub fn endpoints(&self) -> Option<(CableEnd, CableEnd)> {
        Some((first_end(&self.a_terminations)?, first_end(&self.b_terminations)?))
    }

    pub fn is_valid(&self) -> bool {
        self.endpoints().is_some()
    }
}

impl NbInterface {
    /// Informational peer, from the first connected endpoint that names a device
    pub fn peer(&self) -> Option<CableEnd> {
        self.connected_endpoints
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find_map(NbEndpoint::as_cable_end)
    }
}
