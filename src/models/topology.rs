use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical connection status used when the inventory does not report one
pub mod connection_status {
    pub const CONNECTED: &str = "connected";
}

// ========== Cluster ==========

/// Descriptive snapshot of an inventory cluster, overwritten on every sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterMeta {
    pub description: String,
    pub comments: String,
    pub tags: Vec<Value>,
    pub custom_fields: Map<String, Value>,
    pub created: Option<String>,
    pub last_updated: Option<String>,
    pub status: Option<String>,
    pub device_count: i64,
}

/// Cluster represents one topology unit mirrored from the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: i64,
    pub external_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_type: Option<String>,
    pub meta_data: ClusterMeta,
    pub layout_data: Value,
    pub sync_in_progress: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a sync is allowed to overwrite on a cluster row
#[derive(Debug, Clone)]
pub struct UpsertClusterRequest {
    pub external_id: i64,
    pub name: String,
    pub cluster_type: Option<String>,
    pub meta_data: ClusterMeta,
}

/// Per-cluster sync status exposed to collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSyncStatus {
    pub sync_in_progress: bool,
    pub last_sync: Option<DateTime<Utc>>,
}

// ========== Device ==========

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceMeta {
    pub manufacturer: Option<String>,
    pub status: Option<String>,
    pub description: String,
    pub comments: String,
    pub tags: Vec<Value>,
    pub custom_fields: Map<String, Value>,
    pub created: Option<String>,
    pub last_updated: Option<String>,
}

/// Informational pointer to whatever the inventory says sits on the far end.
/// Never enforced against local rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerPointer {
    pub device: String,
    pub interface: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub external_id: i64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub interface_type: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub mgmt_only: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub connected_to: Option<PeerPointer>,
}

fn default_true() -> bool {
    true
}

/// Layout position of a node on the topology canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub external_id: i64,
    pub cluster_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_color: Option<String>,
    pub interfaces: Vec<Interface>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub meta_data: DeviceMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a sync is allowed to overwrite on a device row. Layout position is
/// user-owned; interfaces go through `replace_device_interfaces`.
#[derive(Debug, Clone)]
pub struct UpsertDeviceRequest {
    pub external_id: i64,
    pub cluster_id: i64,
    pub name: String,
    pub device_type: Option<String>,
    pub role: Option<String>,
    pub role_color: Option<String>,
    pub meta_data: DeviceMeta,
}

// ========== Connection ==========

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionMeta {
    #[serde(rename = "type")]
    pub cable_type: Option<String>,
    pub label: String,
    pub color: String,
    pub description: String,
    pub comments: String,
    pub tags: Vec<Value>,
    pub custom_fields: Map<String, Value>,
    pub created: Option<String>,
    pub last_updated: Option<String>,
    pub status: Option<String>,
}

/// Connection is one physical cable between two local devices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: i64,
    pub cluster_id: i64,
    pub external_id: i64,
    pub device_a_id: i64,
    pub interface_a: String,
    pub device_b_id: i64,
    pub interface_b: String,
    pub status: String,
    pub meta_data: ConnectionMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewConnection {
    pub external_id: i64,
    pub device_a_id: i64,
    pub interface_a: String,
    pub device_b_id: i64,
    pub interface_b: String,
    pub status: String,
    pub meta_data: ConnectionMeta,
}

// ========== Device Role ==========

/// DeviceRole pins a display color to a role name. Colors never change
/// once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRole {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub ordinal: i64,
    pub created_at: DateTime<Utc>,
}

// ========== Topology graph ==========

#[derive(Debug, Clone, Serialize)]
pub struct TopologyNode {
    pub id: i64,
    pub label: String,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub role: Option<String>,
    pub role_color: Option<String>,
    pub interfaces: Vec<Interface>,
    pub position: Position,
    pub meta_data: DeviceMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopologyEdge {
    pub id: String,
    pub source: i64,
    pub target: i64,
    pub source_interface: String,
    pub target_interface: String,
    pub status: String,
    pub meta_data: ConnectionMeta,
}

/// Graph view of one cluster, ready for a canvas renderer
#[derive(Debug, Clone, Serialize)]
pub struct TopologyGraph {
    pub cluster: Cluster,
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
}
