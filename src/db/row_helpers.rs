use serde::de::DeserializeOwned;
use sqlx::{Row, sqlite::SqliteRow};

use crate::models::*;

/// Filter empty strings to None; nullable text columns may hold ''
pub fn none_if_empty(opt: Option<String>) -> Option<String> {
    opt.filter(|s| !s.is_empty())
}

/// Decode a JSON text column, falling back to the type's default on bad data
pub fn json_column<T: DeserializeOwned + Default>(row: &SqliteRow, column: &str) -> T {
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

/// Map a SQLite row to a Cluster struct
pub fn map_cluster_row(row: &SqliteRow) -> Cluster {
    let sync_in_progress: i32 = row.get("sync_in_progress");
    Cluster {
        id: row.get("id"),
        external_id: row.get("external_id"),
        name: row.get("name"),
        cluster_type: none_if_empty(row.get("cluster_type")),
        meta_data: json_column(row, "meta_data"),
        layout_data: json_column(row, "layout_data"),
        sync_in_progress: sync_in_progress == 1,
        last_sync: row.get("last_sync"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a Device struct
pub fn map_device_row(row: &SqliteRow) -> Device {
    let position: Option<Position> = row
        .try_get::<Option<String>, _>("position")
        .ok()
        .flatten()
        .and_then(|s| serde_json::from_str(&s).ok());
    Device {
        id: row.get("id"),
        external_id: row.get("external_id"),
        cluster_id: row.get("cluster_id"),
        name: row.get("name"),
        device_type: none_if_empty(row.get("device_type")),
        role: none_if_empty(row.get("role")),
        role_color: none_if_empty(row.get("role_color")),
        interfaces: json_column(row, "interfaces"),
        position,
        meta_data: json_column(row, "meta_data"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a Connection struct
pub fn map_connection_row(row: &SqliteRow) -> Connection {
    Connection {
        id: row.get("id"),
        cluster_id: row.get("cluster_id"),
        external_id: row.get("external_id"),
        device_a_id: row.get("device_a_id"),
        interface_a: row.get("interface_a"),
        device_b_id: row.get("device_b_id"),
        interface_b: row.get("interface_b"),
        status: row.get::<Option<String>, _>("status").unwrap_or_default(),
        meta_data: json_column(row, "meta_data"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a DeviceRole struct
pub fn map_device_role_row(row: &SqliteRow) -> DeviceRole {
    DeviceRole {
        id: row.get("id"),
        name: row.get("name"),
        color: row.get("color"),
        ordinal: row.get("ordinal"),
        created_at: row.get("created_at"),
    }
}
