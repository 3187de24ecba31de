use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::*;

use super::row_helpers::map_device_row;

const SELECT_DEVICE: &str = r#"
    SELECT id, external_id, cluster_id, name, device_type, role, role_color,
           interfaces, position, meta_data, created_at, updated_at
    FROM devices
"#;

/// Device database operations
pub struct DeviceRepo;

impl DeviceRepo {
    pub async fn list_by_cluster(pool: &Pool<Sqlite>, cluster_id: i64) -> Result<Vec<Device>> {
        let rows = sqlx::query(&format!("{} WHERE cluster_id = ? ORDER BY name", SELECT_DEVICE))
            .bind(cluster_id)
            .fetch_all(pool)
            .await?;

        Ok(rows.iter().map(map_device_row).collect())
    }

    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Device>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_DEVICE))
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(row.as_ref().map(map_device_row))
    }

    pub async fn get_by_external_id(pool: &Pool<Sqlite>, external_id: i64) -> Result<Option<Device>> {
        let row = sqlx::query(&format!("{} WHERE external_id = ?", SELECT_DEVICE))
            .bind(external_id)
            .fetch_optional(pool)
            .await?;

        Ok(row.as_ref().map(map_device_row))
    }

    /// Look a device up by name, preferring one that belongs to `cluster_id`
    pub async fn find_by_name(pool: &Pool<Sqlite>, cluster_id: i64, name: &str) -> Result<Option<Device>> {
        let row = sqlx::query(&format!(
            "{} WHERE name = ? ORDER BY (cluster_id = ?) DESC, id LIMIT 1",
            SELECT_DEVICE
        ))
        .bind(name)
        .bind(cluster_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.as_ref().map(map_device_row))
    }

    /// Insert or overwrite a device by external id, re-attaching it to the
    /// given cluster. Interfaces and position are left as they are.
    pub async fn upsert(pool: &Pool<Sqlite>, req: &UpsertDeviceRequest) -> Result<Device> {
        let now = Utc::now();
        let meta_json = serde_json::to_string(&req.meta_data)?;
        sqlx::query(
            r#"
            INSERT INTO devices (external_id, cluster_id, name, device_type, role, role_color,
                                 meta_data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                cluster_id = excluded.cluster_id,
                name = excluded.name,
                device_type = excluded.device_type,
                role = excluded.role,
                role_color = excluded.role_color,
                meta_data = excluded.meta_data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(req.external_id)
        .bind(req.cluster_id)
        .bind(&req.name)
        .bind(&req.device_type)
        .bind(&req.role)
        .bind(&req.role_color)
        .bind(&meta_json)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Self::get_by_external_id(pool, req.external_id)
            .await?
            .context("Device not found after upsert")
    }

    /// Replace the whole interface list of a device
    pub async fn replace_interfaces(pool: &Pool<Sqlite>, id: i64, interfaces: &[Interface]) -> Result<()> {
        let json = serde_json::to_string(interfaces)?;
        let result = sqlx::query("UPDATE devices SET interfaces = ?, updated_at = ? WHERE id = ?")
            .bind(&json)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(super::NotFoundError::new("Device", &id.to_string()).into());
        }
        Ok(())
    }

    pub async fn update_position(pool: &Pool<Sqlite>, id: i64, position: Position) -> Result<Device> {
        let json = serde_json::to_string(&position)?;
        let result = sqlx::query("UPDATE devices SET position = ?, updated_at = ? WHERE id = ?")
            .bind(&json)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(super::NotFoundError::new("Device", &id.to_string()).into());
        }
        Self::get(pool, id).await?.context("Device not found after update")
    }
}
