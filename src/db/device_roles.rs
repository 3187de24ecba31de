use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::*;
use super::row_helpers::map_device_role_row;

// ========== Device Role Repo ==========

pub struct DeviceRoleRepo;

impl DeviceRoleRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<DeviceRole>> {
        let rows = sqlx::query("SELECT id, name, color, ordinal, created_at FROM device_roles ORDER BY ordinal")
            .fetch_all(pool).await?;
        Ok(rows.iter().map(map_device_role_row).collect())
    }

    pub async fn get_by_name(pool: &Pool<Sqlite>, name: &str) -> Result<Option<DeviceRole>> {
        let row = sqlx::query("SELECT id, name, color, ordinal, created_at FROM device_roles WHERE name = ?")
            .bind(name).fetch_optional(pool).await?;
        Ok(row.as_ref().map(map_device_role_row))
    }

    /// Create a role at the next free ordinal, coloring it with `color_for`.
    /// Callers serialize access; the unique ordinal guards against writers in
    /// other processes.
    pub async fn create_next(
        pool: &Pool<Sqlite>,
        name: &str,
        color_for: impl Fn(i64) -> String,
    ) -> Result<DeviceRole> {
        let mut tx = pool.begin().await?;

        let (ordinal,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(ordinal) + 1, 0) FROM device_roles")
            .fetch_one(&mut *tx).await?;

        sqlx::query(
            "INSERT INTO device_roles (name, color, ordinal, created_at) VALUES (?, ?, ?, ?) ON CONFLICT(name) DO NOTHING"
        )
        .bind(name)
        .bind(color_for(ordinal))
        .bind(ordinal)
        .bind(Utc::now())
        .execute(&mut *tx).await?;

        tx.commit().await?;
        Self::get_by_name(pool, name).await?.context("DeviceRole not found after creation")
    }
}
