use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

use crate::models::*;
use super::row_helpers::map_cluster_row;

const SELECT_CLUSTER: &str = r#"
    SELECT id, external_id, name, cluster_type, meta_data, layout_data,
           sync_in_progress, last_sync, created_at, updated_at
    FROM clusters
"#;

/// Cluster database operations
pub struct ClusterRepo;

impl ClusterRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Cluster>> {
        let rows = sqlx::query(&format!("{} WHERE name <> '' ORDER BY name", SELECT_CLUSTER))
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(map_cluster_row).collect())
    }

    pub async fn get_by_external_id(pool: &Pool<Sqlite>, external_id: i64) -> Result<Option<Cluster>> {
        let row = sqlx::query(&format!("{} WHERE external_id = ?", SELECT_CLUSTER))
            .bind(external_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.as_ref().map(map_cluster_row))
    }

    /// Atomically set the in-progress flag. A cluster never seen before gets
    /// an empty shell row. Returns false when another run already holds it.
    pub async fn claim(pool: &Pool<Sqlite>, external_id: i64) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO clusters (external_id, name, sync_in_progress, created_at, updated_at)
            VALUES (?, '', 1, ?, ?)
            ON CONFLICT(external_id) DO UPDATE
                SET sync_in_progress = 1, updated_at = excluded.updated_at
                WHERE clusters.sync_in_progress = 0
            "#,
        )
        .bind(external_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn release(pool: &Pool<Sqlite>, external_id: i64) -> Result<()> {
        sqlx::query("UPDATE clusters SET sync_in_progress = 0 WHERE external_id = ?")
            .bind(external_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Remove a shell row that a failed first sync never filled in
    pub async fn discard_shell(pool: &Pool<Sqlite>, external_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM clusters WHERE external_id = ? AND name = '' AND last_sync IS NULL AND sync_in_progress = 0",
        )
        .bind(external_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert or overwrite descriptive fields. Never touches the sync flag,
    /// the last-sync stamp or the layout.
    pub async fn upsert(pool: &Pool<Sqlite>, req: &UpsertClusterRequest) -> Result<Cluster> {
        let now = Utc::now();
        let meta_json = serde_json::to_string(&req.meta_data)?;
        sqlx::query(
            r#"
            INSERT INTO clusters (external_id, name, cluster_type, meta_data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                name = excluded.name,
                cluster_type = excluded.cluster_type,
                meta_data = excluded.meta_data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(req.external_id)
        .bind(&req.name)
        .bind(&req.cluster_type)
        .bind(&meta_json)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Self::get_by_external_id(pool, req.external_id)
            .await?
            .context("Cluster not found after upsert")
    }

    pub async fn mark_synced(pool: &Pool<Sqlite>, external_id: i64, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE clusters SET last_sync = ?, updated_at = ? WHERE external_id = ?")
            .bind(at)
            .bind(at)
            .bind(external_id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(super::NotFoundError::new("Cluster", &external_id.to_string()).into());
        }
        Ok(())
    }

    pub async fn status(pool: &Pool<Sqlite>, external_id: i64) -> Result<Option<ClusterSyncStatus>> {
        let row = sqlx::query("SELECT sync_in_progress, last_sync FROM clusters WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|row| {
            let in_progress: i32 = row.get("sync_in_progress");
            ClusterSyncStatus {
                sync_in_progress: in_progress == 1,
                last_sync: row.get("last_sync"),
            }
        }))
    }

    /// Clear every in-progress flag. Only safe when no run is active.
    pub async fn reset_all_flags(pool: &Pool<Sqlite>) -> Result<u64> {
        let result = sqlx::query("UPDATE clusters SET sync_in_progress = 0 WHERE sync_in_progress = 1")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
