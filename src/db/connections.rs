use anyhow::Result;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::*;

use super::row_helpers::map_connection_row;

/// Connection database operations
pub struct ConnectionRepo;

impl ConnectionRepo {
    pub async fn list_by_cluster(pool: &Pool<Sqlite>, cluster_id: i64) -> Result<Vec<Connection>> {
        let rows = sqlx::query(
            r#"
            SELECT id, cluster_id, external_id, device_a_id, interface_a, device_b_id, interface_b,
                   status, meta_data, created_at, updated_at
            FROM connections WHERE cluster_id = ?
            ORDER BY external_id
            "#,
        )
        .bind(cluster_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.iter().map(map_connection_row).collect())
    }

    /// Delete every connection owned by the cluster and insert the new set,
    /// all in one transaction.
    pub async fn replace_for_cluster(
        pool: &Pool<Sqlite>,
        cluster_id: i64,
        connections: &[NewConnection],
    ) -> Result<u64> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM connections WHERE cluster_id = ?")
            .bind(cluster_id)
            .execute(&mut *tx)
            .await?;

        let mut written = 0;
        for conn in connections {
            let meta_json = serde_json::to_string(&conn.meta_data)?;
            sqlx::query(
                r#"
                INSERT INTO connections (cluster_id, external_id, device_a_id, interface_a,
                                         device_b_id, interface_b, status, meta_data, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(cluster_id)
            .bind(conn.external_id)
            .bind(conn.device_a_id)
            .bind(&conn.interface_a)
            .bind(conn.device_b_id)
            .bind(&conn.interface_b)
            .bind(&conn.status)
            .bind(&meta_json)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            written += 1;
        }

        tx.commit().await?;
        Ok(written)
    }
}
