use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

/// Global sync state database operations (single row, id = 1)
pub struct SyncStateRepo;

impl SyncStateRepo {
    pub async fn get(pool: &Pool<Sqlite>) -> Result<(bool, Option<DateTime<Utc>>)> {
        let row = sqlx::query("SELECT connected, last_sync FROM sync_state WHERE id = 1")
            .fetch_optional(pool)
            .await?;

        Ok(row
            .map(|row| {
                let connected: i32 = row.get("connected");
                (connected == 1, row.get("last_sync"))
            })
            .unwrap_or((false, None)))
    }

    /// Record the outcome of a contact with the inventory. `last_sync` is only
    /// overwritten when a successful sync time is supplied.
    pub async fn record_contact(pool: &Pool<Sqlite>, connected: bool, last_sync: Option<DateTime<Utc>>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (id, connected, last_sync, updated_at) VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                connected = excluded.connected,
                last_sync = COALESCE(excluded.last_sync, sync_state.last_sync),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(connected as i32)
        .bind(last_sync)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }
}
