mod clusters;
mod connections;
mod device_roles;
mod devices;
pub(crate) mod row_helpers;
mod sync_state;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::models::*;

/// Typed "resource not found" error, downcast by the API error handler
#[derive(Debug)]
pub struct NotFoundError {
    pub resource: String,
    pub id: String,
}

impl NotFoundError {
    pub fn new(resource: &str, id: &str) -> Self {
        Self {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found: {}", self.resource, self.id)
    }
}

impl std::error::Error for NotFoundError {}

/// Store is the topology store: every read and write the sync engine and the
/// API make goes through here, delegating to per-entity repo modules.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Create a new database store with a specific pool size
    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory store. A single connection that never idles out,
    /// otherwise SQLite would hand every connection its own empty database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Raw statement against the pool, for breaking the schema in tests
    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ========== Cluster Operations ==========

    pub async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        clusters::ClusterRepo::list(&self.pool).await
    }

    pub async fn get_cluster(&self, external_id: i64) -> Result<Option<Cluster>> {
        clusters::ClusterRepo::get_by_external_id(&self.pool, external_id).await
    }

    pub async fn upsert_cluster(&self, req: &UpsertClusterRequest) -> Result<Cluster> {
        clusters::ClusterRepo::upsert(&self.pool, req).await
    }

    pub async fn claim_cluster(&self, external_id: i64) -> Result<bool> {
        clusters::ClusterRepo::claim(&self.pool, external_id).await
    }

    pub async fn release_cluster(&self, external_id: i64) -> Result<()> {
        clusters::ClusterRepo::release(&self.pool, external_id).await
    }

    pub async fn discard_cluster_shell(&self, external_id: i64) -> Result<bool> {
        clusters::ClusterRepo::discard_shell(&self.pool, external_id).await
    }

    pub async fn mark_cluster_synced(&self, external_id: i64, at: DateTime<Utc>) -> Result<()> {
        clusters::ClusterRepo::mark_synced(&self.pool, external_id, at).await
    }

    pub async fn cluster_sync_status(&self, external_id: i64) -> Result<Option<ClusterSyncStatus>> {
        clusters::ClusterRepo::status(&self.pool, external_id).await
    }

    pub async fn reset_sync_flags(&self) -> Result<u64> {
        clusters::ClusterRepo::reset_all_flags(&self.pool).await
    }

    // ========== Device Operations ==========

    pub async fn list_cluster_devices(&self, cluster_id: i64) -> Result<Vec<Device>> {
        devices::DeviceRepo::list_by_cluster(&self.pool, cluster_id).await
    }

    pub async fn find_device_by_name(&self, cluster_id: i64, name: &str) -> Result<Option<Device>> {
        devices::DeviceRepo::find_by_name(&self.pool, cluster_id, name).await
    }

    pub async fn upsert_device(&self, req: &UpsertDeviceRequest) -> Result<Device> {
        devices::DeviceRepo::upsert(&self.pool, req).await
    }

    pub async fn replace_device_interfaces(&self, id: i64, interfaces: &[Interface]) -> Result<()> {
        devices::DeviceRepo::replace_interfaces(&self.pool, id, interfaces).await
    }

    pub async fn update_device_position(&self, id: i64, position: Position) -> Result<Device> {
        devices::DeviceRepo::update_position(&self.pool, id, position).await
    }

    // ========== Connection Operations ==========

    pub async fn list_cluster_connections(&self, cluster_id: i64) -> Result<Vec<Connection>> {
        connections::ConnectionRepo::list_by_cluster(&self.pool, cluster_id).await
    }

    pub async fn replace_cluster_connections(&self, cluster_id: i64, conns: &[NewConnection]) -> Result<u64> {
        connections::ConnectionRepo::replace_for_cluster(&self.pool, cluster_id, conns).await
    }

    // ========== Device Role Operations ==========

    pub async fn list_device_roles(&self) -> Result<Vec<DeviceRole>> {
        device_roles::DeviceRoleRepo::list(&self.pool).await
    }

    pub async fn get_device_role(&self, name: &str) -> Result<Option<DeviceRole>> {
        device_roles::DeviceRoleRepo::get_by_name(&self.pool, name).await
    }

    pub async fn create_device_role(&self, name: &str, color_for: impl Fn(i64) -> String) -> Result<DeviceRole> {
        device_roles::DeviceRoleRepo::create_next(&self.pool, name, color_for).await
    }

    // ========== Sync State Operations ==========

    pub async fn get_sync_state(&self) -> Result<(bool, Option<DateTime<Utc>>)> {
        sync_state::SyncStateRepo::get(&self.pool).await
    }

    pub async fn record_contact(&self, connected: bool, last_sync: Option<DateTime<Utc>>) -> Result<()> {
        sync_state::SyncStateRepo::record_contact(&self.pool, connected, last_sync).await
    }

    // ========== Topology View ==========

    /// Build the canvas graph for one cluster, looked up by external id
    pub async fn cluster_topology(&self, external_id: i64) -> Result<Option<TopologyGraph>> {
        let cluster = match self.get_cluster(external_id).await? {
            Some(c) if !c.name.is_empty() => c,
            _ => return Ok(None),
        };

        let nodes = self
            .list_cluster_devices(cluster.id)
            .await?
            .into_iter()
            .map(|d| TopologyNode {
                id: d.id,
                label: d.name,
                device_type: d.device_type,
                role: d.role,
                role_color: d.role_color,
                interfaces: d.interfaces,
                position: d.position.unwrap_or(Position { x: 0.0, y: 0.0 }),
                meta_data: d.meta_data,
            })
            .collect();

        let edges = self
            .list_cluster_connections(cluster.id)
            .await?
            .into_iter()
            .map(|c| TopologyEdge {
                id: format!("e{}", c.id),
                source: c.device_a_id,
                target: c.device_b_id,
                source_interface: c.interface_a,
                target_interface: c.interface_b,
                status: c.status,
                meta_data: c.meta_data,
            })
            .collect();

        Ok(Some(TopologyGraph { cluster, nodes, edges }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_req(external_id: i64, name: &str) -> UpsertClusterRequest {
        UpsertClusterRequest {
            external_id,
            name: name.to_string(),
            cluster_type: Some("fabric".to_string()),
            meta_data: ClusterMeta {
                status: Some("active".to_string()),
                device_count: 2,
                ..Default::default()
            },
        }
    }

    fn device_req(external_id: i64, cluster_id: i64, name: &str) -> UpsertDeviceRequest {
        UpsertDeviceRequest {
            external_id,
            cluster_id,
            name: name.to_string(),
            device_type: Some("DCS-7050".to_string()),
            role: Some("leaf".to_string()),
            role_color: Some("#e05151".to_string()),
            meta_data: DeviceMeta::default(),
        }
    }

    fn link(external_id: i64, a: i64, b: i64) -> NewConnection {
        NewConnection {
            external_id,
            device_a_id: a,
            interface_a: "eth0".to_string(),
            device_b_id: b,
            interface_b: "eth1".to_string(),
            status: connection_status::CONNECTED.to_string(),
            meta_data: ConnectionMeta::default(),
        }
    }

    #[tokio::test]
    async fn test_cluster_upsert_is_keyed_by_external_id() {
        let store = Store::in_memory().await.unwrap();
        let first = store.upsert_cluster(&cluster_req(42, "pod-a")).await.unwrap();
        let second = store.upsert_cluster(&cluster_req(42, "pod-a-renamed")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "pod-a-renamed");
        assert_eq!(second.meta_data.device_count, 2);
        assert!(second.last_sync.is_none());
        assert_eq!(store.list_clusters().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_is_single_flight() {
        let store = Store::in_memory().await.unwrap();
        assert!(store.claim_cluster(7).await.unwrap());
        assert!(!store.claim_cluster(7).await.unwrap());

        let status = store.cluster_sync_status(7).await.unwrap().unwrap();
        assert!(status.sync_in_progress);

        store.release_cluster(7).await.unwrap();
        assert!(store.claim_cluster(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_shell_rows_are_hidden_and_discardable() {
        let store = Store::in_memory().await.unwrap();
        store.claim_cluster(9).await.unwrap();
        assert!(store.list_clusters().await.unwrap().is_empty());

        // still claimed: not discarded
        assert!(!store.discard_cluster_shell(9).await.unwrap());
        store.release_cluster(9).await.unwrap();
        assert!(store.discard_cluster_shell(9).await.unwrap());
        assert!(store.get_cluster(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_claim_flag() {
        let store = Store::in_memory().await.unwrap();
        store.claim_cluster(42).await.unwrap();
        let cluster = store.upsert_cluster(&cluster_req(42, "pod-a")).await.unwrap();
        assert!(cluster.sync_in_progress);
    }

    #[tokio::test]
    async fn test_device_upsert_preserves_position_and_interfaces() {
        let store = Store::in_memory().await.unwrap();
        let cluster = store.upsert_cluster(&cluster_req(42, "pod-a")).await.unwrap();
        let dev = store.upsert_device(&device_req(100, cluster.id, "sw1")).await.unwrap();

        let iface = Interface {
            external_id: 5,
            name: "eth0".to_string(),
            interface_type: Some("1000base-t".to_string()),
            enabled: true,
            mgmt_only: false,
            description: String::new(),
            connected_to: None,
        };
        store.replace_device_interfaces(dev.id, &[iface.clone()]).await.unwrap();
        store.update_device_position(dev.id, Position { x: 10.0, y: -4.5 }).await.unwrap();

        let again = store.upsert_device(&device_req(100, cluster.id, "sw1-new")).await.unwrap();
        assert_eq!(again.id, dev.id);
        assert_eq!(again.name, "sw1-new");
        assert_eq!(again.interfaces, vec![iface]);
        assert_eq!(again.position, Some(Position { x: 10.0, y: -4.5 }));
    }

    #[tokio::test]
    async fn test_update_position_unknown_device_is_not_found() {
        let store = Store::in_memory().await.unwrap();
        let err = store
            .update_device_position(999, Position { x: 0.0, y: 0.0 })
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<NotFoundError>().is_some());
    }

    #[tokio::test]
    async fn test_find_by_name_prefers_own_cluster() {
        let store = Store::in_memory().await.unwrap();
        let a = store.upsert_cluster(&cluster_req(1, "pod-a")).await.unwrap();
        let b = store.upsert_cluster(&cluster_req(2, "pod-b")).await.unwrap();
        let in_a = store.upsert_device(&device_req(10, a.id, "core")).await.unwrap();
        let in_b = store.upsert_device(&device_req(20, b.id, "core")).await.unwrap();

        assert_eq!(store.find_device_by_name(a.id, "core").await.unwrap().unwrap().id, in_a.id);
        assert_eq!(store.find_device_by_name(b.id, "core").await.unwrap().unwrap().id, in_b.id);
        assert!(store.find_device_by_name(a.id, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_connections_is_full_replace() {
        let store = Store::in_memory().await.unwrap();
        let cluster = store.upsert_cluster(&cluster_req(42, "pod-a")).await.unwrap();
        let d1 = store.upsert_device(&device_req(1, cluster.id, "sw1")).await.unwrap();
        let d2 = store.upsert_device(&device_req(2, cluster.id, "sw2")).await.unwrap();
        let d3 = store.upsert_device(&device_req(3, cluster.id, "sw3")).await.unwrap();

        let written = store
            .replace_cluster_connections(cluster.id, &[link(1, d1.id, d2.id), link(2, d2.id, d3.id), link(3, d1.id, d3.id)])
            .await
            .unwrap();
        assert_eq!(written, 3);

        store.replace_cluster_connections(cluster.id, &[link(2, d2.id, d3.id)]).await.unwrap();
        let conns = store.list_cluster_connections(cluster.id).await.unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].external_id, 2);
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_connections() {
        let store = Store::in_memory().await.unwrap();
        let cluster = store.upsert_cluster(&cluster_req(42, "pod-a")).await.unwrap();
        let d1 = store.upsert_device(&device_req(1, cluster.id, "sw1")).await.unwrap();
        let d2 = store.upsert_device(&device_req(2, cluster.id, "sw2")).await.unwrap();
        store.replace_cluster_connections(cluster.id, &[link(1, d1.id, d2.id)]).await.unwrap();

        // self-loop violates the CHECK constraint, rolling back the delete
        let result = store.replace_cluster_connections(cluster.id, &[link(2, d1.id, d1.id)]).await;
        assert!(result.is_err());
        let conns = store.list_cluster_connections(cluster.id).await.unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].external_id, 1);
    }

    #[tokio::test]
    async fn test_record_contact_keeps_last_sync_when_absent() {
        let store = Store::in_memory().await.unwrap();
        assert_eq!(store.get_sync_state().await.unwrap(), (false, None));

        let now = Utc::now();
        store.record_contact(true, Some(now)).await.unwrap();
        store.record_contact(false, None).await.unwrap();

        let (connected, last_sync) = store.get_sync_state().await.unwrap();
        assert!(!connected);
        assert_eq!(last_sync.map(|t| t.timestamp()), Some(now.timestamp()));
    }

    #[tokio::test]
    async fn test_cluster_topology_graph() {
        let store = Store::in_memory().await.unwrap();
        let cluster = store.upsert_cluster(&cluster_req(42, "pod-a")).await.unwrap();
        let d1 = store.upsert_device(&device_req(1, cluster.id, "sw1")).await.unwrap();
        let d2 = store.upsert_device(&device_req(2, cluster.id, "sw2")).await.unwrap();
        store.replace_cluster_connections(cluster.id, &[link(900, d1.id, d2.id)]).await.unwrap();

        let graph = store.cluster_topology(42).await.unwrap().unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].position, Position { x: 0.0, y: 0.0 });
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].source, d1.id);
        assert_eq!(graph.edges[0].target, d2.id);
        assert!(store.cluster_topology(43).await.unwrap().is_none());
    }
}
