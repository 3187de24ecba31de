use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::db::Store;
use crate::models::*;
use crate::netbox::types::{CableEnd, NbCable, NbCluster, NbDevice, NbInterface};
use crate::netbox::Inventory;

use super::error::SyncError;
use super::report::ClusterReport;
use super::roles::RoleResolver;

/// Steps of one cluster pass, in commit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    FetchCluster,
    UpsertCluster,
    FetchDevices,
    UpsertDevices,
    FetchCables,
    ReconcileConnections,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchCluster => "fetch cluster",
            Self::UpsertCluster => "upsert cluster",
            Self::FetchDevices => "fetch devices",
            Self::UpsertDevices => "upsert devices",
            Self::FetchCables => "fetch cables",
            Self::ReconcileConnections => "reconcile connections",
        };
        f.write_str(name)
    }
}

/// A cluster-fatal error and the step it stopped at. Everything committed by
/// earlier steps stays committed.
#[derive(Debug, Error)]
#[error("{step} failed: {error}")]
pub struct ReconcileFailure {
    pub step: SyncStep,
    #[source]
    pub error: SyncError,
}

/// A device upserted during the current pass
struct SyncedDevice {
    inventory_id: i64,
    local: Device,
}

/// Reconciler mirrors one inventory cluster into the topology store
pub struct Reconciler {
    store: Store,
    inventory: Arc<dyn Inventory>,
    roles: Arc<RoleResolver>,
}

impl Reconciler {
    pub fn new(store: Store, inventory: Arc<dyn Inventory>, roles: Arc<RoleResolver>) -> Self {
        Self { store, inventory, roles }
    }

    /// Run every step for one cluster. The caller owns the in-progress flag.
    pub async fn reconcile(&self, cluster_id: i64) -> Result<ClusterReport, ReconcileFailure> {
        let mut step = SyncStep::FetchCluster;
        match self.run(cluster_id, &mut step).await {
            Ok(report) => Ok(report),
            Err(error) => Err(ReconcileFailure { step, error }),
        }
    }

    async fn run(&self, cluster_id: i64, step: &mut SyncStep) -> Result<ClusterReport, SyncError> {
        let mut report = ClusterReport {
            cluster_id,
            ..Default::default()
        };

        *step = SyncStep::FetchCluster;
        let nb_cluster = self.inventory.get_cluster(cluster_id).await?;

        *step = SyncStep::UpsertCluster;
        let cluster = self.store.upsert_cluster(&cluster_request(&nb_cluster)).await?;
        report.cluster_name = cluster.name.clone();
        tracing::info!("Syncing cluster {} ({})", cluster.name, cluster_id);

        *step = SyncStep::FetchDevices;
        let fetched = self.inventory.list_cluster_devices(cluster_id).await?;
        if fetched.skipped > 0 {
            report.devices_skipped += fetched.skipped;
            report
                .errors
                .push(format!("{} device records could not be decoded", fetched.skipped));
        }

        *step = SyncStep::UpsertDevices;
        let mut synced = Vec::with_capacity(fetched.items.len());
        for nb_device in &fetched.items {
            match self.upsert_device(cluster.id, nb_device, &mut report).await {
                Ok(device) => synced.push(device),
                Err(e @ SyncError::DataShape { .. }) => {
                    tracing::warn!("{}", e);
                    report.devices_skipped += 1;
                    report.errors.push(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        *step = SyncStep::FetchCables;
        let cables = self.collect_cables(&synced, &mut report).await?;

        *step = SyncStep::ReconcileConnections;
        let connections = self.resolve_connections(cluster.id, &cables, &mut report).await?;
        report.connections_written = self
            .store
            .replace_cluster_connections(cluster.id, &connections)
            .await?;

        self.store.mark_cluster_synced(cluster_id, Utc::now()).await?;

        tracing::info!(
            "Cluster {} synced: {} devices, {} interfaces, {} connections ({} duplicate, {} invalid, {} unresolved cables)",
            report.cluster_name,
            report.devices_upserted,
            report.interfaces_written,
            report.connections_written,
            report.duplicate_cables,
            report.invalid_cables,
            report.unresolved_cables
        );
        Ok(report)
    }

    /// Upsert one device and replace its interface list
    async fn upsert_device(
        &self,
        cluster_id: i64,
        nb: &NbDevice,
        report: &mut ClusterReport,
    ) -> Result<SyncedDevice, SyncError> {
        let name = nb.name.as_deref().map(str::trim).unwrap_or("");
        if name.is_empty() {
            return Err(SyncError::DataShape {
                kind: "device",
                id: nb.id,
                reason: "missing name".to_string(),
            });
        }

        let role_name = nb.role.as_ref().map(|r| r.name.as_str()).unwrap_or("");
        let role = self.roles.get_or_create(role_name).await?;

        let req = UpsertDeviceRequest {
            external_id: nb.id,
            cluster_id,
            name: name.to_string(),
            device_type: nb.device_type.as_ref().and_then(|t| t.model.clone()),
            role: role.as_ref().map(|r| r.name.clone()),
            role_color: role.map(|r| r.color),
            meta_data: device_meta(nb),
        };
        let local = self.store.upsert_device(&req).await?;
        report.devices_upserted += 1;

        let fetched = self.inventory.list_device_interfaces(nb.id).await?;
        if fetched.skipped > 0 {
            tracing::warn!("Skipped {} malformed interfaces on {}", fetched.skipped, name);
            report
                .errors
                .push(format!("{}: {} interface records could not be decoded", name, fetched.skipped));
        }
        let interfaces: Vec<Interface> = fetched.items.iter().map(interface_from).collect();
        self.store.replace_device_interfaces(local.id, &interfaces).await?;
        report.interfaces_written += interfaces.len();

        tracing::debug!("Upserted device {} with {} interfaces", name, interfaces.len());
        Ok(SyncedDevice {
            inventory_id: nb.id,
            local,
        })
    }

    /// Fetch cables for every device synced in this pass, keeping the first
    /// sighting of each cable id
    async fn collect_cables(
        &self,
        devices: &[SyncedDevice],
        report: &mut ClusterReport,
    ) -> Result<Vec<NbCable>, SyncError> {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();

        for device in devices {
            let fetched = self.inventory.list_device_cables(device.inventory_id).await?;
            report.invalid_cables += fetched.skipped;

            for cable in fetched.items {
                report.cables_seen += 1;
                if seen.insert(cable.id) {
                    unique.push(cable);
                } else {
                    report.duplicate_cables += 1;
                    tracing::debug!("Cable {} already seen, reported again by {}", cable.id, device.local.name);
                }
            }
        }

        Ok(unique)
    }

    async fn resolve_connections(
        &self,
        cluster_id: i64,
        cables: &[NbCable],
        report: &mut ClusterReport,
    ) -> Result<Vec<NewConnection>, SyncError> {
        let mut by_name: HashMap<String, Option<i64>> = HashMap::new();
        let mut connections = Vec::with_capacity(cables.len());

        for cable in cables {
            match self.resolve_cable(cluster_id, cable, &mut by_name).await {
                Ok(conn) => connections.push(conn),
                Err(e @ SyncError::Referential { .. }) => {
                    tracing::warn!("{}", e);
                    report.unresolved_cables += 1;
                    report.errors.push(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(connections)
    }

    async fn resolve_cable(
        &self,
        cluster_id: i64,
        cable: &NbCable,
        by_name: &mut HashMap<String, Option<i64>>,
    ) -> Result<NewConnection, SyncError> {
        let unresolved = |reason: String| SyncError::Referential {
            cable_id: cable.id,
            reason,
        };

        let (a, b) = cable
            .endpoints()
            .ok_or_else(|| unresolved("missing termination".to_string()))?;

        let device_a = self
            .lookup_device(cluster_id, &a, by_name)
            .await?
            .ok_or_else(|| unresolved(format!("device {} not found", a.device)))?;
        let device_b = self
            .lookup_device(cluster_id, &b, by_name)
            .await?
            .ok_or_else(|| unresolved(format!("device {} not found", b.device)))?;

        if device_a == device_b {
            return Err(unresolved(format!("both ends on device {}", a.device)));
        }

        Ok(NewConnection {
            external_id: cable.id,
            device_a_id: device_a,
            interface_a: a.interface,
            device_b_id: device_b,
            interface_b: b.interface,
            status: cable
                .status
                .as_ref()
                .map(|s| s.value.clone())
                .unwrap_or_else(|| connection_status::CONNECTED.to_string()),
            meta_data: connection_meta(cable),
        })
    }

    async fn lookup_device(
        &self,
        cluster_id: i64,
        end: &CableEnd,
        by_name: &mut HashMap<String, Option<i64>>,
    ) -> Result<Option<i64>, SyncError> {
        if let Some(id) = by_name.get(&end.device) {
            return Ok(*id);
        }
        let id = self
            .store
            .find_device_by_name(cluster_id, &end.device)
            .await?
            .map(|d| d.id);
        by_name.insert(end.device.clone(), id);
        Ok(id)
    }
}

// ========== Inventory → store mapping ==========

fn cluster_request(nb: &NbCluster) -> UpsertClusterRequest {
    UpsertClusterRequest {
        external_id: nb.id,
        name: nb.name.clone(),
        cluster_type: nb.cluster_type.as_ref().map(|t| t.name.clone()),
        meta_data: ClusterMeta {
            description: nb.description.clone().unwrap_or_default(),
            comments: nb.comments.clone().unwrap_or_default(),
            tags: nb.tags.clone(),
            custom_fields: nb.custom_fields.clone().unwrap_or_default(),
            created: nb.created.clone(),
            last_updated: nb.last_updated.clone(),
            status: nb.status.as_ref().map(|s| s.value.clone()),
            device_count: nb.device_count.unwrap_or(0),
        },
    }
}

fn device_meta(nb: &NbDevice) -> DeviceMeta {
    DeviceMeta {
        manufacturer: nb
            .device_type
            .as_ref()
            .and_then(|t| t.manufacturer.as_ref())
            .map(|m| m.name.clone()),
        status: nb.status.as_ref().map(|s| s.value.clone()),
        description: nb.description.clone().unwrap_or_default(),
        comments: nb.comments.clone().unwrap_or_default(),
        tags: nb.tags.clone(),
        custom_fields: nb.custom_fields.clone().unwrap_or_default(),
        created: nb.created.clone(),
        last_updated: nb.last_updated.clone(),
    }
}

fn interface_from(nb: &NbInterface) -> Interface {
    Interface {
        external_id: nb.id,
        name: nb.name.clone(),
        interface_type: nb.iface_type.as_ref().map(|t| t.value.clone()),
        enabled: nb.enabled,
        mgmt_only: nb.mgmt_only,
        description: nb.description.clone().unwrap_or_default(),
        connected_to: nb.peer().map(|p| PeerPointer {
            device: p.device,
            interface: p.interface,
        }),
    }
}

fn connection_meta(cable: &NbCable) -> ConnectionMeta {
    ConnectionMeta {
        cable_type: cable.cable_type.clone(),
        label: cable.label.clone().unwrap_or_default(),
        color: cable.color.clone().unwrap_or_default(),
        description: cable.description.clone().unwrap_or_default(),
        comments: cable.comments.clone().unwrap_or_default(),
        tags: cable.tags.clone(),
        custom_fields: cable.custom_fields.clone().unwrap_or_default(),
        created: cable.created.clone(),
        last_updated: cable.last_updated.clone(),
        status: cable.status.as_ref().map(|s| s.value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::fake::{self, FakeInventory};

    async fn setup() -> (Store, Arc<FakeInventory>, Reconciler) {
        let store = Store::in_memory().await.unwrap();
        let inventory = Arc::new(FakeInventory::new());
        let roles = Arc::new(RoleResolver::new(store.clone()));
        let reconciler = Reconciler::new(store.clone(), inventory.clone(), roles);
        (store, inventory, reconciler)
    }

    /// Cluster 42 with sw1 and sw2; cable 900 reported from both ends
    fn seed_pod(inv: &FakeInventory) {
        inv.add_cluster(fake::cluster(42, "pod-a"));
        inv.set_devices(42, vec![fake::device(1, "sw1", "leaf"), fake::device(2, "sw2", "spine")]);
        inv.set_interfaces(1, vec![fake::interface(11, "eth0")]);
        inv.set_interfaces(2, vec![fake::interface(21, "eth0")]);
        let c900 = fake::cable(900, ("sw1", "eth0 (sw1 side)"), ("sw2", "eth0"));
        inv.set_cables(1, vec![c900.clone()]);
        inv.set_cables(2, vec![c900]);
    }

    async fn local_cluster_id(store: &Store, external_id: i64) -> i64 {
        store.get_cluster(external_id).await.unwrap().unwrap().id
    }

    #[tokio::test]
    async fn test_cable_seen_from_both_ends_is_one_connection() {
        let (store, inv, reconciler) = setup().await;
        seed_pod(&inv);

        let report = reconciler.reconcile(42).await.unwrap();
        assert_eq!(report.devices_upserted, 2);
        assert_eq!(report.cables_seen, 2);
        assert_eq!(report.duplicate_cables, 1);
        assert_eq!(report.connections_written, 1);

        let cid = local_cluster_id(&store, 42).await;
        let conns = store.list_cluster_connections(cid).await.unwrap();
        assert_eq!(conns.len(), 1);
        let sw1 = store.find_device_by_name(cid, "sw1").await.unwrap().unwrap();
        let sw2 = store.find_device_by_name(cid, "sw2").await.unwrap().unwrap();
        assert_eq!(conns[0].external_id, 900);
        assert_eq!(conns[0].device_a_id, sw1.id);
        assert_eq!(conns[0].interface_a, "eth0 (sw1 side)");
        assert_eq!(conns[0].device_b_id, sw2.id);
        assert_eq!(conns[0].interface_b, "eth0");
        assert_eq!(conns[0].status, "connected");
        assert_eq!(conns[0].meta_data.label, "cable-900");
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let (store, inv, reconciler) = setup().await;
        seed_pod(&inv);

        reconciler.reconcile(42).await.unwrap();
        let cid = local_cluster_id(&store, 42).await;
        let devices_before = store.list_cluster_devices(cid).await.unwrap();

        reconciler.reconcile(42).await.unwrap();
        assert_eq!(store.list_clusters().await.unwrap().len(), 1);
        assert_eq!(local_cluster_id(&store, 42).await, cid);

        let devices_after = store.list_cluster_devices(cid).await.unwrap();
        assert_eq!(devices_before.len(), devices_after.len());
        for (before, after) in devices_before.iter().zip(&devices_after) {
            assert_eq!(before.id, after.id);
            assert_eq!(before.name, after.name);
            assert_eq!(before.role_color, after.role_color);
            assert_eq!(before.interfaces, after.interfaces);
        }
        assert_eq!(store.list_cluster_connections(cid).await.unwrap().len(), 1);
        assert_eq!(store.list_device_roles().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_connections_are_fully_replaced() {
        let (store, inv, reconciler) = setup().await;
        inv.add_cluster(fake::cluster(42, "pod-a"));
        inv.set_devices(
            42,
            vec![fake::device(1, "sw1", "leaf"), fake::device(2, "sw2", "leaf"), fake::device(3, "sw3", "leaf")],
        );
        inv.set_cables(
            1,
            vec![
                fake::cable(1, ("sw1", "eth1"), ("sw2", "eth1")),
                fake::cable(3, ("sw1", "eth2"), ("sw3", "eth2")),
            ],
        );
        inv.set_cables(2, vec![fake::cable(2, ("sw2", "eth3"), ("sw3", "eth3"))]);

        reconciler.reconcile(42).await.unwrap();
        let cid = local_cluster_id(&store, 42).await;
        assert_eq!(store.list_cluster_connections(cid).await.unwrap().len(), 3);

        inv.set_cables(1, vec![]);
        inv.set_cables(3, vec![]);
        reconciler.reconcile(42).await.unwrap();

        let conns = store.list_cluster_connections(cid).await.unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].external_id, 2);
    }

    #[tokio::test]
    async fn test_interface_failure_keeps_earlier_devices() {
        let (store, inv, reconciler) = setup().await;
        seed_pod(&inv);
        inv.fail("interfaces:2");

        let failure = reconciler.reconcile(42).await.unwrap_err();
        assert_eq!(failure.step, SyncStep::UpsertDevices);
        assert!(failure.error.is_connectivity());

        let cid = local_cluster_id(&store, 42).await;
        let devices = store.list_cluster_devices(cid).await.unwrap();
        let sw1 = devices.iter().find(|d| d.name == "sw1").unwrap();
        assert_eq!(sw1.interfaces.len(), 1);
        assert!(store.get_cluster(42).await.unwrap().unwrap().last_sync.is_none());
    }

    #[tokio::test]
    async fn test_cable_fetch_failure_keeps_previous_connections() {
        let (store, inv, reconciler) = setup().await;
        seed_pod(&inv);
        reconciler.reconcile(42).await.unwrap();
        let first_sync = store.get_cluster(42).await.unwrap().unwrap().last_sync;

        inv.fail("cables:2");
        let failure = reconciler.reconcile(42).await.unwrap_err();
        assert_eq!(failure.step, SyncStep::FetchCables);

        let cid = local_cluster_id(&store, 42).await;
        assert_eq!(store.list_cluster_connections(cid).await.unwrap().len(), 1);
        assert_eq!(store.get_cluster(42).await.unwrap().unwrap().last_sync, first_sync);
    }

    #[tokio::test]
    async fn test_unresolvable_cables_are_skipped() {
        let (store, inv, reconciler) = setup().await;
        seed_pod(&inv);
        inv.set_cables(
            1,
            vec![
                fake::cable(900, ("sw1", "eth0"), ("sw2", "eth0")),
                fake::cable(901, ("sw1", "eth5"), ("ghost", "eth0")),
                fake::cable(902, ("sw1", "eth6"), ("sw1", "eth7")),
            ],
        );

        let report = reconciler.reconcile(42).await.unwrap();
        assert_eq!(report.unresolved_cables, 2);
        assert_eq!(report.connections_written, 1);
        assert_eq!(report.errors.len(), 2);

        let cid = local_cluster_id(&store, 42).await;
        assert_eq!(store.list_cluster_connections(cid).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_cables_are_counted() {
        let (_store, inv, reconciler) = setup().await;
        seed_pod(&inv);
        let mut dangling = fake::cable(905, ("sw1", "eth9"), ("sw2", "eth9"));
        dangling.b_terminations.clear();
        inv.set_cables(2, vec![dangling]);

        let report = reconciler.reconcile(42).await.unwrap();
        assert_eq!(report.invalid_cables, 1);
        assert_eq!(report.connections_written, 1);
    }

    #[tokio::test]
    async fn test_nameless_device_is_skipped() {
        let (store, inv, reconciler) = setup().await;
        seed_pod(&inv);
        let mut nameless = fake::device(3, "x", "leaf");
        nameless.name = None;
        inv.set_devices(42, vec![fake::device(1, "sw1", "leaf"), nameless, fake::device(2, "sw2", "spine")]);
        inv.set_skipped_devices(1);

        let report = reconciler.reconcile(42).await.unwrap();
        assert_eq!(report.devices_upserted, 2);
        assert_eq!(report.devices_skipped, 2);

        let cid = local_cluster_id(&store, 42).await;
        assert_eq!(store.list_cluster_devices(cid).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_device_fields_are_mapped() {
        let (store, inv, reconciler) = setup().await;
        seed_pod(&inv);
        reconciler.reconcile(42).await.unwrap();

        let cluster = store.get_cluster(42).await.unwrap().unwrap();
        assert_eq!(cluster.name, "pod-a");
        assert_eq!(cluster.cluster_type.as_deref(), Some("fabric"));
        assert_eq!(cluster.meta_data.status.as_deref(), Some("active"));
        assert!(cluster.last_sync.is_some());

        let sw1 = store.find_device_by_name(cluster.id, "sw1").await.unwrap().unwrap();
        assert_eq!(sw1.device_type.as_deref(), Some("DCS-7050"));
        assert_eq!(sw1.role.as_deref(), Some("leaf"));
        assert_eq!(sw1.role_color.as_deref(), Some("#e05151"));
        assert_eq!(sw1.meta_data.manufacturer.as_deref(), Some("Arista"));
        assert_eq!(sw1.interfaces[0].interface_type.as_deref(), Some("10gbase-x-sfpp"));
    }
}
