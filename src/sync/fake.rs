//! Scripted in-process inventory for engine and route tests.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::netbox::types::{NbCable, NbCluster, NbDevice, NbInterface, Records};
use crate::netbox::{Inventory, InventoryError};

#[derive(Default)]
struct State {
    clusters: Vec<NbCluster>,
    devices: HashMap<i64, Vec<NbDevice>>,
    interfaces: HashMap<i64, Vec<NbInterface>>,
    cables: HashMap<i64, Vec<NbCable>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    requested: HashMap<String, usize>,
    skipped_devices: usize,
}

#[derive(Default)]
pub struct FakeInventory {
    state: Mutex<State>,
    calls: AtomicUsize,
}

pub fn cluster(id: i64, name: &str) -> NbCluster {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "type": { "name": "fabric" },
        "status": { "value": "active", "label": "Active" },
        "description": format!("{} fabric", name),
        "tags": [{ "name": "lab" }],
        "device_count": 2
    }))
    .unwrap()
}

pub fn device(id: i64, name: &str, role: &str) -> NbDevice {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "device_type": { "model": "DCS-7050", "manufacturer": { "name": "Arista" } },
        "role": { "name": role },
        "status": { "value": "active", "label": "Active" }
    }))
    .unwrap()
}

pub fn interface(id: i64, name: &str) -> NbInterface {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "type": { "value": "10gbase-x-sfpp", "label": "SFP+" }
    }))
    .unwrap()
}

pub fn cable(id: i64, a: (&str, &str), b: (&str, &str)) -> NbCable {
    serde_json::from_value(json!({
        "id": id,
        "a_terminations": [{ "object": { "device": { "name": a.0 }, "name": a.1 } }],
        "b_terminations": [{ "object": { "device": { "name": b.0 }, "name": b.1 } }],
        "type": "cat6",
        "label": format!("cable-{}", id),
        "status": { "value": "connected", "label": "Connected" }
    }))
    .unwrap()
}

impl FakeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cluster(&self, cluster: NbCluster) {
        let mut state = self.state.lock().unwrap();
        state.clusters.retain(|c| c.id != cluster.id);
        state.clusters.push(cluster);
    }

    pub fn set_devices(&self, cluster_id: i64, devices: Vec<NbDevice>) {
        self.state.lock().unwrap().devices.insert(cluster_id, devices);
    }

    pub fn set_interfaces(&self, device_id: i64, interfaces: Vec<NbInterface>) {
        self.state.lock().unwrap().interfaces.insert(device_id, interfaces);
    }

    pub fn set_cables(&self, device_id: i64, cables: Vec<NbCable>) {
        self.state.lock().unwrap().cables.insert(device_id, cables);
    }

    pub fn set_skipped_devices(&self, skipped: usize) {
        self.state.lock().unwrap().skipped_devices = skipped;
    }

    /// Make an operation fail, e.g. `"interfaces:2"`, `"cluster:42"`, `"probe"`
    pub fn fail(&self, key: &str) {
        self.state.lock().unwrap().failing.insert(key.to_string());
    }

    pub fn heal(&self, key: &str) {
        self.state.lock().unwrap().failing.remove(key);
    }

    /// Hold an operation for `delay` before it answers
    pub fn set_delay(&self, key: &str, delay: Duration) {
        self.state.lock().unwrap().delays.insert(key.to_string(), delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// How many times one operation key was requested
    pub fn calls_for(&self, key: &str) -> usize {
        self.state.lock().unwrap().requested.get(key).copied().unwrap_or(0)
    }

    async fn enter(&self, key: String) -> Result<std::sync::MutexGuard<'_, State>, InventoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = {
            let mut state = self.state.lock().unwrap();
            *state.requested.entry(key.clone()).or_default() += 1;
            state.delays.get(&key).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        if state.failing.contains(&key) {
            return Err(InventoryError::Status {
                status: 503,
                url: format!("fake://{}", key),
                body: "unavailable".to_string(),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl Inventory for FakeInventory {
    async fn list_clusters(&self) -> Result<Records<NbCluster>, InventoryError> {
        let state = self.enter("clusters".to_string()).await?;
        Ok(Records::new(state.clusters.clone()))
    }

    async fn get_cluster(&self, cluster_id: i64) -> Result<NbCluster, InventoryError> {
        let state = self.enter(format!("cluster:{}", cluster_id)).await?;
        state
            .clusters
            .iter()
            .find(|c| c.id == cluster_id)
            .cloned()
            .ok_or_else(|| InventoryError::Status {
                status: 404,
                url: format!("fake://cluster/{}", cluster_id),
                body: "Not found".to_string(),
            })
    }

    async fn list_cluster_devices(&self, cluster_id: i64) -> Result<Records<NbDevice>, InventoryError> {
        let state = self.enter(format!("devices:{}", cluster_id)).await?;
        Ok(Records {
            items: state.devices.get(&cluster_id).cloned().unwrap_or_default(),
            skipped: state.skipped_devices,
        })
    }

    async fn list_device_interfaces(&self, device_id: i64) -> Result<Records<NbInterface>, InventoryError> {
        let state = self.enter(format!("interfaces:{}", device_id)).await?;
        Ok(Records::new(state.interfaces.get(&device_id).cloned().unwrap_or_default()))
    }

    async fn list_device_cables(&self, device_id: i64) -> Result<Records<NbCable>, InventoryError> {
        let state = self.enter(format!("cables:{}", device_id)).await?;
        let (valid, invalid): (Vec<_>, Vec<_>) = state
            .cables
            .get(&device_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .partition(NbCable::is_valid);
        Ok(Records { items: valid, skipped: invalid.len() })
    }

    async fn probe(&self) -> Result<(), InventoryError> {
        self.enter("probe".to_string()).await.map(|_| ())
    }
}
