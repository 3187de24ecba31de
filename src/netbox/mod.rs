pub mod client;
pub mod error;
pub mod retry;
pub mod types;

use async_trait::async_trait;

pub use client::NetBoxClient;
pub use error::InventoryError;
pub use types::{NbCable, NbCluster, NbDevice, NbInterface, Records};

/// Read side of the external inventory the sync engine depends on.
/// List operations drain pagination before returning.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn list_clusters(&self) -> Result<Records<NbCluster>, InventoryError>;

    async fn get_cluster(&self, cluster_id: i64) -> Result<NbCluster, InventoryError>;

    async fn list_cluster_devices(&self, cluster_id: i64) -> Result<Records<NbDevice>, InventoryError>;

    async fn list_device_interfaces(&self, device_id: i64) -> Result<Records<NbInterface>, InventoryError>;

    /// Cables touching the device. Cables missing either end are filtered
    /// out and reported in `skipped`.
    async fn list_device_cables(&self, device_id: i64) -> Result<Records<NbCable>, InventoryError>;

    /// Cheap reachability check
    async fn probe(&self) -> Result<(), InventoryError>;
}

/// Stand-in used when no inventory is configured. Every call fails with a
/// configuration error.
pub struct Unconfigured;

impl Unconfigured {
    fn error() -> InventoryError {
        InventoryError::Config("inventory is not configured".to_string())
    }
}

#[async_trait]
impl Inventory for Unconfigured {
    async fn list_clusters(&self) -> Result<Records<NbCluster>, InventoryError> {
        Err(Self::error())
    }

    async fn get_cluster(&self, _cluster_id: i64) -> Result<NbCluster, InventoryError> {
        Err(Self::error())
    }

    async fn list_cluster_devices(&self, _cluster_id: i64) -> Result<Records<NbDevice>, InventoryError> {
        Err(Self::error())
    }

    async fn list_device_interfaces(&self, _device_id: i64) -> Result<Records<NbInterface>, InventoryError> {
        Err(Self::error())
    }

    async fn list_device_cables(&self, _device_id: i64) -> Result<Records<NbCable>, InventoryError> {
        Err(Self::error())
    }

    async fn probe(&self) -> Result<(), InventoryError> {
        Err(Self::error())
    }
}
