use thiserror::Error;

use crate::netbox::InventoryError;

/// Errors raised while reconciling a cluster.
///
/// `Connectivity` and `Store` are cluster-fatal: they stop the remaining
/// steps of the current cluster. `DataShape` and `Referential` are record
/// level: the reconciler logs them, counts them in the report and moves on.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Inventory unreachable: {0}")]
    Connectivity(#[from] InventoryError),

    #[error("{kind} {id} skipped: {reason}")]
    DataShape { kind: &'static str, id: i64, reason: String },

    #[error("Cable {cable_id} skipped: {reason}")]
    Referential { cable_id: i64, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl SyncError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    /// Short message for API consumers, without nested error text
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "Could not reach the inventory",
            Self::DataShape { .. } => "Inventory record was malformed",
            Self::Referential { .. } => "Cable endpoint could not be resolved",
            Self::Store(_) => "Failed to write to the topology store",
        }
    }
}
