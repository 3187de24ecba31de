use serde::Serialize;

/// Step report for one cluster pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterReport {
    pub cluster_id: i64,
    pub cluster_name: String,
    pub devices_upserted: usize,
    pub devices_skipped: usize,
    pub interfaces_written: usize,
    pub cables_seen: usize,
    pub duplicate_cables: usize,
    pub invalid_cables: usize,
    pub unresolved_cables: usize,
    pub connections_written: u64,
    /// Record-level problems that were skipped, not fatal
    pub errors: Vec<String>,
}

/// Result of a single-cluster trigger
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClusterSyncOutcome {
    Completed(ClusterReport),
    /// Another run holds the cluster; nothing was fetched
    AlreadyInProgress { cluster_id: i64 },
    Failed {
        cluster_id: i64,
        message: String,
        /// The pass stopped because an inventory call failed
        inventory_unreachable: bool,
    },
}

impl ClusterSyncOutcome {
    pub fn cluster_id(&self) -> i64 {
        match self {
            Self::Completed(r) => r.cluster_id,
            Self::AlreadyInProgress { cluster_id } | Self::Failed { cluster_id, .. } => *cluster_id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Failed { inventory_unreachable: true, .. })
    }

    /// One-line summary for API responses
    pub fn message(&self) -> String {
        match self {
            Self::Completed(r) => format!(
                "Synced cluster {}: {} devices, {} connections",
                r.cluster_name, r.devices_upserted, r.connections_written
            ),
            Self::AlreadyInProgress { cluster_id } => format!("Sync already in progress for cluster {}", cluster_id),
            Self::Failed { message, .. } => message.clone(),
        }
    }
}

/// Aggregate of a full multi-cluster run
#[derive(Debug, Clone, Serialize)]
pub struct FullSyncReport {
    pub success: bool,
    pub message: String,
    pub clusters: Vec<ClusterSyncOutcome>,
}

impl FullSyncReport {
    /// A run fails only if every attempted cluster failed
    pub fn from_outcomes(clusters: Vec<ClusterSyncOutcome>) -> Self {
        let total = clusters.len();
        let failed = clusters.iter().filter(|c| c.is_failure()).count();

        let (success, message) = if total == 0 {
            (true, "No clusters to sync".to_string())
        } else if failed == total {
            (false, format!("All {} clusters failed to sync", total))
        } else if failed > 0 {
            (true, format!("Synced {} of {} clusters ({} failed)", total - failed, total, failed))
        } else {
            (true, format!("Synced {} clusters", total))
        };

        Self { success, message, clusters }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            clusters: Vec::new(),
        }
    }
}
