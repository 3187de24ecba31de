use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::db::Store;
use crate::models::{ClusterSyncStatus, GlobalSyncStatus};
use crate::netbox::Inventory;

use super::reconciler::Reconciler;
use super::report::{ClusterSyncOutcome, FullSyncReport};
use super::roles::RoleResolver;

const FAILURE_BACKOFF: Duration = Duration::from_secs(60);

/// SyncCoordinator drives full and single-cluster runs, keeps the global
/// connectivity status and owns the optional polling loop
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Store,
    inventory: Arc<dyn Inventory>,
    reconciler: Arc<Reconciler>,
    interval_secs: u64,
}

impl SyncCoordinator {
    pub fn new(store: Store, inventory: Arc<dyn Inventory>, interval_secs: u64) -> Self {
        let roles = Arc::new(RoleResolver::new(store.clone()));
        let reconciler = Arc::new(Reconciler::new(store.clone(), inventory.clone(), roles));
        Self {
            store,
            inventory,
            reconciler,
            interval_secs,
        }
    }

    /// Sync every cluster the inventory knows about, one at a time
    pub async fn trigger_full_sync(&self) -> FullSyncReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("full_sync", run_id = %run_id);
        self.full_sync(run_id).instrument(span).await
    }

    async fn full_sync(&self, run_id: Uuid) -> FullSyncReport {
        tracing::info!("Starting full sync {}", run_id);

        let clusters = match self.inventory.list_clusters().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Failed to list clusters: {}", e);
                self.record_contact(false, false).await;
                return FullSyncReport::failed("Could not reach the inventory");
            }
        };
        if clusters.skipped > 0 {
            tracing::warn!("Skipped {} malformed cluster records", clusters.skipped);
        }

        let mut outcomes = Vec::with_capacity(clusters.items.len());
        for cluster in &clusters.items {
            outcomes.push(self.sync_cluster(cluster.id).await);
        }

        let report = FullSyncReport::from_outcomes(outcomes);
        // the cluster listing answered, so only a failed inventory call
        // during a cluster pass counts as lost contact
        let connected = !report.clusters.iter().any(ClusterSyncOutcome::is_unreachable);
        // an empty inventory is still a successful sync
        let any_completed = report.clusters.is_empty()
            || report
                .clusters
                .iter()
                .any(|c| matches!(c, ClusterSyncOutcome::Completed(_)));
        self.record_contact(connected, report.success && any_completed)
            .await;

        if report.success {
            tracing::info!("Full sync {} finished: {}", run_id, report.message);
        } else {
            tracing::error!("Full sync {} failed: {}", run_id, report.message);
        }
        report
    }

    /// Sync one cluster by inventory id, unless a run already holds it
    pub async fn trigger_cluster_sync(&self, cluster_id: i64) -> ClusterSyncOutcome {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("cluster_sync", run_id = %run_id, cluster_id);
        async {
            let outcome = self.sync_cluster(cluster_id).await;
            match &outcome {
                ClusterSyncOutcome::Completed(_) => self.record_contact(true, true).await,
                ClusterSyncOutcome::Failed { inventory_unreachable, .. } => {
                    self.record_contact(!inventory_unreachable, false).await
                }
                ClusterSyncOutcome::AlreadyInProgress { .. } => {}
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Claim, reconcile, release. The pass runs on its own task so a caller
    /// that goes away (dropped request, timeout) cannot strand the claim.
    async fn sync_cluster(&self, cluster_id: i64) -> ClusterSyncOutcome {
        let coordinator = self.clone();
        let pass = tokio::spawn(
            async move { coordinator.claimed_pass(cluster_id).await }
                .instrument(tracing::Span::current()),
        );

        match pass.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Sync task for cluster {} aborted: {}", cluster_id, e);
                ClusterSyncOutcome::Failed {
                    cluster_id,
                    message: format!("Sync of cluster {} aborted", cluster_id),
                    inventory_unreachable: false,
                }
            }
        }
    }

    async fn claimed_pass(&self, cluster_id: i64) -> ClusterSyncOutcome {
        match self.store.claim_cluster(cluster_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("Sync already in progress for cluster {}", cluster_id);
                return ClusterSyncOutcome::AlreadyInProgress { cluster_id };
            }
            Err(e) => {
                tracing::error!("Failed to claim cluster {}: {}", cluster_id, e);
                return ClusterSyncOutcome::Failed {
                    cluster_id,
                    message: format!("Could not start sync for cluster {}", cluster_id),
                    inventory_unreachable: false,
                };
            }
        }

        let result = self.reconciler.reconcile(cluster_id).await;

        if let Err(e) = self.store.release_cluster(cluster_id).await {
            tracing::error!("Failed to clear sync flag for cluster {}: {}", cluster_id, e);
        }

        match result {
            Ok(report) => ClusterSyncOutcome::Completed(report),
            Err(failure) => {
                tracing::error!("Sync of cluster {} stopped: {}", cluster_id, failure);
                if let Err(e) = self.store.discard_cluster_shell(cluster_id).await {
                    tracing::warn!("Failed to discard empty cluster row {}: {}", cluster_id, e);
                }
                ClusterSyncOutcome::Failed {
                    cluster_id,
                    message: format!(
                        "Sync of cluster {} failed during {}: {}",
                        cluster_id,
                        failure.step,
                        failure.error.summary()
                    ),
                    inventory_unreachable: failure.error.is_connectivity(),
                }
            }
        }
    }

    /// Update the global status; `synced` stamps the last-sync time
    async fn record_contact(&self, connected: bool, synced: bool) {
        let last_sync = synced.then(Utc::now);
        if let Err(e) = self.store.record_contact(connected, last_sync).await {
            tracing::warn!("Failed to record sync status: {}", e);
        }
    }

    pub async fn get_status(&self, cluster_id: i64) -> Result<Option<ClusterSyncStatus>> {
        self.store.cluster_sync_status(cluster_id).await
    }

    pub async fn global_status(&self) -> Result<GlobalSyncStatus> {
        let (connected, last_sync) = self.store.get_sync_state().await?;
        Ok(GlobalSyncStatus {
            connected,
            last_sync,
            interval: self.interval_secs,
        })
    }

    /// Single status call against the inventory; updates only the connected flag
    pub async fn probe(&self) -> bool {
        let connected = match self.inventory.probe().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Inventory probe failed: {}", e);
                false
            }
        };
        self.record_contact(connected, false).await;
        connected
    }

    /// Clear every in-progress flag, for recovery after a crash mid-sync
    pub async fn reset_stuck_flags(&self) -> Result<u64> {
        let cleared = self.store.reset_sync_flags().await?;
        if cleared > 0 {
            tracing::warn!("Cleared {} stuck sync flags", cleared);
        }
        Ok(cleared)
    }

    /// Spawn the continuous loop: full sync, then sleep the interval on
    /// success or a fixed backoff on failure
    pub fn start_polling(&self) -> PollHandle {
        self.start_polling_with(Duration::from_secs(self.interval_secs.max(1)), FAILURE_BACKOFF)
    }

    fn start_polling_with(&self, interval: Duration, failure_backoff: Duration) -> PollHandle {
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        let coordinator = self.clone();

        let task = tokio::spawn(async move {
            tracing::info!("Continuous sync started (interval {}s)", interval.as_secs());
            loop {
                // a run in flight is never interrupted; stop is honored between runs
                match stop_rx.try_recv() {
                    Err(tokio::sync::oneshot::error::TryRecvError::Empty) => {}
                    _ => break,
                }
                let report = coordinator.trigger_full_sync().await;

                let wait = if report.success { interval } else { failure_backoff };
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = &mut stop_rx => break,
                }
            }
            tracing::info!("Continuous sync stopped");
        });

        PollHandle {
            stop_tx: Some(stop_tx),
            task,
        }
    }
}

/// Handle to a running polling loop
pub struct PollHandle {
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl PollHandle {
    /// Signal the loop to stop and wait for it to exit. A sync already
    /// running is allowed to finish first.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            tracing::warn!("Polling task ended abnormally: {}", e);
        }
    }
}
