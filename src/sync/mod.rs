//! Sync engine: reconciles inventory clusters into the topology store.

mod coordinator;
mod error;
mod reconciler;
mod report;
mod roles;

#[cfg(test)]
pub(crate) mod fake;

pub use coordinator::{PollHandle, SyncCoordinator};
pub use error::SyncError;
pub use reconciler::{ReconcileFailure, Reconciler, SyncStep};
pub use report::{ClusterReport, ClusterSyncOutcome, FullSyncReport};
pub use roles::RoleResolver;
