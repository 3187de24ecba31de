use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection settings for the external inventory
#[derive(Clone, Serialize, Deserialize)]
pub struct InventorySettings {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub credential: String,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

fn default_verify_tls() -> bool {
    true
}
fn default_timeout_seconds() -> u64 { 30 }
fn default_poll_interval_seconds() -> u64 { 300 }

impl InventorySettings {
    /// Both a URL and a credential are required before anything is fetched
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.credential.is_empty()
    }
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            credential: String::new(),
            verify_tls: default_verify_tls(),
            timeout_seconds: default_timeout_seconds(),
            poll_interval_seconds: default_poll_interval_seconds(),
        }
    }
}

impl std::fmt::Debug for InventorySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventorySettings")
            .field("base_url", &self.base_url)
            .field("credential", &if self.credential.is_empty() { "" } else { "********" })
            .field("verify_tls", &self.verify_tls)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("poll_interval_seconds", &self.poll_interval_seconds)
            .finish()
    }
}

/// Global sync status: outcome of the most recent contact with the inventory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalSyncStatus {
    pub connected: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub interval: u64,
}
