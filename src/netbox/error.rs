use thiserror::Error;

/// Failure talking to the inventory. Every variant counts as a connectivity
/// failure once it escapes the client.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Client could not be built from the settings (bad URL, TLS setup)
    #[error("Invalid inventory configuration: {0}")]
    Config(String),

    /// Network, TLS or timeout failure after the retry budget was spent
    #[error("Request to {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response. 5xx only reaches here after retries are exhausted.
    #[error("Inventory returned HTTP {status} for {url}")]
    Status { status: u16, url: String, body: String },

    /// A response body that is not the JSON shape we expect
    #[error("Could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl InventoryError {
    /// Whether the same request might succeed if sent again
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Config(_) | Self::Decode { .. } => false,
        }
    }
}
