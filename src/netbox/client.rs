use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;

use crate::models::InventorySettings;

use super::error::InventoryError;
use super::retry::RetryPolicy;
use super::types::*;
use super::Inventory;

const DEFAULT_PAGE_SIZE: u32 = 100;

/// NetBox API client
pub struct NetBoxClient {
    base_url: String,
    token: String,
    client: Client,
    retry: RetryPolicy,
    page_size: u32,
}

impl NetBoxClient {
    pub fn new(settings: &InventorySettings) -> Result<Self, InventoryError> {
        if settings.base_url.is_empty() {
            return Err(InventoryError::Config("inventory URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds.max(1)))
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()
            .map_err(|e| InventoryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        if !settings.verify_tls {
            tracing::warn!("TLS certificate verification is disabled for {}", settings.base_url);
        }

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.credential.clone(),
            client,
            retry: RetryPolicy::default(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Send a GET, retrying network failures and 5xx responses with
    /// exponential backoff. 4xx responses come back immediately.
    async fn get_with_retry(&self, url: &str, retry: &RetryPolicy) -> Result<Response, InventoryError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::debug!(url = %url, attempt, "Sending inventory request");

            let result = self
                .client
                .get(url)
                .header("Authorization", self.auth_header())
                .header("Accept", "application/json")
                .send()
                .await;

            let err = match result {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    InventoryError::Status {
                        status,
                        url: url.to_string(),
                        body,
                    }
                }
                Err(e) => InventoryError::Transport {
                    url: url.to_string(),
                    attempts: attempt,
                    source: e,
                },
            };

            if !err.is_transient() || attempt > retry.max_retries {
                return Err(err);
            }

            let wait = retry.backoff(attempt);
            tracing::warn!(
                url = %url,
                error = %err,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "Transient inventory error, retrying with backoff"
            );
            tokio::time::sleep(wait).await;
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, InventoryError> {
        let resp = self.get_with_retry(url, &self.retry).await?;
        resp.json().await.map_err(|e| InventoryError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Follow `next` links until the listing is drained. Records that do not
    /// decode are dropped and counted instead of failing the whole listing.
    async fn list_paginated<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Records<T>, InventoryError> {
        let sep = if endpoint.contains('?') { '&' } else { '?' };
        let mut url = self.api_url(&format!("{}{}limit={}", endpoint, sep, self.page_size));
        let mut records = Records::new(Vec::new());
        let mut visited = HashSet::new();

        loop {
            visited.insert(url.clone());
            let page: PaginatedResponse<serde_json::Value> = self.get_json(&url).await?;

            for raw in page.results {
                match serde_json::from_value::<T>(raw) {
                    Ok(item) => records.items.push(item),
                    Err(e) => {
                        records.skipped += 1;
                        tracing::warn!("Skipping malformed record from {}: {}", endpoint, e);
                    }
                }
            }

            match page.next {
                Some(next) if next.is_empty() => break,
                Some(next) if visited.contains(&next) => {
                    tracing::warn!("Pagination of {} links back to {}, stopping", endpoint, next);
                    break;
                }
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl Inventory for NetBoxClient {
    async fn list_clusters(&self) -> Result<Records<NbCluster>, InventoryError> {
        let records = self.list_paginated("/virtualization/clusters/").await?;
        tracing::info!("Retrieved {} clusters", records.items.len());
        Ok(records)
    }

    async fn get_cluster(&self, cluster_id: i64) -> Result<NbCluster, InventoryError> {
        self.get_json(&self.api_url(&format!("/virtualization/clusters/{}/", cluster_id)))
            .await
    }

    async fn list_cluster_devices(&self, cluster_id: i64) -> Result<Records<NbDevice>, InventoryError> {
        let records = self
            .list_paginated(&format!("/dcim/devices/?cluster_id={}", cluster_id))
            .await?;
        tracing::debug!("Retrieved {} devices for cluster {}", records.items.len(), cluster_id);
        Ok(records)
    }

    async fn list_device_interfaces(&self, device_id: i64) -> Result<Records<NbInterface>, InventoryError> {
        self.list_paginated(&format!("/dcim/interfaces/?device_id={}", device_id))
            .await
    }

    async fn list_device_cables(&self, device_id: i64) -> Result<Records<NbCable>, InventoryError> {
        let fetched: Records<NbCable> = self
            .list_paginated(&format!("/dcim/cables/?device_id={}", device_id))
            .await?;

        let total = fetched.items.len();
        let (valid, invalid): (Vec<_>, Vec<_>) = fetched.items.into_iter().partition(NbCable::is_valid);
        for cable in &invalid {
            tracing::warn!("Skipping cable {} of device {}: missing termination", cable.id, device_id);
        }
        tracing::debug!(
            "Retrieved {} valid cables for device {} (skipped {})",
            valid.len(),
            device_id,
            total - valid.len()
        );

        Ok(Records {
            items: valid,
            skipped: fetched.skipped + invalid.len(),
        })
    }

    /// Single status-endpoint call, no retries
    async fn probe(&self) -> Result<(), InventoryError> {
        self.get_with_retry(&self.api_url("/status/"), &RetryPolicy::none())
            .await
            .map(|_| ())
    }
}
