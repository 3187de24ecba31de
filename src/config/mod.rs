use std::env;

use crate::models::InventorySettings;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub db_max_connections: u32,
    pub listen_addr: String,
    pub inventory: InventorySettings,
    pub page_size: u32,
    /// Run the polling loop in the background
    pub sync_continuous: bool,
    /// Clear stuck in-progress flags before serving
    pub reset_flags_on_start: bool,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            db_path: get_env("DB_PATH", "/data/topology.db"),
            db_max_connections: get_env("DB_MAX_CONNECTIONS", "5").parse().unwrap_or(5),
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8080"),
            inventory: InventorySettings {
                base_url: get_env("NETBOX_URL", ""),
                credential: get_env("NETBOX_TOKEN", ""),
                verify_tls: parse_bool(&get_env("NETBOX_VERIFY_TLS", "true"), true),
                timeout_seconds: get_env("NETBOX_TIMEOUT_SECS", "30").parse().unwrap_or(30),
                poll_interval_seconds: get_env("SYNC_INTERVAL_SECS", "300").parse().unwrap_or(300),
            },
            page_size: get_env("NETBOX_PAGE_SIZE", "100").parse().unwrap_or(100),
            sync_continuous: parse_bool(&get_env("SYNC_CONTINUOUS", "false"), false),
            reset_flags_on_start: parse_bool(&get_env("SYNC_RESET_FLAGS_ON_START", "false"), false),
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}
