mod config;
mod db;
mod handlers;
mod models;
mod netbox;
mod router;
mod sync;

use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use db::Store;
use netbox::NetBoxClient;
use sync::SyncCoordinator;

/// Application state shared across handlers
pub struct AppState {
    pub store: Store,
    pub config: Config,
    pub coordinator: SyncCoordinator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topology_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let cfg = Config::load();
    tracing::info!("Starting topology sync server");
    tracing::info!("Database: {}", cfg.db_path);
    tracing::info!("Inventory: {:?}", cfg.inventory);
    tracing::info!("Listen: {}", cfg.listen_addr);

    // Initialize database
    let store = Store::with_pool_size(&cfg.db_path, cfg.db_max_connections).await?;
    tracing::info!("Database initialized (pool_size={})", cfg.db_max_connections);

    if !cfg.inventory.is_configured() {
        tracing::warn!("NETBOX_URL or NETBOX_TOKEN not set - sync requests will be rejected");
    }

    // An unset URL still yields a client; every call then fails as a connectivity error
    let inventory: Arc<dyn netbox::Inventory> = match NetBoxClient::new(&cfg.inventory) {
        Ok(client) => Arc::new(client.with_page_size(cfg.page_size)),
        Err(e) => {
            tracing::warn!("Inventory client unavailable: {}", e);
            Arc::new(netbox::Unconfigured)
        }
    };

    let coordinator = SyncCoordinator::new(store.clone(), inventory, cfg.inventory.poll_interval_seconds);

    if cfg.reset_flags_on_start {
        let cleared = coordinator.reset_stuck_flags().await?;
        tracing::info!("Reset {} sync flags on startup", cleared);
    }

    let poller = if cfg.sync_continuous && cfg.inventory.is_configured() {
        Some(coordinator.start_polling())
    } else {
        None
    };

    // Create app state
    let state = Arc::new(AppState {
        store: store.clone(),
        config: cfg.clone(),
        coordinator,
    });

    // Build router
    let app = router::build(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!("Listening on {}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(poller) = poller {
        poller.stop().await;
    }

    tracing::info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
