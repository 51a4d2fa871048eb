use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use eeditor_core::bridge::FileBridge;
use eeditor_core::config::GlobalConfig;
use eeditor_core::document::DocumentTable;
use eeditor_core::ipc::{self, AppState, IPCServer};
use eeditor_updater_lib::{NetworkChecker, UpdateCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
    tracing::info!("EEditor core starting");

    let cfg = GlobalConfig::load();

    let bridge = FileBridge::new(cfg.sandbox_root())
        .with_context(|| format!("Failed to prepare sandbox {}", cfg.sandbox_root().display()))?;
    let coordinator = UpdateCoordinator::new(cfg.updater.clone())?;
    let checker = NetworkChecker::with_endpoints(
        vec![cfg.network.probe_url.clone()],
        Duration::from_secs(cfg.network.probe_timeout_secs),
    );

    // 시작 시 한 번 시나리오 업데이트 확인
    if cfg.updater.enabled {
        if let Err(e) = ipc::updates::spawn_attempt(&coordinator, ipc::updates::logging_sink()) {
            tracing::warn!("[Updater] Initial check not started: {}", e);
        }
    }

    let state = AppState {
        bridge,
        documents: DocumentTable::new(Duration::from_secs(cfg.document.read_timeout_secs)),
        coordinator,
        checker: Arc::new(checker),
        assets: cfg.assets.clone(),
    };

    let server = IPCServer::new(state, &cfg.ipc);
    tokio::select! {
        result = server.start() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown signal received"),
    }

    tracing::info!("EEditor core stopped");
    Ok(())
}
