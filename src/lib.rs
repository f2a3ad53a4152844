mod api;
pub mod core;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::core::config::Settings;
use crate::core::state::AppState;
use crate::core::sync::spawn_scheduler;

pub async fn run() -> anyhow::Result<()> {
    let settings = Settings::from_env();

    // RUST_LOG wins, then MODS_LOG, then the crate default.
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info,mods_catalog=debug"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "mods-catalog starting");

    let state = Arc::new(AppState::initialize(settings).await?);
    let scheduler = spawn_scheduler(
        Arc::clone(&state.reconciler),
        state.settings.sync_interval,
    );

    let addr: SocketAddr = state.settings.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, api::router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.abort();
    info!("mods-catalog stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}
