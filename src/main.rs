use std::{net::SocketAddr, sync::Arc};

use tokio::{signal, sync::watch};
use tracing::{error, info};

use plantops_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();

    let repos = api::db::Repositories::from_config(&cfg).map_err(|e| {
        error!("Failed to initialize data source: {}", e);
        e
    })?;

    let (event_sender, event_rx) = api::events::EventSender::channel(cfg.event_channel_capacity);
    let app_state = api::AppState::new(cfg.clone(), repos, event_sender);

    tokio::spawn(api::events::process_events(
        event_rx,
        app_state.services.activities.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresher = api::services::dashboard::DashboardRefresher::new(
        Arc::clone(&app_state.services.dashboard),
        app_state.snapshots.clone(),
        cfg.dashboard_refresh_interval(),
    );
    let refresher_handle = tokio::spawn(refresher.run(shutdown_rx));

    let app = api::app_router(app_state);

    // Bind and serve
    let host: std::net::IpAddr = cfg.host.parse()?;
    let addr = SocketAddr::from((host, cfg.port));
    info!(data_source = %cfg.data_source, "plantops-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = refresher_handle.await {
        error!("Dashboard refresher task failed: {}", e);
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
    info!("Shutdown signal received");
}
