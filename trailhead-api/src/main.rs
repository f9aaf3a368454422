use std::net::SocketAddr;

use trailhead_api::prelude::*;
use trailhead_api::{routes, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // Programming faults are fatal: log them and let supervision restart us.
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("fatal panic, shutting down: {info}");
    }));

    let config = Config::load()?;
    telemetry::init_tracing(&config);

    let port = config.service.port;
    let state = AppState::new(config).await?;
    let app = routes::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM; in-flight requests drain before exit.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
}
