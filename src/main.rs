use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::info;

use payment_bridge as bridge;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = bridge::config::load_config()?;
    bridge::config::init_tracing(cfg.log_level(), cfg.log_json);
    bridge::handlers::health::init_start_time();

    // load_config has already rejected a missing CORS setting outside development
    let cors_layer = bridge::build_cors_layer(&cfg);

    let addr = format!("{}:{}", cfg.host, cfg.port)
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    let app_state = bridge::AppState::from_config(cfg)?;
    let app = bridge::build_router(app_state, cors_layer);

    info!("payment-bridge listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
