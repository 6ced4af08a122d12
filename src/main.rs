use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cineseat::locks::{start_expiry_task, ExpiryConfig};
use cineseat::{build_router, AppState, Config};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cineseat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cineseat reservation server");

    let config = Config::from_env();
    let port = config.port;
    let sweep_interval = config.sweep_interval;
    let state = AppState::new(config);

    cineseat::seed::run(&state.registry);

    // Background sweep backstops lazy expiry on the read paths
    tokio::spawn(start_expiry_task(
        Arc::clone(&state.locks),
        ExpiryConfig { sweep_interval },
    ));

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap();
    info!("Server running on http://localhost:{port}");
    axum::serve(listener, app).await.unwrap();
}
