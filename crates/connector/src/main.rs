//! Commerce Connector - receives pushes from the commerce backend.
//!
//! # Architecture
//!
//! - Axum resources declared in one registration table (`routes`)
//! - Managers behind traits, backed by `PostgreSQL`
//! - A background runner draining the promotion attach/detach queues
//! - Outbound calls to the commerce backend for verification and re-pushes
//!
//! Migrations are NOT run on startup. Run them explicitly via:
//! `cargo run -p commerce-connector-cli -- migrate`

#![cfg_attr(not(test), forbid(unsafe_code))]

use commerce_connector::config::ConnectorConfig;
use commerce_connector::settings::ConnectorSettings;
use commerce_connector::state::{AppState, Services};
use commerce_connector::{db, routes, telemetry};
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ConnectorConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing(config.json_logs);

    let settings = ConnectorSettings::load(&config.settings_path)
        .await
        .expect("Failed to load connector settings");

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    let services =
        Services::postgres(&config, &settings, &pool).expect("Failed to build commerce API client");
    let state = AppState::new(settings, services, Some(pool));

    // Queue runner stops with the server
    let (shutdown_tx, mut shutdown_rx) = watch::channel(());
    let runner = state.queue_runner(config.queue.clone());
    let runner_task = tokio::spawn(async move {
        runner
            .run(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await;
    });

    let app = routes::router(state).expect("Invalid resource registration table");

    let addr = config.socket_addr();
    tracing::info!("commerce connector listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    let _ = shutdown_tx.send(());
    if let Err(e) = runner_task.await {
        tracing::error!(error = %e, "Queue runner task failed");
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
