use std::net::SocketAddr;
use std::sync::Arc;

use atelier_comfyui::{ComfyUIBackend, ComfyUIBackendConfig};
use atelier_core::blocking::BlockingPool;
use atelier_core::storage::StorageLayout;
use atelier_direct::{DirectBackend, DirectBackendConfig};
use atelier_events::{NotificationHub, PeerRelay};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_api::config::ServerConfig;
use atelier_api::engine::GenerationRunner;
use atelier_api::router::build_app_router;
use atelier_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pool = atelier_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    atelier_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    atelier_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store = Arc::new(atelier_db::PgJobStore::new(pool.clone()));

    let hub = Arc::new(match &config.peer_broadcast_url {
        Some(peer) => {
            tracing::info!(peer = %peer, "Broadcasts relay to peer");
            NotificationHub::with_relay(PeerRelay::new(peer, config.broadcast_token.clone()))
        }
        None => NotificationHub::new(),
    });

    let blocking = BlockingPool::new(config.blocking_pool_size);
    let storage = StorageLayout::new(&config.storage_root);

    let mut runner = GenerationRunner::new(store.clone(), Arc::clone(&hub), storage, blocking.clone());

    // The direct backend claims its own models; ComfyUI takes everything else.
    if let Some(url) = &config.direct_backend_url {
        let mut direct = DirectBackendConfig::new(url.clone());
        direct.default_timeout = config.generation_timeout();
        runner = runner.with_backend(Arc::new(DirectBackend::new(direct, blocking.clone())));
        tracing::info!(url = %url, "Direct backend enabled");
    }
    let mut comfyui = ComfyUIBackendConfig::new(config.comfyui_url.clone(), &config.workflow_dir);
    comfyui.poll_interval = config.poll_interval();
    comfyui.default_timeout = config.generation_timeout();
    runner = runner.with_backend(Arc::new(ComfyUIBackend::new(comfyui)));
    tracing::info!(url = %config.comfyui_url, "ComfyUI backend enabled");

    let runner = Arc::new(runner);

    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        hub: Arc::clone(&hub),
        runner: Arc::clone(&runner),
    };

    let app = build_app_router(state);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Connect info feeds the broadcast allow-list.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let active = runner.in_flight();
    if runner.shutdown(config.shutdown_timeout()).await {
        tracing::info!(active, "Generation runs drained");
    } else {
        tracing::warn!(
            remaining = runner.in_flight(),
            "Shutdown timeout reached with generation runs in flight",
        );
    }

    let subscribers = hub.subscriber_count().await;
    tracing::info!(subscribers, "Closing remaining WebSocket connections");
    hub.shutdown_all().await;

    blocking.close();
    pool.close().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
