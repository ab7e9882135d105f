use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use ride_server::auth::SessionConfig;
use ride_server::backend::{Backend, BackendClient, BackendConfig, MockBackend};
use ride_server::config::{BackendSource, ServerConfig};
use ride_server::realtime::{ChangeBus, ChangeFeed, RealtimeConfig};
use ride_server::web::{AppState, change_interests, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ride_server=info,tower_http=info")),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(2);
        }
    };

    let bus = ChangeBus::new();
    let cancel = CancellationToken::new();

    match config.backend.clone() {
        BackendSource::Mock(dir) => {
            let backend = MockBackend::new(&dir)
                .expect("Failed to load mock data")
                .with_bus(bus.clone());
            tracing::info!(dir = %dir.display(), "using mock data");
            serve(Arc::new(backend), &bus, &config, cancel).await;
        }
        BackendSource::Live {
            url,
            api_key,
            timeout_secs,
            checkout_path,
        } => {
            let mut backend_config = BackendConfig::new(&url, &api_key).with_timeout(timeout_secs);
            if let Some(path) = checkout_path {
                backend_config = backend_config.with_checkout_path(path);
            }
            let client = BackendClient::new(backend_config).expect("Failed to create backend client");
            let feed = ChangeFeed::connect(
                RealtimeConfig::for_backend(&url, &api_key),
                change_interests(),
                bus.clone(),
                cancel.child_token(),
            );
            tracing::info!(%url, "using live backend");
            serve(Arc::new(client), &bus, &config, cancel).await;
            feed.shutdown();
        }
    }
}

async fn serve<B: Backend>(backend: Arc<B>, bus: &ChangeBus, config: &ServerConfig, cancel: CancellationToken) {
    let state = AppState::start(
        backend,
        bus,
        &config.refresh,
        &SessionConfig::default(),
        &config.public_url,
    );

    let static_dir = config.static_dir.to_string_lossy();
    let app = create_router(state.clone(), &static_dir);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!("Ride Share listening on http://{}", config.bind_addr);
    tracing::info!("  GET  /health, /, /drivers/available, /rides/search, /ride-requests");
    tracing::info!("  POST /ride-requests, /offers, /checkout, /auth/sign-in|sign-up|sign-out");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("received Ctrl+C, shutting down"),
                _ = shutdown.cancelled() => {}
            }
        })
        .await
        .expect("Server error");

    cancel.cancel();
    state.shutdown();
}
