use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use session_auth::config::{Config, StoreBackend};
use session_auth::gate::{AuthGate, RouteClassifier};
use session_auth::storage::{Database, MemoryStore, SessionStore};
use session_auth::tokens::SessionManager;
use session_auth::users::{Argon2Scheme, StaticDirectory};
use session_auth::{api, expiration, AppState};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "session-auth starting");

    // Load configuration
    let config = Config::load()?;

    // Initialize session store
    let store: Arc<dyn SessionStore> = match config.store.backend {
        StoreBackend::Redb => {
            let db = Database::open(&config.store.data_dir)?;
            info!("Database opened at: {}", config.store.data_dir);
            Arc::new(db)
        }
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };

    // Load user directory
    let directory = match &config.users_file {
        Some(path) => {
            let directory = StaticDirectory::from_file(path)?;
            info!(users = directory.len(), "Loaded user directory from: {path}");
            directory
        }
        None => {
            tracing::warn!("USERS_FILE not set; no account can log in");
            StaticDirectory::new(Vec::new())?
        }
    };

    let sessions = SessionManager::new(
        config.sessions.clone(),
        Arc::clone(&store),
        Arc::new(directory),
        Arc::new(Argon2Scheme),
    );
    let gate = AuthGate::new(RouteClassifier::default(), sessions.clone());

    // Create shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        gate,
        sessions,
        store,
    });

    // Start background tasks
    let expiration_handle = expiration::start_expiration_cleaner(Arc::clone(&state));

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Listening on: {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down background tasks");
    expiration_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, draining connections");
}
