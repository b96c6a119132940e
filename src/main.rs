use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use staffdesk_access::config::{Config, StorageBackend};
use staffdesk_access::db::MemoryStore;
use staffdesk_access::state::{AppState, Backends, SharedState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!(storage = ?config.storage, "Starting staffdesk-access");

    let state = connect(config).await?;

    if let Some(bootstrap) = state.config.bootstrap.clone() {
        match state
            .provisioner
            .bootstrap_super_admin(&bootstrap.email, &bootstrap.password)
            .await
        {
            Ok(Some(user)) => tracing::info!(account_id = %user.id, email = %user.email, "Super admin provisioned"),
            Ok(None) => tracing::debug!("Super admin already present, skipping bootstrap"),
            Err(e) => tracing::error!(error = %e, "Super admin bootstrap failed"),
        }
    }

    // Periodically forget stale login failures
    let limiter_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter_state.login_limiter.cleanup();
        }
    });

    let addr = SocketAddr::new(state.config.host, state.config.port);
    let app = staffdesk_access::build_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn connect(config: Config) -> Result<SharedState, Box<dyn std::error::Error>> {
    let backends = match (config.storage, config.database_url.as_deref()) {
        (StorageBackend::Postgres, Some(url)) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Migrations applied");

            Backends::postgres(pool, &config)?
        }
        (StorageBackend::Postgres, None) => return Err("DATABASE_URL is required".into()),
        (StorageBackend::Memory, _) => {
            tracing::warn!("Using in-memory storage; all data is lost on shutdown");
            Backends::memory(Arc::new(MemoryStore::new()), &config)?
        }
    };

    Ok(AppState::new(config, backends))
}

async fn shutdown_signal() {
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
