use std::sync::Arc;

use bypass_ledger::{
    api,
    config::AppConfig,
    db::{memory::MemoryStore, pg::PgStore},
    service::BypassService,
};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bypass_ledger=info,tower_http=info".into()),
        )
        .init();

    let config =
        AppConfig::from_env().map_err(|err| anyhow::anyhow!("invalid configuration: {err}"))?;

    let (service, pg) = match &config.database_url {
        Some(database_url) => {
            let store = PgStore::connect(database_url, config.db_max_connections).await?;
            store.run_migrations().await?;
            tracing::info!("connected to postgres");
            (BypassService::new(Arc::new(store.clone())), Some(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, events are kept in memory only");
            (BypassService::new(Arc::new(MemoryStore::default())), None)
        }
    };

    let app = api::router(api::AppState { service })
        .layer(api::cors_layer(&config))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(store) = pg {
        store.close().await;
        tracing::info!("postgres pool closed");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
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
    tracing::info!("shutdown signal received");
}
