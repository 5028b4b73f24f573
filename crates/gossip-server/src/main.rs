mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use gossip_api::auth::{AppState, AppStateInner};
use gossip_broker::{BrokerConfig, MemoryBroker};
use gossip_chat::{Registry, Store};
use gossip_db::Database;
use gossip_ingest::{Ingest, Supervisor};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gossip=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    // Broker and ingestion
    let broker = MemoryBroker::new(BrokerConfig {
        redelivery_delay: config.redelivery_delay,
        max_in_flight: config.max_in_flight,
    });
    let ingest = Ingest::new(Arc::new(broker.clone()), db.clone());
    let supervisor = Supervisor::new(ingest);

    for channel in db.list_channels()? {
        if let Err(e) = supervisor.ensure(&channel) {
            error!("Could not start ingest for {}: {}", channel, e);
        }
    }
    info!("Ingesting {} channels", supervisor.running().len());

    let state: AppState = Arc::new(AppStateInner {
        registry: Arc::new(Registry::new(db)),
        broker: broker.clone(),
        supervisor,
        admin_user: config.admin_user,
        admin_password: config.admin_password,
    });

    let app = gossip_api::router(state.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Gossip server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.supervisor.stop_all().await;
    broker.shutdown();
    info!("Gossip server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
