use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{ServeArgs, ServerConfig, StoreKind};
use crate::error::ServerError;
use registrar_api::RecordStore;
use registrar_broker_kafka::{KafkaBroker, KafkaConfig};
use registrar_engine::{ConnectionManager, Coordinator};
use registrar_storage_memory::MemoryStore;
use registrar_storage_postgres::{DEFAULT_TABLE, PostgresStore};

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("registrar-server starting");

    // --- Load config ---
    let config = ServerConfig::resolve(&args)?;
    tracing::info!(
        config = args.config.as_deref().unwrap_or("<none>"),
        port = config.port,
        brokers = %config.brokers,
        topic = %config.topic,
        store = ?config.store,
        "loaded config"
    );

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- Record store: must be ready before any request is accepted ---
    let store = open_store(&config).await?;

    // --- Broker connection manager (background retry loop) ---
    let kafka = KafkaConfig::new(&config.brokers, config.topic.clone())
        .with_connect_timeout(config.connect_timeout());
    let manager = ConnectionManager::new(Arc::new(KafkaBroker::new(kafka)));
    let connector = manager.start(config.retry_policy(), token.clone())?;

    let coordinator = Arc::new(Coordinator::new(store, manager, config.topic.clone())?);

    // --- API server ---
    let mut api_handle = tokio::spawn(registrar_api_server::run(
        config.port,
        coordinator,
        token.clone(),
    ));
    tracing::info!("server ready");

    // --- Wait for Ctrl+C, or for the API server to stop on its own ---
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down...");
        }
        finished = &mut api_handle => {
            token.cancel();
            let _ = connector.await;
            return match finished {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ServerError::Api(e)),
                Err(e) => Err(ServerError::Api(e.to_string())),
            };
        }
    }

    token.cancel();

    if let Ok(Err(e)) = api_handle.await {
        tracing::error!(error = %e, "api server error");
    }
    let _ = connector.await;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn open_store(config: &ServerConfig) -> Result<Arc<dyn RecordStore>, ServerError> {
    let store: Arc<dyn RecordStore> = match config.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Postgres => Arc::new(PostgresStore::connect(&config.store_uri, DEFAULT_TABLE).await?),
    };
    store.init().await?;
    tracing::info!(store = ?config.store, "record store ready");
    Ok(store)
}
