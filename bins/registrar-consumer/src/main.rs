use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use registrar_api::{ClientError, RetryPolicy};
use registrar_broker_kafka::{DEFAULT_BROKERS, DEFAULT_TOPIC, KafkaConfig, KafkaConsumer};

#[derive(Parser, Debug)]
#[command(name = "registrar-consumer", about = "Log every tournament announcement")]
struct Cli {
    /// Comma-separated Kafka bootstrap brokers
    #[arg(long, env = "KAFKA_BROKERS", default_value = DEFAULT_BROKERS)]
    brokers: String,

    /// Topic to read from the earliest offset
    #[arg(long, env = "TOPIC", default_value = DEFAULT_TOPIC)]
    topic: String,

    /// Upper bound for the initial connection, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    connect_timeout_ms: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "registrar-consumer failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let config = KafkaConfig::new(&cli.brokers, cli.topic)
        .with_connect_timeout(Duration::from_millis(cli.connect_timeout_ms));
    let consumer = KafkaConsumer::connect(&config).await?;
    tracing::info!(brokers = ?config.brokers, topic = %consumer.topic(), "consumer connected");

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down...");
            shutdown.cancel();
        }
    });

    consumer
        .run(RetryPolicy::default(), token, |offset, payload| {
            tracing::info!(offset, payload = %String::from_utf8_lossy(payload), "announcement received");
        })
        .await
}
