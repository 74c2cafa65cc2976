//! Order Service Server
//!
//! Serves `POST /orders` and runs the `order-service` consumer group.
//!
//! # Usage
//!
//! ```bash
//! # In-memory event log
//! cargo run -p order-service
//!
//! # Against Redpanda
//! EVENT_LOG_BACKEND=redpanda REDPANDA_BROKERS=localhost:9092 \
//!     cargo run -p order-service --features redpanda
//! ```

use order_service::{Application, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,order_service=debug,rdkafka=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting order service...");

    let config = Config::from_env()?;
    tracing::info!(
        address = %config.bind_address(),
        backend = %config.event_log.backend,
        brokers = %config.event_log.brokers,
        topic = %config.orders.topic,
        "Configuration loaded"
    );

    let app = Application::build(&config).await?;
    tracing::info!("Order service is running, press Ctrl+C to shut down");

    app.run().await?;
    Ok(())
}
