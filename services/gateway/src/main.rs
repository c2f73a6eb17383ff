mod config;
mod error;
mod handlers;
mod models;
mod router;
mod state;
mod subscribers;

use config::GatewayConfig;
use router::create_router;
use state::AppState;
use stream_engine::{Pipeline, ResultDistributor};
use subscribers::{ConsoleSubscriber, LogSubscriber};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting price aggregation gateway");

    let config = GatewayConfig::from_env();
    tracing::info!(
        port = config.http_port,
        default_symbol = %config.default_symbol,
        window_ms = config.engine.window.as_millis() as u64,
        price_threshold = config.engine.price_threshold,
        "Configuration loaded"
    );

    // One shutdown signal fans out to the HTTP server and the engine
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received, shutting down"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        let _ = shutdown_tx.send(true);
    });

    let mut distributor = ResultDistributor::new();
    distributor.register(LogSubscriber);
    distributor.register(ConsoleSubscriber::stdout());

    let pipeline = Pipeline::start(config.engine.clone(), distributor, wait_for(shutdown_rx.clone()))?;

    let state = AppState::new(pipeline.sender(), pipeline.metrics(), config.default_symbol.clone());
    let app = create_router(state);

    // Bind and serve
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for(shutdown_rx))
        .await?;

    let report = pipeline.join().await?;
    tracing::info!(
        windows_closed = report.windows_closed,
        results_emitted = report.results_emitted,
        "Gateway stopped"
    );

    Ok(())
}

/// Resolves once the shutdown flag flips to true (or its sender is gone).
async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
