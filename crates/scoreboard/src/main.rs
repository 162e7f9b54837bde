//! Scoreboard entry point: reads JSON-lines score events from stdin.

use std::net::{Ipv4Addr, SocketAddr};

use ingest::JsonLinesEventSource;
use scoreboard::{AppError, Config, Engine};
use tokio::io::BufReader;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    // 2. Install Prometheus metrics exporter
    if let Some(port) = config.metrics_port() {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        scoreboard::describe_metrics();
        tracing::info!(%addr, "metrics exporter listening");
    }

    // 3. Build the engine and consume stdin until EOF or a signal
    let engine = Engine::new(&config);
    let source = JsonLinesEventSource::new(BufReader::new(tokio::io::stdin()));
    tracing::info!("reading score events from stdin");

    let stats = engine.run(source, shutdown_signal()).await?;

    // 4. Report what was aggregated
    engine.log_summary().await;
    tracing::info!(
        applied = stats.applied,
        rejected = stats.rejected,
        duplicates = stats.duplicates,
        dead_lettered = stats.dead_lettered,
        "scoreboard shut down gracefully"
    );

    Ok(())
}
