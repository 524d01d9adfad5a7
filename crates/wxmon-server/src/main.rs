use anyhow::Result;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use wxmon_alert::engine::AlertEngine;
use wxmon_metrics::memory::MemorySink;
use wxmon_metrics::prometheus::PrometheusSink;
use wxmon_metrics::MetricsSink;

use wxmon_server::app;
use wxmon_server::config::{self, SinkKind};
use wxmon_server::dispatcher::{DispatchStats, Dispatcher};
use wxmon_server::rule_seed;
use wxmon_server::source;
use wxmon_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  wxmon-server [config.toml]    Start the consumer (default: config/server.toml)");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("wxmon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        other => run_server(other.unwrap_or("config/server.toml")).await,
    }
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = config::ServerConfig::load(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config '{}': {}", config_path, e))?;

    tracing::info!(
        http_port = config.http_port,
        rules_file = %config.rules_file,
        source = %config.source,
        "wxmon-server starting"
    );

    // Registry is fully populated before anything reads it.
    let registry = Arc::new(rule_seed::load_registry(&config.rules_file, &config.alert));

    let sink: Arc<dyn MetricsSink> = match config.sink {
        SinkKind::Prometheus => Arc::new(PrometheusSink::install()),
        SinkKind::Memory => Arc::new(MemorySink::new()),
    };
    let stats = Arc::new(DispatchStats::new());

    let config = Arc::new(config);
    let state = AppState {
        sink: sink.clone(),
        registry: registry.clone(),
        stats: stats.clone(),
        start_time: Utc::now(),
        config: config.clone(),
    };

    let mut message_source = source::open(&config.source).await?;
    let dispatcher = Dispatcher::new(AlertEngine::new(registry), sink, stats);
    let dispatch_handle =
        tokio::spawn(async move { dispatcher.run(message_source.as_mut()).await });

    let http_app = app::build_http_app(state);
    let http_addr: SocketAddr = ([0, 0, 0, 0], config.http_port).into();
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(listener, http_app);

    tracing::info!(http = %http_addr, "Server started");

    let mut exit_err = None;
    tokio::select! {
        result = dispatch_handle => {
            match result {
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Dispatch loop terminated");
                    exit_err = Some(anyhow::Error::from(e));
                }
                Ok(Ok(())) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Dispatch task panicked");
                    exit_err = Some(anyhow::Error::from(e));
                }
            }
        }
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    tracing::info!("Server stopped");
    match exit_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
