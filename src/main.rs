use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use ytmcp::cache::TranscriptCache;
use ytmcp::config::{Config, LogFormat, LogOutput};
use ytmcp::health::HealthChecker;
use ytmcp::mcp::{http, stdio, McpServer};
use ytmcp::metrics::Metrics;
use ytmcp::page::ReqwestHttpClient;
use ytmcp::rate_limit::RateLimiter;
use ytmcp::service::TranscriptService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

/// MCP server exposing YouTube transcript retrieval tools.
#[derive(Debug, Parser)]
#[command(name = "ytmcp", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport to serve the JSON-RPC envelope on.
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Listen address for the HTTP transport.
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
}

fn init_logging(config: &Config, transport: Transport) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    // The stdio transport owns stdout for responses; logs must not leak
    // into it.
    let output = if transport == Transport::Stdio {
        LogOutput::Stderr
    } else {
        config.logging.output.clone()
    };

    let writer = match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File => {
            let path = config
                .logging
                .file
                .as_deref()
                .context("logging.output = \"file\" requires logging.file")?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {path}"))?;
            BoxMakeWriter::new(Arc::new(file))
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(Config::load(cli.config.as_deref()).context("loading configuration")?);

    init_logging(&config, cli.transport)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?cli.transport,
        "starting"
    );

    let shutdown = CancellationToken::new();

    let http_client = Arc::new(ReqwestHttpClient::from_config(&config)?);
    let metrics = Arc::new(Metrics::new());
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_per_minute,
        config.rate_limit_per_hour,
    ));

    let cache = if config.cache.enabled {
        let cache = Arc::new(TranscriptCache::new(config.cache.max_size));
        tokio::spawn(Arc::clone(&cache).run_janitor(
            Duration::from_secs(config.cache.cleanup_interval),
            shutdown.clone(),
        ));
        Some(cache)
    } else {
        None
    };

    let service = Arc::new(TranscriptService::new(
        Arc::clone(&config),
        http_client,
        cache.clone(),
        limiter,
        Arc::clone(&metrics),
    ));
    let server = Arc::new(McpServer::new(service));
    let health = Arc::new(HealthChecker::new(cache, config.proxies().len()));

    if config.metrics.enabled {
        let addr = SocketAddr::new(cli.listen.ip(), config.metrics.port);
        tokio::spawn(http::serve_metrics(
            Arc::clone(&metrics),
            addr,
            config.metrics.path.clone(),
            shutdown.clone(),
        ));
    }

    let ctrl_c = {
        let shutdown = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    };
    tokio::spawn(ctrl_c);

    match cli.transport {
        Transport::Stdio => stdio::serve(server, shutdown).await,
        Transport::Http => http::serve(server, health, cli.listen, shutdown).await,
    }
}
