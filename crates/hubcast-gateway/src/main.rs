use clap::Parser;
use hubcast_core::HubcastConfig;
use hubcast_gateway::app;
use hubcast_hub::Hub;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "hubcast-gateway", version)]
#[command(about = "Real-time fan-out hub over WebSocket and Server-Sent Events")]
struct Cli {
    /// Path to hubcast.toml (default: $HUBCAST_CONFIG, then ~/.hubcast/hubcast.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Address to bind, overrides gateway.bind
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on, overrides gateway.port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hubcast_gateway=info,hubcast_hub=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // config path: --config > HUBCAST_CONFIG env > ~/.hubcast/hubcast.toml
    let config_path = cli.config.or_else(|| std::env::var("HUBCAST_CONFIG").ok());
    let mut config = HubcastConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        HubcastConfig::default()
    });
    if let Some(bind) = cli.bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let hub = Hub::spawn();
    let shutdown = CancellationToken::new();
    let state = Arc::new(app::AppState::new(config, hub, shutdown.clone())?);
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind((bind.as_str(), port)).await?;
    info!(addr = %listener.local_addr()?, "hubcast gateway listening");

    let token = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // close every client connection
            token.cancel();
        })
        .await?;

    shutdown.cancel();
    info!("hubcast gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received terminate signal"),
    }
}
