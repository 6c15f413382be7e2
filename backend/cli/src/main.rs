mod api;
mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use cmdhub_config::HubConfig;
use cmdhub_dispatch::CommandProcessor;
use cmdhub_infra::BroadcastPublisher;
use cmdhub_logging::init_logger;

use api::AppState;

/// How long shutdown waits for notifier and workflow tasks to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "cmdhub")]
#[command(about = "Command hub: routes chat-platform events to interaction modules")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $CMDHUB_CONFIG or ~/.cmdhub/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Validate the config file and print findings
    CheckConfig,
    /// Query a running server's health endpoint
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = config::resolve_path(cli.config.as_deref());
    let mut hub = cmdhub_config::load_with_overrides(&path).await?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                hub.server.port = port;
            }
            let _guard = init_logger(hub.logging.dir.as_deref(), &hub.logging.level, hub.logging.json)?;
            cmdhub_config::ensure_valid(&hub)?;
            run_server(hub).await?;
        }
        Commands::CheckConfig => {
            let report = cmdhub_config::validate(&hub);
            print!("{}", config::render_report(&path, &report));
            if !report.is_valid() {
                std::process::exit(1);
            }
        }
        Commands::Status => {
            let url = format!("http://localhost:{}/api/health", hub.server.port);
            match reqwest::get(&url).await {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => println!("cmdhub is not running on port {}", hub.server.port),
            }
        }
    }

    Ok(())
}

async fn run_server(hub: HubConfig) -> Result<()> {
    info!(
        port = hub.server.port,
        bind = %hub.server.bind,
        rpc = hub.notifiers.rpc_enabled,
        rpc_endpoints = hub.notifiers.has_rpc_endpoints(),
        "Starting cmdhub"
    );

    let outbound = Arc::new(BroadcastPublisher::default());
    let processor = Arc::new(
        CommandProcessor::builder(&hub)
            .publisher(outbound.clone())
            .build(),
    );

    let app_state = Arc::new(AppState {
        processor: Arc::clone(&processor),
        outbound,
    });
    let app = api::build_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", hub.server.bind, hub.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if processor.wait_idle(DRAIN_TIMEOUT).await {
        info!("Background tasks drained");
    } else {
        warn!(pending = processor.pending_tasks(), "Shutting down with tasks still pending");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
