use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use http::{Method, header::CONTENT_TYPE};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use chatterbox_gateway::{InMemoryRegistry, ServerConfig, routes, state::AppState};

/// Chatterbox Gateway - text-to-speech request orchestration server
#[derive(Parser, Debug)]
#[command(name = "chatterbox-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate configuration, print it with secrets redacted, then exit
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ServerConfig> {
    let config = match path {
        Some(config_path) => {
            println!("Loading configuration from {}", config_path.display());
            ServerConfig::from_file(config_path)?
        }
        None => ServerConfig::from_env()?,
    };
    Ok(config)
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    match origins {
        Some("*") => base.allow_origin(Any),
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            base.allow_origin(origins)
        }
        None => {
            // No allow_origin = same-origin only
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            base
        }
    }
}

async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining in-flight synthesis");
    state.pipeline.shutdown().await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;

    if let Some(Commands::CheckConfig) = cli.command {
        println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
        if let Some(path) = &config.registry_path {
            let registry = InMemoryRegistry::from_file(path)?;
            println!(
                "Registry {} loaded: {} voices, {} characters",
                path.display(),
                registry.voice_ids().len(),
                registry.character_ids().len()
            );
        }
        println!("Configuration is valid");
        return Ok(());
    }

    let address = config.address();
    let cors = cors_layer(config.cors_allowed_origins.as_deref());
    println!("Starting server on {address}");

    // Create application state
    let app_state = AppState::new(config)?;

    let app = routes::api::create_api_router()
        .with_state(app_state.clone())
        .layer(cors);

    // Parse socket address
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    println!("Server listening on http://{}", socket_addr);

    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(app_state))
    .await?;

    Ok(())
}
