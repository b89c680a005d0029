//! hai-md (Medical Diagnosis) - clinical model inference service
//!
//! Loads every model bundle once at startup, then serves diagnosis requests
//! against the resulting read-only registry. A model whose bundle fails to
//! load is reported as unavailable; the service still starts.

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hai_common::config::{
    default_config_path, load_toml_config_if_present, resolve_models_dir, CompiledDefaults,
    RootFolderResolver, TomlConfig,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hai_md::registry::FsModelLoader;
use hai_md::{build_router, AppState, ModelRegistry, MODULE_NAME};

/// Command-line arguments for hai-md
#[derive(Parser, Debug)]
#[command(name = "hai-md")]
#[command(about = "Medical diagnosis inference service for HealthAI")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "HAI_MD_PORT")]
    port: Option<u16>,

    /// Root folder for service data
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Directory holding the model bundles (default: <root folder>/models)
    #[arg(short, long)]
    models_dir: Option<PathBuf>,

    /// Bootstrap TOML file (default: ~/.config/healthai/hai-md.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let defaults = CompiledDefaults::for_current_platform();

    // Read the bootstrap file before tracing so its log level applies;
    // problems with it are reported once the subscriber is up
    let config_path = args.config.clone().or_else(|| default_config_path(MODULE_NAME));
    let toml_result = load_toml_config_if_present(config_path.as_deref());
    let (log_level, log_file) = match &toml_result {
        Some(Ok(config)) => (config.logging.level.clone(), config.logging.file.clone()),
        _ => (defaults.log_level.clone(), None),
    };

    init_tracing(&log_level, log_file.as_deref())?;

    // Build identification first, before any slow startup work
    info!(
        "Starting HealthAI Medical Diagnosis ({}) v{} [{}] built {} ({})",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let toml_config = match toml_result {
        Some(Ok(config)) => {
            if let Some(path) = &config_path {
                info!("Loaded config file {}", path.display());
            }
            config
        }
        Some(Err(e)) => {
            warn!("{} - continuing with defaults", e);
            TomlConfig::default()
        }
        None => {
            if let Some(path) = &config_path {
                info!("No config file at {}, using defaults", path.display());
            }
            TomlConfig::default()
        }
    };

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&toml_config)
        .resolve();
    let models_dir = resolve_models_dir(args.models_dir.as_deref(), &toml_config, &root_folder);
    info!("Root folder: {}", root_folder.display());
    info!("Models directory: {}", models_dir.display());

    // Startup barrier: no request is served before every model was attempted
    let registry = ModelRegistry::load(&FsModelLoader::new(&models_dir));
    info!(
        "{}/{} models loaded",
        registry.loaded_count(),
        registry.len()
    );

    let state = AppState::new(Arc::new(registry));
    let app = build_router(state);

    let bind_address = toml_config
        .bind_address
        .clone()
        .unwrap_or(defaults.bind_address);
    let port = args.port.or(toml_config.port).unwrap_or(defaults.port);
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("hai-md listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level; logs go to stderr unless a file is set
fn init_tracing(level: &str, file: Option<&std::path::Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("hai_md={level},hai_common={level},tower_http={level}").into());

    let writer = match file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
