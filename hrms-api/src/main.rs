//! HRMS API server - main entry point
//!
//! Startup sequence: logging, config, database, event bus, background
//! jobs, then the HTTP listener.

use anyhow::{Context, Result};
use clap::Parser;
use hrms_api::services::scheduler;
use hrms_api::{build_router, AppState};
use hrms_common::auth::TokenSigner;
use hrms_common::config::{self, ensure_root_folder, load_toml_config, resolve_root_folder};
use hrms_common::db::init_database;
use hrms_common::events::EventBus;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for hrms-api
#[derive(Parser, Debug)]
#[command(name = "hrms-api")]
#[command(about = "HR management REST API")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, env = "HRMS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long, env = "HRMS_BIND_ADDRESS")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "HRMS_PORT")]
    port: Option<u16>,

    /// Skip the daily auto-absent job
    #[arg(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = load_toml_config();

    let default_filter = toml_config
        .logging
        .level
        .clone()
        .map(|level| format!("hrms_api={level},hrms_common={level},tower_http=info"))
        .unwrap_or_else(|| "hrms_api=debug,hrms_common=info,tower_http=info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting HRMS API");
    info!(
        "hrms-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    info!("Root folder: {}", root_folder.display());
    let db_path = ensure_root_folder(&root_folder).context("Failed to prepare root folder")?;

    let db = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let secret = config::resolve_token_secret(&db, &toml_config)
        .await
        .context("Failed to resolve token secret")?;

    let event_bus = EventBus::new(1000);
    let state = AppState::new(db, event_bus, TokenSigner::new(secret));

    if args.no_scheduler {
        info!("Auto-absent job disabled");
    } else {
        scheduler::spawn_auto_absent(state.clone());
    }

    let app = build_router(state);

    let bind = args
        .bind
        .unwrap_or_else(|| toml_config.bind_address().to_string());
    let port = args.port.unwrap_or_else(|| toml_config.port());
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
