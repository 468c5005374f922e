//! Command-line interface for the OAI-PMH server.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::bootstrap::{build_engine, open_token_store};
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::routes::router;
use crate::state::AppState;
use crate::sweeper::spawn_sweeper;

/// OAI-PMH endpoint over a search index.
#[derive(Parser)]
#[command(name = "oai-server")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Repository configuration (YAML); overrides OAI_CONFIG
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the OAI-PMH endpoint.
    Serve {
        /// Serve documents from a JSON file instead of a search backend
        #[arg(long)]
        index_file: Option<PathBuf>,

        /// Listen address; overrides OAI_BIND_ADDR
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Delete expired and corrupt resumption tokens once.
    Sweep,

    /// Print a stored resumption token.
    ShowToken {
        /// Token name (e.g., oai_1718000000000001)
        name: String,
    },
}

/// Run the CLI.
pub async fn run(cli: Cli) -> Result<()> {
    let mut server = ServerConfig::from_env()?;
    if let Some(path) = cli.config {
        server.config_path = Some(path);
    }

    match cli.command {
        Commands::Serve { index_file, bind } => {
            server.index_file = index_file;
            if let Some(addr) = bind {
                server.bind_addr = addr;
            }
            serve(server).await
        }
        Commands::Sweep => {
            let deleted = tokio::task::spawn_blocking(move || -> Result<usize> {
                let config = server.load_oai_config()?;
                Ok(open_token_store(&config)?.sweep())
            })
            .await??;
            println!("Deleted {deleted} resumption token(s)");
            Ok(())
        }
        Commands::ShowToken { name } => {
            let output = tokio::task::spawn_blocking(move || -> Result<String> {
                let config = server.load_oai_config()?;
                // Expired tokens are shown too.
                let token = open_token_store(&config)?.load_at(&name, DateTime::<Utc>::MIN_UTC)?;
                Ok(serde_json::to_string_pretty(&token)?)
            })
            .await??;
            println!("{output}");
            Ok(())
        }
    }
}

/// Serve until SIGINT or SIGTERM.
async fn serve(server: ServerConfig) -> Result<()> {
    let addr = server.bind_addr;
    let engine = tokio::task::spawn_blocking(move || -> Result<_> {
        let config = server.load_oai_config()?;
        build_engine(&server, config)
    })
    .await??;

    let tokens = engine.token_store().clone();
    let sweep_interval = engine.config().sweep_interval();
    let app = router(AppState::new(engine));

    let cancel = CancellationToken::new();
    let sweeper = spawn_sweeper(tokens, sweep_interval, cancel.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {addr}");

    let shutdown = shutdown_signal()?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "token sweeper did not stop cleanly");
    }

    served?;
    tracing::info!("server stopped");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| ServerError::Config(format!("failed to register SIGTERM handler: {e}")))?;

    Ok(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
        }
    })
}
