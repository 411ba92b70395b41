//! Chorus chat server entry point.
//!
//! Binary name: `chorus`
//!
//! Parses CLI arguments, initializes tracing and application state, then
//! serves WebSocket chats and speech clips until Ctrl+C or SIGTERM.

mod cli;
mod http;
mod session;
mod state;
#[cfg(test)]
mod testing;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use chorus_core::repository::ChatRepository;
use chorus_infra::config::resolve_data_dir;
use chorus_infra::llm::default_registry;
use chorus_observe::tracing_setup::{default_filter, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(default_filter(cli.verbose), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = resolve_data_dir(cli.data_dir);
    let shutdown = CancellationToken::new();
    let state = AppState::init(data_dir.clone(), default_registry(), shutdown.clone()).await?;

    match cli.command {
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            tracing::info!(%addr, data_dir = %data_dir.display(), "Chorus listening");
            println!("  Chorus listening on ws://{addr}/ws");
            println!("  Press Ctrl+C to stop");

            let router = http::router::build_router(state);
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_signal().await;
                    shutdown.cancel();
                })
                .await?;

            println!("\n  Server stopped.");
        }

        Commands::Characters => {
            if state.config.characters.is_empty() {
                println!("No characters configured in {}", data_dir.join("config.toml").display());
            }
            for character in state.config.characters.iter() {
                let chats = state.chats.list_chats(&character.id).await?;
                println!("{}  {} ({} chats)", character.id, character.name, chats.len());
                for chat in chats {
                    println!("    {}  started {}", chat.id, chat.created_at.format("%Y-%m-%d %H:%M"));
                }
            }
            shutdown.cancel();
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
