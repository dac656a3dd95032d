//! Onramp CLI and REST API entry point.
//!
//! Binary name: `onramp`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use std::sync::Arc;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, ListResource};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default filter based on verbosity; RUST_LOG overrides.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,onramp=debug",
        _ => "trace",
    };

    let enable_otel = matches!(cli.command, Commands::Serve { otel: true, .. });
    onramp_observe::tracing_setup::init_tracing(enable_otel, filter)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "onramp", &mut std::io::stdout());
        return Ok(());
    }

    // Initialize application state (DB, services)
    let state = AppState::init().await?;

    match cli.command {
        Commands::List { resource } => match resource {
            ListResource::Employees => {
                cli::employee::list_employees(&state, cli.json).await?;
            }
        },

        Commands::Show { id } => {
            cli::employee::show_employee(&state, &id, cli.json).await?;
        }

        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }

        Commands::Serve { port, host, .. } => {
            // Re-enter workflows that were in flight when the process last
            // stopped, before accepting new traffic-driven triggers.
            let engine = Arc::clone(&state.engine);
            tokio::spawn(async move {
                match engine.resume_in_flight().await {
                    Ok(outcomes) if outcomes.is_empty() => {}
                    Ok(outcomes) => {
                        tracing::info!(count = outcomes.len(), "resumed in-flight workflows");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "in-flight workflow recovery failed");
                    }
                }
            });

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} Onramp API listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            onramp_observe::tracing_setup::shutdown_tracing();
            println!("\n  Server stopped.");
        }

        Commands::Completions { .. } => unreachable!("handled above"),
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
