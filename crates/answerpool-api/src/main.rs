//! answerpool CLI and REST API entry point.
//!
//! Binary name: `apool`
//!
//! Parses CLI arguments, sets up tracing, builds the pool from the config
//! file, then dispatches to the command handler or starts the API server.

mod cli;
mod http;
mod state;

use std::sync::Arc;

use clap::Parser;
use clap_complete::generate;
use tokio_util::sync::CancellationToken;

use answerpool_core::pool::checker::run_health_checks;
use answerpool_observe::tracing_setup::{
    TracingOptions, filter_for_verbosity, init_tracing, shutdown_tracing,
};
use answerpool_types::answer::AnswerRequest;
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        filter: filter_for_verbosity(cli.verbose, cli.quiet).to_string(),
        json: cli.log_json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Commands that don't need a built pool
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(*shell, &mut cmd, "apool", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config { action } => {
            return cli::config::handle_config_command(action, &cli.config, cli.json).await;
        }
        _ => {}
    }

    let state = AppState::init(&cli.config).await?;

    match cli.command {
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| state.server.host.clone());
            let port = port.unwrap_or(state.server.port);
            serve(state, &host, port).await?;
        }

        Commands::Ask {
            question,
            model,
            question_type,
            options,
        } => {
            let request = AnswerRequest {
                question,
                model,
                question_type,
                options,
            };
            cli::ask::ask(&state, request, cli.json).await?;
        }

        Commands::Provider { action } => {
            cli::provider::handle_provider_command(action, &state, cli.json).await?;
        }

        Commands::Cache { action } => {
            cli::cache::handle_cache_command(action, &state, cli.json).await?;
        }

        Commands::Completions { .. } | Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}

async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} answerpool listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let checker = CancellationToken::new();
    let checker_task = state.health_check.map(|period| {
        tokio::spawn(run_health_checks(
            Arc::clone(&state.dispatcher),
            period,
            checker.clone(),
        ))
    });

    let router = http::router::build_router(state);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    checker.cancel();
    if let Some(task) = checker_task {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Health checker task failed");
        }
    }
    served?;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
