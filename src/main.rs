//! Gridmatch - Unified CLI
//!
//! Runs the match server or publishes the hall of fame once.

#![warn(missing_docs)]

mod cli;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use gridmatch::{
    AppState, DirectorySink, GameRepository, GithubOAuth, HallOfFame, HttpSink, MatchService,
    PublicationSink, PublishStatus, ServerConfig, router,
};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gridmatch=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { host, port } => run_server(config.with_bind(host, port)).await,
        Command::Publish => run_publish(config).await,
    }
}

/// Opens the database and applies pending migrations.
#[instrument(skip(config))]
fn open_repository(config: &ServerConfig) -> Result<GameRepository> {
    let repository = GameRepository::new(config.db_path().clone())?;
    repository.run_migrations()?;
    Ok(repository)
}

/// Builds the hall-of-fame publisher from config.
fn hall_of_fame(config: &ServerConfig, client: &reqwest::Client) -> HallOfFame {
    let sink: Arc<dyn PublicationSink> = match config.publish_url() {
        Some(url) => Arc::new(HttpSink::new(client.clone(), url.clone())),
        None => Arc::new(DirectorySink::new(config.publish_dir().clone())),
    };
    HallOfFame::new(
        sink,
        config.destination_key().clone(),
        config.publish_timeout(),
    )
}

/// Run the HTTP match server
async fn run_server(config: ServerConfig) -> Result<()> {
    info!(addr = %config.bind_addr(), "Starting gridmatch server");

    if config.github_client_id().is_empty() {
        warn!("No OAuth client id configured, logins will fail");
    }

    let repository = open_repository(&config)?;
    let client = reqwest::Client::new();
    let state = AppState {
        service: MatchService::new(repository, config.match_settings()),
        identity: Arc::new(GithubOAuth::new(
            client.clone(),
            config.github_client_id().clone(),
            config.github_client_secret().clone(),
        )),
        hall_of_fame: hall_of_fame(&config, &client),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

/// Publish the hall of fame once from the stored aggregates
async fn run_publish(config: ServerConfig) -> Result<()> {
    let repository = open_repository(&config)?;
    let service = MatchService::new(repository, config.match_settings());
    let entries = tokio::task::spawn_blocking(move || service.leaderboard()).await??;
    info!(entries = entries.len(), "Publishing hall of fame");

    let client = reqwest::Client::new();
    match hall_of_fame(&config, &client).publish(&entries).await {
        PublishStatus::Published => Ok(()),
        PublishStatus::Failed(message) => anyhow::bail!("Publication failed: {}", message),
        PublishStatus::TimedOut => anyhow::bail!(
            "Publication timed out after {} ms",
            config.publish_timeout().as_millis()
        ),
    }
}
