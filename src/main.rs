//! Relaybot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use serenity::all::GatewayIntents;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relaybot")]
#[command(about = "A Discord bot that relays conversations to a language model")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Secrets may live in a local .env file.
    let dotenv = dotenvy::dotenv();

    let default_level = if cli.debug { "relaybot=debug,info" } else { "relaybot=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    tracing::info!("starting relaybot");

    let config = if let Some(config_path) = cli.config {
        relaybot::config::Config::load_from_path(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        relaybot::config::Config::load().with_context(|| "failed to load configuration")?
    };

    let token = config
        .discord_token()
        .with_context(|| "DISCORD_TOKEN must be set")?
        .to_string();

    tracing::info!(
        model = %config.llm.model,
        max_history = config.bot.max_history,
        internet_access = config.bot.internet_access,
        "configuration loaded"
    );

    let state = Arc::new(
        relaybot::AppState::build(config)
            .await
            .with_context(|| "failed to initialize bot state")?,
    );

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::Client::builder(&token, intents)
        .event_handler(relaybot::messaging::Handler::new(state.clone()))
        .await
        .with_context(|| "failed to create Discord client")?;

    state.set_shard_manager(client.shard_manager.clone());
    let shard_manager = client.shard_manager.clone();

    tokio::select! {
        result = client.start() => {
            result.with_context(|| "Discord client stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            shard_manager.shutdown_all().await;
        }
    }

    tracing::info!("relaybot stopped");
    Ok(())
}
