mod bot;
mod config;
mod error;
mod platform;
mod strategy;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::destination::Roster;
use crate::bot::events::EventBus;
use crate::bot::orchestrator::Orchestrator;
use crate::bot::user::BotUser;
use crate::config::Config;
use crate::platform::slack::SlackClient;
use crate::platform::Transport;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chatbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  API base URL: {}", config.slack.base_url);
    info!("  Phase poll interval: {}ms", config.engine.poll_interval_ms);
    info!("  Default phase budget: {}ms", config.engine.default_max_wait_ms);

    // Connect to the platform and resolve who we are. The configured name is
    // what the bot answers to in channels, on top of its platform identity.
    let slack = Arc::new(SlackClient::new(&config.slack));
    let identity = slack
        .bot_identity()
        .await
        .context("Failed to resolve bot identity")?;
    let bot_user = BotUser::with_alias(identity, &config.bot.name);

    // Load the user/destination registry
    let roster = Arc::new(Roster::new());
    let listen = slack
        .load_roster(&roster)
        .await
        .context("Failed to load roster")?;
    info!(
        "Roster: {} users, {} destinations",
        roster.user_count(),
        roster.destination_count()
    );

    // Wire inbound delivery into the engine
    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    Arc::clone(&slack).spawn_listener(listen, inbound_tx, config.engine.inbound_poll());

    let events = EventBus::new(16);
    let orchestrator = Orchestrator::new(
        Arc::clone(&slack) as Arc<dyn Transport>,
        roster,
        bot_user,
        events,
        &config.engine,
    );

    info!("Bot is starting...");
    orchestrator.run(inbound_rx).await
}
