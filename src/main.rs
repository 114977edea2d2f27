mod config;
mod detect;
mod paste;
mod pipeline;
mod platform;
mod qualify;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::detect::{LanguageDetector, LanguageTable};
use crate::paste::PasteClient;
use crate::pipeline::PastePipeline;
use crate::platform::telegram::{self, TelegramChat};
use crate::platform::EventAdapter;
use crate::qualify::Qualifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pastebot=debug".into()),
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
    info!("  Paste API: {}", config.paste.api_url);
    info!("  Languages API: {}", config.paste.languages_url);
    info!("  Website: {}", config.paste.website_url);
    info!("  Min message length: {}", config.qualifier.min_length);
    info!("  API token configured: {}", config.has_api_token());

    let detector = Arc::new(LanguageDetector::new(
        LanguageTable::builtin().context("Failed to build language table")?,
    ));
    info!(
        "  Language groups: {:?}",
        detector.table().tags().collect::<Vec<_>>()
    );

    let bot = Bot::new(&config.telegram.bot_token);
    let me = bot
        .get_me()
        .await
        .context("Failed to fetch bot identity from Telegram")?;

    let chat = Arc::new(TelegramChat::new(bot.clone(), config.telegram.timeout()));
    let pastes = Arc::new(PasteClient::new(config.paste.clone())?);
    let qualifier = Qualifier::new(config.qualifier.min_length)?;
    let pipeline = Arc::new(PastePipeline::new(
        qualifier,
        detector,
        pastes,
        chat,
        &config.paste,
    ));
    info!(
        "Pasting messages over {} chars or with code signals",
        pipeline.qualifier().min_length()
    );

    let adapter = Arc::new(EventAdapter::new(pipeline, Some(me.id.0)));

    info!("Bot is starting...");
    telegram::run(bot, me, adapter, Arc::new(config)).await?;

    Ok(())
}
