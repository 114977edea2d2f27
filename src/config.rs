use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_paste_config")]
    pub paste: PasteConfig,
    #[serde(default = "default_qualifier_config")]
    pub qualifier: QualifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PasteConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_languages_url")]
    pub languages_url: String,
    /// Public site the paste links point at (`<website_url>/<paste id>`)
    #[serde(default = "default_website_url")]
    pub website_url: String,
    /// Sent as `X-Bot-Token` so the service can whitelist the bot
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_expiration_days")]
    pub expiration_days: u32,
    #[serde(default)]
    pub one_time: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QualifierConfig {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_api_url() -> String {
    "http://localhost:8000/api/pastes/".to_string()
}

fn default_languages_url() -> String {
    "http://localhost:8000/api/languages/".to_string()
}

fn default_website_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_expiration_days() -> u32 {
    7
}

fn default_min_length() -> usize {
    200
}

fn default_paste_config() -> PasteConfig {
    PasteConfig {
        api_url: default_api_url(),
        languages_url: default_languages_url(),
        website_url: default_website_url(),
        api_token: None,
        expiration_days: default_expiration_days(),
        one_time: false,
        timeout_secs: default_timeout_secs(),
    }
}

fn default_qualifier_config() -> QualifierConfig {
    QualifierConfig {
        min_length: default_min_length(),
    }
}

impl TelegramConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PasteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Secrets and the threshold can come from the environment instead of the file.
    /// Recognised keys: `TELEGRAM_TOKEN`, `BOT_TOKEN`, `MIN_MESSAGE_LENGTH`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_TOKEN").filter(|t| !t.is_empty()) {
            self.telegram.bot_token = token;
        }
        if let Some(token) = lookup("BOT_TOKEN").filter(|t| !t.is_empty()) {
            self.paste.api_token = Some(token);
        }
        if let Some(raw) = lookup("MIN_MESSAGE_LENGTH") {
            self.qualifier.min_length = raw
                .trim()
                .parse()
                .with_context(|| format!("MIN_MESSAGE_LENGTH is not a number: {}", raw))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("telegram.bot_token is empty (set it in the config or TELEGRAM_TOKEN)");
        }
        if self.paste.website_url.trim().is_empty() {
            anyhow::bail!("paste.website_url must not be empty");
        }
        Ok(())
    }

    /// Whether the paste API token is configured, for the status summary
    pub fn has_api_token(&self) -> bool {
        self.paste
            .api_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }
}
