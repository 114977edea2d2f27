use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{Chat, InlineKeyboardButton, InlineKeyboardMarkup, Me, MessageId, ParseMode};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::pipeline::{ChatActions, PipelineOutcome};
use crate::platform::{ChatEvent, ChatKind, Dispatch, EventAdapter, Sender};

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "welcome message and a button to add me to a group")]
    Start,
    #[command(description = "how the bot works")]
    Help,
    #[command(description = "bot configuration (private chat only)")]
    Status,
}

/// Telegram side of the pipeline's chat actions
pub struct TelegramChat {
    bot: Bot,
    timeout: Duration,
}

impl TelegramChat {
    pub fn new(bot: Bot, timeout: Duration) -> Self {
        Self { bot, timeout }
    }
}

#[async_trait]
impl ChatActions for TelegramChat {
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
        let request = self
            .bot
            .delete_message(ChatId(chat_id), MessageId(message_id));
        tokio::time::timeout(self.timeout, request)
            .await
            .context("Timed out deleting message")?
            .context("Failed to delete message")?;
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, html_text: &str) -> Result<()> {
        let request = self
            .bot
            .send_message(ChatId(chat_id), html_text)
            .parse_mode(ParseMode::Html);
        tokio::time::timeout(self.timeout, request)
            .await
            .context("Timed out sending message")?
            .context("Failed to send message")?;
        Ok(())
    }
}

fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else if chat.is_group() {
        ChatKind::Group
    } else {
        ChatKind::Channel
    }
}

fn to_event(msg: &Message) -> ChatEvent {
    ChatEvent {
        text: msg.text().map(str::to_string),
        chat_kind: chat_kind(&msg.chat),
        sender: msg.from.as_ref().map(|user| Sender {
            id: user.id.0,
            display_name: user.full_name(),
            is_bot: user.is_bot,
        }),
        message_id: msg.id.0,
        chat_id: msg.chat.id.0,
    }
}

fn welcome_text(config: &Config) -> String {
    format!(
        "Welcome! 📋\n\n\
         I keep group chats readable. Add me to a group and make me an admin.\n\
         When someone posts a long message or a piece of code, I move it to a paste, \
         remove the original and share the link instead. \
         Pastes expire after {} days.",
        config.paste.expiration_days
    )
}

fn help_text(config: &Config) -> String {
    format!(
        "{}\n\n\
         How it works:\n\
         1. Add me to your group\n\
         2. Make me an admin (I need to delete messages)\n\
         3. Messages longer than {} characters, or that look like code, become pastes\n\
         4. I post the paste link and mention the author\n\n\
         The language is detected automatically. I only act in groups, never in private chats.",
        Command::descriptions(),
        config.qualifier.min_length
    )
}

fn status_text(config: &Config, me: &Me) -> String {
    format!(
        "📊 Bot status\n\n\
         Paste API: {}\n\
         Languages API: {}\n\
         Website: {}\n\
         Min message length: {} chars\n\
         Paste expiration: {} days\n\
         API token configured: {}\n\n\
         Bot: @{} ({})\n\
         Status: ✅ Running",
        config.paste.api_url,
        config.paste.languages_url,
        config.paste.website_url,
        config.qualifier.min_length,
        config.paste.expiration_days,
        if config.has_api_token() { "yes" } else { "no" },
        me.username(),
        me.id.0
    )
}

/// Run the Telegram bot platform
pub async fn run(bot: Bot, me: Me, adapter: Arc<EventAdapter>, config: Arc<Config>) -> Result<()> {
    info!("Starting Telegram platform as @{}...", me.username());

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![adapter, config, me])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Telegram platform stopped");
    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    me: Me,
    config: Arc<Config>,
) -> ResponseResult<()> {
    debug!("Command {:?} in chat {}", cmd, msg.chat.id.0);

    match cmd {
        Command::Start => {
            let keyboard = match reqwest::Url::parse(&format!(
                "https://t.me/{}?startgroup=true",
                me.username()
            )) {
                Ok(url) => Some(InlineKeyboardMarkup::new(vec![vec![
                    InlineKeyboardButton::url("➕ Add to Group", url),
                ]])),
                Err(e) => {
                    warn!("Could not build add-to-group link: {}", e);
                    None
                }
            };
            let request = bot.send_message(msg.chat.id, welcome_text(&config));
            match keyboard {
                Some(keyboard) => request.reply_markup(keyboard).await?,
                None => request.await?,
            };
        }
        Command::Help => {
            bot.send_message(msg.chat.id, help_text(&config)).await?;
        }
        Command::Status => {
            if !msg.chat.is_private() {
                bot.send_message(
                    msg.chat.id,
                    "❌ This command is only available in private chat.",
                )
                .await?;
                return Ok(());
            }
            bot.send_message(msg.chat.id, status_text(&config, &me))
                .await?;
        }
    }

    Ok(())
}

async fn handle_message(msg: Message, adapter: Arc<EventAdapter>) -> ResponseResult<()> {
    match adapter.handle_event(to_event(&msg)).await {
        Dispatch::Ignored(reason) => {
            debug!(
                "Skipped message {} in chat {}: {:?}",
                msg.id.0, msg.chat.id.0, reason
            );
        }
        Dispatch::Processed(PipelineOutcome::Rejected) => {}
        Dispatch::Processed(outcome) => {
            debug!("Pipeline finished for message {}: {:?}", msg.id.0, outcome);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::parse("[telegram]\nbot_token = \"t\"\n[qualifier]\nmin_length = 150\n").unwrap()
    }

    #[test]
    fn test_commands_parse() {
        assert_eq!(Command::parse("/start", "pastebot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/help@pastebot", "pastebot").unwrap(), Command::Help);
        assert_eq!(Command::parse("/status", "pastebot").unwrap(), Command::Status);
        assert!(Command::parse("/paste", "pastebot").is_err());
    }

    #[test]
    fn test_help_mentions_threshold_and_commands() {
        let text = help_text(&config());
        assert!(text.contains("150 characters"));
        assert!(text.contains("/status"));
    }

    #[test]
    fn test_welcome_mentions_expiration() {
        assert!(welcome_text(&config()).contains("7 days"));
    }

    #[tokio::test]
    async fn test_slow_api_times_out() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true, "result": true}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let bot = Bot::new("t").set_api_url(reqwest::Url::parse(&server.uri()).unwrap());
        let chat = TelegramChat::new(bot, Duration::from_secs(1));

        let err = chat.delete_message(1, 2).await.unwrap_err();
        assert!(err.to_string().contains("Timed out"), "{}", err);

        let err = chat.send_message(1, "hi").await.unwrap_err();
        assert!(err.to_string().contains("Timed out"), "{}", err);
    }
}
