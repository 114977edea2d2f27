pub mod telegram;

use std::sync::Arc;

use tracing::debug;

use crate::pipeline::{PastePipeline, PipelineOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn is_group(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

/// Who sent an inbound event
#[derive(Debug, Clone)]
pub struct Sender {
    pub id: u64,
    pub display_name: String,
    pub is_bot: bool,
}

/// A raw inbound chat event, before any filtering
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub text: Option<String>,
    pub chat_kind: ChatKind,
    pub sender: Option<Sender>,
    pub message_id: i32,
    pub chat_id: i64,
}

/// A group message that passed the adapter's filters
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// The message text
    pub text: String,
    pub chat_kind: ChatKind,
    pub sender_id: u64,
    /// Display name of the sender
    pub sender_display_name: String,
    pub message_id: i32,
    pub chat_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoText,
    NoSender,
    FromBot,
    NotGroup,
    Command,
}

/// What the adapter did with one event
#[derive(Debug)]
pub enum Dispatch {
    Ignored(IgnoreReason),
    Processed(PipelineOutcome),
}

/// Scopes inbound events to group messages from humans and hands them to
/// the pipeline, once per event.
pub struct EventAdapter {
    pipeline: Arc<PastePipeline>,
    bot_user_id: Option<u64>,
}

impl EventAdapter {
    pub fn new(pipeline: Arc<PastePipeline>, bot_user_id: Option<u64>) -> Self {
        Self {
            pipeline,
            bot_user_id,
        }
    }

    pub fn filter(&self, event: ChatEvent) -> Result<IncomingMessage, IgnoreReason> {
        let text = event.text.ok_or(IgnoreReason::NoText)?;
        let sender = event.sender.ok_or(IgnoreReason::NoSender)?;

        if sender.is_bot || Some(sender.id) == self.bot_user_id {
            return Err(IgnoreReason::FromBot);
        }
        if !event.chat_kind.is_group() {
            return Err(IgnoreReason::NotGroup);
        }
        if text.starts_with('/') {
            return Err(IgnoreReason::Command);
        }

        Ok(IncomingMessage {
            text,
            chat_kind: event.chat_kind,
            sender_id: sender.id,
            sender_display_name: sender.display_name,
            message_id: event.message_id,
            chat_id: event.chat_id,
        })
    }

    pub async fn handle_event(&self, event: ChatEvent) -> Dispatch {
        match self.filter(event) {
            Ok(message) => Dispatch::Processed(self.pipeline.process(&message).await),
            Err(reason) => {
                debug!("Ignoring event: {:?}", reason);
                Dispatch::Ignored(reason)
            }
        }
    }
}
