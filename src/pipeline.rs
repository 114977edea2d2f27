//! The paste pipeline: qualify, tag, paste, delete the original, reply.
//!
//! Each external call happens at most once per message. Failures are caught
//! at their stage, logged, and reported through [`PipelineOutcome`]; nothing
//! propagates back to the event loop.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::utils::html;
use tracing::{error, info, warn};

use crate::config::PasteConfig;
use crate::detect::{Detection, LanguageDetector, PLAINTEXT};
use crate::paste::{PasteRequest, PasteResult, PasteService};
use crate::platform::IncomingMessage;
use crate::qualify::{Qualifier, Reason};

/// Chat-side actions the pipeline performs
#[async_trait]
pub trait ChatActions: Send + Sync {
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()>;

    /// Sends an HTML-formatted message
    async fn send_message(&self, chat_id: i64, html_text: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchLanguages,
    CreatePaste,
    DeleteMessage,
    SendReply,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::FetchLanguages => write!(f, "fetch_languages"),
            Stage::CreatePaste => write!(f, "create_paste"),
            Stage::DeleteMessage => write!(f, "delete_message"),
            Stage::SendReply => write!(f, "send_reply"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} failed: {cause}")]
pub struct RemoteCallFailure {
    pub stage: Stage,
    pub cause: String,
}

impl RemoteCallFailure {
    fn new(stage: Stage, err: anyhow::Error) -> Self {
        Self {
            stage,
            cause: format!("{:#}", err),
        }
    }
}

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The message did not qualify. No side effects.
    Rejected,
    /// Paste created, original deleted, reply posted.
    ReplySent {
        paste: PasteResult,
        language: String,
        reason: Reason,
    },
    /// Paste created and reply posted, but the original could not be deleted.
    ReplySentOriginalKept {
        paste: PasteResult,
        language: String,
        reason: Reason,
        delete_failure: RemoteCallFailure,
    },
    /// A stage failed and nothing further was attempted.
    /// `paste` is set when the paste already exists remotely.
    Failed {
        failure: RemoteCallFailure,
        paste: Option<PasteResult>,
        original_deleted: bool,
    },
}

impl PipelineOutcome {
    fn failed(failure: RemoteCallFailure) -> Self {
        PipelineOutcome::Failed {
            failure,
            paste: None,
            original_deleted: false,
        }
    }
}

/// Log-only preview. Paste bodies are never truncated.
fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out.replace('\n', "⏎")
}

/// HTML mention linking to the sender's profile
fn mention(message: &IncomingMessage) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        message.sender_id,
        html::escape(&message.sender_display_name)
    )
}

pub fn format_reply(
    message: &IncomingMessage,
    paste: &PasteResult,
    language: &str,
    reason: Reason,
) -> String {
    let what = match reason {
        Reason::CodePattern => "a code snippet",
        Reason::TooLong => "a long message",
        // rejected messages never reach a reply
        Reason::None => "a message",
    };
    format!(
        "{} sent {} ({}).\n📋 View it here: {}",
        mention(message),
        what,
        html::escape(language),
        html::escape(&paste.paste_url)
    )
}

pub struct PastePipeline {
    qualifier: Qualifier,
    detector: Arc<LanguageDetector>,
    pastes: Arc<dyn PasteService>,
    chat: Arc<dyn ChatActions>,
    expiration_days: u32,
    one_time: bool,
}

impl PastePipeline {
    pub fn new(
        qualifier: Qualifier,
        detector: Arc<LanguageDetector>,
        pastes: Arc<dyn PasteService>,
        chat: Arc<dyn ChatActions>,
        paste_config: &PasteConfig,
    ) -> Self {
        Self {
            qualifier,
            detector,
            pastes,
            chat,
            expiration_days: paste_config.expiration_days,
            one_time: paste_config.one_time,
        }
    }

    pub fn qualifier(&self) -> &Qualifier {
        &self.qualifier
    }

    /// Turns `Unknown` into a concrete tag: the service's first supported
    /// language, or `plaintext` when it lists none.
    async fn resolve_language(&self, detection: Detection) -> Result<String, RemoteCallFailure> {
        if let Some(tag) = detection.tag() {
            return Ok(tag.to_string());
        }

        let languages = self
            .pastes
            .supported_languages()
            .await
            .map_err(|e| RemoteCallFailure::new(Stage::FetchLanguages, e))?;

        Ok(languages
            .into_iter()
            .next()
            .unwrap_or_else(|| PLAINTEXT.to_string()))
    }

    pub async fn process(&self, message: &IncomingMessage) -> PipelineOutcome {
        let classification = self.qualifier.should_create_paste(message);
        if !classification.should_paste {
            return PipelineOutcome::Rejected;
        }
        let reason = classification.reason;

        info!(
            "Message {} in {:?} chat {} qualifies ({}): {}",
            message.message_id,
            message.chat_kind,
            message.chat_id,
            reason,
            preview(&message.text, 40)
        );

        let detection = self.detector.detect_language(&message.text);
        let language = match self.resolve_language(detection).await {
            Ok(language) => language,
            Err(failure) => {
                error!("Could not resolve fallback language: {}", failure);
                return PipelineOutcome::failed(failure);
            }
        };

        let request = PasteRequest {
            content: message.text.clone(),
            language: Some(language.clone()),
            expiration: self.expiration_days,
            one_time: self.one_time,
        };

        let paste = match self.pastes.create_paste(&request).await {
            Ok(paste) => paste,
            Err(e) => {
                let failure = RemoteCallFailure::new(Stage::CreatePaste, e);
                error!("Error creating paste: {}", failure);
                return PipelineOutcome::failed(failure);
            }
        };

        let delete_failure = match self
            .chat
            .delete_message(message.chat_id, message.message_id)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                let failure = RemoteCallFailure::new(Stage::DeleteMessage, e);
                warn!("Error deleting message, still sending the link: {}", failure);
                Some(failure)
            }
        };

        let reply = format_reply(message, &paste, &language, reason);
        if let Err(e) = self.chat.send_message(message.chat_id, &reply).await {
            let failure = RemoteCallFailure::new(Stage::SendReply, e);
            error!(
                "Paste {} created but the link was not delivered: {}",
                paste.paste_id, failure
            );
            return PipelineOutcome::Failed {
                failure,
                paste: Some(paste),
                original_deleted: delete_failure.is_none(),
            };
        }

        info!(
            "Created paste {} ({}) for user {} in chat {}",
            paste.paste_id, language, message.sender_id, message.chat_id
        );

        match delete_failure {
            None => PipelineOutcome::ReplySent {
                paste,
                language,
                reason,
            },
            Some(delete_failure) => PipelineOutcome::ReplySentOriginalKept {
                paste,
                language,
                reason,
                delete_failure,
            },
        }
    }
}
