//! The chat pipeline: one request from message to reply.
//!
//! Each turn walks a fixed sequence of stages:
//!
//! 1. **Received**: validate the message and session id
//! 2. **HistoryFetched**: check out the session (serializes turns per id)
//! 3. **PromptBuilt**: web search, then assemble knowledge + results + history
//! 4. **CompletionRequested**: call the completion service
//! 5. **HistoryUpdated**: append the exchange, evicting the oldest over the bound
//! 6. **Responded**: hand the reply back
//!
//! Any failure ends the turn in the error state. Nothing is rolled back:
//! the history is only touched after a successful completion.

use crate::knowledge::KnowledgeBase;
use crate::prompt::PromptAssembler;
use crate::session::SessionStore;
use sage_config::AppConfig;
use sage_core::Exchange;
use sage_core::completion::{CompletionRequest, CompletionService, SamplingParams};
use sage_core::error::{Error, Result, ValidationError};
use sage_search::WebSearch;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    HistoryFetched,
    PromptBuilt,
    CompletionRequested,
    HistoryUpdated,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::HistoryFetched => "history_fetched",
            Stage::PromptBuilt => "prompt_built",
            Stage::CompletionRequested => "completion_requested",
            Stage::HistoryUpdated => "history_updated",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Tunables for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub domain: String,
    pub max_tokens: u32,
    pub sampling: SamplingParams,
    pub max_message_chars: usize,
    pub max_session_id_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let c = &config.completion;
        Self {
            domain: config.assistant.domain.clone(),
            max_tokens: c.max_tokens,
            sampling: SamplingParams {
                temperature: c.temperature,
                top_p: c.top_p,
                top_k: c.top_k,
                repetition_penalty: c.repetition_penalty,
            },
            max_message_chars: config.session.max_message_chars,
            max_session_id_chars: config.session.max_session_id_chars,
        }
    }
}

/// The result of a successful turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub session_id: String,
    pub reply: String,
    /// History length after this turn was appended
    pub history_len: usize,
}

/// Orchestrates knowledge, search, sessions, and the completion service.
pub struct ChatPipeline {
    completion: Arc<dyn CompletionService>,
    search: WebSearch,
    knowledge: KnowledgeBase,
    sessions: Arc<dyn SessionStore>,
    assembler: PromptAssembler,
    settings: PipelineSettings,
}

impl ChatPipeline {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        search: WebSearch,
        knowledge: KnowledgeBase,
        sessions: Arc<dyn SessionStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            completion,
            search,
            knowledge,
            assembler: PromptAssembler::new(settings.domain.clone()),
            sessions,
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn completion(&self) -> &Arc<dyn CompletionService> {
        &self.completion
    }

    /// Run one turn for `session_id`.
    pub async fn respond(&self, session_id: &str, message: &str) -> Result<ChatTurn> {
        let stage = Stage::Received;
        debug!(session_id, %stage, message_len = message.len(), "Chat turn started");

        let message = match self.validate(session_id, message) {
            Ok(m) => m,
            Err(e) => return Err(self.fail(session_id, stage, e.into())),
        };

        let mut session = self.sessions.checkout(session_id).await;
        let history = session.history();
        let stage = Stage::HistoryFetched;
        debug!(session_id, %stage, history_len = history.len(), "Session checked out");

        let results = self.search.search(message).await;
        let prompt = self
            .assembler
            .build_prompt(message, &self.knowledge.text, &results, &history);
        let stage = Stage::PromptBuilt;
        debug!(
            session_id,
            %stage,
            search_results = results.len(),
            prompt_len = prompt.len(),
            "Prompt assembled"
        );

        let stage = Stage::CompletionRequested;
        debug!(session_id, %stage, backend = self.completion.name(), "Requesting completion");
        let request =
            CompletionRequest::new(prompt, self.settings.max_tokens, self.settings.sampling);
        let completion = match self.completion.complete(request).await {
            Ok(c) => c,
            Err(e) => return Err(self.fail(session_id, stage, e.into())),
        };

        session.append(Exchange::new(message, completion.text.clone()));
        let history_len = session.len();
        drop(session);
        let stage = Stage::HistoryUpdated;
        debug!(session_id, %stage, history_len, "History updated");

        let stage = Stage::Responded;
        debug!(
            session_id,
            %stage,
            model = %completion.model,
            reply_len = completion.text.len(),
            "Chat turn complete"
        );

        Ok(ChatTurn {
            session_id: session_id.to_string(),
            reply: completion.text,
            history_len,
        })
    }

    /// Check the inputs; returns the trimmed message.
    fn validate<'a>(
        &self,
        session_id: &str,
        message: &'a str,
    ) -> std::result::Result<&'a str, ValidationError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        let len = message.chars().count();
        if len > self.settings.max_message_chars {
            return Err(ValidationError::MessageTooLong {
                len,
                max: self.settings.max_message_chars,
            });
        }

        if session_id.is_empty() {
            return Err(ValidationError::InvalidSessionId("must not be empty".into()));
        }
        if session_id.chars().count() > self.settings.max_session_id_chars {
            return Err(ValidationError::InvalidSessionId(format!(
                "longer than {} characters",
                self.settings.max_session_id_chars
            )));
        }
        if session_id.chars().any(char::is_control) {
            return Err(ValidationError::InvalidSessionId(
                "contains control characters".into(),
            ));
        }

        Ok(message)
    }

    fn fail(&self, session_id: &str, stage: Stage, err: Error) -> Error {
        error!(session_id, %stage, error = %err, "Chat turn failed");
        err
    }
}
