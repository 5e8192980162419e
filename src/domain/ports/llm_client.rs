//! Text completion port.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Speaker of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    /// Text written by a person
    User,
    /// Text written by the model
    Assistant,
}

/// One turn of a completion prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Who wrote the turn
    pub role: PromptRole,
    /// Turn text
    pub content: String,
}

impl PromptMessage {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// A provider-neutral completion request.
///
/// Model selection and token limits belong to the client's configuration,
/// not to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// System prompt
    pub system: Option<String>,
    /// Conversation turns, oldest first
    pub messages: Vec<PromptMessage>,
}

impl CompletionRequest {
    /// Single-turn request.
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            messages: vec![PromptMessage::user(prompt)],
        }
    }
}

/// Text completion over some LLM provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete the request and return the concatenated text output.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}
