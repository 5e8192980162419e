//! Request and response types for the Claude Messages API
use serde::{Deserialize, Serialize};

use crate::domain::ports::{CompletionRequest, PromptMessage, PromptRole};

/// Message request to send to Claude API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    /// Model identifier
    pub model: String,

    /// Conversation turns, alternating user and assistant
    pub messages: Vec<Message>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// System prompt (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl MessageRequest {
    /// Request for `model` built from a port-level completion.
    pub fn from_completion(model: &str, max_tokens: u32, request: CompletionRequest) -> Self {
        Self {
            model: model.to_string(),
            messages: request.messages.into_iter().map(Message::from).collect(),
            max_tokens,
            system: request.system,
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// `user` or `assistant`
    pub role: String,
    /// Turn text
    pub content: String,
}

impl From<PromptMessage> for Message {
    fn from(m: PromptMessage) -> Self {
        let role = match m.role {
            PromptRole::User => "user",
            PromptRole::Assistant => "assistant",
        };
        Self {
            role: role.to_string(),
            content: m.content,
        }
    }
}

/// Content block in a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Generated text
    Text {
        /// Block text
        text: String,
    },
    /// Tool use, thinking and any other block kinds
    #[serde(other)]
    Other,
}

/// Response from Claude API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message id
    pub id: String,
    /// Model that produced the response
    pub model: String,
    /// Content blocks in order
    pub content: Vec<ContentBlock>,
    /// Why generation stopped
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token accounting
    #[serde(default)]
    pub usage: Usage,
}

impl MessageResponse {
    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect()
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Generated tokens
    pub output_tokens: u32,
}
