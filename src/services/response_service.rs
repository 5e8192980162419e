//! Reply generation and response judgment over an [`LlmClient`].

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::models::{AssistantConfig, Channel, ChatMessage, Memory};
use crate::domain::ports::{CompletionRequest, LlmClient};

/// The judge's decision on whether to speak up unprompted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the assistant should reply
    pub respond: bool,
    /// Model's short justification
    #[serde(default)]
    pub reason: String,
}

impl Verdict {
    fn decline(reason: impl Into<String>) -> Self {
        Self {
            respond: false,
            reason: reason.into(),
        }
    }
}

/// Render messages as a plain `speaker: text` transcript, oldest first.
pub(crate) fn render_transcript(messages: &[ChatMessage], assistant_name: &str) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = if m.is_bot { assistant_name } else { m.user_id.as_str() };
            format!("{}: {}", speaker, m.text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull the outermost JSON object out of a response that may be wrapped in
/// prose or a code fence.
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parse a judge response, declining when it cannot be understood.
pub fn parse_verdict(response: &str) -> Verdict {
    match serde_json::from_str::<Verdict>(extract_json(response)) {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(error = %e, "could not parse judge verdict; declining to respond");
            Verdict::decline("unparsable verdict")
        }
    }
}

/// Reply generation and reply judgment over an [`LlmClient`].
pub struct ResponseService {
    llm: Arc<dyn LlmClient>,
    assistant: AssistantConfig,
}

impl ResponseService {
    /// Service over `llm` speaking as `assistant`.
    pub fn new(llm: Arc<dyn LlmClient>, assistant: AssistantConfig) -> Self {
        Self { llm, assistant }
    }

    fn system_prompt(&self, memories: &[Memory]) -> String {
        let mut system = format!(
            "Your name is {}. {}",
            self.assistant.name, self.assistant.persona
        );
        if !memories.is_empty() {
            system.push_str("\n\n## What you remember about this channel\n");
            // Oldest first so the newest summary reads last.
            for memory in memories.iter().rev() {
                system.push_str("- ");
                system.push_str(memory.summary.trim());
                system.push('\n');
            }
        }
        system
    }

    /// Write the assistant's next message for a conversation.
    ///
    /// `history` is oldest first and should end with the message being
    /// answered; `memories` are newest first.
    pub async fn generate_reply(
        &self,
        history: &[ChatMessage],
        memories: &[Memory],
    ) -> anyhow::Result<String> {
        let prompt = format!(
            "## Conversation\n{}\n\nWrite {}'s next message. Reply with the message text only.",
            render_transcript(history, &self.assistant.name),
            self.assistant.name
        );
        let request = CompletionRequest::new(self.system_prompt(memories), prompt);

        let reply = self
            .llm
            .complete(request)
            .await
            .context("reply generation failed")?;
        let reply = reply.trim().to_string();
        debug!(chars = reply.len(), history = history.len(), "reply generated");
        Ok(reply)
    }

    /// Ask whether the assistant should join the conversation in `channel`.
    pub async fn judge(&self, channel: &Channel, recent: &[ChatMessage]) -> anyhow::Result<Verdict> {
        if recent.is_empty() {
            return Ok(Verdict::decline("no recent messages"));
        }

        let system = format!(
            "You decide whether {} should speak up in a team chat without being asked. \
             Only say yes when a reply would clearly help: an unanswered question, a request \
             nobody picked up, or a factual error. Answer with JSON only: \
             {{\"respond\": true|false, \"reason\": \"<short reason>\"}}",
            self.assistant.name
        );
        let prompt = format!(
            "## Channel #{}\n{}",
            channel.name,
            render_transcript(recent, &self.assistant.name)
        );

        let response = self
            .llm
            .complete(CompletionRequest::new(system, prompt))
            .await
            .context("response judgment failed")?;
        let verdict = parse_verdict(&response);
        debug!(channel_id = %channel.id, respond = verdict.respond, reason = %verdict.reason, "judge verdict");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct ScriptedLlm {
        response: String,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response.to_string(),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: CompletionRequest) -> anyhow::Result<String> {
            self.requests.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    fn message(user: &str, text: &str, is_bot: bool) -> ChatMessage {
        ChatMessage {
            channel_id: "C1".to_string(),
            ts: "1.0".to_string(),
            thread_ts: None,
            user_id: user.to_string(),
            text: text.to_string(),
            is_bot,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_verdict_plain_json() {
        let verdict = parse_verdict(r#"{"respond": true, "reason": "unanswered question"}"#);
        assert!(verdict.respond);
        assert_eq!(verdict.reason, "unanswered question");
    }

    #[test]
    fn test_parse_verdict_with_surrounding_prose() {
        let verdict = parse_verdict(
            "Sure, here is my answer:\n```json\n{\"respond\": false, \"reason\": \"chit-chat\"}\n```",
        );
        assert!(!verdict.respond);
        assert_eq!(verdict.reason, "chit-chat");
    }

    #[test]
    fn test_parse_verdict_missing_reason() {
        assert!(parse_verdict(r#"{"respond": true}"#).respond);
    }

    #[test]
    fn test_parse_verdict_garbage_declines() {
        let verdict = parse_verdict("I think you should probably answer.");
        assert!(!verdict.respond);
    }

    #[test]
    fn test_render_transcript_labels_bot() {
        let transcript = render_transcript(
            &[message("U1", "hi there ", false), message("B1", "hello!", true)],
            "Parlor",
        );
        assert_eq!(transcript, "U1: hi there\nParlor: hello!");
    }

    #[tokio::test]
    async fn test_generate_reply_includes_history_and_memories() {
        let llm = ScriptedLlm::new("  Sounds good!  ");
        let service = ResponseService::new(llm.clone(), AssistantConfig::default());
        let memories = vec![
            Memory::new("C1", "newest summary", "5.0", 10),
            Memory::new("C1", "older summary", "2.0", 10),
        ];

        let reply = service
            .generate_reply(&[message("U1", "shall we ship?", false)], &memories)
            .await
            .unwrap();
        assert_eq!(reply, "Sounds good!");

        let requests = llm.requests.lock().unwrap();
        let system = requests[0].system.as_deref().unwrap();
        assert!(system.starts_with("Your name is Parlor."));
        let older = system.find("older summary").unwrap();
        let newest = system.find("newest summary").unwrap();
        assert!(older < newest);
        assert!(requests[0].messages[0].content.contains("U1: shall we ship?"));
    }

    #[tokio::test]
    async fn test_judge_without_messages_skips_llm() {
        let llm = ScriptedLlm::new(r#"{"respond": true}"#);
        let service = ResponseService::new(llm.clone(), AssistantConfig::default());

        let verdict = service.judge(&Channel::new("C1", "general"), &[]).await.unwrap();
        assert!(!verdict.respond);
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_judge_parses_verdict() {
        let llm = ScriptedLlm::new(r#"{"respond": true, "reason": "question"}"#);
        let service = ResponseService::new(llm.clone(), AssistantConfig::default());

        let verdict = service
            .judge(&Channel::new("C1", "general"), &[message("U1", "anyone know?", false)])
            .await
            .unwrap();
        assert!(verdict.respond);
        assert!(llm.requests.lock().unwrap()[0].messages[0]
            .content
            .starts_with("## Channel #general"));
    }
}
