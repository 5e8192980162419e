//! Rolling channel summaries ("memories").

use std::sync::Arc;

use anyhow::{bail, Context};

use super::response_service::render_transcript;
use crate::domain::models::{AssistantConfig, Channel, ChatMessage, Memory};
use crate::domain::ports::{CompletionRequest, LlmClient};

/// Writes rolling channel memories.
pub struct SummaryService {
    llm: Arc<dyn LlmClient>,
    assistant: AssistantConfig,
}

impl SummaryService {
    /// Service over `llm` writing as `assistant`.
    pub fn new(llm: Arc<dyn LlmClient>, assistant: AssistantConfig) -> Self {
        Self { llm, assistant }
    }

    /// Fold `messages` (oldest first) into the channel's previous memory.
    pub async fn summarize(
        &self,
        channel: &Channel,
        previous: Option<&Memory>,
        messages: &[ChatMessage],
    ) -> anyhow::Result<Memory> {
        let Some(last) = messages.last() else {
            bail!("nothing to summarize for channel {}", channel.id);
        };

        let system = "You maintain a running memory of a team chat channel. \
                      Produce a concise summary of ongoing topics, decisions, open questions \
                      and who is involved. Write plain prose, at most a few short paragraphs.";
        let previous_text = previous.map_or("(none yet)", |m| m.summary.as_str());
        let prompt = format!(
            "## Channel #{}\n\n## Previous summary\n{}\n\n## New messages\n{}\n\nWrite the updated summary.",
            channel.name,
            previous_text,
            render_transcript(messages, &self.assistant.name)
        );

        let summary = self
            .llm
            .complete(CompletionRequest::new(system, prompt))
            .await
            .with_context(|| format!("summarizing channel {} failed", channel.id))?;
        let summary = summary.trim();
        if summary.is_empty() {
            bail!("model returned an empty summary for channel {}", channel.id);
        }

        let count = u32::try_from(messages.len()).unwrap_or(u32::MAX);
        Ok(Memory::new(&channel.id, summary, &last.ts, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct EchoLlm {
        reply: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn complete(&self, request: CompletionRequest) -> anyhow::Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[0].content.clone());
            Ok(self.reply.to_string())
        }
    }

    fn msg(ts: &str, text: &str) -> ChatMessage {
        ChatMessage {
            channel_id: "C1".to_string(),
            ts: ts.to_string(),
            thread_ts: None,
            user_id: "U1".to_string(),
            text: text.to_string(),
            is_bot: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_summarize_builds_memory() {
        let llm = Arc::new(EchoLlm {
            reply: " Team agreed to ship Friday. ",
            prompts: Mutex::new(Vec::new()),
        });
        let service = SummaryService::new(llm.clone(), AssistantConfig::default());
        let channel = Channel::new("C1", "general");
        let previous = Memory::new("C1", "Release planning started.", "1.0", 4);

        let memory = service
            .summarize(
                &channel,
                Some(&previous),
                &[msg("2.0", "ship friday?"), msg("3.0", "yes")],
            )
            .await
            .unwrap();

        assert_eq!(memory.channel_id, "C1");
        assert_eq!(memory.summary, "Team agreed to ship Friday.");
        assert_eq!(memory.covers_until_ts, "3.0");
        assert_eq!(memory.message_count, 2);

        let prompt = &llm.prompts.lock().unwrap()[0];
        assert!(prompt.contains("Release planning started."));
        assert!(prompt.contains("U1: ship friday?"));
    }

    #[tokio::test]
    async fn test_summarize_rejects_empty_input() {
        let llm = Arc::new(EchoLlm {
            reply: "anything",
            prompts: Mutex::new(Vec::new()),
        });
        let service = SummaryService::new(llm.clone(), AssistantConfig::default());

        let result = service
            .summarize(&Channel::new("C1", "general"), None, &[])
            .await;
        assert!(result.is_err());
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summarize_rejects_blank_model_output() {
        let llm = Arc::new(EchoLlm {
            reply: "   ",
            prompts: Mutex::new(Vec::new()),
        });
        let service = SummaryService::new(llm, AssistantConfig::default());

        let result = service
            .summarize(&Channel::new("C1", "general"), None, &[msg("1.0", "hi")])
            .await;
        assert!(result.is_err());
    }
}
