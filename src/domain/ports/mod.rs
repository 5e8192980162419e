//! Port trait definitions (Hexagonal Architecture)
//!
//! These are the external collaborators handlers call into:
//! - ChatClient: posting to and listing the chat platform
//! - LlmClient: text completion
//! - MessageRepository / ChannelRepository / MemoryRepository: storage
//!
//! None of them is part of the event core's contract; handlers may suspend
//! while calling them and that is all the core needs to know.

pub mod channel_repository;
pub mod chat_client;
pub mod llm_client;
pub mod memory_repository;
pub mod message_repository;

pub use channel_repository::ChannelRepository;
pub use chat_client::ChatClient;
pub use llm_client::{CompletionRequest, LlmClient, PromptMessage, PromptRole};
pub use memory_repository::MemoryRepository;
pub use message_repository::MessageRepository;
