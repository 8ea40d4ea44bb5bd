//! Chat Model Module
//!
//! Provides a unified interface for the chat completion providers used by
//! answer synthesis:
//! - OpenAI (chat completions, non-streaming)
//! - Stub (deterministic, offline)

pub mod openai;
pub mod provider;
pub mod stub;
pub mod types;

// Re-export main types
pub use openai::OpenAIChatModel;
pub use provider::{create_chat_model, ChatModel};
pub use stub::{StubChatModel, REFUSAL_SENTENCE};
pub use types::*;
