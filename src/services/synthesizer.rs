//! Answer Synthesis
//!
//! Turns a question into an answer through the retrieval-augmented pipeline:
//! embed the question, retrieve the owner's top-k chunks, fill the prompt
//! template with the retrieved context, and invoke the chat model.
//!
//! ## Design Decisions
//!
//! - The synthesis path is an explicit three-stage composition: template
//!   fill ([`format_prompt`]), model invocation, and verbatim text
//!   extraction ([`extract_answer`]). Each stage stands on its own for
//!   testing.
//! - An owner with no retrievable chunks gets an empty context string, not
//!   a short circuit. The refusal reply comes from the model following the
//!   template instructions, so prompt changes alone can retune it.
//! - Model failures surface to the caller unchanged. The synthesizer never
//!   retries; transient-retry policy lives with the providers.

use std::sync::Arc;

use tracing::debug;

use crate::services::embedding::EmbeddingManager;
use crate::services::llm::{ChatModel, ChatResponse};
use crate::services::retrieval::VectorStore;
use crate::storage::repository::ChunkRepository;
use crate::utils::error::AppResult;

/// Prompt template for answer synthesis, with `{context}` and `{question}`
/// placeholders.
///
/// The refusal sentence is part of the instructions, so answers outside the
/// retrieved context are declined by the model itself.
pub const PROMPT_TEMPLATE: &str = "\nAnswer the question based on the context below. If you can't \n\
     answer the question, reply \"Sorry, I can only help with the questions related to uploaded documents\".\n\
     \n\
     Context: {context}\n\
     \n\
     Question: {question}\n";

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

/// Fill the prompt template with the assembled context and the question.
///
/// Each placeholder is filled exactly once in a single pass over the
/// template, so placeholder-like text inside the context or the question is
/// carried through verbatim.
pub fn format_prompt(context: &str, question: &str) -> String {
    let (head, rest) = PROMPT_TEMPLATE
        .split_once("{context}")
        .unwrap_or((PROMPT_TEMPLATE, ""));
    let (middle, tail) = rest.split_once("{question}").unwrap_or((rest, ""));

    let mut prompt =
        String::with_capacity(PROMPT_TEMPLATE.len() + context.len() + question.len());
    prompt.push_str(head);
    prompt.push_str(context);
    prompt.push_str(middle);
    prompt.push_str(question);
    prompt.push_str(tail);
    prompt
}

/// Extract the answer text from a chat completion, verbatim.
pub fn extract_answer(response: ChatResponse) -> String {
    response.text
}

// ---------------------------------------------------------------------------
// AnswerSynthesizer
// ---------------------------------------------------------------------------

/// Retrieval-augmented answer synthesis over an owner's documents.
pub struct AnswerSynthesizer {
    embeddings: Arc<EmbeddingManager>,
    store: Arc<VectorStore>,
    repository: Arc<dyn ChunkRepository>,
    chat: Arc<dyn ChatModel>,
    top_k: usize,
}

impl AnswerSynthesizer {
    pub fn new(
        embeddings: Arc<EmbeddingManager>,
        store: Arc<VectorStore>,
        repository: Arc<dyn ChunkRepository>,
        chat: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> Self {
        Self {
            embeddings,
            store,
            repository,
            chat,
            top_k,
        }
    }

    /// Retrieve the owner's top-k chunk texts for `question` and join them
    /// into the prompt context, newline-separated in rank order.
    ///
    /// Returns the empty string when nothing is retrievable for the owner.
    pub async fn retrieve_context(&self, owner_id: &str, question: &str) -> AppResult<String> {
        let query = self.embeddings.embed_query(question).await?;
        let hits = self.store.search(owner_id, &query, self.top_k).await?;

        let ids: Vec<String> = hits.into_iter().map(|hit| hit.chunk_id).collect();
        let rows = self.repository.get_chunks_by_ids(&ids)?;

        Ok(rows
            .iter()
            .map(|row| row.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Answer `question` from the owner's documents.
    ///
    /// Embeds the question, retrieves context, fills the template, and
    /// returns the chat model's output verbatim.
    pub async fn answer(&self, owner_id: &str, question: &str) -> AppResult<String> {
        let context = self.retrieve_context(owner_id, question).await?;
        debug!(
            owner_id,
            context_chars = context.len(),
            "assembled retrieval context"
        );

        let prompt = format_prompt(&context, question);
        let response = self.chat.complete(&prompt).await?;
        debug!(
            model = %response.model,
            answer_chars = response.text.len(),
            "chat completion received"
        );

        Ok(extract_answer(response))
    }

    /// The number of chunks retrieved per question.
    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
