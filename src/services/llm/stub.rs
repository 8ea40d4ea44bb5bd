//! Stub Chat Provider
//!
//! Deterministic offline implementation of the `ChatModel` trait for tests
//! and air-gapped deployments. It understands the synthesis prompt layout
//! (`Context:` / `Question:` sections) and honors the template's refusal
//! instruction: no usable context means the refusal sentence, verbatim.
//!
//! Without context it never invents an answer; with context it returns the
//! context sentence sharing the most words with the question. Scripted
//! responses can be queued to force exact outputs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::provider::ChatModel;
use super::types::{ChatResponse, ChatResult, ChatUsage};

/// The refusal sentence the synthesis template instructs models to reply
/// with when the context cannot answer the question.
pub const REFUSAL_SENTENCE: &str =
    "Sorry, I can only help with the questions related to uploaded documents";

/// Deterministic chat model stub.
pub struct StubChatModel {
    model: String,
    responses: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl StubChatModel {
    /// Create a stub that answers from the prompt's context section.
    pub fn new() -> Self {
        Self {
            model: "stub-v1".to_string(),
            responses: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a stub with a queue of scripted responses.
    ///
    /// Scripted responses are returned in order, one per call, before the
    /// context heuristic takes over again.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let stub = Self::new();
        {
            let mut queue = stub.responses.lock().unwrap();
            queue.extend(responses);
        }
        stub
    }

    /// Queue one scripted response.
    pub fn push_response(&self, response: impl Into<String>) {
        let mut queue = self.responses.lock().unwrap();
        queue.push_back(response.into());
    }

    /// Number of completions served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Split a synthesis prompt into its context and question sections.
    ///
    /// A prompt without the expected markers is treated as a bare question
    /// with no context.
    fn split_prompt(prompt: &str) -> (String, String) {
        match prompt.split_once("Context:") {
            Some((_, rest)) => match rest.rsplit_once("Question:") {
                Some((context, question)) => {
                    (context.trim().to_string(), question.trim().to_string())
                }
                None => (rest.trim().to_string(), String::new()),
            },
            None => (String::new(), prompt.trim().to_string()),
        }
    }

    /// Lowercased word tokens.
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect()
    }

    /// Split context text into sentences. Newlines also terminate a
    /// sentence since retrieved chunks are newline-joined.
    fn sentences(text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = String::new();
        for ch in text.chars() {
            current.push(ch);
            if matches!(ch, '.' | '!' | '?' | '\n') {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    out.push(sentence.to_string());
                }
                current.clear();
            }
        }
        let sentence = current.trim();
        if !sentence.is_empty() {
            out.push(sentence.to_string());
        }
        out
    }

    /// Pick the context sentence sharing the most words with the question.
    /// Earlier sentences win ties; zero overlap means refusal.
    fn answer_from_context(context: &str, question: &str) -> String {
        let question_tokens = Self::tokenize(question);
        if question_tokens.is_empty() {
            return REFUSAL_SENTENCE.to_string();
        }

        let mut best_sentence: Option<String> = None;
        let mut best_score = 0usize;

        for sentence in Self::sentences(context) {
            let sentence_tokens = Self::tokenize(&sentence);
            let score = question_tokens
                .iter()
                .filter(|t| sentence_tokens.contains(t))
                .count();
            if score > best_score {
                best_score = score;
                best_sentence = Some(sentence);
            }
        }

        match best_sentence {
            Some(sentence) => sentence,
            None => REFUSAL_SENTENCE.to_string(),
        }
    }
}

impl Default for StubChatModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for StubChatModel {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> ChatResult<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let scripted = {
            let mut queue = self.responses.lock().unwrap();
            queue.pop_front()
        };

        let text = match scripted {
            Some(response) => response,
            None => {
                let (context, question) = Self::split_prompt(prompt);
                if context.is_empty() {
                    REFUSAL_SENTENCE.to_string()
                } else {
                    Self::answer_from_context(&context, &question)
                }
            }
        };

        // Word counts stand in for token counts.
        let usage = ChatUsage {
            prompt_tokens: prompt.split_whitespace().count() as u32,
            completion_tokens: text.split_whitespace().count() as u32,
        };

        Ok(ChatResponse {
            text,
            model: self.model.clone(),
            usage: Some(usage),
        })
    }

    async fn health_check(&self) -> ChatResult<()> {
        Ok(())
    }
}
