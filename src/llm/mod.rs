// src/llm/mod.rs
// Generative model abstraction and answer generation from retrieved context

mod gemini;

pub use self::gemini::{GeminiModel, DEFAULT_MODEL};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::context::assemble_context;
use crate::error::{RagError, Result};
use crate::retrieval::RetrievedDocument;

/// Returned when retrieval found nothing; the model is not called.
pub const FALLBACK_ANSWER: &str = "I don't have enough information in my knowledge base to answer that question. Could you try asking about recent news topics?";

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier for logging
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the single prompt sent to the model.
pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "You are a helpful news chatbot. Based on the following news articles, answer the user's question accurately and concisely.

Context from news articles:
{context}

User Question: {query}

Instructions:
- Provide a clear, concise answer based on the provided context
- If the context doesn't fully answer the question, say so
- Include relevant details from the articles
- Keep the response conversational and helpful
- If you mention specific facts, indicate which article they came from

Answer:"
    )
}

/// Turns retrieved documents and a question into answer text.
pub struct ResponseGenerator {
    model: Option<Arc<dyn LanguageModel>>,
}

impl ResponseGenerator {
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { model }
    }

    /// Answer `query` from `documents`.
    ///
    /// With no documents this returns [`FALLBACK_ANSWER`] without touching
    /// the model. Otherwise the model is called exactly once and its text is
    /// returned verbatim; failures propagate without retry.
    pub async fn generate(&self, query: &str, documents: &[RetrievedDocument]) -> Result<String> {
        if documents.is_empty() {
            debug!("No documents retrieved, returning fallback answer");
            return Ok(FALLBACK_ANSWER.to_string());
        }

        let model = self
            .model
            .as_ref()
            .ok_or_else(|| RagError::Generation("no generative model configured".to_string()))?;

        let prompt = build_prompt(&assemble_context(documents), query);
        debug!(model = model.name(), prompt_chars = prompt.len(), "Invoking generative model");

        model.generate(&prompt).await
    }
}
