//! Retrieval-augmented answering
//!
//! Folds recent user turns into the retrieval query, retrieves, cites,
//! and produces either an extractive answer or a chat-model answer.

use std::sync::Arc;

use convorag_common::config::RetrievalConfig;
use convorag_common::errors::{AppError, Result};
use convorag_common::metrics;
use convorag_common::models::{Citation, Role, Turn};
use convorag_common::ChatModel;
use convorag_search::{MetadataFilter, RetrievedChunk, Retriever};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::prompt;

/// Returned when retrieval finds nothing
pub const INSUFFICIENT_CONTEXT: &str = "I don't have enough context in the indexed documents to answer that confidently. \
Please index more relevant documents or ask a question closer to the available content.";

/// Leading line of extractive answers
pub const GROUNDED_PREFIX: &str = "Based on the retrieved context, here is the best grounded answer:\n\n";

#[derive(Debug, Clone)]
pub struct ResponderOptions {
    /// Prior user turns folded into the retrieval query
    pub history_query_turns: usize,
    /// Prior messages forwarded to the chat model
    pub prompt_history_messages: usize,
    /// Citation snippet length in characters
    pub snippet_chars: usize,
    /// Characters of the top chunk used by the extractive answer
    pub fallback_chars: usize,
}

impl Default for ResponderOptions {
    fn default() -> Self {
        Self {
            history_query_turns: 2,
            prompt_history_messages: 6,
            snippet_chars: 160,
            fallback_chars: 400,
        }
    }
}

impl From<&RetrievalConfig> for ResponderOptions {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            history_query_turns: config.history_query_turns,
            prompt_history_messages: config.prompt_history_messages,
            snippet_chars: config.snippet_chars,
            ..Self::default()
        }
    }
}

/// How an answer was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Llm,
    Template,
    InsufficientContext,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Llm => "llm",
            AnswerSource::Template => "template",
            AnswerSource::InsufficientContext => "insufficient_context",
        }
    }
}

/// A grounded answer
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub citations: Vec<Citation>,
    /// Query actually sent to retrieval
    pub retrieval_query: String,
    pub source: AnswerSource,
}

pub struct Responder {
    retriever: Arc<dyn Retriever>,
    chat_model: Option<Arc<dyn ChatModel>>,
    options: ResponderOptions,
}

impl Responder {
    /// Without a chat model answers are extractive
    pub fn new(
        retriever: Arc<dyn Retriever>,
        chat_model: Option<Arc<dyn ChatModel>>,
        options: ResponderOptions,
    ) -> Self {
        Self { retriever, chat_model, options }
    }

    pub fn generation_enabled(&self) -> bool {
        self.chat_model.is_some()
    }

    /// Last few user turns, then the question, one per line
    pub fn compose_query(&self, question: &str, history: &[Turn]) -> String {
        let user_turns: Vec<&str> = history
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .collect();
        let start = user_turns.len().saturating_sub(self.options.history_query_turns);

        let mut parts = user_turns[start..].to_vec();
        parts.push(question);
        parts.join("\n")
    }

    #[instrument(skip_all, fields(top_k = top_k, history = history.len()))]
    pub async fn answer(
        &self,
        question: &str,
        history: &[Turn],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Answer> {
        if !self.retriever.is_ready().await {
            return Err(AppError::NoDocumentsIndexed);
        }

        let retrieval_query = self.compose_query(question, history);
        let hits = self.retriever.retrieve(&retrieval_query, top_k, filter).await?;
        debug!(hits = hits.len(), "Context retrieved");

        if hits.is_empty() {
            metrics::record_answer(AnswerSource::InsufficientContext.as_str());
            return Ok(Answer {
                answer: INSUFFICIENT_CONTEXT.to_string(),
                citations: Vec::new(),
                retrieval_query,
                source: AnswerSource::InsufficientContext,
            });
        }

        let citations = self.citations(&hits);

        let (answer, source) = match &self.chat_model {
            Some(model) => {
                let messages = prompt::build_messages(
                    question,
                    history,
                    &hits,
                    self.options.prompt_history_messages,
                );
                (model.complete(&messages).await?, AnswerSource::Llm)
            }
            None => (self.extractive_answer(&hits), AnswerSource::Template),
        };

        metrics::record_answer(source.as_str());
        info!(citations = citations.len(), source = source.as_str(), "Answer produced");

        Ok(Answer { answer, citations, retrieval_query, source })
    }

    fn citations(&self, hits: &[RetrievedChunk]) -> Vec<Citation> {
        hits.iter()
            .map(|hit| Citation {
                source: hit
                    .chunk
                    .metadata
                    .get("source")
                    .cloned()
                    .unwrap_or_else(|| hit.chunk.source.clone()),
                chunk_id: hit.chunk.id.clone(),
                snippet: truncate_chars(&hit.chunk.text, self.options.snippet_chars),
                score: hit.score,
            })
            .collect()
    }

    fn extractive_answer(&self, hits: &[RetrievedChunk]) -> String {
        let top = hits.first().map(|h| h.chunk.text.as_str()).unwrap_or_default();
        format!("{}{}", GROUNDED_PREFIX, truncate_chars(top, self.options.fallback_chars))
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
