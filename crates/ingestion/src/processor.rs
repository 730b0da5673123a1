//! Ingestion processor
//!
//! Turns a batch of submitted documents into chunks ready for the index.

use std::collections::HashSet;

use convorag_common::models::{Chunk, DocumentInput, CONTENT_HASH_KEY};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::chunker::{Chunker, ChunkingStrategy};
use crate::errors::IngestionError;

/// Output of processing a batch of documents
#[derive(Debug, Clone, Default)]
pub struct ProcessedBatch {
    /// Chunks of every document, in submission order
    pub chunks: Vec<Chunk>,
    /// Document ids, one per submitted document
    pub document_ids: Vec<String>,
}

/// Ingestion processor
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    chunker: Chunker,
}

impl DocumentProcessor {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker }
    }

    /// Chunk every document, assigning ids to documents submitted without one
    #[instrument(skip(self, documents), fields(documents = documents.len()))]
    pub fn process(
        &self,
        documents: &[DocumentInput],
        strategy: Option<ChunkingStrategy>,
    ) -> Result<ProcessedBatch, IngestionError> {
        let chunker = match strategy {
            Some(strategy) if strategy != self.chunker.strategy() => self.chunker.with_strategy(strategy),
            _ => self.chunker.clone(),
        };

        let mut seen = HashSet::new();
        let mut batch = ProcessedBatch::default();

        for (index, document) in documents.iter().enumerate() {
            if document.content.trim().is_empty() {
                return Err(IngestionError::EmptyDocument { index });
            }

            let document_id = document
                .document_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            if !seen.insert(document_id.clone()) {
                return Err(IngestionError::DuplicateDocumentId(document_id));
            }

            let mut metadata = document.metadata.clone();
            metadata.insert(CONTENT_HASH_KEY.to_string(), content_hash(&document.content));

            let chunks = chunker.chunk(&document.content, &document.source, &document_id, &metadata)?;
            if chunks.is_empty() {
                warn!(document_id = %document_id, source = %document.source, "Document produced no chunks");
            }
            debug!(
                document_id = %document_id,
                source = %document.source,
                chunk_count = chunks.len(),
                "Document chunked"
            );

            batch.chunks.extend(chunks);
            batch.document_ids.push(document_id);
        }

        info!(
            documents = batch.document_ids.len(),
            chunks = batch.chunks.len(),
            strategy = %chunker.strategy(),
            "Documents processed"
        );

        Ok(batch)
    }
}

/// Hex SHA-256 of document content
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
