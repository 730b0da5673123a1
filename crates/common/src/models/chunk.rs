//! Chunk model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// String metadata attached to documents and chunks
pub type Metadata = BTreeMap<String, String>;

/// Metadata key holding the hex SHA-256 of the full document
pub const CONTENT_HASH_KEY: &str = "content_hash";

/// Metadata keys written during ingestion rather than supplied by callers
pub const PROVENANCE_KEYS: &[&str] = &[
    "source",
    "chunk_id",
    "document_id",
    "chunk_index",
    "total_chunks",
    "start_offset",
    CONTENT_HASH_KEY,
];

/// A bounded span of document text plus provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID, `"{document_id}-{chunk_index}"`
    pub id: String,

    /// Document this chunk was cut from
    pub document_id: String,

    /// Chunk content
    pub text: String,

    /// Source name of the document (file name, URL, "inline")
    pub source: String,

    /// Position within the document (0-based)
    pub chunk_index: usize,

    /// Provenance and caller metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    /// Number of sibling chunks cut from the same document, if recorded
    pub fn total_chunks(&self) -> Option<usize> {
        self.metadata.get("total_chunks").and_then(|v| v.parse().ok())
    }

    /// Byte offset of the chunk within the document text, if recorded
    pub fn start_offset(&self) -> Option<usize> {
        self.metadata.get("start_offset").and_then(|v| v.parse().ok())
    }

    /// Metadata supplied by the caller, without ingestion provenance
    pub fn caller_metadata(&self) -> Metadata {
        self.metadata
            .iter()
            .filter(|(k, _)| !PROVENANCE_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
