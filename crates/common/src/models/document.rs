//! Document models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Metadata;

/// A document submitted for indexing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    /// Raw text
    pub content: String,

    /// Source name
    #[serde(default = "default_source")]
    pub source: String,

    /// Caller supplied document ID; generated when absent
    #[serde(default)]
    pub document_id: Option<String>,

    /// Caller metadata copied onto every chunk
    #[serde(default)]
    pub metadata: Metadata,
}

fn default_source() -> String {
    "inline".to_string()
}

impl DocumentInput {
    /// Create an input with the given content and source
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            document_id: None,
            metadata: Metadata::new(),
        }
    }
}

/// Registry entry describing an indexed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub source: String,
    pub chunk_count: usize,
    /// Hex SHA-256 of the original content
    pub content_hash: String,
    pub indexed_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}
