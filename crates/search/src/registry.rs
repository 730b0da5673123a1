//! Document registry kept beside the vector index
//!
//! One record per indexed document, persisted as `document_registry.json`.

use std::collections::BTreeMap;

use chrono::Utc;
use convorag_common::models::{Chunk, DocumentRecord, CONTENT_HASH_KEY};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRegistry {
    documents: BTreeMap<String, DocumentRecord>,
}

impl DocumentRegistry {
    /// Record (or replace) the documents the given chunks belong to
    pub fn record_chunks(&mut self, chunks: &[Chunk]) {
        let mut batch: BTreeMap<&str, DocumentRecord> = BTreeMap::new();
        for chunk in chunks {
            batch
                .entry(chunk.document_id.as_str())
                .and_modify(|record| record.chunk_count += 1)
                .or_insert_with(|| DocumentRecord {
                    document_id: chunk.document_id.clone(),
                    source: chunk.source.clone(),
                    chunk_count: 1,
                    content_hash: chunk.metadata.get(CONTENT_HASH_KEY).cloned().unwrap_or_default(),
                    indexed_at: Utc::now(),
                    metadata: chunk.caller_metadata(),
                });
        }
        for (id, record) in batch {
            self.documents.insert(id.to_string(), record);
        }
    }

    pub fn remove(&mut self, document_id: &str) -> Option<DocumentRecord> {
        self.documents.remove(document_id)
    }

    pub fn get(&self, document_id: &str) -> Option<&DocumentRecord> {
        self.documents.get(document_id)
    }

    /// Records ordered by document id
    pub fn records(&self) -> Vec<DocumentRecord> {
        self.documents.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convorag_common::models::Metadata;

    fn chunk(document_id: &str, index: usize) -> Chunk {
        let mut metadata = Metadata::new();
        metadata.insert("document_id".to_string(), document_id.to_string());
        metadata.insert(CONTENT_HASH_KEY.to_string(), "abc123".to_string());
        metadata.insert("lang".to_string(), "en".to_string());
        Chunk {
            id: format!("{}-{}", document_id, index),
            document_id: document_id.to_string(),
            text: format!("chunk {}", index),
            source: format!("{}.md", document_id),
            chunk_index: index,
            metadata,
        }
    }

    #[test]
    fn test_one_record_per_document() {
        let mut registry = DocumentRegistry::default();
        registry.record_chunks(&[chunk("a", 0), chunk("a", 1), chunk("b", 0)]);

        assert_eq!(registry.len(), 2);
        let a = registry.get("a").unwrap();
        assert_eq!(a.chunk_count, 2);
        assert_eq!(a.source, "a.md");
        assert_eq!(a.content_hash, "abc123");
        assert_eq!(a.metadata.get("lang").map(String::as_str), Some("en"));
        assert!(!a.metadata.contains_key("document_id"));
    }

    #[test]
    fn test_reindex_replaces_record() {
        let mut registry = DocumentRegistry::default();
        registry.record_chunks(&[chunk("a", 0), chunk("a", 1)]);
        registry.record_chunks(&[chunk("a", 0)]);
        assert_eq!(registry.get("a").unwrap().chunk_count, 1);
    }

    #[test]
    fn test_serializes_as_map() {
        let mut registry = DocumentRegistry::default();
        registry.record_chunks(&[chunk("a", 0)]);
        let json = serde_json::to_value(&registry).unwrap();
        assert!(json.get("a").is_some());

        let back: DocumentRegistry = serde_json::from_value(json).unwrap();
        assert_eq!(back, registry);
    }
}
