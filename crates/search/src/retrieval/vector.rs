//! In-memory vector index
//!
//! Exact nearest-neighbour search by squared L2 distance over every live
//! entry. Deleted documents are tombstoned and compacted away lazily.
//! When a directory is configured, every mutation is followed by a JSON
//! snapshot of the live entries plus the document registry.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use convorag_common::errors::{AppError, Result};
use convorag_common::metrics;
use convorag_common::models::{Chunk, DocumentRecord};
use convorag_common::Embedder;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::{MetadataFilter, RetrievedChunk, Retriever};
use crate::persist::{self, INDEX_FILE, REGISTRY_FILE};
use crate::registry::DocumentRegistry;

const SNAPSHOT_VERSION: u32 = 1;

/// A chunk together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    model: String,
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

#[derive(Default)]
struct IndexState {
    entries: Vec<IndexEntry>,
    tombstones: HashSet<String>,
    registry: DocumentRegistry,
    dimension: Option<usize>,
    live: usize,
}

impl IndexState {
    fn live_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries
            .iter()
            .filter(move |e| !self.tombstones.contains(&e.chunk.id))
    }

    /// Physically drop every entry (live or tombstoned) of the given documents
    fn drop_documents(&mut self, document_ids: &HashSet<String>) -> usize {
        let tombstones = &mut self.tombstones;
        let mut dropped_live = 0;
        self.entries.retain(|e| {
            if !document_ids.contains(&e.chunk.document_id) {
                return true;
            }
            if !tombstones.remove(&e.chunk.id) {
                dropped_live += 1;
            }
            false
        });
        self.live -= dropped_live;
        dropped_live
    }

    fn compact(&mut self) -> usize {
        let before = self.entries.len();
        let tombstones = &self.tombstones;
        self.entries.retain(|e| !tombstones.contains(&e.chunk.id));
        self.tombstones.clear();
        if self.entries.is_empty() {
            self.dimension = None;
        }
        before - self.entries.len()
    }
}

/// Vector index over embedded chunks
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    dir: Option<PathBuf>,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Create an empty index. `dir` enables persistence.
    pub fn new(embedder: Arc<dyn Embedder>, dir: Option<PathBuf>) -> Self {
        Self {
            embedder,
            dir,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Restore the index persisted under `dir`.
    ///
    /// A missing, unreadable or incompatible snapshot yields an empty index.
    pub async fn load(embedder: Arc<dyn Embedder>, dir: Option<PathBuf>) -> Self {
        let mut state = IndexState::default();

        if let Some(dir) = &dir {
            match read_snapshot(embedder.as_ref(), dir).await {
                Ok(Some(restored)) => {
                    info!(
                        path = %dir.display(),
                        chunks = restored.live,
                        documents = restored.registry.len(),
                        "Vector index loaded"
                    );
                    state = restored;
                }
                Ok(None) => info!(path = %dir.display(), "No persisted vector index, starting empty"),
                Err(e) => warn!(path = %dir.display(), error = %e, "Ignoring unusable vector index snapshot"),
            }
        }

        metrics::record_index_size(state.live);

        Self {
            embedder,
            dir,
            state: RwLock::new(state),
        }
    }

    /// Embed and append chunks, returning how many were added.
    ///
    /// Chunks of a document already in the index replace its previous chunks.
    /// A chunk without text rejects the whole batch.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn add(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        if let Some(blank) = chunks.iter().find(|c| c.text.trim().is_empty()) {
            return Err(AppError::Validation {
                message: format!("Chunk {} has no text", blank.id),
                field: Some("text".to_string()),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(AppError::EmbeddingError {
                message: format!("Expected {} embeddings, received {}", chunks.len(), embeddings.len()),
            });
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or_default();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(AppError::DimensionMismatch { expected: dimension, actual: bad.len() });
        }

        let mut state = self.state.write().await;
        if let Some(expected) = state.dimension {
            if expected != dimension {
                return Err(AppError::DimensionMismatch { expected, actual: dimension });
            }
        }

        let document_ids: HashSet<String> = chunks.iter().map(|c| c.document_id.clone()).collect();
        let replaced = state.drop_documents(&document_ids);
        if replaced > 0 {
            debug!(replaced, "Replaced chunks of re-indexed documents");
        }

        state.registry.record_chunks(&chunks);
        state.dimension = Some(dimension);

        let added = chunks.len();
        state.entries.extend(
            chunks
                .into_iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| IndexEntry { chunk, embedding }),
        );
        state.live += added;

        metrics::record_indexing(document_ids.len(), added, state.live);
        info!(added, documents = document_ids.len(), total_chunks = state.live, "Chunks indexed");

        self.persist_or_warn(&state).await;
        Ok(added)
    }

    /// Up to `k` live chunks closest to `query`, optionally restricted by metadata
    #[instrument(skip(self, query, filter))]
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedChunk>> {
        if k == 0 || !self.is_initialized().await {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let query_embedding = self.embedder.embed(query).await?;

        let state = self.state.read().await;
        if let Some(expected) = state.dimension {
            if expected != query_embedding.len() {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: query_embedding.len(),
                });
            }
        }

        let mut hits: Vec<(&IndexEntry, f32)> = state
            .live_entries()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.chunk.metadata)))
            .map(|e| (e, squared_l2(&query_embedding, &e.embedding)))
            .collect();

        // Stable sort keeps insertion order among equal distances
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(k);

        let results: Vec<RetrievedChunk> = hits
            .into_iter()
            .map(|(entry, score)| RetrievedChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect();

        let filtered = filter.is_some_and(|f| !f.is_empty());
        metrics::record_retrieval(start.elapsed(), filtered);
        debug!(results = results.len(), filtered, "Similarity search complete");

        Ok(results)
    }

    /// True once at least one live chunk exists
    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.live > 0
    }

    /// Number of live chunks
    pub async fn total_chunks(&self) -> usize {
        self.state.read().await.live
    }

    /// Tombstoned entries awaiting compaction
    pub async fn tombstoned(&self) -> usize {
        self.state.read().await.tombstones.len()
    }

    /// Embedding dimension of the stored vectors, once known
    pub async fn dimension(&self) -> Option<usize> {
        self.state.read().await.dimension
    }

    /// Registry records of every indexed document
    pub async fn documents(&self) -> Vec<DocumentRecord> {
        self.state.read().await.registry.records()
    }

    pub async fn document(&self, document_id: &str) -> Option<DocumentRecord> {
        self.state.read().await.registry.get(document_id).cloned()
    }

    /// Exclude a document's chunks from future searches
    #[instrument(skip(self))]
    pub async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        if state.registry.remove(document_id).is_none() {
            return Err(AppError::DocumentNotFound { id: document_id.to_string() });
        }

        let ids: Vec<String> = state
            .live_entries()
            .filter(|e| e.chunk.document_id == document_id)
            .map(|e| e.chunk.id.clone())
            .collect();
        let removed = ids.len();
        state.tombstones.extend(ids);
        state.live -= removed;

        if state.tombstones.len() * 2 > state.entries.len() {
            let dropped = state.compact();
            debug!(dropped, "Compacted vector index");
        }

        metrics::record_index_size(state.live);
        info!(removed, total_chunks = state.live, "Document removed");

        self.persist_or_warn(&state).await;
        Ok(removed)
    }

    /// Physically drop tombstoned entries, returning how many were dropped
    pub async fn compact(&self) -> usize {
        self.state.write().await.compact()
    }

    /// Write the snapshot and registry now. No-op without a directory.
    pub async fn persist(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let state = self.state.read().await;
        self.write_snapshot(&state, dir).await
    }

    /// Drop everything, including persisted files
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        *state = IndexState::default();
        metrics::record_index_size(0);

        if let Some(dir) = &self.dir {
            persist::remove_if_exists(&dir.join(INDEX_FILE)).await?;
            persist::remove_if_exists(&dir.join(REGISTRY_FILE)).await?;
        }
        info!("Vector index cleared");
        Ok(())
    }

    async fn persist_or_warn(&self, state: &IndexState) {
        if let Some(dir) = &self.dir {
            if let Err(e) = self.write_snapshot(state, dir).await {
                warn!(error = %e, "Failed to persist vector index, in-memory state kept");
            }
        }
    }

    async fn write_snapshot(&self, state: &IndexState, dir: &Path) -> Result<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            model: self.embedder.model_name().to_string(),
            dimension: state.dimension,
            entries: state.live_entries().cloned().collect(),
        };
        persist::write_json_atomic(&dir.join(INDEX_FILE), &snapshot).await?;
        persist::write_json_atomic(&dir.join(REGISTRY_FILE), &state.registry).await?;
        debug!(path = %dir.display(), chunks = snapshot.entries.len(), "Vector index persisted");
        Ok(())
    }
}

async fn read_snapshot(embedder: &dyn Embedder, dir: &Path) -> Result<Option<IndexState>> {
    let Some(snapshot) = persist::read_json::<Snapshot>(&dir.join(INDEX_FILE)).await? else {
        return Ok(None);
    };

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(AppError::Persistence {
            message: format!("unsupported snapshot version {}", snapshot.version),
        });
    }
    if snapshot.model != embedder.model_name() {
        return Err(AppError::Persistence {
            message: format!(
                "snapshot built with model '{}', current model is '{}'",
                snapshot.model,
                embedder.model_name()
            ),
        });
    }
    if let Some(expected) = snapshot.dimension {
        if let Some(bad) = snapshot.entries.iter().find(|e| e.embedding.len() != expected) {
            return Err(AppError::DimensionMismatch { expected, actual: bad.embedding.len() });
        }
    }

    let registry = match persist::read_json::<DocumentRegistry>(&dir.join(REGISTRY_FILE)).await {
        Ok(Some(registry)) if !(registry.is_empty() && !snapshot.entries.is_empty()) => registry,
        Ok(_) => rebuild_registry(&snapshot.entries),
        Err(e) => {
            warn!(error = %e, "Document registry unreadable, rebuilding from chunks");
            rebuild_registry(&snapshot.entries)
        }
    };

    let live = snapshot.entries.len();
    Ok(Some(IndexState {
        dimension: snapshot.dimension.filter(|_| live > 0),
        entries: snapshot.entries,
        tombstones: HashSet::new(),
        registry,
        live,
    }))
}

fn rebuild_registry(entries: &[IndexEntry]) -> DocumentRegistry {
    let chunks: Vec<Chunk> = entries.iter().map(|e| e.chunk.clone()).collect();
    let mut registry = DocumentRegistry::default();
    registry.record_chunks(&chunks);
    registry
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[async_trait]
impl Retriever for VectorIndex {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedChunk>> {
        self.search(query, k, filter).await
    }

    async fn is_ready(&self) -> bool {
        self.is_initialized().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convorag_common::embeddings::HashEmbedder;
    use convorag_common::models::Metadata;

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(HashEmbedder::new(64))
    }

    fn chunk(document_id: &str, index: usize, text: &str, lang: &str) -> Chunk {
        let id = format!("{}-{}", document_id, index);
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), format!("{}.md", document_id));
        metadata.insert("chunk_id".to_string(), id.clone());
        metadata.insert("document_id".to_string(), document_id.to_string());
        metadata.insert("lang".to_string(), lang.to_string());
        Chunk {
            id,
            document_id: document_id.to_string(),
            text: text.to_string(),
            source: format!("{}.md", document_id),
            chunk_index: index,
            metadata,
        }
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("python", 0, "Python uses indentation to define code blocks", "en"),
            chunk("python", 1, "Python lists are dynamic arrays", "en"),
            chunk("fastapi", 0, "FastAPI is a modern web framework", "en"),
            chunk("rust", 0, "Rust ownership rules prevent data races", "de"),
        ]
    }

    /// Embedder whose dimension follows the number of words
    struct WordCountEmbedder;

    #[async_trait]
    impl Embedder for WordCountEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; text.split_whitespace().count()])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn model_name(&self) -> &str {
            "word-count"
        }

        fn dimension(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let index = VectorIndex::new(embedder(), None);
        assert!(!index.is_initialized().await);
        for k in [0, 1, 10] {
            assert!(index.search("anything", k, None).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_add_and_search_bounds() {
        let index = VectorIndex::new(embedder(), None);
        assert_eq!(index.add(Vec::new()).await.unwrap(), 0);

        let added = index.add(corpus()).await.unwrap();
        assert_eq!(added, 4);
        assert!(index.is_initialized().await);
        assert_eq!(index.total_chunks().await, 4);

        assert_eq!(index.search("python", 2, None).await.unwrap().len(), 2);
        assert_eq!(index.search("python", 10, None).await.unwrap().len(), 4);
        assert!(index.search("python", 0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_chunk_rejects_batch() {
        let index = VectorIndex::new(embedder(), None);
        let mut chunks = corpus();
        chunks.push(chunk("python", 2, " \n\n ", "en"));

        let err = index.add(chunks).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(err.to_string().contains("python-2"));
        assert_eq!(index.total_chunks().await, 0);
        assert!(index.documents().await.is_empty());
    }

    #[tokio::test]
    async fn test_exact_text_ranks_first() {
        let index = VectorIndex::new(embedder(), None);
        index.add(corpus()).await.unwrap();

        let results = index
            .search("FastAPI is a modern web framework", 3, None)
            .await
            .unwrap();
        assert_eq!(results[0].chunk.id, "fastapi-0");
        assert!(results[0].score.abs() < 1e-5);
        assert!(results.windows(2).all(|w| w[0].score <= w[1].score));
    }

    #[tokio::test]
    async fn test_filter_applied_during_scan() {
        let index = VectorIndex::new(embedder(), None);
        index.add(corpus()).await.unwrap();

        let german = MetadataFilter::new().equals("lang", "de");
        let results = index.search("python", 3, Some(&german)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_id, "rust");

        let either = MetadataFilter::new().any_of("source", ["fastapi.md", "rust.md"]);
        let results = index.search("python", 10, Some(&either)).await.unwrap();
        assert_eq!(results.len(), 2);

        let nothing = MetadataFilter::new().equals("lang", "fr");
        assert!(index.search("python", 3, Some(&nothing)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_registry_tracks_documents() {
        let index = VectorIndex::new(embedder(), None);
        index.add(corpus()).await.unwrap();

        let documents = index.documents().await;
        assert_eq!(documents.len(), 3);
        assert_eq!(index.document("python").await.unwrap().chunk_count, 2);
        assert!(index.document("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_reindex_replaces_document() {
        let index = VectorIndex::new(embedder(), None);
        index.add(corpus()).await.unwrap();
        index
            .add(vec![chunk("python", 0, "Python 3 replaced print statements", "en")])
            .await
            .unwrap();

        assert_eq!(index.total_chunks().await, 3);
        assert_eq!(index.document("python").await.unwrap().chunk_count, 1);
    }

    #[tokio::test]
    async fn test_remove_document_tombstones_chunks() {
        let index = VectorIndex::new(embedder(), None);
        index.add(corpus()).await.unwrap();

        let removed = index.remove_document("fastapi").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(index.total_chunks().await, 3);
        assert_eq!(index.tombstoned().await, 1);

        let results = index.search("FastAPI is a modern web framework", 10, None).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.chunk.document_id != "fastapi"));
        assert!(index.document("fastapi").await.is_none());

        assert_eq!(index.compact().await, 1);
        assert_eq!(index.tombstoned().await, 0);
        assert_eq!(index.total_chunks().await, 3);
    }

    #[tokio::test]
    async fn test_compaction_after_half_tombstoned() {
        let index = VectorIndex::new(embedder(), None);
        index.add(corpus()).await.unwrap();

        index.remove_document("fastapi").await.unwrap();
        assert_eq!(index.tombstoned().await, 1);
        // 3 of 4 tombstoned crosses the threshold
        index.remove_document("python").await.unwrap();
        assert_eq!(index.tombstoned().await, 0);
        assert_eq!(index.total_chunks().await, 1);
    }

    #[tokio::test]
    async fn test_readd_after_removal() {
        let index = VectorIndex::new(embedder(), None);
        index.add(corpus()).await.unwrap();
        index.remove_document("fastapi").await.unwrap();

        index
            .add(vec![chunk("fastapi", 0, "FastAPI is a modern web framework", "en")])
            .await
            .unwrap();
        let results = index.search("FastAPI is a modern web framework", 1, None).await.unwrap();
        assert_eq!(results[0].chunk.id, "fastapi-0");
        assert_eq!(index.total_chunks().await, 4);
    }

    #[tokio::test]
    async fn test_remove_unknown_document() {
        let index = VectorIndex::new(embedder(), None);
        assert!(matches!(
            index.remove_document("ghost").await,
            Err(AppError::DocumentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_removing_everything_uninitializes() {
        let index = VectorIndex::new(embedder(), None);
        index.add(vec![chunk("solo", 0, "only chunk", "en")]).await.unwrap();
        index.remove_document("solo").await.unwrap();
        assert!(!index.is_initialized().await);
        assert!(index.search("only chunk", 3, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = Some(dir.path().to_path_buf());

        let index = VectorIndex::new(embedder(), path.clone());
        index.add(corpus()).await.unwrap();
        index.persist().await.unwrap();
        let before = index.total_chunks().await;

        let restored = VectorIndex::load(embedder(), path).await;
        assert_eq!(restored.total_chunks().await, before);
        assert_eq!(restored.documents().await.len(), 3);

        let results = restored.search("Python lists are dynamic arrays", 1, None).await.unwrap();
        assert_eq!(results[0].chunk.id, "python-1");
    }

    #[tokio::test]
    async fn test_add_persists_automatically() {
        let dir = tempfile::tempdir().unwrap();
        let path = Some(dir.path().to_path_buf());

        let index = VectorIndex::new(embedder(), path.clone());
        index.add(corpus()).await.unwrap();
        index.remove_document("rust").await.unwrap();
        assert!(dir.path().join(INDEX_FILE).exists());
        assert!(dir.path().join(REGISTRY_FILE).exists());

        let restored = VectorIndex::load(embedder(), path).await;
        assert_eq!(restored.total_chunks().await, 3);
        assert!(restored.document("rust").await.is_none());
    }

    #[tokio::test]
    async fn test_registry_rebuilt_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = Some(dir.path().to_path_buf());

        let index = VectorIndex::new(embedder(), path.clone());
        index.add(corpus()).await.unwrap();
        std::fs::remove_file(dir.path().join(REGISTRY_FILE)).unwrap();

        let restored = VectorIndex::load(embedder(), path).await;
        assert_eq!(restored.documents().await.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_registry_beside_chunks_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let path = Some(dir.path().to_path_buf());

        let index = VectorIndex::new(embedder(), path.clone());
        index.add(corpus()).await.unwrap();
        std::fs::write(dir.path().join(REGISTRY_FILE), "{}").unwrap();

        let restored = VectorIndex::load(embedder(), path).await;
        assert_eq!(restored.documents().await.len(), 3);
        assert_eq!(restored.document("python").await.map(|r| r.chunk_count), Some(2));
    }

    #[tokio::test]
    async fn test_load_missing_or_corrupt_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = Some(dir.path().to_path_buf());

        let index = VectorIndex::load(embedder(), path.clone()).await;
        assert!(!index.is_initialized().await);

        std::fs::write(dir.path().join(INDEX_FILE), b"{\"version\": 1, \"entr").unwrap();
        let index = VectorIndex::load(embedder(), path).await;
        assert!(!index.is_initialized().await);
    }

    #[tokio::test]
    async fn test_load_rejects_other_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = Some(dir.path().to_path_buf());

        let index = VectorIndex::new(embedder(), path.clone());
        index.add(corpus()).await.unwrap();

        let restored = VectorIndex::load(Arc::new(WordCountEmbedder), path).await;
        assert_eq!(restored.total_chunks().await, 0);
    }

    #[tokio::test]
    async fn test_clear_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::new(embedder(), Some(dir.path().to_path_buf()));
        index.add(corpus()).await.unwrap();

        index.clear().await.unwrap();
        assert!(!index.is_initialized().await);
        assert!(index.documents().await.is_empty());
        assert!(!dir.path().join(INDEX_FILE).exists());
        assert!(!dir.path().join(REGISTRY_FILE).exists());
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let index = VectorIndex::new(embedder(), Some(blocker));
        assert_eq!(index.add(corpus()).await.unwrap(), 4);
        assert_eq!(index.total_chunks().await, 4);
        assert!(index.persist().await.is_err());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_error() {
        let index = VectorIndex::new(Arc::new(WordCountEmbedder), None);
        index.add(vec![chunk("a", 0, "two words", "en")]).await.unwrap();

        assert!(matches!(
            index.search("three words here", 1, None).await,
            Err(AppError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(matches!(
            index.add(vec![chunk("b", 0, "one", "en")]).await,
            Err(AppError::DimensionMismatch { .. })
        ));
    }
}
