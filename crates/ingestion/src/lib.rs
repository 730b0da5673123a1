//! convorag ingestion
//!
//! File loading, chunking and document preparation ahead of indexing.

pub mod chunker;
pub mod errors;
pub mod loader;
pub mod processor;

pub use chunker::{chunk, Chunker, ChunkingStrategy, TextChunk};
pub use errors::IngestionError;
pub use loader::{file_extension, load_document, FileKind};
pub use processor::{DocumentProcessor, ProcessedBatch};
