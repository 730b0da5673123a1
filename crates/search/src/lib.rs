//! convorag search
//!
//! Vector index, metadata filtering, and the persisted document registry.

pub mod persist;
pub mod registry;
pub mod retrieval;

pub use registry::DocumentRegistry;
pub use retrieval::{MetadataFilter, RetrievedChunk, Retriever, VectorIndex};
