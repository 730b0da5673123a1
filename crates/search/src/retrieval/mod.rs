//! Similarity retrieval over embedded chunks
//!
//! - `VectorIndex`: exact brute-force scan with squared L2 distance
//! - `MetadataFilter`: per-key exact / any-of constraints checked during the scan

mod filter;
mod vector;

pub use filter::{FilterValue, MetadataFilter};
pub use vector::{IndexEntry, VectorIndex};

use async_trait::async_trait;
use convorag_common::errors::Result;
use convorag_common::models::Chunk;
use serde::{Deserialize, Serialize};

/// Retrieved chunk with its distance to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,

    /// Squared L2 distance, lower is closer
    pub score: f32,
}

/// Common trait for retrieval backends
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` chunks closest to `query`, best first
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Whether anything can be retrieved at all
    async fn is_ready(&self) -> bool;
}
