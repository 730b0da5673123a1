//! Citation model

use serde::{Deserialize, Serialize};

/// Reference back to a chunk used to ground an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Document source name
    pub source: String,

    /// Cited chunk ID
    pub chunk_id: String,

    /// Leading text of the chunk
    pub snippet: String,

    /// Squared L2 distance of the chunk to the query (lower is closer)
    pub score: f32,
}
