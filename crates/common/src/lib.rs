//! convorag Common Library
//! 
//! Shared code for the convorag crates including:
//! - Configuration management
//! - Error types and HTTP mapping
//! - Domain models (chunks, documents, sessions, citations)
//! - Embedding client abstraction
//! - Chat completion client abstraction
//! - Metrics and observability

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::ChatModel;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model for the OpenAI provider
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default dimension of the offline hashing embedder
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 512;
