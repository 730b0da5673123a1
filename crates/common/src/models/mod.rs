//! Domain models shared across crates

mod chunk;
mod citation;
mod document;
mod session;

pub use chunk::{Chunk, Metadata, CONTENT_HASH_KEY, PROVENANCE_KEYS};
pub use citation::Citation;
pub use document::{DocumentInput, DocumentRecord};
pub use session::{Role, SessionInfo, Turn};
