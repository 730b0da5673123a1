//! convorag context
//!
//! Conversation memory and retrieval-augmented answering.

pub mod prompt;
pub mod responder;
pub mod session;

pub use responder::{Answer, AnswerSource, Responder, ResponderOptions};
pub use session::{Session, SessionGuard, SessionStore};
