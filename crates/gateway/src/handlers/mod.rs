//! API handlers module

pub mod chat;
pub mod documents;
pub mod health;
pub mod metrics;
pub mod sessions;
