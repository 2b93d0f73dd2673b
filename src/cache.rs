//! Single-flight TTL cache and its storage backends.

pub mod backend;
pub mod manager;
pub mod state;
