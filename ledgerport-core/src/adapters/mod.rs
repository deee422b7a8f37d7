//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - In-memory stores for tests and embedding
//! - `settings.json` template store and NDJSON record sink
//! - HTTP client for the persistence backend

pub mod file;
pub mod http;
pub mod memory;
mod table;
