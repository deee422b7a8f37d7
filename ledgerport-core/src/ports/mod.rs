//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators. The engine
//! depends only on these traits, not on concrete implementations.

mod record_sink;
mod template_store;

pub use record_sink::RecordSink;
pub use template_store::TemplateStore;
