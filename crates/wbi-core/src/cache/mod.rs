//! Caching layer for wbi-core
//!
//! Provides the durable, file-backed copy of the last fetched index document.

pub mod document_cache;

pub use document_cache::{CachedDocument, DocumentCache};
