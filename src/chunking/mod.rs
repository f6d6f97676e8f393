//! Chunking of task content for the external search index.

pub mod chunker;

pub use chunker::*;
