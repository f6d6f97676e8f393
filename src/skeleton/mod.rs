//! Skeletons — the cached, derived summary of one task.
//!
//! A skeleton owns exclusively derived fields (metadata projection, the
//! task's own truncated instruction, declared-child prefixes, source
//! checksums, counts). It never owns its source files; the host's task
//! directory stays read-only.

pub mod builder;
pub mod cache;
pub mod types;

pub use builder::*;
pub use cache::*;
pub use types::*;
