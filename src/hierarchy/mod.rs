//! Hierarchy reconstruction engine.
//!
//! The persisted task records do not reliably store parent links; the tree
//! is rebuilt from evidence in two phases over the skeleton map:
//!
//! - Phase 1 indexes every declared child-instruction prefix into a radix
//!   tree keyed on normalized text.
//! - Phase 2 resolves each task's parent by exact-prefix lookup, with
//!   workspace, temporal, and cycle guards.
//!
//! No fuzzy matching, no fallback resolution methods: only exact normalized
//! prefixes count, and a task with no evidence stays a root.

pub mod forest;
pub mod phase1;
pub mod phase2;

pub use forest::*;
pub use phase1::*;
pub use phase2::*;
