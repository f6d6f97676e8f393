//! task-atlas — state management core for multi-agent coding-assistant
//! task logs.
//!
//! Hosts persist each agent conversation as a task directory holding a
//! metadata record, a UI-message log, and an API-history log. Tasks spawn
//! subtasks through in-message instructions, but the persisted records do
//! not reliably store the parent link. This crate reconstructs the full
//! task forest across the corpus, maintains an incremental on-disk skeleton
//! cache, and exposes structured queries (hierarchical navigation, tree
//! export, chunking for semantic search) to the dispatch layer.
//!
//! Pipeline: storage detection → UI-message deserialization → subtask
//! extraction → skeleton build → skeleton cache. On (re)load: cache →
//! hierarchy engine (index build, then guarded exact-prefix resolution) →
//! in-memory forest.

pub mod chunking;
pub mod config;
pub mod error;
pub mod extract;
pub mod hierarchy;
pub mod index;
pub mod logging;
pub mod messages;
pub mod search;
pub mod service;
pub mod skeleton;
pub mod storage;

pub use config::AtlasConfig;
pub use error::{CoreError, ErrorKind, TaskErrorRecord};
pub use service::{RebuildSummary, ResolvedState, StateService};
pub use skeleton::{CancellationFlag, ParentResolutionMethod, TaskSkeleton};
