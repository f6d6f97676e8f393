//! Storage Detector — enumerate task directories and read their file triple.
//!
//! Hosts persist each agent conversation ("task") under:
//! `<storage root>/tasks/<task-id>/`
//!
//! Each task directory contains:
//! - `task_metadata.json` — workspace, title, timestamps, initial instruction
//! - `ui_messages.json` — timestamped UI-level messages
//! - `api_conversation_history.json` — raw API message log
//!
//! This module treats all of it as read-only.

pub mod detector;
pub mod roots;

pub use detector::*;
pub use roots::*;
