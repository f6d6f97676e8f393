//! UI-message deserialization for host message logs.
//!
//! The `ui_messages.json` shape has drifted across host versions: it may be a
//! single JSON array or line-delimited JSON, and individual records carry
//! version-dependent fields. Records are projected into a small closed set of
//! variants at this boundary; downstream code never sees open-ended JSON.

pub mod deserializer;
pub mod types;

pub use deserializer::*;
pub use types::*;
