//! Instruction index mapping normalized prefixes to declaring parents.

pub mod radix;

pub use radix::*;
