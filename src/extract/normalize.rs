//! Prefix normalization and instruction truncation.
//!
//! Contains:
//! - Truncation constants
//! - The prefix normalizer (matching canonical form)
//! - UTF-8 safe truncation helpers
//!
//! This module must contain no filesystem access and no parsing logic.
//!
//! The normalizer is deterministic and idempotent. It is called from exactly
//! two places — indexing a parent's declared child prefixes and looking up a
//! child's own instruction — and both MUST go through [`normalize_prefix`].
//! Historically the two call sites diverged and silently produced zero
//! matches; keep them on this one function.

/// Characters kept by [`truncate_instruction`] for the stored, human-readable
/// form of a task's own instruction.
pub const TRUNCATED_INSTRUCTION_LEN: usize = 200;
/// Minimum instruction length; shorter extracts are dropped as noise.
pub const MIN_INSTRUCTION_LEN: usize = 20;

/// Emphasis characters stripped by the normalizer. These appear in source
/// text only as decoration and differ between the declaring side and the
/// child's persisted instruction.
const EMPHASIS_CHARS: &[char] = &['*', '`', '\u{200D}'];

/// Canonicalize instruction text for exact-prefix matching.
///
/// Steps, in order: collapse whitespace runs to a single space; lowercase;
/// strip emphasis characters; truncate to `max_len` code points; right-trim.
pub fn normalize_prefix(text: &str, max_len: usize) -> String {
    let collapsed = collapse_whitespace(text);
    let lowered = collapsed.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| !EMPHASIS_CHARS.contains(c))
        .collect();
    let truncated: String = stripped.chars().take(max_len).collect();
    truncated.trim_end().to_string()
}

/// The stored `truncated_instruction` form: whitespace-collapsed and bounded,
/// but case-preserved so it stays readable in reports.
pub fn truncate_instruction(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    let truncated: String = collapsed.chars().take(TRUNCATED_INSTRUCTION_LEN).collect();
    truncated.trim_end().to_string()
}

/// Replace every run of whitespace with a single space and trim the ends.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for c in text.chars() {
        if c.is_whitespace() {
            in_ws = true;
        } else {
            if in_ws && !out.is_empty() {
                out.push(' ');
            }
            in_ws = false;
            out.push(c);
        }
    }
    out
}

/// Safely truncate a UTF-8 string to at most `max_chars` characters, with an
/// ellipsis when shortened. Display-only; never feed the result to the
/// normalizer.
pub fn truncate_utf8(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}…", truncated)
    }
}
