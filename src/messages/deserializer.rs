//! Parser for `ui_messages.json` in both shapes the hosts have produced.
//!
//! Strict JSON array first; on failure, line-delimited fallback where each
//! line is parsed independently and malformed lines are silently dropped
//! (counted, for `extraction_partial` accounting).

use crate::messages::types::RawUiMessage;

/// Result of parsing one UI log.
#[derive(Debug, Default)]
pub struct UiLogParse {
    pub messages: Vec<RawUiMessage>,
    /// Lines dropped in line-delimited mode because they failed to parse.
    pub dropped_lines: usize,
}

impl UiLogParse {
    /// True when the log parsed to nothing despite having content —
    /// neither shape the deserializer accepts.
    pub fn is_malformed(&self, input_len: usize) -> bool {
        input_len > 0 && self.messages.is_empty() && self.dropped_lines > 0
    }
}

/// Parse a UI log as a JSON array, falling back to line-delimited JSON.
///
/// The output is a finite sequence; callers that need multiple passes
/// buffer here.
pub fn parse_ui_log(bytes: &[u8]) -> UiLogParse {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return UiLogParse::default();
    }

    // Strict array mode first — the common shape.
    if let Ok(messages) = serde_json::from_slice::<Vec<RawUiMessage>>(bytes) {
        return UiLogParse {
            messages,
            dropped_lines: 0,
        };
    }

    // Line-delimited fallback: one record per line, malformed lines dropped.
    let text = String::from_utf8_lossy(bytes);
    let mut messages = Vec::new();
    let mut dropped_lines = 0usize;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RawUiMessage>(line) {
            Ok(msg) => messages.push(msg),
            Err(e) => {
                log::debug!("Dropping malformed UI log line: {}", e);
                dropped_lines += 1;
            }
        }
    }
    UiLogParse {
        messages,
        dropped_lines,
    }
}
