//! Subtask-instruction extraction from UI message logs.
//!
//! Two recognizers run over the same message sequence:
//! - R1, tool-invocation form: `ask = "tool"` messages whose `text` is a JSON
//!   object with `tool ∈ {"newTask", "new_task"}`.
//! - R2, API-request form: `say = "api_req_started"` messages whose `request`
//!   string carries a tagged `[new_task in <mode> mode: '<body>']` fragment.
//!
//! Both yield the same record shape; duplicates between and within
//! recognizers collapse on `(mode, first 200 chars)` with the earliest
//! timestamp winning. Malformed JSON inside a single message yields nothing
//! for that message and the sequence continues.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::normalize::{truncate_instruction, MIN_INSTRUCTION_LEN};
use crate::messages::{RawUiMessage, UiMessage};

/// One declared child invocation extracted from a parent's UI log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskInstruction {
    /// Normalized lowercase mode name, decorations stripped.
    pub mode: String,
    /// The verbatim child launch instruction.
    pub message: String,
    /// Best-effort timestamp from the originating message (epoch ms).
    pub timestamp: u64,
}

/// Per-log extraction accounting. Warnings, not failures.
#[derive(Debug, Default, Clone)]
pub struct ExtractionLog {
    /// Messages whose `text` payload was not parseable JSON.
    pub malformed_payloads: usize,
    /// Extracts dropped for being shorter than the minimum length.
    pub below_min_length: usize,
    /// Duplicate declarations collapsed.
    pub duplicates_collapsed: usize,
}

impl ExtractionLog {
    pub fn is_clean(&self) -> bool {
        self.malformed_payloads == 0
    }
}

// The tagged fragment appears inside the `request` string of api_req_started
// payloads. Quote style varies by host version; bodies may contain escaped
// quotes and span newlines.
static NEW_TASK_SINGLE_QUOTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\[new_task in (.+?) mode:\s*'((?:[^'\\]|\\.)*)'\]").unwrap()
});
static NEW_TASK_DOUBLE_QUOTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)\[new_task in (.+?) mode:\s*"((?:[^"\\]|\\.)*)"\]"#).unwrap()
});

/// Extract every declared child invocation from one task's message sequence.
///
/// Never fails: per-message problems are counted in the returned log and the
/// scan continues.
pub fn extract_instructions(messages: &[RawUiMessage]) -> (Vec<SubtaskInstruction>, ExtractionLog) {
    let mut log = ExtractionLog::default();
    // (mode, first-200-chars) → index into `out`; earliest timestamp wins.
    let mut seen: HashMap<(String, String), usize> = HashMap::new();
    let mut out: Vec<SubtaskInstruction> = Vec::new();

    for raw in messages {
        match UiMessage::from(raw) {
            UiMessage::ToolAsk { text, ts } => {
                match recognize_tool_ask(&text, ts.unwrap_or(0)) {
                    Ok(Some(instr)) => collapse(&mut out, &mut seen, &mut log, instr),
                    Ok(None) => {}
                    Err(_) => log.malformed_payloads += 1,
                }
            }
            UiMessage::ApiReqStarted { text, ts } => {
                match recognize_api_request(&text, ts.unwrap_or(0)) {
                    Ok(instrs) => {
                        for instr in instrs {
                            collapse(&mut out, &mut seen, &mut log, instr);
                        }
                    }
                    Err(_) => log.malformed_payloads += 1,
                }
            }
            UiMessage::Other { .. } => {}
        }
    }

    // Drop noise extracts after collapse so a short duplicate can't shadow
    // a longer original.
    let (kept, dropped): (Vec<_>, Vec<_>) = out
        .into_iter()
        .partition(|i| i.message.chars().count() >= MIN_INSTRUCTION_LEN);
    log.below_min_length += dropped.len();

    (kept, log)
}

/// R1: parse a tool-ask payload; `Some` only for new-task invocations.
fn recognize_tool_ask(text: &str, ts: u64) -> Result<Option<SubtaskInstruction>, serde_json::Error> {
    let payload: serde_json::Value = serde_json::from_str(text)?;
    let tool = payload.get("tool").and_then(|t| t.as_str()).unwrap_or("");
    if tool != "newTask" && tool != "new_task" {
        return Ok(None);
    }
    // Later host versions renamed `content` to `message`.
    let message = payload
        .get("content")
        .or_else(|| payload.get("message"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();
    if message.is_empty() {
        return Ok(None);
    }
    let mode = strip_mode(payload.get("mode").and_then(|m| m.as_str()).unwrap_or(""));
    Ok(Some(SubtaskInstruction {
        mode,
        message,
        timestamp: ts,
    }))
}

/// R2: parse an api_req_started payload and scan its `request` string for
/// tagged new_task fragments. One instruction per match.
fn recognize_api_request(text: &str, ts: u64) -> Result<Vec<SubtaskInstruction>, serde_json::Error> {
    let payload: serde_json::Value = serde_json::from_str(text)?;
    let request = match payload.get("request").and_then(|r| r.as_str()) {
        Some(r) => r,
        None => return Ok(Vec::new()),
    };

    let mut out = Vec::new();
    for re in [&*NEW_TASK_SINGLE_QUOTED, &*NEW_TASK_DOUBLE_QUOTED] {
        for caps in re.captures_iter(request) {
            let mode = strip_mode(&caps[1]);
            let message = unescape_quotes(&caps[2]);
            out.push(SubtaskInstruction {
                mode,
                message,
                timestamp: ts,
            });
        }
    }
    Ok(out)
}

/// Normalize a mode label: keep alphabetic characters only (mode labels carry
/// emoji and separator decorations), lowercased.
fn strip_mode(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase()
}

/// Undo the backslash escaping the host applies inside quoted bodies.
fn unescape_quotes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\'') => out.push('\''),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn collapse(
    out: &mut Vec<SubtaskInstruction>,
    seen: &mut HashMap<(String, String), usize>,
    log: &mut ExtractionLog,
    instr: SubtaskInstruction,
) {
    let key = (instr.mode.clone(), truncate_instruction(&instr.message));
    match seen.get(&key) {
        Some(&idx) => {
            log.duplicates_collapsed += 1;
            if instr.timestamp != 0 && (out[idx].timestamp == 0 || instr.timestamp < out[idx].timestamp)
            {
                out[idx].timestamp = instr.timestamp;
            }
        }
        None => {
            seen.insert(key, out.len());
            out.push(instr);
        }
    }
}
