//! Types for host UI-message logs.

use serde::Deserialize;

/// A UI message as persisted by the host (open-ended record; only the fields
/// the core reads are declared, everything else is ignored).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUiMessage {
    #[serde(default)]
    pub ts: Option<u64>,
    #[serde(rename = "type", default)]
    pub msg_type: Option<String>,
    /// The "ask" sub-type: "tool", "followup", etc.
    #[serde(default)]
    pub ask: Option<String>,
    /// The "say" sub-type: "task", "api_req_started", "text", etc.
    #[serde(default)]
    pub say: Option<String>,
    /// Text content; for tool asks and api_req_started this is JSON-encoded.
    #[serde(default)]
    pub text: Option<String>,
}

/// Closed projection of a UI message. All downstream code is polymorphic
/// over this set only.
#[derive(Debug, Clone)]
pub enum UiMessage {
    /// `type = "ask"`, `ask = "tool"` — `text` holds a JSON tool invocation.
    ToolAsk { text: String, ts: Option<u64> },
    /// `type = "say"`, `say = "api_req_started"` — `text` holds JSON whose
    /// `request` field may carry a tagged new_task fragment.
    ApiReqStarted { text: String, ts: Option<u64> },
    /// Everything else. Kept so message counts and chunking see the full log.
    Other {
        say: Option<String>,
        text: Option<String>,
        ts: Option<u64>,
    },
}

impl From<&RawUiMessage> for UiMessage {
    fn from(raw: &RawUiMessage) -> Self {
        match (raw.msg_type.as_deref(), raw.ask.as_deref(), raw.say.as_deref()) {
            (Some("ask"), Some("tool"), _) => match &raw.text {
                Some(text) => UiMessage::ToolAsk {
                    text: text.clone(),
                    ts: raw.ts,
                },
                None => UiMessage::Other {
                    say: raw.say.clone(),
                    text: None,
                    ts: raw.ts,
                },
            },
            (Some("say"), _, Some("api_req_started")) => match &raw.text {
                Some(text) => UiMessage::ApiReqStarted {
                    text: text.clone(),
                    ts: raw.ts,
                },
                None => UiMessage::Other {
                    say: raw.say.clone(),
                    text: None,
                    ts: raw.ts,
                },
            },
            _ => UiMessage::Other {
                say: raw.say.clone(),
                text: raw.text.clone(),
                ts: raw.ts,
            },
        }
    }
}

impl UiMessage {
    pub fn timestamp(&self) -> Option<u64> {
        match self {
            UiMessage::ToolAsk { ts, .. }
            | UiMessage::ApiReqStarted { ts, .. }
            | UiMessage::Other { ts, .. } => *ts,
        }
    }

    /// Whether this message represents an agent action (a tool ask).
    pub fn is_action(&self) -> bool {
        matches!(self, UiMessage::ToolAsk { .. })
    }
}
