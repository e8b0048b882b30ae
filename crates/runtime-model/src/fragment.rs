// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{StopReason, Usage};

/// One piece of a provider's streamed response.
///
/// The Stream Decoder (§4.4) consumes a `Fragment` sequence and reconstructs
/// assistant messages plus the semantic `AgentEvent`s described in §6. Kinds
/// not listed in §9's table (`Source`, `File`, `Raw`, `Abort`,
/// `ApprovalRequest`) are accepted but ignored by the decoder — providers are
/// free to emit them and callers are free to add new ones without breaking
/// older decoders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Fragment {
    /// A new step has begun on the wire (distinct from the Loop's own step
    /// counter — a provider may split one logical turn into several of
    /// these, e.g. around a built-in tool call).
    StartStep,
    FinishStep {
        stop_reason: Option<StopReason>,
    },

    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },

    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ReasoningEnd {
        id: String,
    },

    /// A tool call's arguments are arriving incrementally as raw JSON text.
    ToolInputStart {
        id: String,
        tool_name: String,
    },
    ToolInputDelta {
        id: String,
        delta: String,
    },

    /// The tool call is complete; `arguments` is the full, valid JSON text
    /// accumulated from the preceding `tool-input-delta` fragments (or sent
    /// whole, for providers that don't stream tool input).
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },

    /// Emitted by providers with server-side tool execution (rare; most
    /// tools are dispatched locally by the Tool Dispatcher).
    ToolResult {
        id: String,
        output: Value,
    },
    ToolError {
        id: String,
        error: String,
    },
    ToolOutputDenied {
        id: String,
        reason: Option<String>,
    },

    Finish {
        stop_reason: StopReason,
        usage: Option<Usage>,
    },
    Error {
        message: String,
    },

    // ── Ignorable kinds (§9) ────────────────────────────────────────────
    Source {
        value: Value,
    },
    File {
        value: Value,
    },
    Raw {
        value: Value,
    },
    Abort,
    ApprovalRequest {
        value: Value,
    },
}

impl Fragment {
    /// `true` for kinds the decoder passes through without state-machine
    /// effects (§9's ignorable-kinds list).
    pub fn is_ignorable(&self) -> bool {
        matches!(
            self,
            Fragment::Source { .. }
                | Fragment::File { .. }
                | Fragment::Raw { .. }
                | Fragment::Abort
                | Fragment::ApprovalRequest { .. }
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignorable_kinds_are_flagged() {
        assert!(Fragment::Abort.is_ignorable());
        assert!(Fragment::Source {
            value: Value::Null
        }
        .is_ignorable());
    }

    #[test]
    fn stateful_kinds_are_not_ignorable() {
        assert!(!Fragment::TextStart { id: "1".into() }.is_ignorable());
        assert!(!Fragment::Finish {
            stop_reason: StopReason::Stop,
            usage: None
        }
        .is_ignorable());
    }

    #[test]
    fn fragment_serde_round_trip() {
        let f = Fragment::ToolCall {
            id: "call-1".into(),
            name: "read_file".into(),
            arguments: "{\"path\":\"a.txt\"}".into(),
        };
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains("\"kind\":\"tool-call\""));
        let back: Fragment = serde_json::from_str(&json).unwrap();
        assert_eq!(f, back);
    }
}
