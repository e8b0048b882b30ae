// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single piece of user-supplied content: plain text or an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { image_url: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }
    pub fn image(image_url: impl Into<String>) -> Self {
        ContentPart::Image {
            image_url: image_url.into(),
        }
    }
}

/// Content attached to a [`Message::User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl From<String> for UserContent {
    fn from(text: String) -> Self {
        UserContent::Text(text)
    }
}

impl From<&str> for UserContent {
    fn from(text: &str) -> Self {
        UserContent::Text(text.to_string())
    }
}

impl UserContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            UserContent::Text(t) => Some(t),
            UserContent::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::Image { .. } => None,
            }),
        }
    }
}

/// One piece of assistant output, in emission order.
///
/// Ordering is significant: a model that reasons, then calls a tool, then
/// explains the result produces `[Reasoning, ToolCall, Text]` in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantPart {
    Text { text: String },
    Reasoning { text: String },
    ToolCall { call: ToolCall },
}

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Token accounting for one assistant turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cache_read_tokens: u32,
    pub cache_write_tokens: u32,
}

/// Why an assistant turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    Stop,
    Length,
    ToolUse,
    Error,
    Aborted,
}

/// One piece of a tool's result content, mirroring [`ContentPart`] for the
/// assistant-facing side of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContentPart {
    Text { text: String },
    Image { image_url: String },
}

/// Content returned by a tool, normalized to either plain text or a list of
/// content parts (e.g. text plus a screenshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Parts(Vec<ToolContentPart>),
}

impl ToolResultContent {
    pub fn as_text(&self) -> String {
        match self {
            ToolResultContent::Text(t) => t.clone(),
            ToolResultContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ToolContentPart::Text { text } => Some(text.as_str()),
                    ToolContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for ToolResultContent {
    fn from(s: String) -> Self {
        ToolResultContent::Text(s)
    }
}

impl From<&str> for ToolResultContent {
    fn from(s: &str) -> Self {
        ToolResultContent::Text(s.to_string())
    }
}

/// The outcome of running a tool's `execute`, before it is wrapped into a
/// [`Message::ToolResult`]. Produced by the Tool Adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub output: Value,
    pub ui: Option<Value>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(output: Value) -> Self {
        Self {
            output,
            ui: None,
            is_error: false,
        }
    }
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: Value::String(message.into()),
            ui: None,
            is_error: true,
        }
    }
}

/// A message in a conversation. The single source of truth for everything
/// sent to or received from a model, and the unit persisted by the session
/// recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: UserContent,
        timestamp: DateTime<Utc>,
    },
    Assistant {
        parts: Vec<AssistantPart>,
        model_id: Option<String>,
        usage: Option<Usage>,
        stop_reason: StopReason,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        content: ToolResultContent,
        details: Option<Value>,
        is_error: bool,
        timestamp: DateTime<Utc>,
    },
    /// Opaque, provider/application-defined payload. Never sent to a model;
    /// the Message Converter (§4.3) drops these before building a request.
    Custom {
        value: Value,
        timestamp: DateTime<Utc>,
    },
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message::User {
            content: UserContent::Text(text.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn user_with_parts(parts: Vec<ContentPart>) -> Self {
        Message::User {
            content: UserContent::Parts(parts),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant_text(text: impl Into<String>, stop_reason: StopReason) -> Self {
        Message::Assistant {
            parts: vec![AssistantPart::Text { text: text.into() }],
            model_id: None,
            usage: None,
            stop_reason,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<ToolResultContent>,
        is_error: bool,
    ) -> Self {
        Message::ToolResult {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            details: None,
            is_error,
            timestamp: Utc::now(),
        }
    }

    /// Tool-call ids declared by this message, if it is an assistant message.
    pub fn tool_call_ids(&self) -> Vec<&str> {
        match self {
            Message::Assistant { parts, .. } => parts
                .iter()
                .filter_map(|p| match p {
                    AssistantPart::ToolCall { call } => Some(call.id.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Concatenated text content, ignoring reasoning and tool calls. Used by
    /// the Subagent tool to project a sub-agent's run down to plain text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Message::User { content, .. } => content.as_text().map(str::to_string),
            Message::Assistant { parts, .. } => {
                let text: String = parts
                    .iter()
                    .filter_map(|p| match p {
                        AssistantPart::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            Message::ToolResult { content, .. } => Some(content.as_text()),
            Message::Custom { .. } => None,
        }
    }
}

/// JSON-schema-shaped tool description sent to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// How the model should choose which tool (if any) to call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Specific {
        name: String,
    },
}

/// A request to stream one assistant turn from a [`crate::ModelProvider`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<ToolSchema>,
    #[serde(default)]
    pub tool_choice: ToolChoice,
    pub system: Option<String>,
    /// Explicit reasoning token budget resolved from `thinking_level` via
    /// `thinking_budgets` (§4.6.3). `None` means no explicit budget is sent.
    pub thinking_budget: Option<u32>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
