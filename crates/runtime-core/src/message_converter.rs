// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use runtime_model::{AssistantPart, Message, ToolContentPart, ToolResultContent};

/// Normalize a heterogeneous message log into the shape a model provider
/// expects (§4.3): strip reasoning, drop empty assistant turns, drop custom
/// envelopes, collapse tool-result content into a single text blob.
///
/// Idempotent: `convert(convert(xs)) == convert(xs)`.
pub fn convert(messages: &[Message]) -> Vec<Message> {
    messages.iter().filter_map(convert_one).collect()
}

fn convert_one(message: &Message) -> Option<Message> {
    match message {
        Message::User { .. } => Some(message.clone()),
        Message::Assistant {
            parts,
            model_id,
            usage,
            stop_reason,
            error,
            timestamp,
        } => {
            let kept: Vec<AssistantPart> = parts
                .iter()
                .filter(|p| !matches!(p, AssistantPart::Reasoning { .. }))
                .cloned()
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(Message::Assistant {
                    parts: kept,
                    model_id: model_id.clone(),
                    usage: *usage,
                    stop_reason: *stop_reason,
                    error: error.clone(),
                    timestamp: *timestamp,
                })
            }
        }
        Message::ToolResult {
            tool_call_id,
            tool_name,
            content,
            details,
            is_error,
            timestamp,
        } => Some(Message::ToolResult {
            tool_call_id: tool_call_id.clone(),
            tool_name: tool_name.clone(),
            content: ToolResultContent::Text(collapse(content)),
            details: details.clone(),
            is_error: *is_error,
            timestamp: *timestamp,
        }),
        Message::Custom { .. } => None,
    }
}

fn collapse(content: &ToolResultContent) -> String {
    match content {
        ToolResultContent::Text(text) => text.clone(),
        ToolResultContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ToolContentPart::Text { text } => text.clone(),
                ToolContentPart::Image { image_url } => {
                    let mime = image_url
                        .split_once(';')
                        .map(|(prefix, _)| prefix.trim_start_matches("data:"))
                        .unwrap_or("image");
                    format!("[image: {mime}]")
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use runtime_model::StopReason;
    use serde_json::json;

    use super::*;

    #[test]
    fn user_messages_pass_through() {
        let msgs = vec![Message::user("hi")];
        let out = convert(&msgs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_text(), Some("hi"));
    }

    #[test]
    fn reasoning_parts_are_stripped() {
        let msg = Message::Assistant {
            parts: vec![
                AssistantPart::Reasoning {
                    text: "thinking...".into(),
                },
                AssistantPart::Text {
                    text: "answer".into(),
                },
            ],
            model_id: None,
            usage: None,
            stop_reason: StopReason::Stop,
            error: None,
            timestamp: Utc::now(),
        };
        let out = convert(&[msg]);
        assert_eq!(out.len(), 1);
        match &out[0] {
            Message::Assistant { parts, .. } => {
                assert_eq!(parts.len(), 1);
                assert!(matches!(parts[0], AssistantPart::Text { .. }));
            }
            _ => panic!("expected assistant"),
        }
    }

    #[test]
    fn assistant_with_only_reasoning_is_omitted() {
        let msg = Message::Assistant {
            parts: vec![AssistantPart::Reasoning {
                text: "thinking...".into(),
            }],
            model_id: None,
            usage: None,
            stop_reason: StopReason::Stop,
            error: None,
            timestamp: Utc::now(),
        };
        let out = convert(&[msg]);
        assert!(out.is_empty());
    }

    #[test]
    fn custom_envelopes_are_dropped() {
        let msg = Message::Custom {
            value: json!({"x": 1}),
            timestamp: Utc::now(),
        };
        assert!(convert(&[msg]).is_empty());
    }

    #[test]
    fn tool_result_parts_collapse_to_text_with_image_placeholder() {
        let msg = Message::ToolResult {
            tool_call_id: "t1".into(),
            tool_name: "read".into(),
            content: ToolResultContent::Parts(vec![
                ToolContentPart::Text {
                    text: "abc".into(),
                },
                ToolContentPart::Image {
                    image_url: "data:image/png;base64,AAAA".into(),
                },
            ]),
            details: None,
            is_error: false,
            timestamp: Utc::now(),
        };
        let out = convert(&[msg]);
        match &out[0] {
            Message::ToolResult { content, .. } => {
                assert_eq!(
                    content.as_text(),
                    "abc\n[image: image/png]"
                );
            }
            _ => panic!("expected tool result"),
        }
    }

    #[test]
    fn converter_is_idempotent() {
        let msgs = vec![
            Message::user("hi"),
            Message::assistant_text("hello", StopReason::Stop),
            Message::tool_result("t1", "read", "abc", false),
        ];
        let once = convert(&msgs);
        let twice = convert(&once);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.as_text(), b.as_text());
        }
    }
}
