// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::{HashMap, HashSet};

use chrono::Utc;
use futures::StreamExt;
use runtime_model::{AssistantPart, Fragment, FragmentStream, Message, StopReason, ToolCall, Usage};
use tokio::sync::oneshot;
use tracing::warn;

use crate::event::{AgentEvent, EventStream};

/// The finalized assistant message for a step, plus any tool results the
/// provider resolved server-side (§4.4's `tool-result`/`tool-error`
/// fragments, distinct from the locally-dispatched path in §4.5).
pub struct DecodedStep {
    pub assistant: Message,
    pub provider_resolved: Vec<Message>,
    pub aborted: bool,
}

/// Drive the Stream Decoder's state machine for one step (§4.4).
pub async fn decode_step<R>(
    mut stream: FragmentStream,
    events: &EventStream<AgentEvent, R>,
    cancel: &mut oneshot::Receiver<()>,
) -> DecodedStep
where
    R: Clone + Send + Sync + 'static,
{
    let mut parts: Vec<AssistantPart> = Vec::new();
    let mut text_idx: HashMap<String, usize> = HashMap::new();
    let mut reasoning_idx: HashMap<String, usize> = HashMap::new();
    let mut tool_idx: HashMap<String, usize> = HashMap::new();
    let mut tool_names: HashMap<String, String> = HashMap::new();
    let mut started_tool_calls: HashSet<String> = HashSet::new();
    let mut ended_tool_calls: HashSet<String> = HashSet::new();
    let mut provider_resolved: Vec<Message> = Vec::new();
    let mut message_started = false;
    let mut usage: Option<Usage> = None;
    let mut provider_stop_reason = StopReason::Stop;
    let mut error: Option<String> = None;
    let mut aborted = false;

    events.push(AgentEvent::TurnStart);

    loop {
        let fragment = tokio::select! {
            biased;
            _ = &mut *cancel => {
                aborted = true;
                break;
            }
            next = stream.next() => match next {
                Some(Ok(f)) => f,
                Some(Err(e)) => {
                    warn!("model stream error: {e}");
                    error = Some(e.to_string());
                    break;
                }
                None => break,
            },
        };

        if fragment.is_ignorable() {
            events.push(AgentEvent::StreamPart { part: fragment });
            continue;
        }

        match fragment {
            Fragment::StartStep => {}
            Fragment::FinishStep { .. } => {}

            Fragment::TextStart { id } => {
                parts.push(AssistantPart::Text { text: String::new() });
                text_idx.insert(id, parts.len() - 1);
                emit_message_progress(events, &parts, &mut message_started, String::new());
            }
            Fragment::TextDelta { id, delta } => {
                if let Some(&idx) = text_idx.get(&id) {
                    if let AssistantPart::Text { text } = &mut parts[idx] {
                        text.push_str(&delta);
                    }
                }
                emit_message_progress(events, &parts, &mut message_started, delta);
            }
            Fragment::TextEnd { .. } => {}

            Fragment::ReasoningStart { id } => {
                parts.push(AssistantPart::Reasoning { text: String::new() });
                reasoning_idx.insert(id, parts.len() - 1);
                emit_message_progress(events, &parts, &mut message_started, String::new());
            }
            Fragment::ReasoningDelta { id, delta } => {
                if let Some(&idx) = reasoning_idx.get(&id) {
                    if let AssistantPart::Reasoning { text } = &mut parts[idx] {
                        text.push_str(&delta);
                    }
                }
                emit_message_progress(events, &parts, &mut message_started, delta);
            }
            Fragment::ReasoningEnd { .. } => {}

            Fragment::ToolInputStart { id, tool_name } => {
                tool_names.insert(id.clone(), tool_name.clone());
                parts.push(AssistantPart::ToolCall {
                    call: ToolCall {
                        id: id.clone(),
                        name: tool_name,
                        arguments: serde_json::Value::Null,
                    },
                });
                tool_idx.insert(id, parts.len() - 1);
                emit_message_progress(events, &parts, &mut message_started, String::new());
            }
            Fragment::ToolInputDelta { .. } => {
                events.push(AgentEvent::StreamPart { part: fragment });
            }
            Fragment::ToolCall {
                id,
                name,
                arguments,
            } => {
                let parsed: serde_json::Value = serde_json::from_str(&arguments)
                    .unwrap_or_else(|_| serde_json::Value::String(arguments.clone()));
                tool_names.insert(id.clone(), name.clone());
                match tool_idx.get(&id) {
                    Some(&idx) => {
                        parts[idx] = AssistantPart::ToolCall {
                            call: ToolCall {
                                id: id.clone(),
                                name: name.clone(),
                                arguments: parsed.clone(),
                            },
                        };
                    }
                    None => {
                        parts.push(AssistantPart::ToolCall {
                            call: ToolCall {
                                id: id.clone(),
                                name: name.clone(),
                                arguments: parsed.clone(),
                            },
                        });
                        tool_idx.insert(id.clone(), parts.len() - 1);
                    }
                }
                emit_message_progress(events, &parts, &mut message_started, String::new());
                if started_tool_calls.insert(id.clone()) {
                    events.push(AgentEvent::ToolExecutionStart {
                        tool_call_id: id,
                        tool_name: name,
                        args: parsed,
                    });
                }
            }

            Fragment::ToolResult { id, output } => {
                let name = tool_names.get(&id).cloned().unwrap_or_default();
                provider_resolved.push(Message::tool_result(
                    id.clone(),
                    name.clone(),
                    output.to_string(),
                    false,
                ));
                if ended_tool_calls.insert(id.clone()) {
                    events.push(AgentEvent::ToolExecutionEnd {
                        tool_call_id: id,
                        tool_name: name,
                        result: output,
                        is_error: false,
                    });
                }
            }
            Fragment::ToolError { id, error: msg } => {
                let name = tool_names.get(&id).cloned().unwrap_or_default();
                provider_resolved.push(Message::tool_result(id.clone(), name.clone(), msg.clone(), true));
                if ended_tool_calls.insert(id.clone()) {
                    events.push(AgentEvent::ToolExecutionEnd {
                        tool_call_id: id,
                        tool_name: name,
                        result: serde_json::Value::String(msg),
                        is_error: true,
                    });
                }
            }
            Fragment::ToolOutputDenied { id, reason } => {
                let name = tool_names.get(&id).cloned().unwrap_or_default();
                let reason = reason.unwrap_or_else(|| "denied".to_string());
                provider_resolved.push(Message::tool_result(id.clone(), name.clone(), reason.clone(), true));
                if ended_tool_calls.insert(id.clone()) {
                    events.push(AgentEvent::ToolExecutionEnd {
                        tool_call_id: id,
                        tool_name: name,
                        result: serde_json::Value::String(reason),
                        is_error: true,
                    });
                }
            }

            Fragment::Finish {
                stop_reason,
                usage: u,
            } => {
                usage = u;
                provider_stop_reason = stop_reason;
                break;
            }
            Fragment::Error { message } => {
                error = Some(message.clone());
                events.push(AgentEvent::Error { error: message });
                break;
            }

            Fragment::Source { .. }
            | Fragment::File { .. }
            | Fragment::Raw { .. }
            | Fragment::Abort
            | Fragment::ApprovalRequest { .. } => unreachable!("handled by is_ignorable above"),
        }
    }

    let has_tool_calls = parts.iter().any(|p| matches!(p, AssistantPart::ToolCall { .. }));
    let final_stop_reason = if aborted {
        StopReason::Aborted
    } else if error.is_some() {
        StopReason::Error
    } else if has_tool_calls {
        StopReason::ToolUse
    } else if provider_stop_reason == StopReason::Length {
        StopReason::Length
    } else {
        StopReason::Stop
    };

    let assistant = Message::Assistant {
        parts,
        model_id: None,
        usage,
        stop_reason: final_stop_reason,
        error,
        timestamp: Utc::now(),
    };

    if !message_started {
        // An error-only step (provider transport failure, or a tool-error
        // fragment with no accompanying text/reasoning) never ran a content
        // fragment through `emit_message_progress`, so `message_start` was
        // never fired. §5/§8 invariant 2 requires one regardless.
        events.push(AgentEvent::MessageStart {
            message: assistant.clone(),
        });
    }
    events.push(AgentEvent::MessageEnd {
        message: assistant.clone(),
    });
    events.push(AgentEvent::TurnEnd {
        message: assistant.clone(),
        tool_results: provider_resolved.clone(),
    });

    DecodedStep {
        assistant,
        provider_resolved,
        aborted,
    }
}

fn emit_message_progress<R: Clone + Send + Sync + 'static>(
    events: &EventStream<AgentEvent, R>,
    parts: &[AssistantPart],
    message_started: &mut bool,
    delta: String,
) {
    let snapshot = Message::Assistant {
        parts: parts.to_vec(),
        model_id: None,
        usage: None,
        stop_reason: StopReason::Stop,
        error: None,
        timestamp: Utc::now(),
    };
    if !*message_started {
        *message_started = true;
        events.push(AgentEvent::MessageStart { message: snapshot });
    } else {
        events.push(AgentEvent::MessageUpdate {
            message: snapshot,
            delta,
        });
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
