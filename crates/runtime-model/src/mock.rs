// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::provider::FragmentStream;
use crate::{CompletionRequest, Fragment, StopReason, Usage};

/// Deterministic mock provider for tests. Echoes the last user message back
/// as the assistant response.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl crate::ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn stream(&self, req: CompletionRequest) -> anyhow::Result<FragmentStream> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m, crate::Message::User { .. }))
            .and_then(|m| m.as_text())
            .unwrap_or_else(|| "[no input]".into());

        let fragments: Vec<anyhow::Result<Fragment>> = vec![
            Ok(Fragment::TextStart { id: "0".into() }),
            Ok(Fragment::TextDelta {
                id: "0".into(),
                delta: format!("MOCK: {reply}"),
            }),
            Ok(Fragment::TextEnd { id: "0".into() }),
            Ok(Fragment::Finish {
                stop_reason: StopReason::Stop,
                usage: Some(Usage {
                    input_tokens: 10,
                    output_tokens: 10,
                    cache_read_tokens: 0,
                    cache_write_tokens: 0,
                }),
            }),
        ];
        Ok(Box::pin(stream::iter(fragments)))
    }
}

/// A pre-scripted mock provider. Each call to `stream` pops the next
/// response script from the front of the queue. Lets tests specify exact
/// fragment sequences -- including tool calls -- without network access.
pub struct ScriptedMockProvider {
    scripts: Arc<Mutex<Vec<Vec<Fragment>>>>,
    name: String,
    /// The last `CompletionRequest` seen by this provider, for assertions.
    pub last_request: Arc<Mutex<Option<CompletionRequest>>>,
}

impl ScriptedMockProvider {
    /// Build a provider from a list of response scripts. The outer `Vec` is
    /// the ordered list of calls; the inner `Vec` is the fragment sequence
    /// emitted for that call.
    pub fn new(scripts: Vec<Vec<Fragment>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            name: "scripted-mock".into(),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Convenience: provider that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        let r = reply.into();
        Self::new(vec![vec![
            Fragment::TextStart { id: "0".into() },
            Fragment::TextDelta {
                id: "0".into(),
                delta: r,
            },
            Fragment::TextEnd { id: "0".into() },
            Fragment::Finish {
                stop_reason: StopReason::Stop,
                usage: Some(Usage {
                    input_tokens: 5,
                    output_tokens: 5,
                    cache_read_tokens: 0,
                    cache_write_tokens: 0,
                }),
            },
        ]])
    }

    /// Convenience: provider that returns a tool call followed by a text
    /// reply on the following call.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        let id = tool_id.into();
        let name = tool_name.into();
        Self::new(vec![
            // Round 1 -- model emits a tool call
            vec![
                Fragment::ToolInputStart {
                    id: id.clone(),
                    tool_name: name.clone(),
                },
                Fragment::ToolCall {
                    id: id.clone(),
                    name,
                    arguments: args_json.into(),
                },
                Fragment::Finish {
                    stop_reason: StopReason::ToolUse,
                    usage: None,
                },
            ],
            // Round 2 -- model responds after the tool result is appended
            vec![
                Fragment::TextStart { id: "0".into() },
                Fragment::TextDelta {
                    id: "0".into(),
                    delta: final_text.into(),
                },
                Fragment::TextEnd { id: "0".into() },
                Fragment::Finish {
                    stop_reason: StopReason::Stop,
                    usage: None,
                },
            ],
        ])
    }

    /// Convenience: provider whose single call reports a tool error
    /// immediately, without ever dispatching the tool's `execute`.
    pub fn tool_error(tool_id: impl Into<String>, error: impl Into<String>) -> Self {
        let id = tool_id.into();
        Self::new(vec![vec![
            Fragment::ToolError {
                id,
                error: error.into(),
            },
            Fragment::Finish {
                stop_reason: StopReason::Error,
                usage: None,
            },
        ]])
    }
}

#[async_trait]
impl crate::ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        &self.name
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn stream(&self, req: CompletionRequest) -> anyhow::Result<FragmentStream> {
        *self.last_request.lock().unwrap() = Some(req);
        let fragments = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                vec![
                    Fragment::TextStart { id: "0".into() },
                    Fragment::TextDelta {
                        id: "0".into(),
                        delta: "[no more scripts]".into(),
                    },
                    Fragment::TextEnd { id: "0".into() },
                    Fragment::Finish {
                        stop_reason: StopReason::Stop,
                        usage: None,
                    },
                ]
            } else {
                scripts.remove(0)
            }
        };
        let wrapped: Vec<anyhow::Result<Fragment>> = fragments.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(wrapped)))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
