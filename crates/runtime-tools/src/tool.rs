// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use runtime_model::{ToolCall, ToolResult};
use serde_json::Value;
use tokio::sync::mpsc;

/// Sink execute() writes partial results to while it runs. The Tool Adapter
/// (§4.2) turns each pushed value into a `tool_execution_update` event.
///
/// Mirrors a lazy sequence of partial results: a tool that has nothing
/// incremental to report simply never calls `push` and returns its final
/// [`ToolResult`] directly from `execute`.
#[derive(Clone)]
pub struct ToolUpdateSink {
    tx: mpsc::UnboundedSender<Value>,
}

impl ToolUpdateSink {
    pub fn push(&self, partial: Value) {
        // The receiving end is dropped once execute() returns; a failed send
        // at that point just means the update arrived too late to matter.
        let _ = self.tx.send(partial);
    }
}

pub fn update_channel() -> (ToolUpdateSink, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ToolUpdateSink { tx }, rx)
}

/// A tool the Loop can offer to the model and, on a `tool-call` fragment,
/// dispatch through the Tool Adapter (§3, §4.2).
///
/// A definition with no real `execute` (a schema-only declaration, §9 OQ1)
/// must return `false` from `has_execute` and `Some` from `output_schema`;
/// the registry enforces this at registration time.
#[async_trait]
pub trait ToolDefinition: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;

    /// Present when results should be validated/documented against a shape,
    /// and mandatory for schema-only tools (§9 OQ1).
    fn output_schema(&self) -> Option<Value> {
        None
    }

    /// `false` marks a schema-only tool: the Dispatcher never calls
    /// `execute` for it and synthesizes the result itself (§9 OQ1).
    fn has_execute(&self) -> bool {
        true
    }

    /// Run the tool. `updates` may be used zero or more times to report
    /// partial progress before the final [`ToolResult`] is returned.
    async fn execute(&self, call: &ToolCall, updates: ToolUpdateSink) -> ToolResult;

    /// Project a [`ToolResult`] into the value placed in the model-facing
    /// tool-result message. Defaults to the raw `output` value.
    fn to_model_output(&self, result: &ToolResult) -> Value {
        result.output.clone()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
