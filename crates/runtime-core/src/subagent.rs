// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use runtime_config::AgentConfig;
use runtime_model::{Message, ModelProvider, ToolCall, ToolResult};
use runtime_tools::{ToolDefinition, ToolRegistry, ToolUpdateSink};
use serde_json::{json, Value};

use crate::agent::Agent;
use crate::error::AgentError;
use crate::event::{AgentEvent, EventStream};

/// A fully configured agent a parent run can delegate to (§4.8): its own
/// model, tool set and loop settings.
pub struct SubagentSpec {
    pub model: Arc<dyn ModelProvider>,
    pub tools: Arc<ToolRegistry>,
    pub config: AgentConfig,
}

/// A registry of `id -> SubagentSpec`. `tool_for` produces a
/// [`ToolDefinition`] that builds and streams a fresh agent from the spec
/// each time it is called.
#[derive(Default)]
pub struct SubagentRegistry {
    specs: HashMap<String, Arc<SubagentSpec>>,
}

impl SubagentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, spec: SubagentSpec) -> Result<(), AgentError> {
        let id = id.into();
        if self.specs.contains_key(&id) {
            return Err(AgentError::DuplicateSubagent(id));
        }
        self.specs.insert(id, Arc::new(spec));
        Ok(())
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.specs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Build the `ToolDefinition` a parent agent's registry can hold for
    /// `id`. Named after the subagent id, so a model sees it as an ordinary
    /// tool (§4.8 "subagents are agents").
    pub fn tool_for(&self, id: &str) -> Result<SubagentTool, AgentError> {
        let spec = self
            .specs
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::SubagentNotFound(id.to_string()))?;
        Ok(SubagentTool {
            id: id.to_string(),
            spec,
        })
    }
}

pub struct SubagentTool {
    id: String,
    spec: Arc<SubagentSpec>,
}

impl std::fmt::Debug for SubagentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubagentTool").field("id", &self.id).finish()
    }
}

#[async_trait]
impl ToolDefinition for SubagentTool {
    fn name(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "Delegates a task to a configured subagent and returns its final answer."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": { "type": "string" }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, call: &ToolCall, updates: ToolUpdateSink) -> ToolResult {
        let prompt_text = call
            .arguments
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut sub = Agent::new(self.spec.model.clone(), self.spec.tools.clone(), self.spec.config.clone());
        let (events, mut consumer) = EventStream::<AgentEvent, Vec<Message>>::new();

        let consume = async {
            let mut running = String::new();
            while let Some(event) = consumer.next().await {
                if let AgentEvent::MessageUpdate { message, .. } = event {
                    if let Some(text) = message.as_text() {
                        running = text;
                        updates.push(Value::String(running.clone()));
                    }
                }
            }
            running
        };

        let (run_result, final_text) = tokio::join!(sub.prompt(prompt_text, &events), consume);

        match run_result {
            Ok(()) => ToolResult::ok(Value::String(final_text)),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
