// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use runtime_model::{ToolCall, ToolResult, ToolSchema};
use thiserror::Error;

use crate::tool::{update_channel, ToolDefinition};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("tool `{0}` declares has_execute() == false but no output_schema()")]
    MissingOutputSchema(String),
}

/// Central registry holding all available tool definitions.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDefinition>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Fails if the tool is schema-only (§9 OQ1) but
    /// declares no output schema -- the Dispatcher would have nothing to
    /// hand back to the model for such a call.
    pub fn register(
        &mut self,
        tool: impl ToolDefinition + 'static,
    ) -> Result<(), RegistrationError> {
        if !tool.has_execute() && tool.output_schema().is_none() {
            return Err(RegistrationError::MissingOutputSchema(
                tool.name().to_string(),
            ));
        }
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolDefinition>> {
        self.tools.get(name).cloned()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.input_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Dispatch a call to its tool, streaming partial results to `updates`.
    /// Returns an error result rather than panicking for unknown tools or
    /// schema-only tools reached here by mistake -- the Dispatcher is
    /// expected to have already filtered those out via `get`/`has_execute`.
    pub async fn execute(
        &self,
        call: &ToolCall,
        updates: crate::tool::ToolUpdateSink,
    ) -> ToolResult {
        match self.tools.get(&call.name) {
            Some(tool) if tool.has_execute() => tool.execute(call, updates).await,
            Some(_) => ToolResult::error(format!("tool `{}` is schema-only", call.name)),
            None => ToolResult::error(format!("unknown tool: {}", call.name)),
        }
    }

    /// Convenience wrapper that creates its own update channel and discards
    /// the receiver -- for callers that don't care about partial updates.
    pub async fn execute_discarding_updates(&self, call: &ToolCall) -> ToolResult {
        let (sink, _rx) = update_channel();
        self.execute(call, sink).await
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
