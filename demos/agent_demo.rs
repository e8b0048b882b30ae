//! Wires a scripted mock model and two toy tools through the full Agent
//! Loop, end to end.
//!
//! Run with: cargo run --bin agent_demo

use std::sync::Arc;

use async_trait::async_trait;
use runtime::{
    Agent, AgentConfig, AgentEvent, EventStream, Message, ScriptedMockProvider, ToolCall,
    ToolDefinition, ToolRegistry, ToolResult, ToolUpdateSink,
};
use serde_json::{json, Value};

struct ClockTool;

#[async_trait]
impl ToolDefinition for ClockTool {
    fn name(&self) -> &str {
        "current_time"
    }
    fn description(&self) -> &str {
        "Returns a fixed demo timestamp."
    }
    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }
    async fn execute(&self, _call: &ToolCall, _updates: ToolUpdateSink) -> ToolResult {
        ToolResult::ok(json!("2026-08-01T00:00:00Z"))
    }
}

struct UppercaseTool;

#[async_trait]
impl ToolDefinition for UppercaseTool {
    fn name(&self) -> &str {
        "uppercase"
    }
    fn description(&self) -> &str {
        "Uppercases the given text."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }
    async fn execute(&self, call: &ToolCall, _updates: ToolUpdateSink) -> ToolResult {
        let text = call.arguments.get("text").and_then(Value::as_str).unwrap_or_default();
        ToolResult::ok(json!(text.to_uppercase()))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let model = Arc::new(ScriptedMockProvider::tool_then_text(
        "call-1",
        "current_time",
        "{}",
        "It is 2026-08-01T00:00:00Z.",
    ));

    let mut registry = ToolRegistry::new();
    registry.register(ClockTool).unwrap();
    registry.register(UppercaseTool).unwrap();

    let mut agent = Agent::new(model, Arc::new(registry), AgentConfig::default());
    let (events, mut consumer) = EventStream::<AgentEvent, Vec<Message>>::new();

    let drain = tokio::spawn(async move {
        while let Some(event) = consumer.next().await {
            match event {
                AgentEvent::ToolExecutionEnd { tool_name, result, .. } => {
                    println!("tool `{tool_name}` -> {result}");
                }
                AgentEvent::AgentEnd { .. } => println!("agent run complete"),
                _ => {}
            }
        }
    });

    agent.prompt("What time is it?", &events).await.unwrap();
    drain.await.unwrap();

    for message in agent.log() {
        if let Some(text) = message.as_text() {
            println!("{text}");
        }
    }
}
