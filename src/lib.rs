// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Facade over the `runtime-*` workspace crates: configuration, the model
//! provider data types, tool definitions, and the Agent Loop orchestrator.
//! No TUI/CLI/GUI/MCP surface is built here.

pub use runtime_config as config;
pub use runtime_model as model;
pub use runtime_tools as tools;

pub use runtime_core::{
    convert_messages, dispatch, Agent, AgentError, AgentEvent, DecodedStep, DispatchOutcome,
    EntryPayload, EventConsumer, EventStream, InMemorySessionStore, JsonlSessionStore,
    QueueManager, ResultHandle, SessionEntry, SessionRecorder, SessionStore, SessionTree,
    SubagentRegistry, SubagentSpec, SubagentTool, decode_step,
};

pub use model::{
    AssistantPart, CompletionRequest, Fragment, FragmentStream, Message, ModelProvider,
    ScriptedMockProvider, ToolCall, ToolChoice, ToolResult, ToolSchema, UserContent,
};

pub use config::{AgentConfig, Config, DrainMode, ModelConfig, ThinkingBudgets, ThinkingLevel};

pub use tools::{HookChain, HookDecision, HookOutcome, ToolDefinition, ToolRegistry, ToolUpdateSink};
