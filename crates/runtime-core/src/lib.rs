// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod agent;
mod decoder;
mod dispatcher;
mod error;
mod event;
mod message_converter;
mod queue;
mod session;
mod subagent;

pub use agent::Agent;
pub use decoder::{decode_step, DecodedStep};
pub use dispatcher::{dispatch, DispatchOutcome};
pub use error::AgentError;
pub use event::{AgentEvent, EventConsumer, EventStream, ResultHandle};
pub use message_converter::convert as convert_messages;
pub use queue::QueueManager;
pub use session::{
    EntryPayload, InMemorySessionStore, JsonlSessionStore, SessionEntry, SessionRecorder,
    SessionStore, SessionTree,
};
pub use subagent::{SubagentRegistry, SubagentSpec, SubagentTool};
