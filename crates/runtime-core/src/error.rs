// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Synchronous, caller-facing configuration errors (§7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("a run is already in progress")]
    AlreadyRunning,
    #[error("nothing to continue: log is empty or ends with an assistant message")]
    NothingToContinue,
    #[error("no subagent registered with id `{0}`")]
    SubagentNotFound(String),
    #[error("a subagent with id `{0}` is already registered")]
    DuplicateSubagent(String),
    #[error("tool `{0}` has no execute and declares no output schema")]
    MissingOutputSchema(String),
}
