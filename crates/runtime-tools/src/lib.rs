// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod hooks;
pub mod registry;
pub mod tool;

pub use hooks::{ApprovalAuthority, GlobPatternHook, HookChain, HookDecision, HookOutcome, PreToolUseHook};
pub use registry::{RegistrationError, ToolRegistry};
pub use tool::{update_channel, ToolDefinition, ToolUpdateSink};

pub use runtime_model::ToolSchema;
