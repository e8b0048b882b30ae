// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use regex::Regex;
use runtime_model::ToolCall;
use serde_json::Value;

/// The verdict a pre-tool-use hook returns for a single call (§4.5 step 3).
#[derive(Debug, Clone, PartialEq)]
pub enum HookDecision {
    /// Run the call. `updated_arguments`, if set, replaces `call.arguments`
    /// before dispatch.
    Allow { updated_arguments: Option<Value> },
    Deny { reason: Option<String> },
    /// Requires a human or external authority to approve. Collapses to
    /// `Deny` when no [`ApprovalAuthority`] is configured (§9).
    Ask { reason: Option<String> },
}

impl HookDecision {
    pub fn allow() -> Self {
        HookDecision::Allow {
            updated_arguments: None,
        }
    }
}

#[async_trait]
pub trait PreToolUseHook: Send + Sync {
    async fn evaluate(&self, call: &ToolCall) -> HookDecision;
}

/// Resolves an `Ask` decision when a hook chain can't decide on its own.
/// Without one registered, `Ask` is treated as `Deny` (§9).
#[async_trait]
pub trait ApprovalAuthority: Send + Sync {
    async fn resolve(&self, call: &ToolCall, reason: Option<&str>) -> bool;
}

/// An ordered chain of pre-tool-use hooks plus an optional approval
/// authority for resolving `Ask` decisions.
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<std::sync::Arc<dyn PreToolUseHook>>,
    approval_authority: Option<std::sync::Arc<dyn ApprovalAuthority>>,
}

/// Outcome after running the full chain and resolving any `Ask`.
pub enum HookOutcome {
    Allow { updated_arguments: Option<Value> },
    Deny { reason: String },
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: std::sync::Arc<dyn PreToolUseHook>) {
        self.hooks.push(hook);
    }

    pub fn set_approval_authority(&mut self, authority: std::sync::Arc<dyn ApprovalAuthority>) {
        self.approval_authority = Some(authority);
    }

    /// Evaluate every hook in order; the first `Deny` short-circuits. An
    /// `Allow` with `updated_arguments` is remembered and carried forward so
    /// a later hook still sees the rewritten call only if callers re-dispatch
    /// with it — the chain itself evaluates each hook against the original
    /// call, matching a flat pre-commit review rather than a pipeline.
    pub async fn decide(&self, call: &ToolCall) -> HookOutcome {
        let mut updated_arguments = None;
        for hook in &self.hooks {
            match hook.evaluate(call).await {
                HookDecision::Allow {
                    updated_arguments: ua,
                } => {
                    if ua.is_some() {
                        updated_arguments = ua;
                    }
                }
                HookDecision::Deny { reason } => {
                    return HookOutcome::Deny {
                        reason: reason.unwrap_or_else(|| "denied by hook".into()),
                    };
                }
                HookDecision::Ask { reason } => {
                    if let Some(authority) = &self.approval_authority {
                        if authority.resolve(call, reason.as_deref()).await {
                            continue;
                        }
                        return HookOutcome::Deny {
                            reason: reason.unwrap_or_else(|| "approval denied".into()),
                        };
                    }
                    return HookOutcome::Deny {
                        reason: reason
                            .unwrap_or_else(|| "requires approval; no approval authority configured".into()),
                    };
                }
            }
        }
        HookOutcome::Allow { updated_arguments }
    }
}

/// Glob-pattern hook grounded on shell-command allow/deny lists: matches the
/// JSON-serialized call arguments against auto-approve and deny patterns.
pub struct GlobPatternHook {
    auto_patterns: Vec<Regex>,
    deny_patterns: Vec<Regex>,
}

impl GlobPatternHook {
    pub fn new(auto_patterns: &[String], deny_patterns: &[String]) -> Self {
        let compile = |patterns: &[String]| -> Vec<Regex> {
            patterns.iter().filter_map(|p| glob_to_regex(p)).collect()
        };
        Self {
            auto_patterns: compile(auto_patterns),
            deny_patterns: compile(deny_patterns),
        }
    }
}

#[async_trait]
impl PreToolUseHook for GlobPatternHook {
    async fn evaluate(&self, call: &ToolCall) -> HookDecision {
        let text = call.arguments.to_string();
        for re in &self.deny_patterns {
            if re.is_match(&text) {
                return HookDecision::Deny {
                    reason: Some(format!("matches deny pattern for {}", call.name)),
                };
            }
        }
        for re in &self.auto_patterns {
            if re.is_match(&text) {
                return HookDecision::allow();
            }
        }
        HookDecision::Ask { reason: None }
    }
}

/// Convert a simple shell glob pattern to a [`Regex`]. Only `*` (match
/// anything) and `?` (match one char) are supported.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => {
                for esc in regex::escape(&c.to_string()).chars() {
                    re.push(esc);
                }
            }
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
