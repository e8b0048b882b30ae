// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

fn default_max_steps() -> u32 {
    20
}
fn default_max_retry_delay_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier, forwarded to whichever `ModelProvider` is wired up
    /// by the caller (e.g. "openai", "anthropic", "mock").
    pub provider: String,
    /// Model name forwarded to the provider
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0-2.0)
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "mock".into(),
            name: "mock-model".into(),
            api_key_env: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
        }
    }
}

/// How queued user input is drained between/within steps.
///
/// `OneAtATime` pops a single queued message per drain point; `All` drains
/// the whole queue as one batch. Applies independently to the steering queue
/// and the follow-up queue (§2, §4.6 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DrainMode {
    #[default]
    OneAtATime,
    All,
}

/// Requested reasoning effort for a step, mapped to a token budget injected
/// into the provider request via `thinking_budgets` (§4.6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    #[default]
    Off,
    Minimal,
    Low,
    Medium,
    High,
    XHigh,
}

impl std::fmt::Display for ThinkingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThinkingLevel::Off => write!(f, "off"),
            ThinkingLevel::Minimal => write!(f, "minimal"),
            ThinkingLevel::Low => write!(f, "low"),
            ThinkingLevel::Medium => write!(f, "medium"),
            ThinkingLevel::High => write!(f, "high"),
            ThinkingLevel::XHigh => write!(f, "xhigh"),
        }
    }
}

/// Token budgets injected per [`ThinkingLevel`]. `off` and `xhigh` never
/// inject an explicit budget: `off` because reasoning is disabled, `xhigh`
/// because it asks the provider for its own unbounded maximum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingBudgets {
    pub minimal: u32,
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

impl Default for ThinkingBudgets {
    fn default() -> Self {
        Self {
            minimal: 1024,
            low: 4096,
            medium: 10_000,
            high: 32_000,
        }
    }
}

impl ThinkingBudgets {
    /// Resolve the token budget for `level`, or `None` when the level
    /// injects no explicit budget (`Off`, `XHigh`).
    pub fn budget_for(&self, level: ThinkingLevel) -> Option<u32> {
        match level {
            ThinkingLevel::Off | ThinkingLevel::XHigh => None,
            ThinkingLevel::Minimal => Some(self.minimal),
            ThinkingLevel::Low => Some(self.low),
            ThinkingLevel::Medium => Some(self.medium),
            ThinkingLevel::High => Some(self.high),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Drain mode for the steering queue (§4.6 step 4)
    #[serde(default)]
    pub steering_mode: DrainMode,
    /// Drain mode for the follow-up queue
    #[serde(default)]
    pub follow_up_mode: DrainMode,
    /// Default reasoning effort requested from the provider
    #[serde(default)]
    pub thinking_level: ThinkingLevel,
    /// Token budgets backing `thinking_level`
    #[serde(default)]
    pub thinking_budgets: ThinkingBudgets,
    /// Maximum number of steps the loop will run before stopping with a
    /// `max-steps` stop reason, regardless of queued follow-up work
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Upper bound on the backoff delay between provider retries
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            steering_mode: DrainMode::default(),
            follow_up_mode: DrainMode::default(),
            thinking_level: ThinkingLevel::default(),
            thinking_budgets: ThinkingBudgets::default(),
            max_steps: default_max_steps(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
