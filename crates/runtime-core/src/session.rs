// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use runtime_model::Message;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::event::AgentEvent;

/// One persisted record in a session's history (§3, §4.7).
///
/// `parent_id` forms a linked list (or tree, under branching) of entries;
/// walking the chain from any leaf reconstructs the conversation that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: String,
    pub parent_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub payload: EntryPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryPayload {
    Message { message: Message },
    ThinkingLevelChange { level: String },
    ModelChange { model_id: String },
    CompactionSummary { summary: String },
    BranchSummary { summary: String },
    Label { label: String },
    Custom { value: serde_json::Value },
}

/// Tree of entries returned by `load` (§6 SessionStore).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionTree {
    pub version: u32,
    pub entries: Vec<SessionEntry>,
}

/// Pluggable persistence backend for session entries (§4.7, §6). Entries are
/// appended monotonically; trees (non-contiguous parent chains) are
/// permitted.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn append(&self, entry: SessionEntry) -> anyhow::Result<()>;
    async fn load(&self) -> anyhow::Result<SessionTree>;
}

/// Default store used by tests and short-lived agents: entries live only in
/// process memory.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<Vec<SessionEntry>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append(&self, entry: SessionEntry) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn load(&self) -> anyhow::Result<SessionTree> {
        Ok(SessionTree {
            version: 1,
            entries: self.entries.lock().unwrap().clone(),
        })
    }
}

/// Append-only newline-delimited-JSON store, one [`SessionEntry`] per line.
pub struct JsonlSessionStore {
    path: PathBuf,
}

impl JsonlSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for JsonlSessionStore {
    async fn append(&self, entry: SessionEntry) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn load(&self) -> anyhow::Result<SessionTree> {
        if !self.path.exists() {
            return Ok(SessionTree::default());
        }
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let entries = contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str::<SessionEntry>(l))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SessionTree {
            version: 1,
            entries,
        })
    }
}

/// Subscriber that writes `message_end` events to a [`SessionStore`] as
/// parent-linked entries (§4.7). Recording can be stopped and restarted
/// without losing the parent chain.
pub struct SessionRecorder {
    store: std::sync::Arc<dyn SessionStore>,
    last_entry_id: Mutex<Option<String>>,
    enabled: AtomicBool,
}

impl SessionRecorder {
    pub fn new(store: std::sync::Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            last_entry_id: Mutex::new(None),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn start(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Called synchronously by the loop for every emitted event, in order;
    /// only `message_end` produces a write.
    pub async fn on_event(&self, event: &AgentEvent) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        if let AgentEvent::MessageEnd { message } = event {
            let parent_id = self.last_entry_id.lock().unwrap().clone();
            let entry = SessionEntry {
                id: Uuid::new_v4().to_string(),
                parent_id,
                timestamp: Utc::now(),
                payload: EntryPayload::Message {
                    message: message.clone(),
                },
            };
            *self.last_entry_id.lock().unwrap() = Some(entry.id.clone());
            if let Err(e) = self.store.append(entry).await {
                tracing::warn!("session recorder failed to append entry: {e}");
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
