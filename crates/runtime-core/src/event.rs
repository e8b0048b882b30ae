// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Mutex;

use runtime_model::{Fragment, Message};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

/// Events emitted by a single run (§6 AgentEvent taxonomy).
#[derive(Debug, Clone)]
pub enum AgentEvent {
    AgentStart,
    AgentEnd { messages: Vec<Message> },
    TurnStart,
    TurnEnd {
        message: Message,
        tool_results: Vec<Message>,
    },
    MessageStart { message: Message },
    MessageUpdate { message: Message, delta: String },
    MessageEnd { message: Message },
    /// Raw passthrough of a provider fragment for advanced subscribers.
    StreamPart { part: Fragment },
    ToolExecutionStart {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    ToolExecutionUpdate {
        tool_call_id: String,
        tool_name: String,
        partial_result: Value,
    },
    ToolExecutionEnd {
        tool_call_id: String,
        tool_name: String,
        result: Value,
        is_error: bool,
    },
    Error { error: String },
}

/// Bounded, ordered, single-producer/single-consumer event sequence with a
/// one-shot terminal result (§4.1).
///
/// Backed by an unbounded mpsc channel for events -- closing the sender on
/// `end` makes pushes-after-end a silent no-op while still letting the
/// consumer drain whatever was buffered before the close, which is exactly
/// the FIFO-then-terminate contract the spec asks for.
pub struct EventStream<T, R> {
    tx: Mutex<Option<mpsc::UnboundedSender<T>>>,
    result_tx: watch::Sender<Option<R>>,
}

/// Consumer handle returned alongside an [`EventStream`].
pub struct EventConsumer<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T: Send + 'static, R: Clone + Send + Sync + 'static> EventStream<T, R> {
    pub fn new() -> (Self, EventConsumer<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (result_tx, _result_rx) = watch::channel(None);
        (
            Self {
                tx: Mutex::new(Some(tx)),
                result_tx,
            },
            EventConsumer { rx },
        )
    }

    /// Hand off an event to the consumer, or buffer it if none is awaiting
    /// yet. Silently dropped once [`end`](Self::end) has been called.
    pub fn push(&self, event: T) {
        let guard = self.tx.lock().unwrap();
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Mark the stream complete. Already-buffered events are still
    /// delivered to the consumer; no further `push` has any effect.
    pub fn end(&self, result: Option<R>) {
        self.tx.lock().unwrap().take();
        if let Some(r) = result {
            let _ = self.result_tx.send(Some(r));
        }
    }

    /// A single-shot handle that resolves once `end` is called with a
    /// value. Safe to call before or after `end`.
    pub fn result(&self) -> ResultHandle<R> {
        ResultHandle {
            rx: self.result_tx.subscribe(),
        }
    }
}

impl<T: Send + 'static, R: Clone + Send + Sync + 'static> Default for EventStream<T, R> {
    fn default() -> Self {
        Self::new().0
    }
}

impl<T> EventConsumer<T> {
    /// Yields the next buffered event, or `None` once the stream has ended
    /// and all buffered events are drained.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

pub struct ResultHandle<R> {
    rx: watch::Receiver<Option<R>>,
}

impl<R: Clone> ResultHandle<R> {
    pub async fn wait(mut self) -> R {
        loop {
            if let Some(r) = self.rx.borrow().clone() {
                return r;
            }
            if self.rx.changed().await.is_err() {
                // Sender dropped without ever calling `end` with a value --
                // this only happens if the producer side was discarded.
                panic!("EventStream dropped before a result was produced");
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_then_consume_in_order() {
        let (stream, mut consumer) = EventStream::<i32, ()>::new();
        stream.push(1);
        stream.push(2);
        assert_eq!(consumer.next().await, Some(1));
        assert_eq!(consumer.next().await, Some(2));
    }

    #[tokio::test]
    async fn end_drains_buffered_then_terminates() {
        let (stream, mut consumer) = EventStream::<i32, ()>::new();
        stream.push(1);
        stream.end(None);
        assert_eq!(consumer.next().await, Some(1));
        assert_eq!(consumer.next().await, None);
    }

    #[tokio::test]
    async fn push_after_end_is_dropped() {
        let (stream, mut consumer) = EventStream::<i32, ()>::new();
        stream.end(None);
        stream.push(1);
        assert_eq!(consumer.next().await, None);
    }

    #[tokio::test]
    async fn result_resolves_after_end() {
        let (stream, _consumer) = EventStream::<i32, &'static str>::new();
        stream.end(Some("done"));
        let handle = stream.result();
        assert_eq!(handle.wait().await, "done");
    }

    #[tokio::test]
    async fn result_handle_taken_before_end_still_resolves() {
        let (stream, _consumer) = EventStream::<i32, &'static str>::new();
        let handle = stream.result();
        stream.end(Some("later"));
        assert_eq!(handle.wait().await, "later");
    }
}
