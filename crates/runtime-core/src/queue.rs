// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::VecDeque;
use std::sync::Mutex;

use runtime_config::DrainMode;
use runtime_model::Message;

/// A single FIFO queue with a configured drain mode (§2, §4.6 step 4, §9).
#[derive(Default)]
struct Fifo {
    items: Mutex<VecDeque<Message>>,
}

impl Fifo {
    fn enqueue(&self, message: Message) {
        self.items.lock().unwrap().push_back(message);
    }

    fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// Drain according to `mode`. `OneAtATime` takes the single oldest
    /// message; `All` drains everything queued at this instant.
    fn drain(&self, mode: DrainMode) -> Vec<Message> {
        let mut items = self.items.lock().unwrap();
        match mode {
            DrainMode::OneAtATime => items.pop_front().into_iter().collect(),
            DrainMode::All => items.drain(..).collect(),
        }
    }
}

/// Two FIFO queues (steering, follow-up) that pre-empt or extend a run
/// (§2). The sentinel stop condition reads `has_pending_steering`; a
/// non-empty read must be followed by a `drain_steering` call that binds
/// the observed batch to the next step -- see `capture_steering`.
#[derive(Default)]
pub struct QueueManager {
    steering: Fifo,
    follow_up: Fifo,
    steering_mode: DrainMode,
    follow_up_mode: DrainMode,
}

impl QueueManager {
    pub fn new(steering_mode: DrainMode, follow_up_mode: DrainMode) -> Self {
        Self {
            steering: Fifo::default(),
            follow_up: Fifo::default(),
            steering_mode,
            follow_up_mode,
        }
    }

    pub fn enqueue_steering(&self, message: Message) {
        self.steering.enqueue(message);
    }

    pub fn enqueue_follow_up(&self, message: Message) {
        self.follow_up.enqueue(message);
    }

    /// The sentinel stop condition (§4.6 step 4): true once steering has
    /// anything queued.
    pub fn has_pending_steering(&self) -> bool {
        !self.steering.is_empty()
    }

    pub fn steering_len(&self) -> usize {
        self.steering.len()
    }

    /// Capture the currently-queued steering batch as a single atomic
    /// handoff, per the configured drain mode. Must be called exactly once
    /// per interruption to avoid losing messages queued between the
    /// sentinel's read and the drain (§9).
    pub fn capture_steering(&self) -> Vec<Message> {
        self.steering.drain(self.steering_mode)
    }

    pub fn drain_follow_up(&self) -> Vec<Message> {
        self.follow_up.drain(self.follow_up_mode)
    }

    pub fn has_pending_follow_up(&self) -> bool {
        !self.follow_up.is_empty()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
