// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{CompletionRequest, Fragment};

pub type FragmentStream = Pin<Box<dyn Stream<Item = anyhow::Result<Fragment>> + Send>>;

/// The collaborator a [`crate::ToolCall`]-producing loop drives for one
/// assistant turn (§6 "Model provider").
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Stream one assistant turn. The returned stream yields [`Fragment`]s in
    /// the order described in §4.4 and always ends with either a
    /// `Fragment::Finish` or a `Fragment::Error`.
    async fn stream(&self, req: CompletionRequest) -> anyhow::Result<FragmentStream>;
}
