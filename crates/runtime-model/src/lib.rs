// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod fragment;
pub mod mock;
mod provider;
mod types;

pub use fragment::Fragment;
pub use mock::{MockProvider, ScriptedMockProvider};
pub use provider::{FragmentStream, ModelProvider};
pub use types::*;
