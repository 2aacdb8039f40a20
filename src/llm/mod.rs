// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for chatdeck
//!
//! Provides abstraction over the supported chat providers.

pub mod factory;
pub mod message;
pub mod mock_provider;
pub mod params;
pub mod provider;
pub mod providers;

pub use message::*;
pub use provider::*;
