// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat sessions
//!
//! In-memory session store, payload normalization, and export/import.

pub mod normalize;
pub mod store;
pub mod transfer;

pub use normalize::normalize_messages;
pub use store::{
    Session, SessionDefaults, SessionStore, SessionSummary, TurnRecord, PLACEHOLDER_TITLE,
};
pub use transfer::{ExportBundle, EXPORT_VERSION, IMPORTED_TITLE};
