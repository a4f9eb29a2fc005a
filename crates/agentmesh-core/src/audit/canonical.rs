// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Canonical JSON serialization for audit payloads.
//!
//! "Canonical" here means: object keys sorted, no insignificant whitespace,
//! and numbers in `serde_json`'s own canonical textual form. `serde_json`
//! gives us all three for free as long as the `preserve_order` feature is
//! never enabled — its `Map` is a `BTreeMap` by default, and `to_string`
//! never inserts whitespace. Changing this representation is a breaking
//! change to every previously computed hash.

use alloc::string::String;

use serde_json::Value;

use crate::error::{AgentMeshError, Result};

/// Render `payload` in this crate's canonical form.
pub fn canonicalize(payload: &Value) -> Result<String> {
    serde_json::to_string(payload).map_err(|e| AgentMeshError::StorageFailure(alloc::format!("canonicalize: {e}")))
}
