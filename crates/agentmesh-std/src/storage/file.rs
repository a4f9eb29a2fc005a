// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! File-based JSON storage backend.
//!
//! [`FileStorage`] persists all engine state to a single JSON file on disk.
//! Every mutation flushes the file atomically (write-rename) so that a
//! crash mid-write does not corrupt existing data.
//!
//! ## Layout
//!
//! ```json
//! {
//!   "identities":    { "<did>": Identity, ... },
//!   "sponsors":      ["alice", ...],
//!   "policies":      { "<policy_id>": { "source": PolicyDocument, "policy_order": 0 }, ... },
//!   "rate_counters": { "<rule_id>:<agent_did>": RateCounter, ... },
//!   "audit":         [ AuditEntry, ... ],
//!   "trust":         { "<agent_did>": AgentTrustState, ... }
//! }
//! ```
//!
//! Compiled policies are not serialized directly — [`crate::policy::document::PolicySet`]
//! embeds a parsed condition AST that carries no `Serialize` impl by design
//! (conditions are recompiled from source text, never persisted as trees).
//! [`FileStorage`] instead snapshots each policy's `source` document and
//! recompiles it via [`agentmesh_core::policy::document::compile`] on
//! [`FileStorage::open`].
//!
//! ## Caveats
//!
//! * [`FileStorage`] holds the full in-memory state and flushes on every
//!   mutation. It is not intended for high-frequency write workloads — see
//!   `agentmesh_core::storage::InMemoryStorage` plus a periodic snapshot for
//!   that case.
//! * Concurrent access from multiple processes is not supported.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use agentmesh_core::audit::{AuditEntry, AuditFilter};
use agentmesh_core::identity::Identity;
use agentmesh_core::policy::document::{self, PolicyDocument, PolicySet};
use agentmesh_core::storage::{RateCounter, Storage};
use agentmesh_core::trust::AgentTrustState;

/// A policy snapshot as persisted on disk: the raw document plus the
/// registration order needed to reconstruct priority ties identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicySnapshot {
    source: PolicyDocument,
    policy_order: usize,
}

/// Snapshot of all engine state, serialized to / deserialized from disk.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageSnapshot {
    identities: HashMap<String, Identity>,
    sponsors: std::collections::BTreeSet<String>,
    policies: HashMap<String, PolicySnapshot>,
    rate_counters: HashMap<String, RateCounterSnapshot>,
    audit: Vec<AuditEntry>,
    trust: HashMap<String, AgentTrustState>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RateCounterSnapshot {
    window_start_ms: u64,
    count: u32,
}

impl From<RateCounter> for RateCounterSnapshot {
    fn from(counter: RateCounter) -> Self {
        Self { window_start_ms: counter.window_start_ms, count: counter.count }
    }
}

impl From<RateCounterSnapshot> for RateCounter {
    fn from(snapshot: RateCounterSnapshot) -> Self {
        RateCounter { window_start_ms: snapshot.window_start_ms, count: snapshot.count }
    }
}

/// A file-backed [`Storage`] implementation that persists state as JSON.
///
/// # Examples
///
/// ```rust,no_run
/// use agentmesh_std::FileStorage;
/// use agentmesh_core::storage::Storage;
///
/// let storage = FileStorage::open("/tmp/agentmesh.json")
///     .expect("could not open storage");
///
/// assert!(storage.all_identities().is_empty());
/// ```
pub struct FileStorage {
    path: PathBuf,
    data: StorageSnapshot,
    compiled_policies: HashMap<String, PolicySet>,
}

impl FileStorage {
    /// Open an existing JSON storage file, or create a new empty one if the
    /// path does not exist. Every persisted policy snapshot is recompiled
    /// immediately so `get_policy`/`all_policies` never pay a recompilation
    /// cost on the read path.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the file exists but cannot be read, the
    /// JSON is malformed, or a persisted policy document fails to recompile
    /// (its condition source must still be valid; if a rule's condition
    /// syntax hasn't changed between versions, it will).
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data: StorageSnapshot = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|error| {
                io::Error::new(io::ErrorKind::InvalidData, format!("agentmesh storage JSON parse error: {error}"))
            })?
        } else {
            StorageSnapshot::default()
        };

        let mut compiled_policies = HashMap::with_capacity(data.policies.len());
        for (id, snapshot) in &data.policies {
            let compiled = document::compile(snapshot.source.clone(), id.clone(), snapshot.policy_order)
                .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, format!("policy '{id}' failed to recompile: {error}")))?;
            compiled_policies.insert(id.clone(), compiled);
        }

        Ok(Self { path, data, compiled_policies })
    }

    /// Flush the current in-memory state to disk using an atomic write-rename.
    ///
    /// The file is written to `<path>.tmp` first, then renamed over the
    /// target, so a crash during the write never leaves a partial file.
    pub fn flush(&self) -> io::Result<()> {
        let json = serde_json::to_string_pretty(&self.data).map_err(|error| {
            io::Error::new(io::ErrorKind::InvalidData, format!("agentmesh storage serialization error: {error}"))
        })?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn rate_key(rule_id: &str, agent_did: &str) -> String {
        format!("{rule_id}:{agent_did}")
    }

    fn flush_or_warn(&self) {
        if let Err(error) = self.flush() {
            warn!(%error, path = %self.path.display(), "failed to flush agentmesh storage to disk");
        }
    }
}

impl Storage for FileStorage {
    fn get_identity(&self, did: &str) -> Option<Identity> {
        self.data.identities.get(did).cloned()
    }

    fn set_identity(&mut self, did: &str, identity: Identity) {
        self.data.identities.insert(did.to_string(), identity);
        self.flush_or_warn();
    }

    fn all_identities(&self) -> Vec<Identity> {
        self.data.identities.values().cloned().collect()
    }

    fn register_sponsor(&mut self, sponsor: &str) {
        self.data.sponsors.insert(sponsor.to_string());
        self.flush_or_warn();
    }

    fn is_known_sponsor(&self, sponsor: &str) -> bool {
        self.data.sponsors.contains(sponsor)
    }

    fn get_policy(&self, policy_id: &str) -> Option<PolicySet> {
        self.compiled_policies.get(policy_id).cloned()
    }

    fn set_policy(&mut self, policy_id: &str, policy: PolicySet) {
        self.data
            .policies
            .insert(policy_id.to_string(), PolicySnapshot { source: policy.source.clone(), policy_order: policy.policy_order });
        self.compiled_policies.insert(policy_id.to_string(), policy);
        self.flush_or_warn();
    }

    fn all_policies(&self) -> Vec<PolicySet> {
        self.compiled_policies.values().cloned().collect()
    }

    fn get_rate_counter(&self, rule_id: &str, agent_did: &str) -> Option<RateCounter> {
        self.data.rate_counters.get(&Self::rate_key(rule_id, agent_did)).copied().map(Into::into)
    }

    fn set_rate_counter(&mut self, rule_id: &str, agent_did: &str, counter: RateCounter) {
        self.data.rate_counters.insert(Self::rate_key(rule_id, agent_did), counter.into());
        self.flush_or_warn();
    }

    fn append_audit(&mut self, entry: AuditEntry) {
        self.data.audit.push(entry);
        self.flush_or_warn();
    }

    fn get_audit(&self, seq: u64) -> Option<AuditEntry> {
        self.data.audit.get(seq as usize).cloned()
    }

    fn audit_len(&self) -> u64 {
        self.data.audit.len() as u64
    }

    fn query_audit(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.data
            .audit
            .iter()
            .filter(|entry| filter.matches(entry))
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    fn get_trust_state(&self, did: &str) -> Option<AgentTrustState> {
        self.data.trust.get(did).cloned()
    }

    fn set_trust_state(&mut self, did: &str, state: AgentTrustState) {
        self.data.trust.insert(did.to_string(), state);
        self.flush_or_warn();
    }

    fn all_trust_dids(&self) -> Vec<String> {
        self.data.trust.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_core::identity::IdentityStatus;
    use tracing_test::traced_test;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("agentmesh-std-test-{name}-{}.json", std::process::id()))
    }

    #[test]
    fn identity_round_trips_through_disk() {
        let path = temp_path("identity");
        let _ = std::fs::remove_file(&path);

        let identity = Identity {
            did: "did:mesh:abc".to_string(),
            public_key: [1u8; 32],
            sponsor: None,
            created_at_ms: 0,
            status: IdentityStatus::Active,
            capabilities: Default::default(),
        };

        {
            let mut storage = FileStorage::open(&path).unwrap();
            storage.set_identity(&identity.did, identity.clone());
        }

        let reopened = FileStorage::open(&path).unwrap();
        let loaded = reopened.get_identity(&identity.did).unwrap();
        assert_eq!(loaded.did, identity.did);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn policy_recompiles_after_reopen() {
        let path = temp_path("policy");
        let _ = std::fs::remove_file(&path);

        let document = document::parse_json(
            r#"{"version": "1.0", "name": "p", "agent": "*", "default_action": "deny",
                "rules": [{"name": "r1", "condition": "action == 'read'", "action": "allow", "priority": 1}]}"#,
        )
        .unwrap();
        let compiled = document::compile(document, "p".to_string(), 0).unwrap();

        {
            let mut storage = FileStorage::open(&path).unwrap();
            storage.set_policy("p", compiled);
        }

        let reopened = FileStorage::open(&path).unwrap();
        let policy = reopened.get_policy("p").unwrap();
        assert_eq!(policy.rules.len(), 1);
        assert_eq!(policy.rules[0].name, "r1");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_opens_as_empty() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);
        let storage = FileStorage::open(&path).unwrap();
        assert!(storage.all_identities().is_empty());
        assert_eq!(storage.audit_len(), 0);
        let _ = std::fs::remove_file(&path);
    }

    #[traced_test]
    #[test]
    fn flush_failure_logs_a_warning() {
        let path = temp_path("flush-warn");
        let _ = std::fs::remove_file(&path);
        let mut storage = FileStorage::open(&path).unwrap();

        // Point at a path whose parent directory doesn't exist so the
        // write-rename in `flush` fails and `flush_or_warn` must log instead
        // of propagating the error (none of the `Storage` methods are
        // fallible).
        storage.path = PathBuf::from("/nonexistent-agentmesh-dir/does-not-exist/storage.json");
        storage.register_sponsor("alice");

        assert!(logs_contain("failed to flush agentmesh storage to disk"));
        let _ = std::fs::remove_file(&path);
    }
}
