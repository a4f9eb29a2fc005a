// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Storage abstraction for the trust core.
//!
//! [`Storage`] is the single interface between the engine and any
//! persistence layer: every subsystem (identity, policy, audit, trust)
//! reads and writes through it,
//! and this crate ships only [`InMemoryStorage`] — production backends
//! (file, database) live in downstream crates (see `agentmesh-std`) so this
//! crate can stay `no_std`.
//!
//! Implementations MUST be `Send + Sync` so the engine can be shared across
//! threads when wrapped in `Arc<Mutex<...>>` or used from
//! [`crate::async_engine::AsyncAgentMeshEngine`].

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::audit::{AuditEntry, AuditFilter};
use crate::identity::Identity;
use crate::policy::PolicySet;
use crate::trust::AgentTrustState;

/// Pluggable persistence interface for the trust core.
pub trait Storage: Send + Sync {
    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Retrieve the identity registered for `did`, if any.
    fn get_identity(&self, did: &str) -> Option<Identity>;

    /// Persist or overwrite the identity for `did`.
    fn set_identity(&mut self, did: &str, identity: Identity);

    /// Return every registered DID. Used by chain verification to resolve
    /// issuer public keys and by tests; not on any evaluation hot path.
    fn all_identities(&self) -> Vec<Identity>;

    /// Register `sponsor` as a known human sponsor (idempotent).
    fn register_sponsor(&mut self, sponsor: &str);

    /// Is `sponsor` a registered human sponsor?
    fn is_known_sponsor(&self, sponsor: &str) -> bool;

    // ------------------------------------------------------------------
    // Policy
    // ------------------------------------------------------------------

    /// Retrieve the compiled policy set keyed by `policy_id`.
    fn get_policy(&self, policy_id: &str) -> Option<PolicySet>;

    /// Persist or overwrite a compiled policy set.
    fn set_policy(&mut self, policy_id: &str, policy: PolicySet);

    /// Return every compiled policy set currently registered.
    fn all_policies(&self) -> Vec<PolicySet>;

    /// Retrieve the rate-limit counter state for `(rule_id, agent_did)`, if
    /// any requests have been recorded in the current or a recent window.
    fn get_rate_counter(&self, rule_id: &str, agent_did: &str) -> Option<RateCounter>;

    /// Persist or overwrite a rate-limit counter.
    fn set_rate_counter(&mut self, rule_id: &str, agent_did: &str, counter: RateCounter);

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    /// Append an immutable audit entry. The caller has already computed
    /// `seq` and the hash chain fields; the storage layer only persists.
    fn append_audit(&mut self, entry: AuditEntry);

    /// Return the audit entry at `seq`, if present.
    fn get_audit(&self, seq: u64) -> Option<AuditEntry>;

    /// Return the number of audit entries appended so far.
    fn audit_len(&self) -> u64;

    /// Return audit entries satisfying `filter`, ordered by `seq`.
    fn query_audit(&self, filter: &AuditFilter) -> Vec<AuditEntry>;

    // ------------------------------------------------------------------
    // Trust
    // ------------------------------------------------------------------

    /// Retrieve the trust state for `did`, if any signal has been recorded.
    fn get_trust_state(&self, did: &str) -> Option<AgentTrustState>;

    /// Persist or overwrite the trust state for `did`.
    fn set_trust_state(&mut self, did: &str, state: AgentTrustState);

    /// Return every agent DID with recorded trust state. Used by the decay
    /// sweep.
    fn all_trust_dids(&self) -> Vec<String>;
}

/// Sliding-window rate-limit counter for a single `(rule, agent)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateCounter {
    /// Unix epoch milliseconds at which the current window started.
    pub window_start_ms: u64,
    /// Number of matches recorded within the current window.
    pub count: u32,
}

// ---------------------------------------------------------------------------
// InMemoryStorage
// ---------------------------------------------------------------------------

/// A volatile, heap-allocated [`Storage`] implementation backed by
/// [`hashbrown::HashMap`].
///
/// Suitable for tests and short-lived processes. All data is lost when the
/// value is dropped.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    identities: HashMap<String, Identity>,
    sponsors: BTreeSet<String>,
    policies: HashMap<String, PolicySet>,
    rate_counters: HashMap<(String, String), RateCounter>,
    audit: Vec<AuditEntry>,
    trust: HashMap<String, AgentTrustState>,
}

impl InMemoryStorage {
    /// Create a new, empty [`InMemoryStorage`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn get_identity(&self, did: &str) -> Option<Identity> {
        self.identities.get(did).cloned()
    }

    fn set_identity(&mut self, did: &str, identity: Identity) {
        self.identities.insert(did.into(), identity);
    }

    fn all_identities(&self) -> Vec<Identity> {
        self.identities.values().cloned().collect()
    }

    fn register_sponsor(&mut self, sponsor: &str) {
        self.sponsors.insert(sponsor.into());
    }

    fn is_known_sponsor(&self, sponsor: &str) -> bool {
        self.sponsors.contains(sponsor)
    }

    fn get_policy(&self, policy_id: &str) -> Option<PolicySet> {
        self.policies.get(policy_id).cloned()
    }

    fn set_policy(&mut self, policy_id: &str, policy: PolicySet) {
        self.policies.insert(policy_id.into(), policy);
    }

    fn all_policies(&self) -> Vec<PolicySet> {
        self.policies.values().cloned().collect()
    }

    fn get_rate_counter(&self, rule_id: &str, agent_did: &str) -> Option<RateCounter> {
        self.rate_counters
            .get(&(rule_id.into(), agent_did.into()))
            .copied()
    }

    fn set_rate_counter(&mut self, rule_id: &str, agent_did: &str, counter: RateCounter) {
        self.rate_counters
            .insert((rule_id.into(), agent_did.into()), counter);
    }

    fn append_audit(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    fn get_audit(&self, seq: u64) -> Option<AuditEntry> {
        self.audit.get(seq as usize).cloned()
    }

    fn audit_len(&self) -> u64 {
        self.audit.len() as u64
    }

    fn query_audit(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.audit
            .iter()
            .filter(|entry| filter.matches(entry))
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    fn get_trust_state(&self, did: &str) -> Option<AgentTrustState> {
        self.trust.get(did).cloned()
    }

    fn set_trust_state(&mut self, did: &str, state: AgentTrustState) {
        self.trust.insert(did.into(), state);
    }

    fn all_trust_dids(&self) -> Vec<String> {
        self.trust.keys().cloned().collect()
    }
}
