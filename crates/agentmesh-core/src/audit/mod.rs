// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Tamper-evident, hash-chained audit log with Merkle inclusion proofs.
//!
//! [`AuditLogger`] is the sole writer of the chain; callers elsewhere in the
//! engine never construct [`AuditEntry`] values directly.

pub mod canonical;
pub mod export;
pub mod merkle;

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::crypto;
use crate::error::{AgentMeshError, Result};
use crate::storage::Storage;
use merkle::{InclusionProof, MerkleTree};

/// Enumerated audit event kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Registration,
    PolicyEvaluation,
    TrustUpdate,
    Revocation,
    Delegation,
    Custom(String),
}

impl AuditEventType {
    fn as_str(&self) -> String {
        match self {
            AuditEventType::Registration => "registration".to_string(),
            AuditEventType::PolicyEvaluation => "policy_evaluation".to_string(),
            AuditEventType::TrustUpdate => "trust_update".to_string(),
            AuditEventType::Revocation => "revocation".to_string(),
            AuditEventType::Delegation => "delegation".to_string(),
            AuditEventType::Custom(name) => name.clone(),
        }
    }
}

/// An immutable, hash-chained audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    /// Monotonic counter used for total ordering; not wall-clock time.
    pub ts_monotonic: u64,
    /// Wall-clock time in Unix epoch milliseconds, stored for display and
    /// hashed alongside the monotonic sequence.
    pub ts_wall_ms: u64,
    pub event_type: AuditEventType,
    pub actor_did: String,
    pub payload: JsonValue,
    pub prior_hash: String,
    pub hash: String,
}

impl AuditEntry {
    /// `sha256_hex(seq || ts_wall || type || actor || canonical(payload) || prior_hash)`.
    fn compute_hash(
        seq: u64,
        ts_wall_ms: u64,
        event_type: &AuditEventType,
        actor_did: &str,
        canonical_payload: &str,
        prior_hash: &str,
    ) -> String {
        let preimage = crypto::concat_for_hash(&[
            seq.to_le_bytes().as_slice(),
            ts_wall_ms.to_le_bytes().as_slice(),
            event_type.as_str().as_bytes(),
            actor_did.as_bytes(),
            canonical_payload.as_bytes(),
            prior_hash.as_bytes(),
        ]);
        crypto::sha256_hex(&preimage)
    }

    fn hash_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        let decoded = hex::decode(&self.hash).unwrap_or_default();
        let len = decoded.len().min(32);
        bytes[..len].copy_from_slice(&decoded[..len]);
        bytes
    }
}

/// Genesis `prior_hash` for the first entry in a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Filter criteria for [`AuditLogger::query`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor_did: Option<String>,
    pub event_type: Option<AuditEventType>,
    pub since_ts_ms: Option<u64>,
    pub until_ts_ms: Option<u64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AuditFilter {
    /// Does `entry` satisfy the actor / event-type / time-range portion of
    /// this filter? (`limit`/`offset` are applied separately by the
    /// storage layer over the ordered match stream.)
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(actor) = &self.actor_did {
            if &entry.actor_did != actor {
                return false;
            }
        }
        if let Some(event_type) = &self.event_type {
            if event_type != &entry.event_type {
                return false;
            }
        }
        if let Some(since) = self.since_ts_ms {
            if entry.ts_wall_ms < since {
                return false;
            }
        }
        if let Some(until) = self.until_ts_ms {
            if entry.ts_wall_ms > until {
                return false;
            }
        }
        true
    }
}

/// The single-writer, hash-chained, Merkle-indexed audit log.
pub struct AuditLogger<S: Storage> {
    storage: S,
    tree: MerkleTree,
}

impl<S: Storage> AuditLogger<S> {
    /// Construct a logger over `storage`, rebuilding the in-memory Merkle
    /// tree from whatever entries are already persisted.
    pub fn new(storage: S) -> Self {
        let mut tree = MerkleTree::new();
        let len = storage.audit_len();
        for seq in 0..len {
            if let Some(entry) = storage.get_audit(seq) {
                tree.push_leaf(entry.hash_bytes());
            }
        }
        Self { storage, tree }
    }

    /// Append a new entry, assigning the next sequence number and chaining
    /// its hash to the prior entry.
    pub fn append(
        &mut self,
        event_type: AuditEventType,
        actor_did: &str,
        payload: JsonValue,
        ts_monotonic: u64,
        ts_wall_ms: u64,
    ) -> Result<AuditEntry> {
        let seq = self.storage.audit_len();
        let prior_hash = if seq == 0 {
            GENESIS_HASH.to_string()
        } else {
            self.storage
                .get_audit(seq - 1)
                .map(|entry| entry.hash)
                .ok_or(AgentMeshError::StorageFailure("missing prior audit entry".into()))?
        };

        let canonical_payload = canonical::canonicalize(&payload)?;
        let hash = AuditEntry::compute_hash(seq, ts_wall_ms, &event_type, actor_did, &canonical_payload, &prior_hash);

        let entry = AuditEntry {
            seq,
            ts_monotonic,
            ts_wall_ms,
            event_type,
            actor_did: actor_did.to_string(),
            payload,
            prior_hash,
            hash,
        };

        self.tree.push_leaf(entry.hash_bytes());
        self.storage.append_audit(entry.clone());
        Ok(entry)
    }

    /// Recompute every entry's hash in `[from_seq, to_seq]` and check that
    /// `prior_hash` chains correctly, failing at the first discrepancy.
    pub fn verify_chain(&self, from_seq: u64, to_seq: u64) -> Result<()> {
        let mut expected_prior: Option<String> = if from_seq == 0 {
            Some(GENESIS_HASH.to_string())
        } else {
            self.storage.get_audit(from_seq - 1).map(|entry| entry.hash)
        };

        for seq in from_seq..=to_seq {
            let entry = self.storage.get_audit(seq).ok_or(AgentMeshError::TamperedAt(seq))?;
            if let Some(expected) = &expected_prior {
                if &entry.prior_hash != expected {
                    return Err(AgentMeshError::TamperedAt(seq));
                }
            }
            let canonical_payload = canonical::canonicalize(&entry.payload)?;
            let recomputed = AuditEntry::compute_hash(
                entry.seq,
                entry.ts_wall_ms,
                &entry.event_type,
                &entry.actor_did,
                &canonical_payload,
                &entry.prior_hash,
            );
            if recomputed != entry.hash {
                return Err(AgentMeshError::TamperedAt(seq));
            }
            expected_prior = Some(entry.hash);
        }
        Ok(())
    }

    /// Hash of the most recently appended entry, if any.
    pub fn chain_tip(&self) -> Option<String> {
        let len = self.storage.audit_len();
        if len == 0 {
            return None;
        }
        self.storage.get_audit(len - 1).map(|entry| entry.hash)
    }

    /// Current Merkle root over every appended entry.
    pub fn merkle_root(&self) -> Option<[u8; 32]> {
        self.tree.root()
    }

    /// Build the inclusion proof for `seq`, if present.
    pub fn inclusion_proof(&self, seq: u64) -> Option<InclusionProof> {
        self.tree.proof(seq as usize)
    }

    /// Verify `entry` is included at its `seq` against `root` using `proof`.
    pub fn verify_inclusion(entry: &AuditEntry, proof: &InclusionProof, root: [u8; 32]) -> bool {
        merkle::verify_inclusion(entry.hash_bytes(), proof, root)
    }

    /// Query entries matching `filter`, ordered by `seq`.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.storage.query_audit(filter)
    }

    /// Borrow the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use serde_json::json;

    fn logger() -> AuditLogger<InMemoryStorage> {
        AuditLogger::new(InMemoryStorage::new())
    }

    #[test]
    fn genesis_entry_chains_to_genesis_hash() {
        let mut log = logger();
        let entry = log
            .append(AuditEventType::Registration, "did:mesh:a", json!({"k": 1}), 0, 0)
            .unwrap();
        assert_eq!(entry.prior_hash, GENESIS_HASH);
        assert_eq!(entry.seq, 0);
    }

    #[test]
    fn chain_links_sequential_entries() {
        let mut log = logger();
        let first = log.append(AuditEventType::Registration, "did:mesh:a", json!({}), 0, 0).unwrap();
        let second = log
            .append(AuditEventType::PolicyEvaluation, "did:mesh:a", json!({"n": 2}), 1, 1)
            .unwrap();
        assert_eq!(second.prior_hash, first.hash);
        assert!(log.verify_chain(0, 1).is_ok());
    }

    #[test]
    fn tampering_with_payload_is_detected() {
        let mut storage = InMemoryStorage::new();
        let mut prior_hash = GENESIS_HASH.to_string();
        for i in 0..5u64 {
            let payload = json!({"i": i});
            let canonical_payload = canonical::canonicalize(&payload).unwrap();
            let hash = AuditEntry::compute_hash(i, i, &AuditEventType::PolicyEvaluation, "did:mesh:a", &canonical_payload, &prior_hash);

            // Entry 2 is persisted with a payload that was never hashed: its
            // `hash` field still attests to the original `{"i": 2}` payload.
            let stored_payload = if i == 2 { json!({"i": 999}) } else { payload };

            storage.append_audit(AuditEntry {
                seq: i,
                ts_monotonic: i,
                ts_wall_ms: i,
                event_type: AuditEventType::PolicyEvaluation,
                actor_did: "did:mesh:a".to_string(),
                payload: stored_payload,
                prior_hash: prior_hash.clone(),
                hash: hash.clone(),
            });
            prior_hash = hash;
        }

        let log = AuditLogger::new(storage);
        assert_eq!(log.verify_chain(0, 4), Err(AgentMeshError::TamperedAt(2)));
    }

    #[test]
    fn inclusion_proof_verifies_against_root() {
        let mut log = logger();
        let mut entries = Vec::new();
        for i in 0..10u64 {
            entries.push(log.append(AuditEventType::PolicyEvaluation, "did:mesh:a", json!({"i": i}), i, i).unwrap());
        }
        let root = log.merkle_root().unwrap();
        for entry in &entries {
            let proof = log.inclusion_proof(entry.seq).unwrap();
            assert!(AuditLogger::<InMemoryStorage>::verify_inclusion(entry, &proof, root));
        }
    }

    #[test]
    fn filter_by_actor_and_event_type() {
        let mut log = logger();
        log.append(AuditEventType::Registration, "did:mesh:a", json!({}), 0, 0).unwrap();
        log.append(AuditEventType::PolicyEvaluation, "did:mesh:b", json!({}), 1, 1).unwrap();
        let filter = AuditFilter { actor_did: Some("did:mesh:b".into()), ..Default::default() };
        let results = log.query(&filter);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].actor_did, "did:mesh:b");
    }
}
