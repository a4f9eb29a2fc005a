// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Async governance engine backed by Tokio.
//!
//! Only compiled when the `async` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! agentmesh-core = { version = "0.1", features = ["async"] }
//! ```
//!
//! [`AsyncAgentMeshEngine`] wraps each manager in its own
//! [`tokio::sync::RwLock`] so identity, policy, audit, and trust state can be
//! accessed from multiple Tokio tasks concurrently. Evaluation still
//! proceeds through the same sequential gates as
//! the sync [`crate::engine::AgentMeshEngine`]; only the lock discipline
//! differs. Revocation callbacks registered on the wrapped [`TrustEngine`]
//! still run synchronously inside the write-lock critical section — wiring
//! them to a bounded channel for true async dispatch is left to the
//! embedding application, since this crate has no opinion on what a
//! downstream consumer should do with a revocation notification.

#![cfg(feature = "async")]

use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::audit::{AuditEventType, AuditFilter, AuditEntry, AuditLogger};
use crate::capability;
use crate::config::Config;
use crate::delegation::DelegationChain;
use crate::error::Result;
use crate::identity::IdentityRegistry;
use crate::policy::ast::Value;
use crate::policy::{self, Decision, PolicyEngine};
use crate::storage::Storage;
use crate::trust::TrustEngine;

/// Async counterpart to [`crate::engine::AgentMeshEngine`], `Arc`-shareable
/// across Tokio tasks.
///
/// Constructed via [`AsyncAgentMeshEngine::new`] when the storage type
/// implements [`Clone`], or via [`AsyncAgentMeshEngine::from_parts`] for
/// custom storage sharding.
pub struct AsyncAgentMeshEngine<S: Storage> {
    identity: Arc<RwLock<IdentityRegistry<S>>>,
    policy: Arc<RwLock<PolicyEngine<S>>>,
    audit: Arc<RwLock<AuditLogger<S>>>,
    trust: Arc<RwLock<TrustEngine<S>>>,
    config: Config,
}

impl<S: Storage + Clone> AsyncAgentMeshEngine<S> {
    /// Construct a new engine, cloning `storage` once per manager — same
    /// semantics as [`crate::engine::AgentMeshEngine::new`].
    pub fn new(config: Config, storage: S) -> Self {
        let trust_config = config.trust_config();
        Self {
            identity: Arc::new(RwLock::new(IdentityRegistry::new(storage.clone()))),
            policy: Arc::new(RwLock::new(PolicyEngine::new(storage.clone()))),
            audit: Arc::new(RwLock::new(AuditLogger::new(storage.clone()))),
            trust: Arc::new(RwLock::new(TrustEngine::new(storage, trust_config))),
            config,
        }
    }
}

impl<S: Storage> AsyncAgentMeshEngine<S> {
    /// Construct an engine from four pre-built managers.
    pub fn from_parts(
        config: Config,
        identity: IdentityRegistry<S>,
        policy: PolicyEngine<S>,
        audit: AuditLogger<S>,
        trust: TrustEngine<S>,
    ) -> Self {
        Self {
            identity: Arc::new(RwLock::new(identity)),
            policy: Arc::new(RwLock::new(policy)),
            audit: Arc::new(RwLock::new(audit)),
            trust: Arc::new(RwLock::new(trust)),
            config,
        }
    }

    /// Register a new identity. See [`IdentityRegistry::register`].
    pub async fn register_identity(
        &self,
        public_key: &[u8],
        sponsor: Option<&str>,
        capabilities: BTreeSet<String>,
        now_ms: u64,
    ) -> Result<String> {
        let did = {
            let mut identity = self.identity.write().await;
            identity.register(public_key, sponsor, capabilities, now_ms)?
        };
        let mut audit = self.audit.write().await;
        audit.append(AuditEventType::Registration, &did, json!({ "sponsor": sponsor }), now_ms, now_ms)?;
        Ok(did)
    }

    /// Revoke an identity and record the revocation.
    pub async fn revoke_identity(&self, did: &str, reason: &str, now_ms: u64) -> Result<()> {
        {
            let mut identity = self.identity.write().await;
            identity.revoke(did, reason);
        }
        let mut audit = self.audit.write().await;
        audit.append(AuditEventType::Revocation, did, json!({ "reason": reason }), now_ms, now_ms)?;
        Ok(())
    }

    /// Evaluate `agent_did` against `context`, mirroring
    /// [`crate::engine::AgentMeshEngine::evaluate`]'s gate order: identity,
    /// capability, policy, audit, trust. `delegation_chain` carries the
    /// acting agent's delegated authority, if any; see the sync engine's
    /// `evaluate` for the full contract.
    pub async fn evaluate(&self, agent_did: &str, context: &Value, delegation_chain: Option<&DelegationChain>, now_ms: u64) -> Decision {
        let is_active = {
            let identity = self.identity.read().await;
            identity.is_active(agent_did)
        };
        if !is_active {
            warn!(agent_did, "evaluate called for unknown or revoked identity");
            let mut decision = policy::timeout_decision();
            decision.reason = "unknown or revoked identity".into();
            return decision;
        }

        let effective_capabilities = match delegation_chain {
            Some(chain) => {
                let identity = self.identity.read().await;
                match chain.verify(&identity, self.config.max_delegation_depth, now_ms) {
                    Ok((capabilities, _root_sponsor)) => capabilities,
                    Err(err) => {
                        warn!(agent_did, %err, "delegation chain failed verification; denying");
                        let mut decision = policy::timeout_decision();
                        decision.reason = alloc::format!("delegation chain invalid: {err}");
                        decision.evaluation_ms = 0;
                        return self.record_and_return(agent_did, context, now_ms, decision).await;
                    }
                }
            }
            None => {
                let identity = self.identity.read().await;
                identity.get(agent_did).map(|identity| identity.capabilities).unwrap_or_default()
            }
        };

        if let Value::String(action) = context.get_path("action") {
            let requested: BTreeSet<String> = [action.clone()].into_iter().collect();
            if !capability::is_subset(&requested, &effective_capabilities) {
                warn!(agent_did, action = %action, "capability escalation attempt denied before policy evaluation");
                let mut decision = policy::timeout_decision();
                decision.reason = alloc::format!("action '{action}' exceeds effective capability set");
                decision.evaluation_ms = 0;
                return self.record_and_return(agent_did, context, now_ms, decision).await;
            }
        }

        #[cfg(feature = "std")]
        let started = std::time::Instant::now();

        let mut decision = {
            let mut policy = self.policy.write().await;
            policy.evaluate(agent_did, context, now_ms)
        };

        #[cfg(feature = "std")]
        {
            decision.evaluation_ms = started.elapsed().as_millis() as u64;
            if decision.evaluation_ms > self.config.policy_eval_timeout_ms {
                warn!(agent_did, ms = decision.evaluation_ms, "policy evaluation exceeded timeout budget");
                decision = policy::timeout_decision();
            }
        }

        self.record_and_return(agent_did, context, now_ms, decision).await
    }

    /// Shared tail of `evaluate`: append the audit entry, feed the trust
    /// engine, and revoke on a threshold crossing. See the sync engine's
    /// identically-named helper.
    async fn record_and_return(&self, agent_did: &str, context: &Value, now_ms: u64, decision: Decision) -> Decision {
        let payload = json!({
            "action": context_action(context),
            "allowed": decision.allowed,
            "policy_name": decision.policy_name,
            "matched_rule": decision.matched_rule,
            "reason": decision.reason,
        });
        {
            let mut audit = self.audit.write().await;
            if let Err(err) = audit.append(AuditEventType::PolicyEvaluation, agent_did, payload, now_ms, now_ms) {
                warn!(agent_did, %err, "failed to append audit entry for policy evaluation");
            }
        }

        let policy_name = decision.policy_name.clone().unwrap_or_else(|| "unnamed".into());
        let crossed = {
            let mut trust = self.trust.write().await;
            if let Err(err) = trust.record_policy_compliance(agent_did, decision.allowed, &policy_name, now_ms) {
                warn!(agent_did, %err, "failed to record policy-compliance signal");
            }
            trust.get(agent_did).map(|state| state.composite < self.config.revocation_threshold).unwrap_or(false)
        };

        if crossed {
            info!(agent_did, "trust composite crossed revocation threshold");
            if let Err(err) = self.revoke_identity(agent_did, "trust_composite_below_threshold", now_ms).await {
                warn!(agent_did, %err, "failed to revoke identity after threshold crossing");
            }
        }

        decision
    }

    /// Query the audit log.
    pub async fn query_audit(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        let audit = self.audit.read().await;
        audit.query(filter)
    }
}

fn context_action(context: &Value) -> Option<String> {
    match context.get_path("action") {
        Value::String(action) => Some(action),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use alloc::collections::BTreeMap;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn ctx(action: &str) -> Value {
        let mut map = BTreeMap::new();
        map.insert("action".into(), Value::String(action.into()));
        Value::Map(map)
    }

    #[tokio::test]
    async fn register_and_evaluate_roundtrip() {
        let engine = AsyncAgentMeshEngine::new(Config::default(), InMemoryStorage::new());
        let key = SigningKey::generate(&mut OsRng);
        let mut granted = BTreeSet::new();
        granted.insert("read".to_string());
        let did = engine
            .register_identity(key.verifying_key().as_bytes(), None, granted, 0)
            .await
            .unwrap();

        let decision = engine.evaluate(&did, &ctx("read"), None, 0).await;
        assert!(!decision.allowed); // no policy loaded: engine-level deny

        let entries = engine.query_audit(&AuditFilter { actor_did: Some(did), ..Default::default() }).await;
        assert_eq!(entries.len(), 2); // registration + policy_evaluation
    }

    #[tokio::test]
    async fn unknown_agent_is_denied_without_panicking() {
        let engine = AsyncAgentMeshEngine::new(Config::default(), InMemoryStorage::new());
        let decision = engine.evaluate("did:mesh:ghost", &ctx("read"), None, 0).await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn capability_gate_denies_an_unentitled_action() {
        let engine = AsyncAgentMeshEngine::new(Config::default(), InMemoryStorage::new());
        let key = SigningKey::generate(&mut OsRng);
        let mut granted = BTreeSet::new();
        granted.insert("read".to_string());
        let did = engine
            .register_identity(key.verifying_key().as_bytes(), None, granted, 0)
            .await
            .unwrap();

        let decision = engine.evaluate(&did, &ctx("delete"), None, 0).await;
        assert!(!decision.allowed);
        assert_eq!(decision.evaluation_ms, 0);
    }
}
