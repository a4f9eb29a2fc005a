// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Governance engine — the top-level composition of all protocol components.
//!
//! [`AgentMeshEngine`] owns a single logical [`Storage`] instance and exposes
//! the four protocol managers as public fields that borrow from it. Because
//! Rust requires unique ownership of mutable references, each manager
//! receives its own storage instance — they communicate through the shared
//! [`Storage`] trait contract rather than shared memory. For `InMemoryStorage`
//! (and similar single-owner stores) this means `S: Clone`; for a shared
//! backend wrap it in `Arc<Mutex<S>>` and implement `Storage` on the wrapper,
//! whose cheap `Clone` still makes every manager see the same data.
//!
//! ## Evaluation order
//!
//! 1. **Identity gate** — the acting DID must be registered and active.
//! 2. **Policy gate** — evaluate the action against every policy targeting
//!    the agent, bounded by `config.policy_eval_timeout_ms`.
//! 3. **Audit** — append a `policy_evaluation` entry regardless of outcome.
//! 4. **Trust update** — feed the decision into the policy-compliance
//!    dimension; if the composite crosses below the revocation threshold,
//!    revoke the identity and append a `revocation` entry.
//!
//! Any gate failure short-circuits the remaining evaluation steps and
//! returns a denied [`Decision`] immediately. The audit record is always
//! written for a policy-gate outcome.

use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde_json::json;
use tracing::{info, warn};

use crate::audit::{AuditEventType, AuditLogger};
use crate::capability;
use crate::config::Config;
use crate::delegation::DelegationChain;
use crate::error::{AgentMeshError, Result};
use crate::identity::IdentityRegistry;
use crate::policy::ast::Value;
use crate::policy::{self, Decision, PolicyEngine};
use crate::storage::Storage;
use crate::trust::TrustEngine;

/// Composes every protocol component into a single evaluation API.
///
/// # Construction
///
/// ```rust
/// use agentmesh_core::{engine::AgentMeshEngine, storage::InMemoryStorage, config::Config};
///
/// let engine = AgentMeshEngine::new(Config::default(), InMemoryStorage::new());
/// ```
///
/// # Evaluation
///
/// ```rust
/// use agentmesh_core::{engine::AgentMeshEngine, storage::InMemoryStorage, config::Config};
/// use agentmesh_core::policy::ast::Value;
/// use alloc::collections::BTreeMap;
/// use ed25519_dalek::SigningKey;
/// use rand::rngs::OsRng;
///
/// let mut engine = AgentMeshEngine::new(Config::default(), InMemoryStorage::new());
/// let key = SigningKey::generate(&mut OsRng);
/// let did = engine.register_identity(key.verifying_key().as_bytes(), None, Default::default(), 0).unwrap();
///
/// let mut ctx = BTreeMap::new();
/// ctx.insert("action".to_string(), Value::String("read".to_string()));
/// let decision = engine.evaluate(&did, &Value::Map(ctx), None, 0);
/// assert!(!decision.allowed); // no policy loaded yet: engine-level deny
/// ```
pub struct AgentMeshEngine<S: Storage> {
    pub identity: IdentityRegistry<S>,
    pub policy: PolicyEngine<S>,
    pub audit: AuditLogger<S>,
    pub trust: TrustEngine<S>,
    config: Config,
}

impl<S: Storage + Clone> AgentMeshEngine<S> {
    /// Construct a new [`AgentMeshEngine`], cloning `storage` once per
    /// manager. When `S` is [`crate::storage::InMemoryStorage`] the clone
    /// produces four independent in-memory stores, which is correct: every
    /// write this engine performs is routed through exactly one manager, and
    /// `evaluate` is the only method that touches more than one.
    pub fn new(config: Config, storage: S) -> Self {
        let trust_config = config.trust_config();
        Self {
            identity: IdentityRegistry::new(storage.clone()),
            policy: PolicyEngine::new(storage.clone()),
            audit: AuditLogger::new(storage.clone()),
            trust: TrustEngine::new(storage, trust_config),
            config,
        }
    }
}

impl<S: Storage> AgentMeshEngine<S> {
    /// Construct an [`AgentMeshEngine`] from four pre-built managers, for
    /// storage types that do not implement [`Clone`] or that shard data
    /// across managers deliberately.
    pub fn from_parts(
        config: Config,
        identity: IdentityRegistry<S>,
        policy: PolicyEngine<S>,
        audit: AuditLogger<S>,
        trust: TrustEngine<S>,
    ) -> Self {
        Self { identity, policy, audit, trust, config }
    }

    /// Register a new identity. See [`IdentityRegistry::register`].
    pub fn register_identity(
        &mut self,
        public_key: &[u8],
        sponsor: Option<&str>,
        capabilities: BTreeSet<String>,
        now_ms: u64,
    ) -> Result<String> {
        let did = self.identity.register(public_key, sponsor, capabilities, now_ms)?;
        self.audit.append(
            AuditEventType::Registration,
            &did,
            json!({ "sponsor": sponsor }),
            now_ms,
            now_ms,
        )?;
        Ok(did)
    }

    /// Revoke an identity and record the revocation, regardless of whether
    /// it was triggered by an operator or by the trust engine crossing its
    /// threshold.
    pub fn revoke_identity(&mut self, did: &str, reason: &str, now_ms: u64) -> Result<()> {
        self.identity.revoke(did, reason);
        self.audit.append(
            AuditEventType::Revocation,
            did,
            json!({ "reason": reason }),
            now_ms,
            now_ms,
        )?;
        Ok(())
    }

    /// Evaluate `agent_did` performing an action described by `context`
    /// (expected to carry at least an `"action"` key; see
    /// [`crate::policy::ast`]) against every policy targeting it, record the
    /// outcome to the audit log, and feed the result into the agent's trust
    /// score.
    ///
    /// `delegation_chain` carries the acting agent's delegated authority, if
    /// it is acting on behalf of a sponsor rather than under its own
    /// declared capabilities. When present, its effective (narrowed)
    /// capability set gates the requested action before policy evaluation
    /// runs; when absent, `agent_did`'s own [`crate::identity::Identity::capabilities`]
    /// gates it instead. A chain that fails verification, or an action
    /// outside the resolved capability set, is denied without ever reaching
    /// the policy engine.
    ///
    /// Returns an engine-level deny decision without touching policy state
    /// if the identity is unknown or revoked, without an audit entry (an
    /// unregistered caller has no DID to attribute one to beyond what it
    /// claims).
    pub fn evaluate(&mut self, agent_did: &str, context: &Value, delegation_chain: Option<&DelegationChain>, now_ms: u64) -> Decision {
        if !self.identity.is_active(agent_did) {
            warn!(agent_did, "evaluate called for unknown or revoked identity");
            return policy::Decision {
                evaluation_ms: 0,
                ..deny_identity_gate()
            };
        }

        let effective_capabilities = match delegation_chain {
            Some(chain) => match chain.verify(&self.identity, self.config.max_delegation_depth, now_ms) {
                Ok((capabilities, _root_sponsor)) => capabilities,
                Err(err) => {
                    warn!(agent_did, %err, "delegation chain failed verification; denying");
                    return self.record_and_return(
                        agent_did,
                        context,
                        now_ms,
                        capability_gate_decision(format!("delegation chain invalid: {err}")),
                    );
                }
            },
            None => self.identity.get(agent_did).map(|identity| identity.capabilities).unwrap_or_default(),
        };

        if let Value::String(action) = context.get_path("action") {
            let requested: BTreeSet<String> = [action.clone()].into_iter().collect();
            if !capability::is_subset(&requested, &effective_capabilities) {
                warn!(agent_did, action = %action, "capability escalation attempt denied before policy evaluation");
                return self.record_and_return(
                    agent_did,
                    context,
                    now_ms,
                    capability_gate_decision(format!("action '{action}' exceeds effective capability set")),
                );
            }
        }

        let started = elapsed_guard();
        let mut decision = self.policy.evaluate(agent_did, context, now_ms);
        decision.evaluation_ms = started.elapsed_ms();

        if decision.evaluation_ms > self.config.policy_eval_timeout_ms {
            warn!(agent_did, ms = decision.evaluation_ms, "policy evaluation exceeded timeout budget");
            decision = policy::timeout_decision();
        }

        self.record_and_return(agent_did, context, now_ms, decision)
    }

    /// Shared tail of `evaluate`: append the audit entry, feed the trust
    /// engine, and revoke on a threshold crossing. Used both by the normal
    /// policy-evaluated path and by the capability gate's short-circuit
    /// denials, so every decision that reaches a registered identity is
    /// audited and scored the same way.
    fn record_and_return(&mut self, agent_did: &str, context: &Value, now_ms: u64, decision: Decision) -> Decision {

        let payload = json!({
            "action": context_action(context),
            "allowed": decision.allowed,
            "policy_name": decision.policy_name,
            "matched_rule": decision.matched_rule,
            "reason": decision.reason,
        });
        if let Err(err) = self.audit.append(AuditEventType::PolicyEvaluation, agent_did, payload, now_ms, now_ms) {
            warn!(agent_did, %err, "failed to append audit entry for policy evaluation");
        }

        let policy_name = decision.policy_name.clone().unwrap_or_else(|| "unnamed".to_string());
        if let Err(err) = self.trust.record_policy_compliance(agent_did, decision.allowed, &policy_name, now_ms) {
            warn!(agent_did, %err, "failed to record policy-compliance signal");
        }

        if let Some(state) = self.trust.get(agent_did) {
            if state.composite < self.config.revocation_threshold && self.identity.is_active(agent_did) {
                info!(agent_did, composite = state.composite, "trust composite crossed revocation threshold");
                if let Err(err) = self.revoke_identity(agent_did, "trust_composite_below_threshold", now_ms) {
                    warn!(agent_did, %err, "failed to revoke identity after threshold crossing");
                }
            }
        }

        decision
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn context_action(context: &Value) -> Option<String> {
    match context.get_path("action") {
        Value::String(action) => Some(action),
        _ => None,
    }
}

fn deny_identity_gate() -> Decision {
    let mut decision = policy::timeout_decision();
    decision.reason = "unknown or revoked identity".to_string();
    decision
}

/// A denial produced by the capability gate, before the policy engine ever
/// runs. Carries `evaluation_ms: 0` since no policy rules were evaluated.
fn capability_gate_decision(reason: String) -> Decision {
    let mut decision = policy::timeout_decision();
    decision.reason = reason;
    decision.evaluation_ms = 0;
    decision
}

/// Elapsed-time measurement for the policy-evaluation timeout.
/// `no_std` builds have no clock and always report zero elapsed time, so
/// the timeout check never fires —
/// callers on embedded targets are expected to enforce their own budget
/// upstream.
struct ElapsedGuard {
    #[cfg(feature = "std")]
    start: std::time::Instant,
}

fn elapsed_guard() -> ElapsedGuard {
    #[cfg(feature = "std")]
    {
        ElapsedGuard { start: std::time::Instant::now() }
    }
    #[cfg(not(feature = "std"))]
    {
        ElapsedGuard {}
    }
}

impl ElapsedGuard {
    fn elapsed_ms(&self) -> u64 {
        #[cfg(feature = "std")]
        {
            self.start.elapsed().as_millis() as u64
        }
        #[cfg(not(feature = "std"))]
        {
            0
        }
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
        map.insert("action".to_string(), Value::String(action.to_string()));
        Value::Map(map)
    }

    fn caps(tokens: &[&str]) -> BTreeSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn register(engine: &mut AgentMeshEngine<InMemoryStorage>, capabilities: BTreeSet<String>) -> String {
        let key = SigningKey::generate(&mut OsRng);
        engine
            .register_identity(key.verifying_key().as_bytes(), None, capabilities, 0)
            .unwrap()
    }

    #[test]
    fn unknown_identity_is_denied_without_policy_lookup() {
        let mut engine = AgentMeshEngine::new(Config::default(), InMemoryStorage::new());
        let decision = engine.evaluate("did:mesh:ghost", &ctx("read"), None, 0);
        assert!(!decision.allowed);
    }

    #[test]
    fn registration_is_audited() {
        let mut engine = AgentMeshEngine::new(Config::default(), InMemoryStorage::new());
        let did = register(&mut engine, BTreeSet::new());
        let entries = engine.audit.query(&crate::audit::AuditFilter { actor_did: Some(did), ..Default::default() });
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, AuditEventType::Registration);
    }

    #[test]
    fn evaluate_with_no_policy_denies_and_records_trust_signal() {
        let mut engine = AgentMeshEngine::new(Config::default(), InMemoryStorage::new());
        let did = register(&mut engine, caps(&["read:data"]));
        let decision = engine.evaluate(&did, &ctx("read"), None, 1_000);
        assert!(!decision.allowed);
        let state = engine.trust.get(&did).unwrap();
        assert!(state.dimension(crate::trust::dimension::Dimension::PolicyCompliance).is_some());
    }

    #[test]
    fn repeated_denials_eventually_revoke_the_identity() {
        let mut config = Config::default();
        config.revocation_threshold = 950; // push the crossing within a handful of denials
        let mut engine = AgentMeshEngine::new(config, InMemoryStorage::new());
        let did = register(&mut engine, caps(&["read:data"]));
        for k in 0..5u64 {
            engine.evaluate(&did, &ctx("read"), None, k);
        }
        assert!(!engine.identity.is_active(&did));
    }

    #[test]
    fn allowed_action_is_reflected_in_the_audit_payload() {
        let mut engine = AgentMeshEngine::new(Config::default(), InMemoryStorage::new());
        let did = register(&mut engine, caps(&["*"]));
        let doc = crate::policy::document::parse_json(
            r#"{
                "version": "1.0", "name": "default", "agent": "*", "default_action": "deny",
                "rules": [{"name": "r1", "condition": "action == 'read'", "action": "allow", "priority": 10}]
            }"#,
        )
        .unwrap();
        engine.policy.load(doc).unwrap();

        let decision = engine.evaluate(&did, &ctx("read"), None, 0);
        assert!(decision.allowed);
        let entries = engine.audit.query(&crate::audit::AuditFilter { actor_did: Some(did), ..Default::default() });
        let evaluation = entries.iter().find(|e| e.event_type == AuditEventType::PolicyEvaluation).unwrap();
        assert_eq!(evaluation.payload["allowed"], true);
    }

    #[test]
    fn capability_gate_denies_before_policy_runs_for_an_unentitled_action() {
        let mut engine = AgentMeshEngine::new(Config::default(), InMemoryStorage::new());
        let did = register(&mut engine, caps(&["read:data"]));
        let doc = crate::policy::document::parse_json(
            r#"{
                "version": "1.0", "name": "default", "agent": "*", "default_action": "deny",
                "rules": [{"name": "r1", "condition": "action == 'delete:data'", "action": "allow", "priority": 10}]
            }"#,
        )
        .unwrap();
        engine.policy.load(doc).unwrap();

        let decision = engine.evaluate(&did, &ctx("delete:data"), None, 0);
        assert!(!decision.allowed);
        assert_eq!(decision.evaluation_ms, 0);
        assert!(decision.reason.contains("capability"));
    }

    #[test]
    fn a_verified_delegation_chain_gates_the_effective_capability_set() {
        use crate::delegation::DelegationChain;

        let mut engine = AgentMeshEngine::new(Config::default(), InMemoryStorage::new());
        let sponsor_key = SigningKey::generate(&mut OsRng);
        let sponsor_did = engine
            .register_identity(sponsor_key.verifying_key().as_bytes(), None, caps(&["*"]), 0)
            .unwrap();

        let agent_key = SigningKey::generate(&mut OsRng);
        let agent_did = engine
            .register_identity(agent_key.verifying_key().as_bytes(), Some(&sponsor_did), BTreeSet::new(), 0)
            .unwrap();

        let doc = crate::policy::document::parse_json(
            r#"{
                "version": "1.0", "name": "default", "agent": "*", "default_action": "deny",
                "rules": [{"name": "r1", "condition": "action == 'read:data'", "action": "allow", "priority": 10}]
            }"#,
        )
        .unwrap();
        engine.policy.load(doc).unwrap();

        let mut chain = DelegationChain::new();
        chain
            .delegate(&sponsor_did, &sponsor_key, &caps(&["*"]), &agent_did, caps(&["read:data"]), 1_000_000, 5)
            .unwrap();

        let allowed = engine.evaluate(&agent_did, &ctx("read:data"), Some(&chain), 0);
        assert!(allowed.allowed);

        let denied = engine.evaluate(&agent_did, &ctx("write:data"), Some(&chain), 1);
        assert!(!denied.allowed);
        assert!(denied.reason.contains("capability"));
    }
}
