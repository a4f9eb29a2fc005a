// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Declarative policy evaluation: load compiled rule sets, evaluate an
//! `(agent, context)` pair against them, and produce a decision with
//! rationale and rate-limit state.

pub mod ast;
pub mod document;
pub mod ratelimit;

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::{AgentMeshError, Result};
use crate::storage::Storage;
use ast::Value;
use document::{Action, PolicyDocument, PolicySet};

pub use document::Target;

/// The result of evaluating a single `(agent_did, context)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// True only when `action ∈ {allow, warn, log}`.
    pub allowed: bool,
    pub action: Action,
    pub matched_rule: Option<String>,
    pub policy_name: Option<String>,
    pub reason: String,
    pub approvers: Vec<String>,
    pub rate_limited: bool,
    pub rate_limit_reset: Option<u64>,
    /// Wall-clock time spent evaluating, filled in by the caller (this
    /// crate has no clock access under `no_std`).
    pub evaluation_ms: u64,
}

impl Decision {
    fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            action: Action::Deny,
            matched_rule: None,
            policy_name: None,
            reason: reason.to_string(),
            approvers: Vec::new(),
            rate_limited: false,
            rate_limit_reset: None,
            evaluation_ms: 0,
        }
    }
}

/// Loads and evaluates compiled policy sets over a pluggable [`Storage`]
/// backend.
pub struct PolicyEngine<S: Storage> {
    storage: S,
    next_policy_order: usize,
}

impl<S: Storage> PolicyEngine<S> {
    /// Create a new [`PolicyEngine`] over `storage`.
    pub fn new(storage: S) -> Self {
        Self { storage, next_policy_order: 0 }
    }

    /// Compile and register `document`, returning its policy id.
    ///
    /// Policy ids are derived from the document's declared `name`; loading
    /// a document with a name already in use overwrites the prior policy —
    /// the whole `PolicySet` is replaced atomically in storage, never
    /// mutated in place.
    pub fn load(&mut self, document: PolicyDocument) -> Result<String> {
        let id = document.name.clone();
        let policy_order = self.next_policy_order;
        let compiled = document::compile(document, id.clone(), policy_order)?;
        self.storage.set_policy(&id, compiled);
        self.next_policy_order += 1;
        Ok(id)
    }

    /// Evaluate `agent_did` against `context` across every policy whose
    /// target selector matches, returning the first matching rule's
    /// decision (or the governing policy's `default_action`, or an
    /// engine-level `deny` if no policy targets this agent at all).
    ///
    /// `now_ms` drives rate-limit window bookkeeping.
    pub fn evaluate(&mut self, agent_did: &str, context: &Value, now_ms: u64) -> Decision {
        let mut candidates: Vec<PolicySet> = self
            .storage
            .all_policies()
            .into_iter()
            .filter(|policy| policy.target.matches(agent_did))
            .collect();

        if candidates.is_empty() {
            return Decision::deny("no policy targets this agent");
        }

        // Sort key: (priority, policy_order, rule_order).
        let mut indexed: Vec<(i64, usize, usize, String, &document::Rule)> = Vec::new();
        for policy in &candidates {
            for rule in &policy.rules {
                if rule.enabled {
                    indexed.push((rule.priority, policy.policy_order, rule.declaration_order, policy.name.clone(), rule));
                }
            }
        }
        indexed.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

        for (_, _, _, policy_name, rule) in &indexed {
            if ast::eval(&rule.condition, context) != Value::Bool(true) {
                continue;
            }

            if let Some(limit) = rule.limit {
                let current = self.storage.get_rate_counter(&rule.name, agent_did);
                let outcome = ratelimit::check_and_record(limit, current, now_ms);
                self.storage.set_rate_counter(&rule.name, agent_did, outcome.updated_counter);
                if outcome.limited {
                    return Decision {
                        allowed: false,
                        action: Action::Deny,
                        matched_rule: Some(rule.name.clone()),
                        policy_name: Some(policy_name.clone()),
                        reason: format!("rate limit exceeded for rule '{}'", rule.name),
                        approvers: Vec::new(),
                        rate_limited: true,
                        rate_limit_reset: outcome.reset_at_ms,
                        evaluation_ms: 0,
                    };
                }
            }

            return Decision {
                allowed: rule.action.is_allowed(),
                action: rule.action,
                matched_rule: Some(rule.name.clone()),
                policy_name: Some(policy_name.clone()),
                reason: format!("matched rule '{}'", rule.name),
                approvers: rule.approvers.clone(),
                rate_limited: false,
                rate_limit_reset: None,
                evaluation_ms: 0,
            };
        }

        // No rule matched: apply the default_action of the highest-priority
        // (lowest policy_order) matching policy.
        candidates.sort_by_key(|policy| policy.policy_order);
        let governing = &candidates[0];
        Decision {
            allowed: governing.default_action.is_allowed(),
            action: governing.default_action,
            matched_rule: None,
            policy_name: Some(governing.name.clone()),
            reason: "no rule matched; applied default_action".to_string(),
            approvers: Vec::new(),
            rate_limited: false,
            rate_limit_reset: None,
            evaluation_ms: 0,
        }
    }

    /// Borrow the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutably borrow the underlying storage.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}

/// Build a timeout decision for use by the engine when evaluation exceeds
/// its configured budget.
pub fn timeout_decision() -> Decision {
    let mut decision = Decision::deny("evaluation_timeout");
    decision.reason = "evaluation_timeout".to_string();
    decision
}
