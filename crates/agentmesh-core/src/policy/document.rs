// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Policy document schema and compilation.
//!
//! A document is deserialized from JSON (always, via `serde_json`) or YAML
//! (behind the `yaml` feature, via `serde_yaml`) into [`PolicyDocument`],
//! then compiled into a [`PolicySet`] whose rule conditions are already
//! parsed [`super::ast::Expr`] trees — compilation happens once, at `load`
//! time, never per-evaluation.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::error::{AgentMeshError, Result};
use crate::policy::ast::{self, Expr};

/// The action a matched rule (or a policy's `default_action`) resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Deny,
    Warn,
    Log,
    RequireApproval,
}

impl Action {
    /// `allowed` is true only for `allow`, `warn`, `log`.
    pub fn is_allowed(self) -> bool {
        matches!(self, Action::Allow | Action::Warn | Action::Log)
    }
}

/// Rate-limit window unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Second,
    Minute,
    Hour,
    Day,
}

impl Window {
    /// Window length in milliseconds.
    pub fn as_millis(self) -> u64 {
        match self {
            Window::Second => 1_000,
            Window::Minute => 60_000,
            Window::Hour => 3_600_000,
            Window::Day => 86_400_000,
        }
    }
}

/// A parsed `"<n>/<window>"` rate limit specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub window: Window,
}

impl RateLimit {
    fn parse(spec: &str) -> Result<Self> {
        let (count, window) = spec
            .split_once('/')
            .ok_or_else(|| AgentMeshError::PolicyInvalid(format!("malformed rate limit: {spec}")))?;
        let limit: u32 = count
            .trim()
            .parse()
            .map_err(|_| AgentMeshError::PolicyInvalid(format!("malformed rate limit count: {count}")))?;
        let window = match window.trim() {
            "second" => Window::Second,
            "minute" => Window::Minute,
            "hour" => Window::Hour,
            "day" => Window::Day,
            other => return Err(AgentMeshError::PolicyInvalid(format!("unknown rate limit window: {other}"))),
        };
        Ok(Self { limit, window })
    }
}

/// Raw, not-yet-compiled rule as it appears in a policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDocument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub condition: String,
    pub action: Action,
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub approvers: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

/// Raw, not-yet-compiled policy document as it appears in YAML or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub agents: Vec<String>,
    pub default_action: Action,
    #[serde(default)]
    pub rules: Vec<RuleDocument>,
}

/// A compiled rule: a condition [`Expr`] plus everything needed to resolve
/// and report a decision.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub condition: Expr,
    pub action: Action,
    pub priority: i64,
    pub enabled: bool,
    pub limit: Option<RateLimit>,
    pub approvers: Vec<String>,
    /// Declaration order within the policy, used as the tiebreaker when two
    /// rules share the same priority.
    pub declaration_order: usize,
}

/// Target selector for a policy: either a wildcard, a single DID, or an
/// explicit set.
#[derive(Debug, Clone)]
pub enum Target {
    Wildcard,
    Did(String),
    Set(Vec<String>),
}

impl Target {
    /// Does this selector target `did`?
    pub fn matches(&self, did: &str) -> bool {
        match self {
            Target::Wildcard => true,
            Target::Did(target) => target == did,
            Target::Set(targets) => targets.iter().any(|t| t == did),
        }
    }
}

/// A compiled policy: target selector, default action, and ordered rules.
#[derive(Debug, Clone)]
pub struct PolicySet {
    pub id: String,
    pub name: String,
    pub target: Target,
    pub default_action: Action,
    pub rules: Vec<Rule>,
    /// Registration order among all loaded policies, used in the
    /// `(priority, policy_order, rule_order)` sort key.
    pub policy_order: usize,
    /// The document this policy was compiled from, retained so storage
    /// backends that cannot serialize [`Expr`] directly (it has no `Serialize`
    /// impl; condition trees are rebuilt from source on every compile, never
    /// persisted) can snapshot and recompile a [`PolicySet`] across restarts.
    pub source: PolicyDocument,
}

/// Compile a [`PolicyDocument`] (already deserialized from JSON or YAML)
/// into a [`PolicySet`], parsing every rule's condition and validating the
/// schema invariants (`agent`/`agents` mutual exclusivity, `approvers`
/// required iff `action == require_approval`).
pub fn compile(document: PolicyDocument, id: String, policy_order: usize) -> Result<PolicySet> {
    let source = document.clone();
    if document.agent.is_some() && !document.agents.is_empty() {
        return Err(AgentMeshError::PolicyInvalid(
            "`agent` and `agents` are mutually exclusive".into(),
        ));
    }
    let target = if let Some(agent) = document.agent {
        if agent == "*" {
            Target::Wildcard
        } else {
            Target::Did(agent)
        }
    } else if !document.agents.is_empty() {
        Target::Set(document.agents)
    } else {
        Target::Wildcard
    };

    let mut rules = Vec::with_capacity(document.rules.len());
    for (declaration_order, raw) in document.rules.into_iter().enumerate() {
        if raw.action == Action::RequireApproval && raw.approvers.is_empty() {
            return Err(AgentMeshError::PolicyInvalid(format!(
                "rule '{}' requires approvers for action require_approval",
                raw.name
            )));
        }
        let condition = ast::parse(&raw.condition)?;
        let limit = raw.limit.as_deref().map(RateLimit::parse).transpose()?;
        rules.push(Rule {
            name: raw.name,
            condition,
            action: raw.action,
            priority: raw.priority,
            enabled: raw.enabled,
            limit,
            approvers: raw.approvers,
            declaration_order,
        });
    }

    Ok(PolicySet {
        id,
        name: document.name,
        target,
        default_action: document.default_action,
        rules,
        policy_order,
        source,
    })
}

/// Parse a policy document from JSON text.
pub fn parse_json(text: &str) -> Result<PolicyDocument> {
    serde_json::from_str(text).map_err(|e| AgentMeshError::PolicyInvalid(format!("invalid JSON: {e}")))
}

/// Parse a policy document from YAML text. Requires the `yaml` feature.
#[cfg(feature = "yaml")]
pub fn parse_yaml(text: &str) -> Result<PolicyDocument> {
    serde_yaml::from_str(text).map_err(|e| AgentMeshError::PolicyInvalid(format!("invalid YAML: {e}")))
}
