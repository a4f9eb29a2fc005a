// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # agentmesh-core
//!
//! Core trust substrate for autonomous agents: identity and delegation,
//! declarative policy evaluation, a tamper-evident audit log, and
//! multi-dimensional reward/trust scoring.
//!
//! This crate is `no_std`-compatible (requires `alloc`). Enable the `std`
//! feature (on by default) to lift that restriction and gain access to
//! standard-library conveniences such as the config loader and clock-backed
//! timeouts.
//!
//! ## Architecture
//!
//! ```text
//! AgentMeshEngine<S: Storage>
//!   ├── IdentityRegistry<S> — register / look up / revoke agent identities
//!   ├── PolicyEngine<S>     — load and evaluate declarative policies
//!   ├── AuditLogger<S>      — hash-chained, Merkle-indexed audit trail
//!   └── TrustEngine<S>      — EMA-smoothed reward signals, tiering, decay
//! ```
//!
//! Delegation chains ([`delegation`]) and short-lived credentials
//! ([`credential`]) sit alongside [`identity`] rather than inside the
//! engine, since they are exercised directly by agent-to-agent handshakes
//! that never touch policy or trust state.
//!
//! ## Quick start
//!
//! ```rust
//! use agentmesh_core::{engine::AgentMeshEngine, storage::InMemoryStorage, config::Config};
//! use agentmesh_core::policy::ast::Value;
//! use alloc::collections::{BTreeMap, BTreeSet};
//! use ed25519_dalek::SigningKey;
//! use rand::rngs::OsRng;
//!
//! let mut engine = AgentMeshEngine::new(Config::default(), InMemoryStorage::new());
//!
//! let key = SigningKey::generate(&mut OsRng);
//! let mut granted = BTreeSet::new();
//! granted.insert("read".to_string());
//! let did = engine
//!     .register_identity(key.verifying_key().as_bytes(), Some("alice"), granted, 0)
//!     .unwrap();
//!
//! let doc = agentmesh_core::policy::document::parse_json(
//!     r#"{"version": "1.0", "name": "default", "agent": "*", "default_action": "deny",
//!         "rules": [{"name": "r1", "condition": "action == 'read'", "action": "allow", "priority": 10}]}"#,
//! ).unwrap();
//! engine.policy.load(doc).unwrap();
//!
//! let mut ctx = BTreeMap::new();
//! ctx.insert("action".to_string(), Value::String("read".to_string()));
//! let decision = engine.evaluate(&did, &Value::Map(ctx), None, 0);
//! assert!(decision.allowed);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod audit;
pub mod capability;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod delegation;
pub mod engine;
pub mod error;
pub mod identity;
pub mod policy;
pub mod storage;
pub mod trust;

// Async engine — only compiled when the "async" feature is enabled.
// Requires the "std" feature (Tokio cannot run in no_std environments).
#[cfg(feature = "async")]
pub mod async_engine;

// Config loader — TOML file and environment variable loading.
// Only compiled when the "config-loader" feature is enabled.
#[cfg(feature = "config-loader")]
pub mod config_loader;

// Re-export the most commonly used items at the crate root so consumers can
// write `use agentmesh_core::AgentMeshEngine;` instead of the fully
// qualified path.
pub use config::Config;
pub use engine::AgentMeshEngine;
pub use error::{AgentMeshError, Result};
pub use storage::{InMemoryStorage, Storage};

// Re-export the async engine at the crate root for ergonomic imports.
#[cfg(feature = "async")]
pub use async_engine::AsyncAgentMeshEngine;

// Re-export config loader types at the crate root.
#[cfg(feature = "config-loader")]
pub use config_loader::{load_config, load_config_from_env, ConfigError};
