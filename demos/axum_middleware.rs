// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # Axum Middleware Example
//!
//! Demonstrates how to integrate the AgentMesh engine into an Axum HTTP
//! server as a request-level middleware layer.
//!
//! Every inbound request carries an `X-Agent-Did` header identifying the
//! caller. The middleware evaluates the requested action against that
//! identity's policies and either permits the request downstream or rejects
//! it with `403 Forbidden`.
//!
//! ## Running
//!
//! Add Axum and Tokio to a downstream crate's `Cargo.toml`:
//!
//! ```toml
//! axum           = "0.7"
//! tokio          = { version = "1", features = ["full"] }
//! tower          = "0.4"
//! tower-http     = { version = "0.5", features = ["trace"] }
//! agentmesh-core = { path = "../crates/agentmesh-core", features = ["async"] }
//! agentmesh-std  = { path = "../crates/agentmesh-std" }
//! ```
//!
//! Then run:
//!
//! ```bash
//! cargo run --example axum_middleware
//! ```
//!
//! Test with:
//!
//! ```bash
//! # Permitted — registered identity, matching policy rule
//! curl -H "X-Agent-Did: did:mesh:<finance-agent-did>" \
//!      http://localhost:3000/data
//!
//! # Denied — unregistered identity
//! curl -H "X-Agent-Did: did:mesh:unknown" \
//!      http://localhost:3000/data
//! ```

// NOTE: This example requires `axum` and `tokio` as dev-dependencies in a
// crate that depends on agentmesh-core. It is written as a self-contained
// illustration; the imports below are annotated with the crates they
// originate from.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use agentmesh_core::async_engine::AsyncAgentMeshEngine;
use agentmesh_core::audit::AuditLogger;
use agentmesh_core::config::Config;
use agentmesh_core::identity::IdentityRegistry;
use agentmesh_core::policy::ast::Value;
use agentmesh_core::policy::{document, PolicyEngine};
use agentmesh_core::storage::InMemoryStorage;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

// ---------------------------------------------------------------------------
// Shared engine wrapper
// ---------------------------------------------------------------------------

/// Async, `Arc`-shareable engine handle that can be cloned across Axum
/// handler invocations.
///
/// In production you would replace `InMemoryStorage` with a storage
/// implementation backed by your database or `agentmesh-std::FileStorage`.
type SharedEngine = Arc<AsyncAgentMeshEngine<InMemoryStorage>>;

/// Construct a pre-seeded engine for the API server, returning it alongside
/// the DIDs minted for the seeded identities (a real deployment persists
/// these and distributes the private keys to the corresponding agents).
///
/// The policy document is loaded into its own [`PolicyEngine`] before the
/// engine is assembled via `from_parts`, since policies are fixed at
/// startup in this example rather than hot-reloaded through the running
/// engine.
async fn build_engine() -> (AsyncAgentMeshEngine<InMemoryStorage>, String, String) {
    let config = Config::default();

    let mut identity = IdentityRegistry::new(InMemoryStorage::new());
    let mut policy = PolicyEngine::new(InMemoryStorage::new());
    let audit = AuditLogger::new(InMemoryStorage::new());
    let trust = agentmesh_core::trust::TrustEngine::new(InMemoryStorage::new(), config.trust_config());

    let api_key = SigningKey::generate(&mut OsRng);
    let reader_key = SigningKey::generate(&mut OsRng);

    let mut api_caps = BTreeSet::new();
    api_caps.insert("*".to_string());
    let mut reader_caps = BTreeSet::new();
    reader_caps.insert("read".to_string());

    let api_did = identity
        .register(api_key.verifying_key().as_bytes(), Some("owner"), api_caps, 0)
        .expect("registration should succeed");
    let reader_did = identity
        .register(reader_key.verifying_key().as_bytes(), Some("owner"), reader_caps, 0)
        .expect("registration should succeed");

    let policy_doc = document::parse_json(
        r#"{
            "version": "1.0",
            "name": "api-default",
            "agent": "*",
            "default_action": "deny",
            "rules": [
                {"name": "allow-read", "condition": "action == 'read'", "action": "allow", "priority": 10},
                {"name": "allow-mutate", "condition": "action == 'mutate'", "action": "allow", "priority": 20}
            ]
        }"#,
    )
    .expect("policy document should parse");
    policy.load(policy_doc).expect("policy should compile");

    let engine = AsyncAgentMeshEngine::from_parts(config, identity, policy, audit, trust);
    (engine, api_did, reader_did)
}

// ---------------------------------------------------------------------------
// Middleware logic (framework-agnostic helper)
// ---------------------------------------------------------------------------

/// Evaluation result returned by the middleware gate.
#[derive(Debug)]
pub struct GateResult {
    /// Whether the request is permitted to proceed.
    pub allowed: bool,
    /// Human-readable explanation for the `403` body or log line.
    pub reason: String,
    /// The HTTP status code to use when denying.
    pub status: u16,
}

/// Evaluate whether `agent_did` is allowed to perform `action`.
///
/// This function is the framework-agnostic core of the middleware. Call it
/// from an Axum `middleware::from_fn` closure, a Tower layer, or any other
/// request interceptor.
pub async fn agentmesh_gate(engine: &AsyncAgentMeshEngine<InMemoryStorage>, agent_did: &str, action: &str, now_ms: u64) -> GateResult {
    let mut context = BTreeMap::new();
    context.insert("action".to_string(), Value::String(action.to_string()));

    let decision = engine.evaluate(agent_did, &Value::Map(context), None, now_ms).await;

    GateResult {
        allowed: decision.allowed,
        reason: decision.reason,
        status: if decision.allowed { 200 } else { 403 },
    }
}

// ---------------------------------------------------------------------------
// Pseudo-main — illustrates how the middleware would be wired
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let (engine, api_did, reader_did) = build_engine().await;
    let engine: SharedEngine = Arc::new(engine);

    println!("AgentMesh — Axum Middleware Example\n");
    println!("Simulating three incoming HTTP requests:\n");

    let requests = vec![
        (api_did.as_str(), "GET /data -> read", "read"),
        (api_did.as_str(), "POST /mutate -> mutate", "mutate"),
        ("did:mesh:unregistered", "DELETE /nuke -> mutate", "mutate"),
    ];

    for (agent_did, label, action) in requests {
        let result = agentmesh_gate(&engine, agent_did, action, 0).await;

        if result.allowed {
            println!("  ALLOW  {agent_did} — {label} ({})", result.reason);
        } else {
            println!("  DENY   {agent_did} — {label} -> HTTP {} ({})", result.status, result.reason);
        }
    }

    // The reader identity is registered but has no capability-granting role
    // in this minimal ruleset beyond the universal read rule.
    let reader_result = agentmesh_gate(&engine, &reader_did, "read", 0).await;
    println!("  ALLOW  {reader_did} — GET /data -> read ({})", reader_result.reason);

    println!("\nAxum wiring (pseudo-code):");
    println!(
        r#"
  // In your actual Axum server:

  let app = Router::new()
      .route("/data",   get(data_handler))
      .route("/mutate", post(mutate_handler))
      .layer(middleware::from_fn_with_state(
          engine.clone(),
          agentmesh_middleware,
      ));

  async fn agentmesh_middleware(
      State(engine): State<SharedEngine>,
      headers: HeaderMap,
      request: Request,
      next: Next,
  ) -> Response {{
      let agent_did = headers
          .get("x-agent-did")
          .and_then(|v| v.to_str().ok())
          .unwrap_or("did:mesh:unregistered");

      let result = agentmesh_gate(&engine, agent_did, "http_request", now_ms()).await;

      if result.allowed {{
          next.run(request).await
      }} else {{
          (StatusCode::FORBIDDEN, result.reason).into_response()
      }}
  }}
"#
    );

    println!("Done.");
}
