// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # Basic AgentMesh Example
//!
//! Demonstrates identity registration, policy loading, and the sequential
//! evaluation pipeline using the in-memory storage backend. Run with:
//!
//! ```bash
//! cargo run --example basic
//! ```

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use agentmesh_core::audit::AuditFilter;
use agentmesh_core::config::Config;
use agentmesh_core::engine::AgentMeshEngine;
use agentmesh_core::policy::ast::Value;
use agentmesh_core::policy::document;
use agentmesh_core::storage::InMemoryStorage;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

fn action_context(action: &str) -> Value {
    let mut map = BTreeMap::new();
    map.insert("action".to_string(), Value::String(action.to_string()));
    Value::Map(map)
}

fn main() {
    println!("AgentMesh — Basic Example\n");

    // -----------------------------------------------------------------------
    // 1. Construct the engine
    // -----------------------------------------------------------------------
    let storage = InMemoryStorage::new();
    let config = Config::default();
    let mut engine = AgentMeshEngine::new(config, storage);

    // -----------------------------------------------------------------------
    // 2. Register agent identities
    // -----------------------------------------------------------------------
    let finance_key = SigningKey::generate(&mut OsRng);
    let ops_key = SigningKey::generate(&mut OsRng);

    let mut finance_caps = BTreeSet::new();
    finance_caps.insert("invoice:*".to_string());
    finance_caps.insert("read".to_string());
    finance_caps.insert("send_invoice".to_string());
    finance_caps.insert("bulk_transfer".to_string());

    let mut ops_caps = BTreeSet::new();
    ops_caps.insert("read".to_string());
    ops_caps.insert("delete_cluster".to_string());

    let finance_did = engine
        .register_identity(finance_key.verifying_key().as_bytes(), Some("owner"), finance_caps, 0)
        .expect("registration should succeed");
    let ops_did = engine
        .register_identity(ops_key.verifying_key().as_bytes(), Some("owner"), ops_caps, 0)
        .expect("registration should succeed");

    println!("Registered identities:");
    println!("  finance agent: {finance_did}");
    println!("  ops agent:     {ops_did}\n");

    // -----------------------------------------------------------------------
    // 3. Load a policy document
    // -----------------------------------------------------------------------
    let policy_doc = document::parse_json(
        r#"{
            "version": "1.0",
            "name": "default",
            "agent": "*",
            "default_action": "deny",
            "rules": [
                {"name": "allow-read", "condition": "action == 'read'", "action": "allow", "priority": 10},
                {"name": "allow-invoice", "condition": "action == 'send_invoice'", "action": "allow", "priority": 20},
                {"name": "deny-delete", "condition": "action == 'delete_cluster'", "action": "deny", "priority": 30}
            ]
        }"#,
    )
    .expect("policy document should parse");
    engine.policy.load(policy_doc).expect("policy should compile");
    println!("Policy loaded: default (allow read/send_invoice, deny delete_cluster)\n");

    // -----------------------------------------------------------------------
    // 4. Evaluate actions through the sequential pipeline
    // -----------------------------------------------------------------------

    // Action A — should ALLOW (finance agent, matching rule)
    let decision_a = engine.evaluate(&finance_did, &action_context("send_invoice"), None, 1_000);
    print_decision("send_invoice (finance agent)", &decision_a);

    // Action B — should DENY (explicit deny rule)
    let decision_b = engine.evaluate(&ops_did, &action_context("delete_cluster"), None, 1_001);
    print_decision("delete_cluster (ops agent)", &decision_b);

    // Action C — should DENY (no matching rule, falls through to default_action)
    let decision_c = engine.evaluate(&finance_did, &action_context("bulk_transfer"), None, 1_002);
    print_decision("bulk_transfer (finance agent, no matching rule)", &decision_c);

    // Action D — should ALLOW (read is universally permitted)
    let decision_d = engine.evaluate(&ops_did, &action_context("read"), None, 1_003);
    print_decision("read (ops agent)", &decision_d);

    // -----------------------------------------------------------------------
    // 5. Query the audit log
    // -----------------------------------------------------------------------
    println!("Audit log (all records):");
    let all_records = engine.audit.query(&AuditFilter::default());
    println!("  Total records: {}", all_records.len());
    for record in &all_records {
        println!(
            "  [seq={}] {:?} actor={} hash={}",
            record.seq,
            record.event_type,
            record.actor_did,
            &record.hash[..8.min(record.hash.len())]
        );
    }

    println!("\nAudit log (finance agent only):");
    let filter = AuditFilter { actor_did: Some(finance_did.clone()), limit: Some(5), ..Default::default() };
    let filtered = engine.audit.query(&filter);
    println!("  Records matching finance agent: {}", filtered.len());

    // -----------------------------------------------------------------------
    // 6. Inspect trust state
    // -----------------------------------------------------------------------
    println!("\nTrust state:");
    if let Some(state) = engine.trust.get(&finance_did) {
        println!("  finance agent composite: {}", state.composite);
    }
    if let Some(state) = engine.trust.get(&ops_did) {
        println!("  ops agent composite:     {}", state.composite);
    }

    println!("\nDone.");
}

fn print_decision(label: &str, decision: &agentmesh_core::policy::Decision) {
    println!(
        "[{}] allowed={} | reason={}",
        label, decision.allowed, decision.reason
    );
    println!(
        "  policy: {} | matched_rule: {}",
        decision.policy_name.as_deref().unwrap_or("-"),
        decision.matched_rule.as_deref().unwrap_or("-")
    );
    println!();
}
