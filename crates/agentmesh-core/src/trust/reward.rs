// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Signal functions: map a raw behavioral observation to a `[0, 100]`
//! reward value for one dimension.
//!
//! These are pure functions; they never touch storage or the engine's
//! clock. [`crate::trust::TrustEngine`] calls one of these, then feeds the
//! resulting value (if any) into the EMA update for the matching
//! [`crate::trust::dimension::Dimension`].

use alloc::string::String;

use super::dimension::Dimension;

/// `policy_compliance`: 100 if the action complied with policy, else 0.
pub fn policy_compliance(compliant: bool) -> (Dimension, f64) {
    (Dimension::PolicyCompliance, if compliant { 100.0 } else { 0.0 })
}

/// `resource_efficiency`: `max(0, 100 * (1 - used/budget))`, clamped to
/// `[0, 100]`. Returns `None` if `budget` is zero (no signal recorded).
pub fn resource_usage(used: f64, budget: f64) -> Option<(Dimension, f64)> {
    if budget <= 0.0 {
        return None;
    }
    let raw = 100.0 * (1.0 - used / budget);
    Some((Dimension::ResourceEfficiency, raw.clamp(0.0, 100.0)))
}

/// `output_quality`: 100 if the output was accepted by its consumer, else 0.
pub fn output_quality(accepted: bool, _consumer: &str) -> (Dimension, f64) {
    (Dimension::OutputQuality, if accepted { 100.0 } else { 0.0 })
}

/// `security_posture`: 100 if the action stayed within its declared
/// boundary, else 0.
pub fn security_event(within_boundary: bool, _event_type: &str) -> (Dimension, f64) {
    (Dimension::SecurityPosture, if within_boundary { 100.0 } else { 0.0 })
}

/// `collaboration_health`: 100 if a handoff to a peer succeeded, else 0.
pub fn collaboration(handoff_successful: bool, _peer_did: &str) -> (Dimension, f64) {
    (Dimension::CollaborationHealth, if handoff_successful { 100.0 } else { 0.0 })
}

/// A human-readable name for the policy that produced a compliance signal,
/// threaded through to the audit log entry describing the update.
pub fn policy_label(policy_name: &str) -> String {
    alloc::format!("policy:{policy_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compliance_is_binary() {
        assert_eq!(policy_compliance(true), (Dimension::PolicyCompliance, 100.0));
        assert_eq!(policy_compliance(false), (Dimension::PolicyCompliance, 0.0));
    }

    #[test]
    fn resource_usage_scales_with_remaining_budget() {
        let (_, value) = resource_usage(25.0, 100.0).unwrap();
        assert!((value - 75.0).abs() < 1e-9);
    }

    #[test]
    fn resource_usage_clamps_when_over_budget() {
        let (_, value) = resource_usage(150.0, 100.0).unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn zero_budget_produces_no_signal() {
        assert!(resource_usage(10.0, 0.0).is_none());
    }

    #[test]
    fn output_and_security_and_collaboration_are_binary() {
        assert_eq!(output_quality(true, "reviewer").1, 100.0);
        assert_eq!(security_event(false, "sandbox_escape").1, 0.0);
        assert_eq!(collaboration(true, "did:mesh:peer").1, 100.0);
    }
}
