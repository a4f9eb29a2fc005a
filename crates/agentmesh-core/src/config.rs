// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Engine-level configuration.
//!
//! [`Config`] is the single entry point for tuning [`crate::engine::AgentMeshEngine`]
//! at construction time. All fields have sensible defaults so that
//! `Config::default()` is always a valid starting point.

use serde::{Deserialize, Serialize};

use crate::trust::dimension::{DimensionAlphas, DimensionWeights};

/// Top-level configuration for [`crate::engine::AgentMeshEngine`].
///
/// # Examples
///
/// ```rust
/// use agentmesh_core::config::Config;
///
/// let config = Config {
///     max_delegation_depth: 4,
///     ..Config::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Composite score below which a revocation event fires. Default 300.
    pub revocation_threshold: u32,
    /// Maximum delegation chain depth. Default 8.
    pub max_delegation_depth: u32,
    /// Credential time-to-live in milliseconds. Default 15 minutes.
    pub credential_ttl_ms: u64,
    /// How far ahead of expiry a credential should be rotated. Default 5 minutes.
    pub credential_rotation_lead_ms: u64,
    /// How long a dimension may go unupdated before decay applies. Default 1 hour.
    pub decay_interval_ms: u64,
    /// Points lost per idle hour during decay. Default 2.0.
    pub decay_rate_per_hour: f64,
    /// Minimum score decay will not go below. Default 10.0.
    pub decay_floor: f64,
    /// Per-dimension weights, must sum to 1.0 ± 1e-6.
    pub dimension_weights: DimensionWeights,
    /// Per-dimension EMA smoothing factors, each in `(0, 1]`.
    pub dimension_alpha: DimensionAlphas,
    /// Policy evaluation timeout in milliseconds. Default 5 ms.
    pub policy_eval_timeout_ms: u64,
    /// `require_approval` resolution timeout in milliseconds. Default 30 s.
    pub approval_timeout_ms: u64,
    /// Bound on the revocation-callback dispatch channel.
    pub revocation_channel_capacity: usize,
    /// Number of partitions the trust-state shard map is split across.
    pub trust_shard_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            revocation_threshold: 300,
            max_delegation_depth: 8,
            credential_ttl_ms: 15 * 60 * 1_000,
            credential_rotation_lead_ms: 5 * 60 * 1_000,
            decay_interval_ms: 60 * 60 * 1_000,
            decay_rate_per_hour: 2.0,
            decay_floor: 10.0,
            dimension_weights: DimensionWeights::defaults(),
            dimension_alpha: DimensionAlphas::defaults(),
            policy_eval_timeout_ms: 5,
            approval_timeout_ms: 30_000,
            revocation_channel_capacity: 256,
            trust_shard_count: 16,
        }
    }
}

impl Config {
    /// Build the [`crate::trust::TrustConfig`] subset of this configuration.
    pub fn trust_config(&self) -> crate::trust::TrustConfig {
        crate::trust::TrustConfig {
            weights: self.dimension_weights,
            alphas: self.dimension_alpha,
            revocation_threshold: self.revocation_threshold,
            decay_interval_ms: self.decay_interval_ms,
            decay_rate_per_hour: self.decay_rate_per_hour,
            decay_floor: self.decay_floor,
            history_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_are_normalized() {
        assert!(Config::default().dimension_weights.is_normalized());
    }

    #[test]
    fn default_matches_spec_values() {
        let config = Config::default();
        assert_eq!(config.revocation_threshold, 300);
        assert_eq!(config.max_delegation_depth, 8);
        assert_eq!(config.credential_ttl_ms, 900_000);
        assert_eq!(config.credential_rotation_lead_ms, 300_000);
    }
}
