// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Multi-dimensional, EMA-smoothed trust scoring with decay, tiering, and
//! revocation dispatch.
//!
//! [`TrustEngine`] is the sole owner of [`AgentTrustState`] transitions:
//! every `record_*` call feeds one dimension's EMA, recomputes the
//! composite and tier, and, if the composite crosses below the configured
//! revocation threshold for the first time since last crossing above it,
//! dispatches to every registered revocation callback exactly once.

pub mod anomaly;
pub mod dimension;
pub mod experiment;
pub mod reward;

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::error::{AgentMeshError, Result};
use crate::storage::Storage;
use anomaly::AnomalyBaseline;
use dimension::{Dimension, DimensionAlphas, DimensionWeights, ALL};
use experiment::Experiment;

/// Coarse trust classification derived solely from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    VerifiedPartner,
    Trusted,
    Standard,
    Probationary,
    Untrusted,
}

/// Fixed tier thresholds.
pub fn tier_from_composite(composite: u32) -> Tier {
    if composite >= 900 {
        Tier::VerifiedPartner
    } else if composite >= 700 {
        Tier::Trusted
    } else if composite >= 500 {
        Tier::Standard
    } else if composite >= 300 {
        Tier::Probationary
    } else {
        Tier::Untrusted
    }
}

/// Per-dimension score, signal count, and last-update timestamp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DimensionState {
    pub score: f64,
    pub signal_count: u64,
    pub last_update_ms: u64,
}

impl DimensionState {
    fn new(initial: f64, now_ms: u64) -> Self {
        Self { score: initial, signal_count: 1, last_update_ms: now_ms }
    }
}

/// Full per-agent trust record: five dimension states, the derived
/// composite/tier, recent history for anomaly detection, and the
/// revocation-crossing latch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTrustState {
    dimensions: [Option<DimensionState>; 5],
    pub composite: u32,
    pub tier: Tier,
    /// Recent `(composite, timestamp_ms)` samples, bounded.
    pub history: VecDeque<(u32, u64)>,
    history_capacity: usize,
    baseline: AnomalyBaseline,
    /// Set once the composite has crossed below the revocation threshold,
    /// cleared once it rises back above — the latch behind
    /// exactly-once-per-crossing callback dispatch.
    below_threshold: bool,
}

impl AgentTrustState {
    fn new(history_capacity: usize) -> Self {
        Self {
            dimensions: [None; 5],
            composite: 0,
            tier: Tier::Untrusted,
            history: VecDeque::with_capacity(history_capacity.min(64)),
            history_capacity,
            baseline: AnomalyBaseline::default(),
            below_threshold: false,
        }
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<DimensionState> {
        self.dimensions[dimension.index()]
    }

    /// Running count of signals flagged more than 2σ from their dimension's
    /// prior rolling baseline, for alerting. Never influences `composite`.
    pub fn anomaly_count(&self) -> u32 {
        self.baseline.anomaly_count
    }

    fn push_history(&mut self, now_ms: u64) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back((self.composite, now_ms));
    }

    fn recompute(&mut self, weights: DimensionWeights) {
        let mut sum = 0.0;
        for dimension in ALL {
            if let Some(state) = self.dimensions[dimension.index()] {
                sum += state.score * weights.get(dimension);
            }
        }
        self.composite = (sum * 10.0).round() as u32;
        self.tier = tier_from_composite(self.composite);
    }
}

/// Engine-level tuning for trust scoring, distinct from the shared
/// [`crate::config::Config`] so this module stays independently testable.
#[derive(Debug, Clone, Copy)]
pub struct TrustConfig {
    pub weights: DimensionWeights,
    pub alphas: DimensionAlphas,
    pub revocation_threshold: u32,
    pub decay_interval_ms: u64,
    pub decay_rate_per_hour: f64,
    pub decay_floor: f64,
    pub history_capacity: usize,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            weights: DimensionWeights::defaults(),
            alphas: DimensionAlphas::defaults(),
            revocation_threshold: 300,
            decay_interval_ms: 3_600_000,
            decay_rate_per_hour: 2.0,
            decay_floor: 10.0,
            history_capacity: 256,
        }
    }
}

type RevocationCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Consumes reward signals, maintains per-agent dimension scores, and
/// dispatches revocation callbacks on downward threshold crossings.
pub struct TrustEngine<S: Storage> {
    storage: S,
    config: TrustConfig,
    callbacks: Vec<RevocationCallback>,
    experiment: Option<Experiment>,
}

impl<S: Storage> TrustEngine<S> {
    pub fn new(storage: S, config: TrustConfig) -> Self {
        Self { storage, config, callbacks: Vec::new(), experiment: None }
    }

    /// Register a handler invoked `(did, composite, reason)` on every
    /// downward threshold crossing. Failures inside a callback are the
    /// caller's concern; this engine does not catch panics.
    pub fn on_revocation(&mut self, callback: impl Fn(&str, u32, &str) + Send + Sync + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    fn weights_for(&self, did: &str) -> DimensionWeights {
        match &self.experiment {
            Some(experiment) => experiment.assign(did),
            None => self.config.weights,
        }
    }

    fn dispatch_if_crossed(&self, did: &str, state: &mut AgentTrustState) {
        let now_below = state.composite < self.config.revocation_threshold;
        if now_below && !state.below_threshold {
            for callback in &self.callbacks {
                callback(did, state.composite, "below_threshold");
            }
        }
        state.below_threshold = now_below;
    }

    fn apply_signal(&mut self, did: &str, dimension: Dimension, raw: f64, now_ms: u64) -> Result<()> {
        if self.storage.get_identity(did).is_none() {
            return Err(AgentMeshError::UnknownAgent);
        }
        let mut state = self.storage.get_trust_state(did).unwrap_or_else(|| AgentTrustState::new(self.config.history_capacity));

        let alpha = self.config.alphas.get(dimension);
        let updated = match state.dimensions[dimension.index()] {
            Some(existing) => DimensionState {
                score: alpha * raw + (1.0 - alpha) * existing.score,
                signal_count: existing.signal_count + 1,
                last_update_ms: now_ms,
            },
            None => DimensionState::new(raw, now_ms),
        };
        state.dimensions[dimension.index()] = Some(updated);
        state.baseline.record(raw);

        let weights = self.weights_for(did);
        state.recompute(weights);
        state.push_history(now_ms);
        self.dispatch_if_crossed(did, &mut state);

        self.storage.set_trust_state(did, state);
        Ok(())
    }

    pub fn record_policy_compliance(&mut self, did: &str, compliant: bool, _policy_name: &str, now_ms: u64) -> Result<()> {
        let (dimension, raw) = reward::policy_compliance(compliant);
        self.apply_signal(did, dimension, raw, now_ms)
    }

    pub fn record_resource_usage(&mut self, did: &str, used: f64, budget: f64, now_ms: u64) -> Result<()> {
        match reward::resource_usage(used, budget) {
            Some((dimension, raw)) => self.apply_signal(did, dimension, raw, now_ms),
            None => Ok(()),
        }
    }

    pub fn record_output_quality(&mut self, did: &str, accepted: bool, consumer: &str, now_ms: u64) -> Result<()> {
        let (dimension, raw) = reward::output_quality(accepted, consumer);
        self.apply_signal(did, dimension, raw, now_ms)
    }

    pub fn record_security_event(&mut self, did: &str, within_boundary: bool, event_type: &str, now_ms: u64) -> Result<()> {
        let (dimension, raw) = reward::security_event(within_boundary, event_type);
        self.apply_signal(did, dimension, raw, now_ms)
    }

    pub fn record_collaboration(&mut self, did: &str, handoff_successful: bool, peer_did: &str, now_ms: u64) -> Result<()> {
        let (dimension, raw) = reward::collaboration(handoff_successful, peer_did);
        self.apply_signal(did, dimension, raw, now_ms)
    }

    /// Visit every agent with recorded trust state and decay any dimension
    /// idle longer than `decay_interval_ms`. A single call sweeps every
    /// shard; it is expected to be driven by one decay worker ticking on an
    /// interval, not per-agent timers.
    pub fn decay_sweep(&mut self, now_ms: u64) {
        let dids = self.storage.all_trust_dids();
        for did in dids {
            let Some(mut state) = self.storage.get_trust_state(&did) else { continue };
            let mut changed = false;
            for dimension in ALL {
                if let Some(existing) = state.dimensions[dimension.index()] {
                    let idle_ms = now_ms.saturating_sub(existing.last_update_ms);
                    if idle_ms >= self.config.decay_interval_ms {
                        let idle_hours = idle_ms as f64 / 3_600_000.0;
                        let decayed = (existing.score - self.config.decay_rate_per_hour * idle_hours).max(self.config.decay_floor);
                        if decayed != existing.score {
                            state.dimensions[dimension.index()] = Some(DimensionState {
                                score: decayed,
                                signal_count: existing.signal_count,
                                last_update_ms: now_ms,
                            });
                            changed = true;
                        }
                    }
                }
            }
            if changed {
                let weights = self.weights_for(&did);
                state.recompute(weights);
                state.push_history(now_ms);
                self.dispatch_if_crossed(&did, &mut state);
                self.storage.set_trust_state(&did, state);
            }
        }
    }

    /// Start an A/B weight experiment. Returns the experiment id.
    pub fn start_experiment(&mut self, id: &str, control: DimensionWeights, treatment: DimensionWeights, treatment_fraction: f64) -> Result<String> {
        if !control.is_normalized() || !treatment.is_normalized() {
            return Err(AgentMeshError::PolicyInvalid("experiment weights must sum to 1.0".to_string()));
        }
        let experiment = Experiment::start(id, control, treatment, treatment_fraction);
        let experiment_id = experiment.id.clone();
        self.experiment = Some(experiment);
        Ok(experiment_id)
    }

    /// Atomically adopt the treatment weights of `experiment_id` as the new
    /// engine-wide default, ending the experiment.
    pub fn adopt_treatment(&mut self, experiment_id: &str) -> Result<()> {
        match self.experiment.take() {
            Some(experiment) if experiment.id == experiment_id => {
                self.config.weights = experiment.treatment;
                Ok(())
            }
            other => {
                self.experiment = other;
                Err(AgentMeshError::PolicyInvalid(alloc::format!("no active experiment '{experiment_id}'")))
            }
        }
    }

    /// Read the current trust state for `did`, if any signal has been
    /// recorded.
    pub fn get(&self, did: &str) -> Option<AgentTrustState> {
        self.storage.get_trust_state(did)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicU32, Ordering};

    fn engine_with_agent() -> (TrustEngine<InMemoryStorage>, String) {
        let mut storage = InMemoryStorage::new();
        let did = "did:mesh:agent".to_string();
        storage.set_identity(
            &did,
            crate::identity::Identity {
                did: did.clone(),
                public_key: [0u8; 32],
                sponsor: None,
                created_at_ms: 0,
                status: crate::identity::IdentityStatus::Active,
                capabilities: Default::default(),
            },
        );
        (TrustEngine::new(storage, TrustConfig::default()), did)
    }

    #[test]
    fn first_signal_seeds_score_at_its_own_value() {
        let (mut engine, did) = engine_with_agent();
        engine.record_policy_compliance(&did, true, "p1", 0).unwrap();
        let state = engine.get(&did).unwrap();
        let dim = state.dimension(Dimension::PolicyCompliance).unwrap();
        assert_eq!(dim.score, 100.0);
    }

    #[test]
    fn ema_decays_geometrically_under_repeated_noncompliance() {
        let (mut engine, did) = engine_with_agent();
        engine.record_policy_compliance(&did, true, "p1", 0).unwrap();
        for k in 1..=10 {
            engine.record_policy_compliance(&did, false, "p1", k).unwrap();
        }
        let state = engine.get(&did).unwrap();
        let dim = state.dimension(Dimension::PolicyCompliance).unwrap();
        let expected = 100.0 * 0.8f64.powi(10);
        assert!((dim.score - expected).abs() < 1e-6);
    }

    #[test]
    fn composite_bounds_and_tier_consistency() {
        let (mut engine, did) = engine_with_agent();
        engine.record_policy_compliance(&did, true, "p1", 0).unwrap();
        let state = engine.get(&did).unwrap();
        assert!(state.composite <= 1000);
        assert_eq!(state.tier, tier_from_composite(state.composite));
    }

    #[test]
    fn unknown_agent_is_rejected() {
        let (mut engine, _) = engine_with_agent();
        let result = engine.record_policy_compliance("did:mesh:ghost", true, "p1", 0);
        assert_eq!(result, Err(AgentMeshError::UnknownAgent));
    }

    #[test]
    fn revocation_fires_exactly_once_per_crossing() {
        let (mut engine, did) = engine_with_agent();
        let fire_count = Arc::new(AtomicU32::new(0));
        let counter = fire_count.clone();
        engine.on_revocation(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for k in 0..20u64 {
            engine.record_policy_compliance(&did, false, "p1", k).unwrap();
        }
        assert_eq!(fire_count.load(Ordering::SeqCst), 1);

        for k in 20..25u64 {
            engine.record_policy_compliance(&did, false, "p1", k).unwrap();
        }
        assert_eq!(fire_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recrossing_refires_callback() {
        let (mut engine, did) = engine_with_agent();
        let fire_count = Arc::new(AtomicU32::new(0));
        let counter = fire_count.clone();
        engine.on_revocation(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for k in 0..20u64 {
            engine.record_policy_compliance(&did, false, "p1", k).unwrap();
        }
        assert_eq!(fire_count.load(Ordering::SeqCst), 1);

        for k in 20..40u64 {
            engine.record_policy_compliance(&did, true, "p1", k).unwrap();
        }
        for k in 40..60u64 {
            engine.record_policy_compliance(&did, false, "p1", k).unwrap();
        }
        assert_eq!(fire_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn decay_lowers_idle_dimension_toward_floor() {
        let (mut engine, did) = engine_with_agent();
        engine.record_policy_compliance(&did, true, "p1", 0).unwrap();
        engine.decay_sweep(3_600_000 * 60);
        let state = engine.get(&did).unwrap();
        let dim = state.dimension(Dimension::PolicyCompliance).unwrap();
        assert!(dim.score < 100.0);
        assert!(dim.score >= engine.config.decay_floor);
    }

    #[test]
    fn repeated_sweeps_do_not_compound_decay_past_elapsed_time() {
        let (mut engine, did) = engine_with_agent();
        engine.record_policy_compliance(&did, true, "p1", 0).unwrap();

        // One sweep two hours in: two hours idle past a one-hour decay
        // interval, at the default rate of 2/hour.
        engine.decay_sweep(3_600_000 * 2);
        let once = engine.get(&did).unwrap().dimension(Dimension::PolicyCompliance).unwrap().score;

        // A second sweep one millisecond later must not re-measure idle time
        // from the original signal and decay again; `last_update_ms` should
        // have advanced with the first sweep.
        engine.decay_sweep(3_600_000 * 2 + 1);
        let twice = engine.get(&did).unwrap().dimension(Dimension::PolicyCompliance).unwrap().score;

        assert_eq!(once, twice);
    }

    #[test]
    fn anomaly_count_is_reachable_through_trust_state() {
        let (mut engine, did) = engine_with_agent();
        for k in 0..20u64 {
            let used = if k % 2 == 0 { 5.0 } else { 7.0 };
            engine.record_resource_usage(&did, used, 100.0, k).unwrap();
        }
        assert_eq!(engine.get(&did).unwrap().anomaly_count(), 0);

        engine.record_resource_usage(&did, 99.0, 100.0, 20).unwrap();
        assert_eq!(engine.get(&did).unwrap().anomaly_count(), 1);
    }

    #[test]
    fn experiment_weights_must_be_normalized() {
        let (mut engine, _) = engine_with_agent();
        let bad = DimensionWeights([0.5, 0.5, 0.5, 0.0, 0.0]);
        let result = engine.start_experiment("exp-1", DimensionWeights::defaults(), bad, 0.5);
        assert!(result.is_err());
    }
}
