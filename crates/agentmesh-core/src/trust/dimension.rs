// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! The five fixed trust dimensions and their default weights.

use serde::{Deserialize, Serialize};

/// One of the five fixed scoring dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    PolicyCompliance,
    ResourceEfficiency,
    OutputQuality,
    SecurityPosture,
    CollaborationHealth,
}

/// The canonical ordering of dimensions, used to index fixed-size arrays.
pub const ALL: [Dimension; 5] = [
    Dimension::PolicyCompliance,
    Dimension::ResourceEfficiency,
    Dimension::OutputQuality,
    Dimension::SecurityPosture,
    Dimension::CollaborationHealth,
];

impl Dimension {
    /// Stable index into a `[f64; 5]`-shaped weight or score array.
    pub fn index(self) -> usize {
        match self {
            Dimension::PolicyCompliance => 0,
            Dimension::ResourceEfficiency => 1,
            Dimension::OutputQuality => 2,
            Dimension::SecurityPosture => 3,
            Dimension::CollaborationHealth => 4,
        }
    }

    /// Default weight: `0.30, 0.15, 0.25, 0.20, 0.10`.
    pub fn default_weight(self) -> f64 {
        match self {
            Dimension::PolicyCompliance => 0.30,
            Dimension::ResourceEfficiency => 0.15,
            Dimension::OutputQuality => 0.25,
            Dimension::SecurityPosture => 0.20,
            Dimension::CollaborationHealth => 0.10,
        }
    }

    /// Default EMA smoothing factor, 0.2 for every dimension.
    pub fn default_alpha(self) -> f64 {
        0.2
    }
}

/// A full set of per-dimension weights, indexed by [`Dimension::index`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights(pub [f64; 5]);

impl DimensionWeights {
    /// The default weight set.
    pub fn defaults() -> Self {
        let mut weights = [0.0; 5];
        for dimension in ALL {
            weights[dimension.index()] = dimension.default_weight();
        }
        Self(weights)
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        self.0[dimension.index()]
    }

    /// Do these weights sum to 1.0 within tolerance (`1e-6`)?
    pub fn is_normalized(&self) -> bool {
        (self.0.iter().sum::<f64>() - 1.0).abs() < 1e-6
    }
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Per-dimension EMA smoothing factors, indexed by [`Dimension::index`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionAlphas(pub [f64; 5]);

impl DimensionAlphas {
    pub fn defaults() -> Self {
        let mut alphas = [0.0; 5];
        for dimension in ALL {
            alphas[dimension.index()] = dimension.default_alpha();
        }
        Self(alphas)
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        self.0[dimension.index()]
    }
}

impl Default for DimensionAlphas {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!(DimensionWeights::defaults().is_normalized());
    }

    #[test]
    fn every_dimension_has_a_distinct_index() {
        let indices: alloc::vec::Vec<usize> = ALL.iter().map(|d| d.index()).collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), indices.len());
    }
}
