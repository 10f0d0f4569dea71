//! Portfolio weight optimizer.
//!
//! Blends each asset's declared weight with its risk by encoding the weights as
//! amplitudes, rotating mass away from risky assets, diffusing, applying a
//! return-to-risk phase shift and collapsing back. The result depends on the
//! order of the inputs: neighbouring assets are coupled.

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::transform::{AmplitudeState, Gate, Transform};

/// Largest request the optimizer accepts.
pub const MAX_ASSETS: usize = 32;

/// Measured mass below this is treated as empty.
const MASS_EPSILON: f64 = 1e-12;

/// One asset in an optimization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetWeightInput {
    pub symbol: String,
    /// Declared target weight (0.0 to 1.0)
    pub weight: f64,
    /// Risk score (0.0 to 1.0)
    pub risk: f64,
}

impl AssetWeightInput {
    pub fn new(symbol: impl Into<String>, weight: f64, risk: f64) -> Self {
        Self {
            symbol: symbol.into(),
            weight,
            risk,
        }
    }

    /// Rotation angle `asin(sqrt(risk))`.
    fn risk_angle(&self) -> f64 {
        self.risk.sqrt().asin()
    }

    /// Phase shift `atan2(weight, risk)`.
    fn return_phase(&self) -> f64 {
        self.weight.atan2(self.risk)
    }
}

/// Optimized weight for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetWeight {
    pub symbol: String,
    pub weight: f64,
}

/// Output of the optimizer. Weights sum to 1 over a non-empty request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedWeights {
    pub weights: Vec<AssetWeight>,
    /// Share of mass that stayed on the requested assets (0.0 to 1.0)
    pub confidence: f64,
    /// True when the proportional fallback produced these weights
    #[serde(default)]
    pub fallback: bool,
}

impl OptimizedWeights {
    /// Weight for `symbol`, or 0 if absent.
    pub fn weight_of(&self, symbol: &str) -> f64 {
        self.weights
            .iter()
            .find(|w| w.symbol == symbol)
            .map(|w| w.weight)
            .unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().map(|w| w.weight).sum()
    }
}

/// Deterministic amplitude-encoding weight optimizer.
#[derive(Debug, Clone, Default)]
pub struct WeightOptimizer;

impl WeightOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// Optimize weights. Never fails: any error falls back to proportional allocation.
    pub fn optimize(&self, assets: &[AssetWeightInput]) -> OptimizedWeights {
        match self.try_optimize(assets) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    error = %e,
                    assets = assets.len(),
                    "Weight optimization failed, using proportional allocation"
                );
                Self::proportional(assets)
            }
        }
    }

    /// Run the full transform, surfacing errors.
    pub fn try_optimize(&self, assets: &[AssetWeightInput]) -> Result<OptimizedWeights> {
        Self::validate(assets)?;

        let weights: Vec<f64> = assets.iter().map(|a| a.weight).collect();
        let mut state = AmplitudeState::encode(&weights)?;
        let total = state.total_mass();
        ensure!(total > MASS_EPSILON, "Request carries no weight");

        Self::transform(assets, state.dimension()).apply(&mut state)?;

        let probabilities: Vec<f64> = (0..assets.len()).map(|i| state.probability(i)).collect();
        let measured: f64 = probabilities.iter().sum();
        ensure!(
            measured.is_finite() && measured > MASS_EPSILON,
            "No mass measured on requested assets"
        );

        let weights = assets
            .iter()
            .zip(&probabilities)
            .map(|(asset, p)| AssetWeight {
                symbol: asset.symbol.clone(),
                weight: p / measured,
            })
            .collect();
        let confidence = (measured / total).clamp(0.0, 1.0);

        debug!(assets = assets.len(), confidence = confidence, "Weights optimized");

        Ok(OptimizedWeights {
            weights,
            confidence,
            fallback: false,
        })
    }

    /// The transform applied between encoding and measurement.
    ///
    /// Risk rotation with neighbour coupling, forward diffusion, return phase
    /// shift, inverse diffusion.
    pub fn transform(assets: &[AssetWeightInput], dim: usize) -> Transform {
        let mut t = Transform::new();

        for (i, asset) in assets.iter().enumerate() {
            let theta = asset.risk_angle();
            let partner = (i + 1) % dim;
            if partner == i {
                // No partner coordinate: the rotation reduces to a phase.
                t.phase(i, -theta);
            } else {
                t.pair(i, partner, Gate::rotation(theta));
            }

            if i > 0 {
                let coupling = assets[i - 1].risk_angle() / 2.0;
                t.pair(i - 1, i, Gate::coupling(coupling));
            }
        }

        let diffusion = Transform::diffusion(dim);
        t.extend(&diffusion);

        for (i, asset) in assets.iter().enumerate() {
            t.phase(i, asset.return_phase());
        }

        t.extend(&diffusion.inverse());
        t
    }

    /// Weight share proportional to declared weight, ignoring risk.
    ///
    /// Equal shares when no weight is declared.
    pub fn proportional(assets: &[AssetWeightInput]) -> OptimizedWeights {
        let declared: Vec<f64> = assets
            .iter()
            .map(|a| if a.weight.is_finite() { a.weight.max(0.0) } else { 0.0 })
            .collect();
        let total: f64 = declared.iter().sum();

        let weights = assets
            .iter()
            .zip(&declared)
            .map(|(asset, &w)| AssetWeight {
                symbol: asset.symbol.clone(),
                weight: if total > 0.0 {
                    w / total
                } else {
                    1.0 / assets.len() as f64
                },
            })
            .collect();

        OptimizedWeights {
            weights,
            confidence: 0.0,
            fallback: true,
        }
    }

    fn validate(assets: &[AssetWeightInput]) -> Result<()> {
        if assets.is_empty() {
            bail!("Empty optimization request");
        }
        ensure!(
            assets.len() <= MAX_ASSETS,
            "Too many assets: {} > {}",
            assets.len(),
            MAX_ASSETS
        );

        for asset in assets {
            ensure!(
                asset.weight.is_finite() && (0.0..=1.0).contains(&asset.weight),
                "Weight for {} out of range: {}",
                asset.symbol,
                asset.weight
            );
            ensure!(
                asset.risk.is_finite() && (0.0..=1.0).contains(&asset.risk),
                "Risk for {} out of range: {}",
                asset.symbol,
                asset.risk
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assets(rows: &[(&str, f64, f64)]) -> Vec<AssetWeightInput> {
        rows.iter()
            .map(|&(s, w, r)| AssetWeightInput::new(s, w, r))
            .collect()
    }

    #[test]
    fn test_single_asset_gets_full_weight() {
        let result = WeightOptimizer::new().optimize(&assets(&[("BTC", 0.9, 0.02)]));
        assert!(!result.fallback);
        assert!((result.weight_of("BTC") - 1.0).abs() < 1e-12);
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert_eq!(result.weight_of("ETH"), 0.0);
    }

    #[test]
    fn test_two_assets() {
        let result = WeightOptimizer::new().optimize(&assets(&[("A", 0.6, 0.2), ("B", 0.4, 0.7)]));
        assert!(!result.fallback);
        assert!((result.total() - 1.0).abs() < 1e-9);
        assert!((result.weight_of("A") - 0.535_008_693_8).abs() < 1e-6);
        assert!((result.weight_of("B") - 0.464_991_306_2).abs() < 1e-6);
    }

    #[test]
    fn test_order_sensitivity() {
        let optimizer = WeightOptimizer::new();
        let forward = optimizer.optimize(&assets(&[("A", 0.6, 0.2), ("B", 0.4, 0.7)]));
        let reversed = optimizer.optimize(&assets(&[("B", 0.4, 0.7), ("A", 0.6, 0.2)]));

        assert!((forward.weight_of("A") - reversed.weight_of("A")).abs() > 1e-3);
        assert!((forward.total() - 1.0).abs() < 1e-9);
        assert!((reversed.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_riskless_equal_weights_stay_equal() {
        let result = WeightOptimizer::new().optimize(&assets(&[
            ("A", 0.25, 0.0),
            ("B", 0.25, 0.0),
            ("C", 0.25, 0.0),
            ("D", 0.25, 0.0),
        ]));
        for w in &result.weights {
            assert!((w.weight - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unused_slots_lower_confidence() {
        // Three assets live in a four-slot state; some mass leaks into the spare slot
        let request = assets(&[("A", 0.5, 0.1), ("B", 0.3, 0.3), ("C", 0.2, 0.5)]);
        let result = WeightOptimizer::new().optimize(&request);
        assert!(!result.fallback);
        assert!(result.confidence < 1.0);
        assert!(result.confidence > 0.9);
        assert!((result.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_input_falls_back_to_proportional() {
        let optimizer = WeightOptimizer::new();

        let result = optimizer.optimize(&assets(&[("A", 0.6, 1.5), ("B", 0.2, 0.1)]));
        assert!(result.fallback);
        assert!((result.weight_of("A") - 0.75).abs() < 1e-12);
        assert!((result.weight_of("B") - 0.25).abs() < 1e-12);

        assert!(optimizer.try_optimize(&[]).is_err());
        let empty = optimizer.optimize(&[]);
        assert!(empty.weights.is_empty());
    }

    #[test]
    fn test_zero_weight_falls_back_to_equal_shares() {
        let result = WeightOptimizer::new().optimize(&assets(&[("A", 0.0, 0.1), ("B", 0.0, 0.2)]));
        assert!(result.fallback);
        assert_eq!(result.weight_of("A"), 0.5);
        assert_eq!(result.weight_of("B"), 0.5);
    }

    #[test]
    fn test_deterministic() {
        let request = assets(&[("A", 0.5, 0.1), ("B", 0.3, 0.3), ("C", 0.2, 0.5)]);
        let optimizer = WeightOptimizer::new();
        assert_eq!(optimizer.optimize(&request), optimizer.optimize(&request));
    }

    fn arb_request() -> impl Strategy<Value = Vec<AssetWeightInput>> {
        prop::collection::vec((0.05..1.0_f64, 0.0..1.0_f64), 1..=8).prop_map(|pairs| {
            pairs
                .into_iter()
                .enumerate()
                .map(|(i, (w, r))| AssetWeightInput::new(format!("S{}", i), w, r))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn weights_are_non_negative_and_sum_to_one(request in arb_request()) {
            let result = WeightOptimizer::new().optimize(&request);
            prop_assert_eq!(result.weights.len(), request.len());
            prop_assert!(result.weights.iter().all(|w| w.weight >= 0.0));
            prop_assert!((result.total() - 1.0).abs() < 1e-9);
            prop_assert!((0.0..=1.0).contains(&result.confidence));
        }

        #[test]
        fn reversing_keeps_sum_to_one(request in arb_request()) {
            let mut reversed = request.clone();
            reversed.reverse();
            let result = WeightOptimizer::new().optimize(&reversed);
            prop_assert!((result.total() - 1.0).abs() < 1e-9);
        }
    }
}
