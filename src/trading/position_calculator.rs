//! Position sizing: optimizer-weighted notional, stop-loss and take-profit.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{MarketObservation, RiskMetrics};
use crate::optimizer::{AssetWeightInput, WeightOptimizer};

use super::StrategyParameters;

/// Share of observed volume used as the base notional.
pub const VOLUME_FRACTION: f64 = 0.01;

/// Share of observed volume used by the fallback sizing.
pub const FALLBACK_VOLUME_FRACTION: f64 = 0.005;

/// Fallback stop distance below price.
pub const FALLBACK_STOP_PCT: f64 = 0.02;

/// Fallback target distance above price.
pub const FALLBACK_TARGET_PCT: f64 = 0.05;

/// Concrete sizing for one trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionParameters {
    /// Notional in quote currency (0 to max position size)
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Calculator combining risk metrics, optimizer weight and strategy parameters.
pub struct PositionCalculator {
    params: StrategyParameters,
    optimizer: WeightOptimizer,
}

impl PositionCalculator {
    pub fn new(params: StrategyParameters) -> Self {
        Self {
            params,
            optimizer: WeightOptimizer::new(),
        }
    }

    pub fn params(&self) -> &StrategyParameters {
        &self.params
    }

    /// Size a position. Never fails: internal errors yield conservative parameters.
    ///
    /// # Arguments
    /// * `data` - Observation to size against (price and volume)
    /// * `confidence` - Prediction confidence (0.0 to 1.0)
    /// * `metrics` - Risk metrics for the analysis window
    pub fn calculate(
        &self,
        data: &MarketObservation,
        confidence: f64,
        metrics: &RiskMetrics,
    ) -> PositionParameters {
        match self.try_calculate(data, confidence, metrics) {
            Ok(params) => params,
            Err(e) => {
                warn!(
                    symbol = %data.symbol,
                    error = %e,
                    "Position calculation failed, using fallback sizing"
                );
                self.fallback(data, confidence)
            }
        }
    }

    /// Size a position, surfacing errors.
    ///
    /// The optimizer's risk input is the window's log-return volatility
    /// (`metrics.volatility`, clamped to [0, 1]). A single-asset request always
    /// renormalizes to weight 1, so it does not change the size.
    pub fn try_calculate(
        &self,
        data: &MarketObservation,
        confidence: f64,
        metrics: &RiskMetrics,
    ) -> Result<PositionParameters> {
        ensure!(data.is_well_formed(), "Malformed observation for {}", data.symbol);
        ensure!(
            confidence.is_finite() && (0.0..=1.0).contains(&confidence),
            "Confidence out of range: {}",
            confidence
        );
        let target_level = self
            .params
            .target_level()
            .context("Take-profit ladder has fewer than three levels")?;

        let assets = [AssetWeightInput::new(
            data.symbol.clone(),
            confidence,
            metrics.volatility.clamp(0.0, 1.0),
        )];
        let optimized = self.optimizer.optimize(&assets);
        let optimal_weight = optimized.weight_of(&data.symbol);

        let base_size = (data.volume * VOLUME_FRACTION).min(self.params.max_position_size);
        let size = base_size * optimal_weight * confidence;
        ensure!(size.is_finite() && size >= 0.0, "Degenerate position size {}", size);

        debug!(
            symbol = %data.symbol,
            base_size = base_size,
            weight = optimal_weight,
            size = size,
            "Position sized"
        );

        Ok(PositionParameters {
            size,
            stop_loss: data.price * (1.0 - self.params.stop_loss_multiplier),
            take_profit: data.price * (1.0 + target_level),
        })
    }

    /// Conservative sizing used when the main path fails.
    pub fn fallback(&self, data: &MarketObservation, confidence: f64) -> PositionParameters {
        let volume = if data.volume.is_finite() { data.volume.max(0.0) } else { 0.0 };
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let base_size = (volume * FALLBACK_VOLUME_FRACTION).min(self.params.max_position_size);
        PositionParameters {
            size: base_size * confidence,
            stop_loss: data.price * (1.0 - FALLBACK_STOP_PCT),
            take_profit: data.price * (1.0 + FALLBACK_TARGET_PCT),
        }
    }

    /// Target price for every configured take-profit level.
    pub fn take_profit_ladder(&self, price: f64) -> Vec<f64> {
        self.params
            .take_profit_levels
            .iter()
            .map(|level| price * (1.0 + level))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(volatility: f64) -> RiskMetrics {
        RiskMetrics {
            volatility,
            ..Default::default()
        }
    }

    #[test]
    fn test_calculate() {
        let calc = PositionCalculator::new(StrategyParameters::default());
        let data = MarketObservation::new("BTC", 110.0, 1_000_000.0);

        let params = calc.calculate(&data, 0.9, &metrics(0.0217));

        // Base 10_000, single-asset weight 1, confidence 0.9
        assert!((params.size - 9_000.0).abs() < 1e-6);
        assert!((params.stop_loss - 107.8).abs() < 1e-9);
        assert!((params.take_profit - 165.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_volatility_does_not_change_single_asset_size() {
        let calc = PositionCalculator::new(StrategyParameters::default());
        let data = MarketObservation::new("BTC", 110.0, 1_000_000.0);

        let calm = calc.try_calculate(&data, 0.9, &metrics(0.0)).unwrap();
        let wild = calc.try_calculate(&data, 0.9, &metrics(0.9)).unwrap();
        assert!((calm.size - wild.size).abs() < 1e-9);
        assert!((calm.size - 9_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_base_size_capped_by_max_position() {
        let calc = PositionCalculator::new(StrategyParameters {
            max_position_size: 5_000.0,
            ..Default::default()
        });
        let data = MarketObservation::new("BTC", 50.0, 10_000_000.0);

        let params = calc.calculate(&data, 1.0, &metrics(0.01));
        assert!(params.size <= 5_000.0 + 1e-9);
        assert!(params.size > 0.0);
    }

    #[test]
    fn test_fallback_on_bad_confidence() {
        let calc = PositionCalculator::new(StrategyParameters::default());
        let data = MarketObservation::new("BTC", 100.0, 1_000_000.0);

        let params = calc.calculate(&data, 1.5, &metrics(0.01));
        // Fallback: min(5_000, 100_000) * clamp(1.5) = 5_000
        assert!((params.size - 5_000.0).abs() < 1e-9);
        assert!((params.stop_loss - 98.0).abs() < 1e-9);
        assert!((params.take_profit - 105.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_on_short_ladder() {
        let params = StrategyParameters {
            take_profit_levels: vec![0.1],
            ..Default::default()
        };
        let calc = PositionCalculator::new(params);
        let data = MarketObservation::new("ETH", 200.0, 100_000.0);

        assert!(calc.try_calculate(&data, 0.8, &metrics(0.01)).is_err());
        let fallback = calc.calculate(&data, 0.8, &metrics(0.01));
        assert!((fallback.size - 400.0).abs() < 1e-9);
        assert!((fallback.take_profit - 210.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_confidence_sizes_nothing() {
        let calc = PositionCalculator::new(StrategyParameters::default());
        let data = MarketObservation::new("BTC", 100.0, 1_000_000.0);
        let params = calc.calculate(&data, 0.0, &metrics(0.01));
        assert_eq!(params.size, 0.0);
    }

    #[test]
    fn test_take_profit_ladder() {
        let calc = PositionCalculator::new(StrategyParameters::default());
        let ladder = calc.take_profit_ladder(100.0);
        assert_eq!(ladder.len(), 5);
        assert!((ladder[0] - 123.6).abs() < 1e-9);
        assert!((ladder[4] - 178.6).abs() < 1e-9);
        assert!(ladder.windows(2).all(|w| w[0] < w[1]));
    }
}
