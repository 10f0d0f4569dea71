//! Prediction providers: the directional signal sources the strategy consults.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::analysis::TechnicalAnalyzer;
use crate::metrics::RiskCalculator;
use crate::models::{ModelPrediction, PredictionRequest, TradeSide};

/// A source of directional predictions.
///
/// Implementations must return `Err` on failure rather than a `hold` call.
#[async_trait]
pub trait PredictionProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Predict the direction for the requested asset.
    async fn predict(&self, request: &PredictionRequest) -> Result<ModelPrediction>;
}

/// Always returns the same call.
#[derive(Debug, Clone)]
pub struct FixedPredictor {
    name: String,
    side: TradeSide,
    confidence: f64,
}

impl FixedPredictor {
    pub fn new(name: impl Into<String>, side: TradeSide, confidence: f64) -> Self {
        Self {
            name: name.into(),
            side,
            confidence,
        }
    }
}

#[async_trait]
impl PredictionProvider for FixedPredictor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, _request: &PredictionRequest) -> Result<ModelPrediction> {
        Ok(ModelPrediction::new(self.side, self.confidence).with_reasoning("fixed signal"))
    }
}

/// Follows the sign of short-window momentum.
///
/// Confidence rises from 0.5 toward 1.0 as momentum dominates volatility.
#[derive(Debug, Clone, Default)]
pub struct MomentumPredictor;

#[async_trait]
impl PredictionProvider for MomentumPredictor {
    fn name(&self) -> &str {
        "momentum"
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<ModelPrediction> {
        if request.observations.len() < 2 {
            bail!("Momentum needs at least two observations for {}", request.asset);
        }

        let metrics = RiskCalculator::calculate(&request.observations);
        let momentum = metrics.momentum;
        if !momentum.is_finite() {
            bail!("Momentum undefined for {}", request.asset);
        }
        if momentum == 0.0 {
            return Ok(ModelPrediction::new(TradeSide::Hold, 0.5).with_reasoning("flat momentum"));
        }

        let side = if momentum > 0.0 { TradeSide::Buy } else { TradeSide::Sell };
        let strength = momentum.abs() / (metrics.volatility + momentum.abs());

        Ok(ModelPrediction::new(side, 0.5 + 0.5 * strength).with_reasoning(format!(
            "momentum {:.5} vs volatility {:.5}",
            momentum, metrics.volatility
        )))
    }
}

/// Compares the last price with the primary Tesla wave inside the pivot band.
#[derive(Debug, Clone, Default)]
pub struct TechnicalPredictor;

#[async_trait]
impl PredictionProvider for TechnicalPredictor {
    fn name(&self) -> &str {
        "technical"
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<ModelPrediction> {
        let snapshot = TechnicalAnalyzer::snapshot(&request.observations)
            .with_context(|| format!("No observations for {}", request.asset))?;
        let last = request
            .observations
            .last()
            .map(|o| o.price)
            .context("No last price")?;

        let wave = snapshot.waves.primary_wave;
        let side = if last > wave {
            TradeSide::Buy
        } else if last < wave {
            TradeSide::Sell
        } else {
            TradeSide::Hold
        };

        let band = snapshot.pivots.resistance - snapshot.pivots.support;
        let distance = if band > 0.0 {
            ((last - wave).abs() / band).min(1.0)
        } else {
            0.0
        };

        let mut confidence = 0.5 + 0.4 * distance;
        let mut reasoning = format!("last {:.4} vs wave {:.4}", last, wave);
        if let Some(pattern) = &snapshot.harmonic {
            confidence += 0.1 * pattern.confidence;
            reasoning.push_str(&format!(
                ", {} target {:.4}",
                pattern.pattern, pattern.price_target
            ));
        }

        Ok(ModelPrediction::new(side, confidence).with_reasoning(reasoning))
    }
}
