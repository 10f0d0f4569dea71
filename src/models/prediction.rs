//! Directional predictions exchanged with signal providers.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MarketObservation, TradeSide};

/// Request sent to a prediction provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Asset symbol to predict
    pub asset: String,

    /// Bar timeframe (e.g. "1h")
    pub timeframe: String,

    /// Indicator families the provider should weigh
    pub indicators: BTreeSet<String>,

    /// Snapshot of the analysis window, oldest first
    #[serde(default)]
    pub observations: Vec<MarketObservation>,
}

impl PredictionRequest {
    pub fn new(
        asset: impl Into<String>,
        timeframe: impl Into<String>,
        indicators: &[&str],
    ) -> Self {
        Self {
            asset: asset.into(),
            timeframe: timeframe.into(),
            indicators: indicators.iter().map(|s| s.to_string()).collect(),
            observations: Vec::new(),
        }
    }

    /// Attach the analysis window.
    pub fn with_observations(mut self, observations: &[MarketObservation]) -> Self {
        self.observations = observations.to_vec();
        self
    }
}

/// A provider's directional call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    /// Predicted direction
    pub prediction: TradeSide,

    /// Certainty in the call (0.0 to 1.0)
    pub confidence: f64,

    /// When the prediction was made
    pub timestamp: DateTime<Utc>,

    /// Free-form explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ModelPrediction {
    /// Build a prediction, clamping confidence into [0, 1].
    pub fn new(prediction: TradeSide, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            prediction,
            confidence,
            timestamp: Utc::now(),
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// True when both predictions call the same direction and each clears `min_confidence`.
    pub fn agrees_with(&self, other: &ModelPrediction, min_confidence: f64) -> bool {
        self.prediction == other.prediction
            && self.confidence >= min_confidence
            && other.confidence >= min_confidence
    }
}
