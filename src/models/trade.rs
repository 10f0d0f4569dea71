//! Trade decision emitted by the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a trade or of a model's directional call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
    Hold,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
            TradeSide::Hold => "hold",
        }
    }

    /// Parse a side from user input. Unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "long" => Some(Self::Buy),
            "sell" | "short" => Some(Self::Sell),
            "hold" | "flat" => Some(Self::Hold),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final, risk-checked trade order. Owned by the caller once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeExecution {
    /// Instrument symbol
    pub symbol: String,

    /// Entry side
    pub side: TradeSide,

    /// Quantity in base units
    pub amount: f64,

    /// Reference entry price
    pub price: f64,

    /// When the decision was made
    pub timestamp: DateTime<Utc>,

    /// Protective stop price
    pub stop_loss: f64,

    /// Profit target price
    pub take_profit: f64,
}

impl TradeExecution {
    /// Notional value of the order (amount * price).
    pub fn notional(&self) -> f64 {
        self.amount * self.price
    }

    /// Distance from entry to stop as a fraction of the entry price.
    pub fn risk_pct(&self) -> f64 {
        if self.price <= 0.0 {
            return 0.0;
        }
        ((self.price - self.stop_loss) / self.price).abs()
    }

    /// Reward-to-risk ratio between take-profit and stop distances.
    pub fn reward_to_risk(&self) -> f64 {
        let risk = (self.price - self.stop_loss).abs();
        if risk == 0.0 {
            return 0.0;
        }
        (self.take_profit - self.price).abs() / risk
    }
}
