//! Risk metrics derived from a price series.

use serde::{Deserialize, Serialize};

/// Win rate used until realized trade history is available.
pub const PLACEHOLDER_WIN_RATE: f64 = 0.65;

/// Market risk measures for one analysis window.
///
/// Recomputed on every analysis call; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    /// Population standard deviation of log-returns
    pub volatility: f64,

    /// Maximum peak-to-trough drawdown (0.0 to 1.0)
    pub max_drawdown: f64,

    /// Volume of the most recent observation
    pub volume: f64,

    /// Mean of the last five log-returns
    pub momentum: f64,

    /// Excess mean return over the daily risk-free rate, scaled by sqrt(volatility)
    pub sharpe_ratio: f64,

    /// Fraction of winning trades
    pub win_rate: f64,

    /// Most recent log-return (0 when fewer than two prices)
    pub last_return: f64,
}

impl Default for RiskMetrics {
    fn default() -> Self {
        Self {
            volatility: 0.0,
            max_drawdown: 0.0,
            volume: 0.0,
            momentum: 0.0,
            sharpe_ratio: 0.0,
            win_rate: PLACEHOLDER_WIN_RATE,
            last_return: 0.0,
        }
    }
}

impl RiskMetrics {
    /// Magnitude of the latest price move, used as the momentary volatility.
    pub fn momentary_volatility(&self) -> f64 {
        self.last_return.abs()
    }
}
