//! Portfolio risk manager: circuit breakers on market risk, position size,
//! leverage and daily losses.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics::RiskCalculator;
use crate::models::{MarketObservation, RiskMetrics, TradeExecution};

use super::RiskLimits;

/// Multiple of the volatility threshold that trips the market-conditions breaker.
pub const MARKET_CONDITIONS_FACTOR: f64 = 1.5;

/// Why a trade was blocked.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskBreach {
    #[error("invalid trade input: {0}")]
    InvalidInput(String),

    #[error("volatility {volatility:.4} above threshold {threshold:.4}")]
    Volatility { volatility: f64, threshold: f64 },

    #[error("drawdown {drawdown:.4} above max {max:.4}")]
    Drawdown { drawdown: f64, max: f64 },

    #[error("position notional {notional:.2} above max {max:.2}")]
    PositionSize { notional: f64, max: f64 },

    #[error("exposure {exposure:.2} above leverage cap {max:.2}")]
    Leverage { exposure: f64, max: f64 },

    #[error("daily loss {loss:.2} reached limit {limit:.2}")]
    DailyLoss { loss: f64, limit: f64 },

    #[error("momentary volatility {momentary:.4} above {limit:.4}")]
    MarketConditions { momentary: f64, limit: f64 },
}

/// Coarse bucket for the current risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            RiskLevel::Low
        } else if score < 0.7 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk manager with running exposure bookkeeping.
///
/// One instance per strategy, or shared behind a lock.
#[derive(Debug, Clone)]
pub struct RiskManager {
    limits: RiskLimits,
    current_risk: f64,
    total_exposure: f64,
    daily_loss: f64,
    loss_day: Option<NaiveDate>,
}

impl Default for RiskManager {
    fn default() -> Self {
        Self::new(RiskLimits::default())
    }
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            current_risk: 0.0,
            total_exposure: 0.0,
            daily_loss: 0.0,
            loss_day: None,
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn total_exposure(&self) -> f64 {
        self.total_exposure
    }

    pub fn current_risk(&self) -> f64 {
        self.current_risk
    }

    /// Realized losses booked for the UTC day of `at`.
    pub fn daily_loss(&self, at: DateTime<Utc>) -> f64 {
        match self.loss_day {
            Some(day) if day == at.date_naive() => self.daily_loss,
            _ => 0.0,
        }
    }

    /// Run every circuit breaker against a proposed trade.
    ///
    /// Market metrics are computed over `series`. All checks must pass.
    pub fn check_trade(
        &self,
        series: &[MarketObservation],
        trade: &TradeExecution,
    ) -> Result<(), RiskBreach> {
        if series.is_empty() {
            return Err(RiskBreach::InvalidInput("empty market series".to_string()));
        }
        if !(trade.amount.is_finite() && trade.amount >= 0.0) {
            return Err(RiskBreach::InvalidInput(format!("amount {}", trade.amount)));
        }
        if !(trade.price.is_finite() && trade.price > 0.0) {
            return Err(RiskBreach::InvalidInput(format!("price {}", trade.price)));
        }

        let metrics = RiskCalculator::calculate(series);
        let notional = trade.notional();

        if metrics.volatility > self.limits.volatility_threshold {
            return Err(RiskBreach::Volatility {
                volatility: metrics.volatility,
                threshold: self.limits.volatility_threshold,
            });
        }

        if metrics.max_drawdown > self.limits.max_drawdown {
            return Err(RiskBreach::Drawdown {
                drawdown: metrics.max_drawdown,
                max: self.limits.max_drawdown,
            });
        }

        if notional > self.limits.max_position_size {
            return Err(RiskBreach::PositionSize {
                notional,
                max: self.limits.max_position_size,
            });
        }

        let new_exposure = self.total_exposure + notional;
        if new_exposure > self.limits.max_exposure() {
            return Err(RiskBreach::Leverage {
                exposure: new_exposure,
                max: self.limits.max_exposure(),
            });
        }

        let loss = self.daily_loss(trade.timestamp);
        if loss >= self.limits.daily_loss_limit {
            return Err(RiskBreach::DailyLoss {
                loss,
                limit: self.limits.daily_loss_limit,
            });
        }

        let momentary = metrics.momentary_volatility();
        let limit = self.limits.volatility_threshold * MARKET_CONDITIONS_FACTOR;
        if momentary > limit {
            return Err(RiskBreach::MarketConditions { momentary, limit });
        }

        Ok(())
    }

    /// Validate a trade and, on approval, add its notional to total exposure.
    pub fn validate_trade(&mut self, series: &[MarketObservation], trade: &TradeExecution) -> bool {
        match self.check_trade(series, trade) {
            Ok(()) => {
                self.total_exposure += trade.notional();
                debug!(
                    symbol = %trade.symbol,
                    notional = trade.notional(),
                    exposure = self.total_exposure,
                    "Trade approved"
                );
                true
            }
            Err(breach) => {
                info!(symbol = %trade.symbol, breach = %breach, "Trade blocked by risk limits");
                false
            }
        }
    }

    /// Weighted risk score: `0.3 * vol + 0.3 * (1 - sharpe / 3) + 0.4 * drawdown`.
    pub fn risk_score(metrics: &RiskMetrics) -> f64 {
        metrics.volatility * 0.3
            + (1.0 - metrics.sharpe_ratio / 3.0) * 0.3
            + metrics.max_drawdown * 0.4
    }

    /// Recompute and store the current risk score.
    pub fn update_risk_levels(&mut self, metrics: &RiskMetrics) -> f64 {
        self.current_risk = Self::risk_score(metrics);
        self.current_risk
    }

    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.current_risk)
    }

    /// Remove a closed position's notional from exposure.
    pub fn release_exposure(&mut self, notional: f64) {
        if notional.is_finite() {
            self.total_exposure = (self.total_exposure - notional.abs()).max(0.0);
        }
    }

    /// Set exposure from an external record, e.g. when resuming with open positions.
    pub fn restore_exposure(&mut self, exposure: f64) {
        if exposure.is_finite() {
            self.total_exposure = exposure.max(0.0);
        }
    }

    /// Book realized P&L; only losses count toward the daily limit.
    pub fn record_realized_pnl(&mut self, pnl: f64, at: DateTime<Utc>) {
        if !pnl.is_finite() {
            return;
        }

        let day = at.date_naive();
        if self.loss_day != Some(day) {
            self.loss_day = Some(day);
            self.daily_loss = 0.0;
        }
        if pnl < 0.0 {
            self.daily_loss += -pnl;
        }

        if self.daily_loss >= self.limits.daily_loss_limit {
            warn!(
                loss = self.daily_loss,
                limit = self.limits.daily_loss_limit,
                "Daily loss limit reached"
            );
        }
    }

    /// Reset exposure, risk score and daily losses.
    ///
    /// Does not cancel trades already emitted.
    pub fn emergency_stop(&mut self) {
        self.total_exposure = 0.0;
        self.current_risk = 0.0;
        self.daily_loss = 0.0;
        self.loss_day = None;
        warn!("Emergency stop activated - risk bookkeeping reset");
    }
}
