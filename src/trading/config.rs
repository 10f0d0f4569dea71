//! Strategy and risk-limit configuration.

use std::str::FromStr;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TRADESIG_";

/// Strategy parameters, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyParameters {
    /// Stop distance below entry as a fraction of price (0.0 to 1.0)
    pub stop_loss_multiplier: f64,

    /// Fibonacci-style take-profit levels; the third one sets the target
    pub take_profit_levels: Vec<f64>,

    /// Minimum confidence both predictions must reach
    pub min_confidence: f64,

    /// Maximum notional for a single position
    pub max_position_size: f64,

    /// Interval between strategy re-tunes in milliseconds
    pub rebalance_interval: u64,
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            stop_loss_multiplier: 0.02,                           // 2% stop
            take_profit_levels: vec![0.236, 0.382, 0.5, 0.618, 0.786],
            min_confidence: 0.75,
            max_position_size: 100_000.0,
            rebalance_interval: 3_600_000,                        // 1 hour
        }
    }
}

impl StrategyParameters {
    /// Defaults overlaid with `TRADESIG_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut params = Self::default();

        if let Some(v) = env_var::<f64>("STOP_LOSS_MULTIPLIER")? {
            params.stop_loss_multiplier = v;
        }
        if let Some(raw) = env_raw("TAKE_PROFIT_LEVELS") {
            params.take_profit_levels = raw
                .split(',')
                .map(|s| s.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Invalid {}TAKE_PROFIT_LEVELS: {}", ENV_PREFIX, raw))?;
        }
        if let Some(v) = env_var::<f64>("MIN_CONFIDENCE")? {
            params.min_confidence = v;
        }
        if let Some(v) = env_var::<f64>("MAX_POSITION_SIZE")? {
            params.max_position_size = v;
        }
        if let Some(v) = env_var::<u64>("REBALANCE_INTERVAL_MS")? {
            params.rebalance_interval = v;
        }

        params.validate()?;
        Ok(params)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.stop_loss_multiplier > 0.0 && self.stop_loss_multiplier < 1.0,
            "Stop-loss multiplier must be in (0, 1), got {}",
            self.stop_loss_multiplier
        );
        ensure!(
            self.take_profit_levels.len() >= 3,
            "Need at least three take-profit levels, got {}",
            self.take_profit_levels.len()
        );
        ensure!(
            self.take_profit_levels.iter().all(|l| l.is_finite() && *l > 0.0),
            "Take-profit levels must be positive"
        );
        ensure!(
            (0.0..=1.0).contains(&self.min_confidence),
            "Minimum confidence must be in [0, 1], got {}",
            self.min_confidence
        );
        ensure!(
            self.max_position_size.is_finite() && self.max_position_size > 0.0,
            "Max position size must be positive, got {}",
            self.max_position_size
        );
        Ok(())
    }

    /// The take-profit level used for the order target.
    pub fn target_level(&self) -> Option<f64> {
        self.take_profit_levels.get(2).copied()
    }
}

/// Portfolio-wide risk limits enforced by the risk manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLimits {
    /// Maximum market drawdown tolerated (0.0 to 1.0)
    pub max_drawdown: f64,

    /// Total exposure cap as a multiple of max position size
    pub max_leverage: f64,

    /// Maximum market volatility tolerated
    pub volatility_threshold: f64,

    /// Maximum notional for a single position
    pub max_position_size: f64,

    /// Realized loss per UTC day after which trading stops
    pub daily_loss_limit: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_drawdown: 0.15,           // 15% drawdown
            max_leverage: 3.0,
            volatility_threshold: 0.25,
            max_position_size: 100_000.0,
            daily_loss_limit: 10_000.0,
        }
    }
}

impl RiskLimits {
    /// Defaults overlaid with `TRADESIG_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut limits = Self::default();

        if let Some(v) = env_var::<f64>("MAX_DRAWDOWN")? {
            limits.max_drawdown = v;
        }
        if let Some(v) = env_var::<f64>("MAX_LEVERAGE")? {
            limits.max_leverage = v;
        }
        if let Some(v) = env_var::<f64>("VOLATILITY_THRESHOLD")? {
            limits.volatility_threshold = v;
        }
        if let Some(v) = env_var::<f64>("MAX_POSITION_SIZE")? {
            limits.max_position_size = v;
        }
        if let Some(v) = env_var::<f64>("DAILY_LOSS_LIMIT")? {
            limits.daily_loss_limit = v;
        }

        limits.validate()?;
        Ok(limits)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("max drawdown", self.max_drawdown),
            ("max leverage", self.max_leverage),
            ("volatility threshold", self.volatility_threshold),
            ("max position size", self.max_position_size),
            ("daily loss limit", self.daily_loss_limit),
        ] {
            ensure!(
                value.is_finite() && value > 0.0,
                "Risk limit {} must be positive, got {}",
                name,
                value
            );
        }
        Ok(())
    }

    /// Largest total exposure allowed.
    pub fn max_exposure(&self) -> f64 {
        self.max_leverage * self.max_position_size
    }
}

fn env_raw(key: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, key)).ok()
}

fn env_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_raw(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid {}{}: {}", ENV_PREFIX, key, raw))
        })
        .transpose()
}
