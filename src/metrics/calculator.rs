//! Calculator for market risk metrics: log-returns, volatility, drawdown, momentum.

use statrs::statistics::Statistics;

use crate::models::{prices, MarketObservation, RiskMetrics, PLACEHOLDER_WIN_RATE};

/// Number of trailing returns averaged into momentum.
pub const MOMENTUM_WINDOW: usize = 5;

/// Daily risk-free rate assumed by the Sharpe ratio (2% annual over 252 sessions).
pub const DAILY_RISK_FREE_RATE: f64 = 0.02 / 252.0;

/// Calculator for computing risk metrics from a price series.
pub struct RiskCalculator;

impl RiskCalculator {
    /// Calculate all risk metrics for an observation window (oldest first).
    pub fn calculate(series: &[MarketObservation]) -> RiskMetrics {
        let prices = prices(series);
        Self::from_prices(&prices, series.last().map(|o| o.volume).unwrap_or(0.0))
    }

    /// Calculate risk metrics from raw prices and the latest volume.
    pub fn from_prices(prices: &[f64], latest_volume: f64) -> RiskMetrics {
        let returns = Self::log_returns(prices);

        RiskMetrics {
            volatility: Self::volatility(&returns),
            max_drawdown: Self::max_drawdown(prices),
            volume: latest_volume,
            momentum: Self::momentum(&returns),
            sharpe_ratio: Self::sharpe_ratio(&returns),
            win_rate: PLACEHOLDER_WIN_RATE,
            last_return: returns.last().copied().unwrap_or(0.0),
        }
    }

    /// Log-returns between consecutive prices: `ln(p[i+1] / p[i])`.
    pub fn log_returns(prices: &[f64]) -> Vec<f64> {
        prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
    }

    /// Population standard deviation of returns. Zero for fewer than two returns.
    pub fn volatility(returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }

        let std_dev = returns.population_std_dev();
        if std_dev.is_finite() {
            std_dev
        } else {
            0.0
        }
    }

    /// Maximum drawdown as a fraction of the running peak.
    pub fn max_drawdown(prices: &[f64]) -> f64 {
        let Some(&first) = prices.first() else {
            return 0.0;
        };

        let mut peak = first;
        let mut max_dd = 0.0f64;

        for &price in prices {
            if price > peak {
                peak = price;
            }

            if peak > 0.0 {
                let dd = (peak - price) / peak;
                if dd > max_dd {
                    max_dd = dd;
                }
            }
        }

        max_dd.clamp(0.0, 1.0)
    }

    /// Mean of the last five returns (fewer if not available).
    pub fn momentum(returns: &[f64]) -> f64 {
        let start = returns.len().saturating_sub(MOMENTUM_WINDOW);
        let recent = &returns[start..];
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().sum::<f64>() / recent.len() as f64
    }

    /// Sharpe-style ratio: excess mean return divided by `sqrt(volatility)`.
    ///
    /// Zero when there are no returns or the series is flat.
    pub fn sharpe_ratio(returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }

        let mean = returns.mean();
        let scale = Self::volatility(returns).sqrt();
        if scale > 0.0 {
            (mean - DAILY_RISK_FREE_RATE) / scale
        } else {
            0.0
        }
    }
}
