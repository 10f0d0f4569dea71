//! Technical analysis: Fibonacci retracements, pivot levels, Tesla waves and
//! Gartley harmonic pattern detection.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::metrics::RiskCalculator;
use crate::models::{prices, MarketObservation};

/// Retracement ratios, low to high.
pub const FIBONACCI_RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

/// Moving-average periods for the primary, secondary and tertiary waves.
pub const TESLA_PERIODS: [usize; 3] = [3, 7, 11];

/// Ideal Gartley leg ratios: XA, AB, BC, CD.
pub const GARTLEY_RATIOS: [f64; 4] = [1.0, 0.618, 0.382, 1.272];

/// Absolute tolerance on each Gartley ratio.
pub const GARTLEY_TOLERANCE: f64 = 0.1;

/// Pivot-derived support and resistance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPoints {
    pub pivot: f64,
    pub support: f64,
    pub resistance: f64,
}

/// Fixed-period moving averages of the trailing prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeslaWaves {
    pub primary_wave: f64,
    pub secondary_wave: f64,
    pub tertiary_wave: f64,
}

/// A matched harmonic pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicPattern {
    /// Pattern name (only "Gartley" is detected)
    pub pattern: String,

    /// Match quality (0.0 to 1.0)
    pub confidence: f64,

    /// Projected price
    pub price_target: f64,
}

/// Everything the analyzer can say about a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub high: f64,
    pub low: f64,
    pub pivots: PivotPoints,
    pub fibonacci: [f64; 7],
    pub waves: TeslaWaves,
    pub harmonic: Option<HarmonicPattern>,
}

/// Stateless technical analyzer.
pub struct TechnicalAnalyzer;

impl TechnicalAnalyzer {
    /// Retracement levels `low + (high - low) * ratio` for each Fibonacci ratio.
    pub fn fibonacci_levels(high: f64, low: f64) -> Result<[f64; 7]> {
        ensure!(high.is_finite() && low.is_finite(), "Non-finite price range");
        ensure!(high >= low, "High {} below low {}", high, low);

        let diff = high - low;
        let mut levels = FIBONACCI_RATIOS.map(|ratio| (low + diff * ratio).clamp(low, high));
        // Rounding must not move the top level off the range
        levels[0] = low;
        levels[6] = high;
        Ok(levels)
    }

    /// Classic floor-trader pivot using the series high, low and last close.
    ///
    /// Returns `None` for an empty series.
    pub fn pivot_points(series: &[MarketObservation]) -> Option<PivotPoints> {
        let (high, low) = Self::range(series)?;
        let close = series.last()?.price;

        let pivot = (high + low + close) / 3.0;
        Some(PivotPoints {
            pivot,
            support: 2.0 * pivot - high,
            resistance: 2.0 * pivot - low,
        })
    }

    /// Moving averages over the last 3, 7 and 11 prices.
    ///
    /// The divisor is always the fixed period, even when the series is shorter.
    pub fn tesla_waves(series: &[MarketObservation]) -> Option<TeslaWaves> {
        if series.is_empty() {
            return None;
        }

        let prices = prices(series);
        let [primary_wave, secondary_wave, tertiary_wave] = TESLA_PERIODS.map(|period| {
            let start = prices.len().saturating_sub(period);
            prices[start..].iter().sum::<f64>() / period as f64
        });

        Some(TeslaWaves {
            primary_wave,
            secondary_wave,
            tertiary_wave,
        })
    }

    /// Detect a Gartley pattern in the first four price legs.
    ///
    /// Needs at least five prices. Any leg ratio that is undefined (zero leg) or
    /// outside tolerance yields `None`.
    pub fn harmonic_pattern(series: &[MarketObservation]) -> Option<HarmonicPattern> {
        let prices = prices(series);
        if prices.len() < 5 {
            return None;
        }

        let moves: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
        let actual = [
            1.0,
            (moves[1] / moves[0]).abs(),
            (moves[2] / moves[1]).abs(),
            (moves[3] / moves[2]).abs(),
        ];

        let matched = actual
            .iter()
            .zip(GARTLEY_RATIOS.iter())
            .all(|(a, ideal)| a.is_finite() && (a - ideal).abs() <= GARTLEY_TOLERANCE);
        if !matched {
            return None;
        }

        let avg_deviation = actual
            .iter()
            .zip(GARTLEY_RATIOS.iter())
            .map(|(a, ideal)| (a - ideal).abs() / ideal)
            .sum::<f64>()
            / GARTLEY_RATIOS.len() as f64;
        let confidence = (1.0 - avg_deviation).max(0.0);

        let last_price = *prices.last()?;
        let volatility = RiskCalculator::volatility(&RiskCalculator::log_returns(&prices));

        Some(HarmonicPattern {
            pattern: "Gartley".to_string(),
            confidence,
            price_target: last_price * (1.0 + volatility * confidence),
        })
    }

    /// Run every analysis over the series. `None` for an empty series.
    pub fn snapshot(series: &[MarketObservation]) -> Option<TechnicalSnapshot> {
        let (high, low) = Self::range(series)?;

        Some(TechnicalSnapshot {
            high,
            low,
            pivots: Self::pivot_points(series)?,
            fibonacci: Self::fibonacci_levels(high, low).ok()?,
            waves: Self::tesla_waves(series)?,
            harmonic: Self::harmonic_pattern(series),
        })
    }

    fn range(series: &[MarketObservation]) -> Option<(f64, f64)> {
        if series.is_empty() {
            return None;
        }
        let high = series.iter().map(|o| o.price).fold(f64::NEG_INFINITY, f64::max);
        let low = series.iter().map(|o| o.price).fold(f64::INFINITY, f64::min);
        Some((high, low))
    }
}
