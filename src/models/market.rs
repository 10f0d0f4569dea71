//! Market observation model: one price/volume print for a symbol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single market data point supplied by the data feed.
///
/// The pipeline receives these as a slice ordered oldest to newest and never
/// mutates or stores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketObservation {
    /// Instrument symbol (e.g. "BTC-USD")
    pub symbol: String,

    /// Last traded price (> 0)
    pub price: f64,

    /// Traded volume for the observation window (>= 0)
    #[serde(default)]
    pub volume: f64,

    /// When the observation was taken
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl MarketObservation {
    /// Create an observation stamped with the current time.
    pub fn new(symbol: impl Into<String>, price: f64, volume: f64) -> Self {
        Self::at(symbol, price, volume, Utc::now())
    }

    /// Create an observation with an explicit timestamp.
    pub fn at(
        symbol: impl Into<String>,
        price: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            volume,
            timestamp,
        }
    }

    /// Check that the observation can be used for analysis.
    ///
    /// Requires a non-empty symbol, a finite positive price and a finite
    /// non-negative volume.
    pub fn is_well_formed(&self) -> bool {
        !self.symbol.trim().is_empty()
            && self.price.is_finite()
            && self.price > 0.0
            && self.volume.is_finite()
            && self.volume >= 0.0
    }
}

/// Extract the price column of a series.
pub fn prices(series: &[MarketObservation]) -> Vec<f64> {
    series.iter().map(|o| o.price).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed() {
        assert!(MarketObservation::new("BTC", 100.0, 0.0).is_well_formed());
        assert!(!MarketObservation::new("", 100.0, 10.0).is_well_formed());
        assert!(!MarketObservation::new("  ", 100.0, 10.0).is_well_formed());
        assert!(!MarketObservation::new("BTC", f64::NAN, 10.0).is_well_formed());
        assert!(!MarketObservation::new("BTC", 0.0, 10.0).is_well_formed());
        assert!(!MarketObservation::new("BTC", 100.0, -1.0).is_well_formed());
        assert!(!MarketObservation::new("BTC", 100.0, f64::INFINITY).is_well_formed());
    }

    #[test]
    fn test_prices_preserve_order() {
        let series = vec![
            MarketObservation::new("ETH", 10.0, 1.0),
            MarketObservation::new("ETH", 12.0, 1.0),
            MarketObservation::new("ETH", 11.0, 1.0),
        ];
        assert_eq!(prices(&series), vec![10.0, 12.0, 11.0]);
    }
}
