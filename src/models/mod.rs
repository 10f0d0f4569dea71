//! Data models for observations, predictions, trades and risk metrics.

mod market;
mod metrics;
mod prediction;
mod trade;

pub use market::{prices, MarketObservation};
pub use metrics::{RiskMetrics, PLACEHOLDER_WIN_RATE};
pub use prediction::{ModelPrediction, PredictionRequest};
pub use trade::{TradeExecution, TradeSide};
