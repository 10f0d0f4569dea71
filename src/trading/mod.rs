//! Trading logic: configuration, risk management, position sizing, signal
//! providers and the strategy orchestrator.

mod config;
mod position_calculator;
mod provider;
mod risk_manager;
mod strategy;

pub use config::{RiskLimits, StrategyParameters, ENV_PREFIX};
pub use position_calculator::{PositionCalculator, PositionParameters};
pub use provider::{FixedPredictor, MomentumPredictor, PredictionProvider, TechnicalPredictor};
pub use risk_manager::{RiskBreach, RiskLevel, RiskManager, MARKET_CONDITIONS_FACTOR};
pub use strategy::{TradingStrategy, PREDICTION_TIMEFRAME, PRIMARY_INDICATORS, SECONDARY_INDICATORS};
