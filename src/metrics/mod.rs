//! Risk metrics for price series.

mod calculator;

pub use calculator::{RiskCalculator, DAILY_RISK_FREE_RATE, MOMENTUM_WINDOW};
