//! Trading strategy orchestrator.
//!
//! Each `analyze` call:
//! - validates the observation window
//! - asks both prediction providers concurrently and requires agreement
//! - sizes the position from risk metrics and the weight optimizer
//! - submits the proposed trade to the risk manager
//!
//! A wall-clock-gated tuning pass runs before analysis when the rebalance
//! interval has elapsed; its failures are logged and ignored.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::analysis::TechnicalAnalyzer;
use crate::metrics::RiskCalculator;
use crate::models::{MarketObservation, ModelPrediction, PredictionRequest, TradeExecution};
use crate::optimizer::{StrategyTuner, TuningOutcome, TuningState};

use super::{PositionCalculator, PredictionProvider, RiskLimits, RiskManager, StrategyParameters};

/// Timeframe requested from the providers.
pub const PREDICTION_TIMEFRAME: &str = "1h";

/// Indicators requested from the primary provider.
pub const PRIMARY_INDICATORS: [&str; 3] = ["trend", "momentum", "volatility"];

/// Indicators requested from the secondary provider.
pub const SECONDARY_INDICATORS: [&str; 3] = ["sentiment", "volume", "correlation"];

/// Signal pipeline from market observations to a risk-checked order.
pub struct TradingStrategy {
    params: StrategyParameters,
    primary: Arc<dyn PredictionProvider>,
    secondary: Arc<dyn PredictionProvider>,
    risk_manager: Arc<RwLock<RiskManager>>,
    position_calculator: PositionCalculator,
    tuner: StrategyTuner,

    // Tuning state
    tuning: RwLock<TuningState>,
    last_tuning: RwLock<Option<TuningOutcome>>,
    last_optimization: RwLock<Option<DateTime<Utc>>>,
}

impl TradingStrategy {
    /// Create a strategy that owns its risk manager.
    pub fn new(
        params: StrategyParameters,
        limits: RiskLimits,
        primary: Arc<dyn PredictionProvider>,
        secondary: Arc<dyn PredictionProvider>,
    ) -> Result<Self> {
        limits.validate()?;
        let risk_manager = Arc::new(RwLock::new(RiskManager::new(limits)));
        Self::with_risk_manager(params, risk_manager, primary, secondary)
    }

    /// Create a strategy sharing a risk manager with other strategies.
    pub fn with_risk_manager(
        params: StrategyParameters,
        risk_manager: Arc<RwLock<RiskManager>>,
        primary: Arc<dyn PredictionProvider>,
        secondary: Arc<dyn PredictionProvider>,
    ) -> Result<Self> {
        params.validate()?;

        Ok(Self {
            position_calculator: PositionCalculator::new(params.clone()),
            params,
            primary,
            secondary,
            risk_manager,
            tuner: StrategyTuner::default(),
            tuning: RwLock::new(TuningState::default()),
            last_tuning: RwLock::new(None),
            last_optimization: RwLock::new(None),
        })
    }

    pub fn params(&self) -> &StrategyParameters {
        &self.params
    }

    /// Handle to the risk manager, for inspection or sharing.
    pub fn risk_manager(&self) -> Arc<RwLock<RiskManager>> {
        self.risk_manager.clone()
    }

    /// Result of the most recent tuning pass.
    pub async fn last_tuning(&self) -> Option<TuningOutcome> {
        self.last_tuning.read().await.clone()
    }

    /// When the last successful tuning pass ran.
    pub async fn last_optimization(&self) -> Option<DateTime<Utc>> {
        *self.last_optimization.read().await
    }

    /// Reset the risk manager's bookkeeping.
    pub async fn emergency_stop(&self) {
        self.risk_manager.write().await.emergency_stop();
    }

    /// Analyze a window of observations (oldest first) at the current time.
    pub async fn analyze(&self, data: &[MarketObservation]) -> Option<TradeExecution> {
        self.analyze_at(data, Utc::now()).await
    }

    /// Analyze with an explicit clock reading.
    ///
    /// Returns `None` whenever no trade should be placed.
    pub async fn analyze_at(
        &self,
        data: &[MarketObservation],
        now: DateTime<Utc>,
    ) -> Option<TradeExecution> {
        self.check_optimization(data, now).await;

        if !Self::validate_market_data(data) {
            warn!(observations = data.len(), "Invalid market data provided");
            return None;
        }
        let latest = data.last()?;

        if let Some(snapshot) = TechnicalAnalyzer::snapshot(data) {
            debug!(
                symbol = %latest.symbol,
                support = snapshot.pivots.support,
                resistance = snapshot.pivots.resistance,
                harmonic = snapshot.harmonic.is_some(),
                "Technical snapshot"
            );
        }

        let (primary, secondary) = match self.get_predictions(data).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(symbol = %latest.symbol, error = %e, "Prediction provider failed");
                return None;
            }
        };

        if !primary.agrees_with(&secondary, self.params.min_confidence) {
            debug!(
                symbol = %latest.symbol,
                primary = %primary.prediction,
                primary_confidence = primary.confidence,
                secondary = %secondary.prediction,
                secondary_confidence = secondary.confidence,
                "Predictions do not agree"
            );
            return None;
        }

        let metrics = RiskCalculator::calculate(data);
        let position = self
            .position_calculator
            .calculate(latest, primary.confidence, &metrics);

        let amount = position.size / latest.price;
        if !(amount.is_finite() && amount > 0.0) {
            debug!(symbol = %latest.symbol, size = position.size, "Position size is zero");
            return None;
        }

        let trade = TradeExecution {
            symbol: latest.symbol.clone(),
            side: primary.prediction,
            amount,
            price: latest.price,
            timestamp: now,
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
        };

        {
            let mut risk = self.risk_manager.write().await;
            risk.update_risk_levels(&metrics);
            if !risk.validate_trade(data, &trade) {
                return None;
            }
        }

        info!(
            symbol = %trade.symbol,
            side = %trade.side,
            amount = trade.amount,
            price = trade.price,
            stop_loss = trade.stop_loss,
            take_profit = trade.take_profit,
            risk_pct = trade.risk_pct(),
            reward_to_risk = trade.reward_to_risk(),
            "Trade signal generated"
        );

        Some(trade)
    }

    fn validate_market_data(data: &[MarketObservation]) -> bool {
        !data.is_empty() && data.iter().all(MarketObservation::is_well_formed)
    }

    async fn get_predictions(
        &self,
        data: &[MarketObservation],
    ) -> Result<(ModelPrediction, ModelPrediction)> {
        let symbol = data.last().map(|o| o.symbol.as_str()).unwrap_or_default();

        let primary_request =
            PredictionRequest::new(symbol, PREDICTION_TIMEFRAME, &PRIMARY_INDICATORS)
                .with_observations(data);
        let secondary_request =
            PredictionRequest::new(symbol, PREDICTION_TIMEFRAME, &SECONDARY_INDICATORS)
                .with_observations(data);

        let (primary, secondary) = tokio::try_join!(
            self.primary.predict(&primary_request),
            self.secondary.predict(&secondary_request)
        )?;

        debug!(
            primary = self.primary.name(),
            secondary = self.secondary.name(),
            "Predictions received"
        );
        Ok((primary, secondary))
    }

    /// Run the tuner if the rebalance interval has elapsed.
    async fn check_optimization(&self, data: &[MarketObservation], now: DateTime<Utc>) {
        let due = match *self.last_optimization.read().await {
            None => true,
            Some(last) => {
                let interval = i64::try_from(self.params.rebalance_interval).unwrap_or(i64::MAX);
                (now - last).num_milliseconds() > interval
            }
        };
        if !due {
            return;
        }

        let current = self.tuning.read().await.clone();
        match self.tuner.tune(&current, data.len()) {
            Ok(outcome) => {
                info!(
                    depth = outcome.state.depth,
                    iterations = outcome.iterations,
                    converged = outcome.converged,
                    "Strategy parameters re-tuned"
                );
                *self.tuning.write().await = outcome.state.clone();
                *self.last_tuning.write().await = Some(outcome);
                *self.last_optimization.write().await = Some(now);
            }
            Err(e) => {
                warn!(error = %e, "Strategy optimization failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeSide;
    use crate::trading::FixedPredictor;
    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::Duration;

    struct FailingPredictor;

    #[async_trait]
    impl PredictionProvider for FailingPredictor {
        fn name(&self) -> &str {
            "failing"
        }

        async fn predict(&self, _request: &PredictionRequest) -> Result<ModelPrediction> {
            bail!("model unavailable")
        }
    }

    fn series(prices: &[f64]) -> Vec<MarketObservation> {
        prices
            .iter()
            .map(|&p| MarketObservation::new("BTC", p, 1_000_000.0))
            .collect()
    }

    fn strategy(a: (TradeSide, f64), b: (TradeSide, f64)) -> TradingStrategy {
        TradingStrategy::new(
            StrategyParameters::default(),
            RiskLimits::default(),
            Arc::new(FixedPredictor::new("a", a.0, a.1)),
            Arc::new(FixedPredictor::new("b", b.0, b.1)),
        )
        .unwrap()
    }

    const CALM: [f64; 5] = [100.0, 102.0, 101.0, 105.0, 110.0];

    #[tokio::test]
    async fn test_agreeing_buy() {
        let strategy = strategy((TradeSide::Buy, 0.9), (TradeSide::Buy, 0.9));
        let trade = strategy.analyze(&series(&CALM)).await.unwrap();

        assert_eq!(trade.side, TradeSide::Buy);
        assert_eq!(trade.price, 110.0);
        assert!((trade.notional() - 9_000.0).abs() < 1e-6);
        assert!(trade.stop_loss < trade.price);
        assert!(trade.take_profit > trade.price);

        let exposure = strategy.risk_manager().read().await.total_exposure();
        assert!((exposure - 9_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_disagreement_is_no_trade() {
        let strategy = strategy((TradeSide::Buy, 0.9), (TradeSide::Sell, 0.9));
        assert!(strategy.analyze(&series(&CALM)).await.is_none());
        assert_eq!(strategy.risk_manager().read().await.total_exposure(), 0.0);
    }

    #[tokio::test]
    async fn test_low_confidence_is_no_trade() {
        let strategy = strategy((TradeSide::Buy, 0.9), (TradeSide::Buy, 0.7));
        assert!(strategy.analyze(&series(&CALM)).await.is_none());
    }

    #[tokio::test]
    async fn test_agreed_hold_is_emitted() {
        let strategy = strategy((TradeSide::Hold, 0.9), (TradeSide::Hold, 0.9));
        let trade = strategy.analyze(&series(&CALM)).await.unwrap();

        assert_eq!(trade.side, TradeSide::Hold);
        assert_eq!(trade.price, 110.0);
        assert!((trade.notional() - 9_000.0).abs() < 1e-6);

        // Goes through risk validation like any other side
        let exposure = strategy.risk_manager().read().await.total_exposure();
        assert!((exposure - 9_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_provider_failure_aborts() {
        let strategy = TradingStrategy::new(
            StrategyParameters::default(),
            RiskLimits::default(),
            Arc::new(FixedPredictor::new("a", TradeSide::Buy, 0.9)),
            Arc::new(FailingPredictor),
        )
        .unwrap();
        assert!(strategy.analyze(&series(&CALM)).await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_market_data() {
        let strategy = strategy((TradeSide::Buy, 0.9), (TradeSide::Buy, 0.9));
        assert!(strategy.analyze(&[]).await.is_none());

        let mut data = series(&CALM);
        data[2].symbol = String::new();
        assert!(strategy.analyze(&data).await.is_none());

        let mut data = series(&CALM);
        data[1].price = f64::NAN;
        assert!(strategy.analyze(&data).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_volume_is_no_trade() {
        let strategy = strategy((TradeSide::Buy, 0.9), (TradeSide::Buy, 0.9));
        let data: Vec<MarketObservation> = CALM
            .iter()
            .map(|&p| MarketObservation::new("BTC", p, 0.0))
            .collect();
        assert!(strategy.analyze(&data).await.is_none());
    }

    #[tokio::test]
    async fn test_retune_is_interval_gated() {
        let strategy = strategy((TradeSide::Buy, 0.9), (TradeSide::Buy, 0.9));
        let start = Utc::now();
        let data = series(&CALM);

        strategy.analyze_at(&data, start).await;
        assert_eq!(strategy.last_optimization().await, Some(start));
        let outcome = strategy.last_tuning().await.unwrap();
        assert_eq!(outcome.state.depth, StrategyTuner::target_depth(data.len()));

        // Within the interval: no re-tune
        strategy.analyze_at(&data, start + Duration::minutes(30)).await;
        assert_eq!(strategy.last_optimization().await, Some(start));

        // Past the interval
        let later = start + Duration::minutes(61);
        strategy.analyze_at(&data, later).await;
        assert_eq!(strategy.last_optimization().await, Some(later));
    }

    #[tokio::test]
    async fn test_retune_failure_does_not_block() {
        let strategy = strategy((TradeSide::Buy, 0.9), (TradeSide::Buy, 0.9));
        // Empty window: tuning fails, analysis rejects input, nothing panics
        assert!(strategy.analyze(&[]).await.is_none());
        assert_eq!(strategy.last_optimization().await, None);

        assert!(strategy.analyze(&series(&CALM)).await.is_some());
        assert!(strategy.last_optimization().await.is_some());
    }

    #[tokio::test]
    async fn test_shared_risk_manager() {
        let shared = Arc::new(RwLock::new(RiskManager::default()));
        let make = || {
            TradingStrategy::with_risk_manager(
                StrategyParameters::default(),
                shared.clone(),
                Arc::new(FixedPredictor::new("a", TradeSide::Buy, 0.9)),
                Arc::new(FixedPredictor::new("b", TradeSide::Buy, 0.9)),
            )
            .unwrap()
        };
        let first = make();
        let second = make();

        assert!(first.analyze(&series(&CALM)).await.is_some());
        assert!(second.analyze(&series(&CALM)).await.is_some());
        assert!((shared.read().await.total_exposure() - 18_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_invalid_params() {
        let result = TradingStrategy::new(
            StrategyParameters {
                take_profit_levels: vec![0.1],
                ..Default::default()
            },
            RiskLimits::default(),
            Arc::new(FixedPredictor::new("a", TradeSide::Buy, 0.9)),
            Arc::new(FixedPredictor::new("b", TradeSide::Buy, 0.9)),
        );
        assert!(result.is_err());
    }
}
