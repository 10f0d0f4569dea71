//! Experimental strategy tuner.
//!
//! Bounded-iteration convergence loop over the transform depth. The cost is a
//! deterministic function of the analysis window, so runs are reproducible.
//! Tuned parameters are recorded for inspection and are not used for sizing.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Smallest depth the tuner will propose.
pub const MIN_DEPTH: u32 = 2;

/// Parameters adjusted by the tuner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningState {
    /// Transform depth, never below `MIN_DEPTH` after tuning.
    pub depth: u32,
}

impl Default for TuningState {
    fn default() -> Self {
        Self { depth: 4 }
    }
}

/// Result of one tuning pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningOutcome {
    pub state: TuningState,
    pub iterations: u32,
    pub converged: bool,
    pub final_cost: f64,
}

/// Gradient-sign tuner with a fixed iteration budget.
#[derive(Debug, Clone)]
pub struct StrategyTuner {
    max_iterations: u32,
    convergence_threshold: f64,
}

impl Default for StrategyTuner {
    fn default() -> Self {
        Self::new(100, 1e-6)
    }
}

impl StrategyTuner {
    pub fn new(max_iterations: u32, convergence_threshold: f64) -> Self {
        Self {
            max_iterations,
            convergence_threshold,
        }
    }

    /// Depth the cost function pulls toward: `2 + ceil(log2(window_len))`.
    pub fn target_depth(window_len: usize) -> u32 {
        MIN_DEPTH + window_len.max(1).next_power_of_two().trailing_zeros()
    }

    /// Squared relative distance from the target depth.
    pub fn cost(depth: u32, target: u32) -> f64 {
        let target = f64::from(target.max(1));
        let diff = (f64::from(depth) - target) / target;
        diff * diff
    }

    /// Tune `state` for an analysis window of `window_len` observations.
    pub fn tune(&self, state: &TuningState, window_len: usize) -> Result<TuningOutcome> {
        ensure!(window_len > 0, "Cannot tune on an empty window");

        let target = Self::target_depth(window_len);
        let mut current = state.clone();
        let mut iterations = 0;
        let mut cost = Self::cost(current.depth, target);
        let mut converged = cost < self.convergence_threshold;

        while iterations < self.max_iterations && !converged {
            let gradient = 2.0 * (f64::from(current.depth) - f64::from(target));
            current.depth = if gradient > 0.0 {
                current.depth.saturating_sub(1).max(MIN_DEPTH)
            } else {
                current.depth + 1
            };

            iterations += 1;
            cost = Self::cost(current.depth, target);
            converged = cost < self.convergence_threshold;
        }

        debug!(
            depth = current.depth,
            target = target,
            iterations = iterations,
            converged = converged,
            "Strategy tuning finished"
        );

        Ok(TuningOutcome {
            state: current,
            iterations,
            converged,
            final_cost: cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_depth() {
        assert_eq!(StrategyTuner::target_depth(1), 2);
        assert_eq!(StrategyTuner::target_depth(2), 3);
        assert_eq!(StrategyTuner::target_depth(5), 5);
        assert_eq!(StrategyTuner::target_depth(8), 5);
        assert_eq!(StrategyTuner::target_depth(100), 9);
    }

    #[test]
    fn test_tune_converges_upward() {
        let outcome = StrategyTuner::default()
            .tune(&TuningState::default(), 100)
            .unwrap();
        assert!(outcome.converged);
        assert_eq!(outcome.state.depth, 9);
        assert_eq!(outcome.iterations, 5);
        assert_eq!(outcome.final_cost, 0.0);
    }

    #[test]
    fn test_tune_converges_downward_with_floor() {
        let state = TuningState { depth: 12 };
        let outcome = StrategyTuner::default().tune(&state, 1).unwrap();
        assert!(outcome.converged);
        assert_eq!(outcome.state.depth, MIN_DEPTH);
    }

    #[test]
    fn test_tune_respects_iteration_budget() {
        let outcome = StrategyTuner::new(3, 1e-6)
            .tune(&TuningState::default(), 100_000)
            .unwrap();
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.state.depth, 7);
    }

    #[test]
    fn test_tune_is_deterministic() {
        let tuner = StrategyTuner::default();
        let a = tuner.tune(&TuningState::default(), 37).unwrap();
        let b = tuner.tune(&TuningState::default(), 37).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tune_rejects_empty_window() {
        assert!(StrategyTuner::default().tune(&TuningState::default(), 0).is_err());
    }
}
