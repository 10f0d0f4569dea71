//! Amplitude-encoding weight optimizer and the experimental strategy tuner.

mod transform;
mod tuning;
mod weights;

pub use transform::{AmplitudeState, Gate, Operation, Transform, MAX_DIMENSION};
pub use tuning::{StrategyTuner, TuningOutcome, TuningState, MIN_DEPTH};
pub use weights::{AssetWeight, AssetWeightInput, OptimizedWeights, WeightOptimizer, MAX_ASSETS};
