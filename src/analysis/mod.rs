//! Price-pattern analysis.

mod technical;

pub use technical::{
    HarmonicPattern, PivotPoints, TechnicalAnalyzer, TechnicalSnapshot, TeslaWaves,
    FIBONACCI_RATIOS, GARTLEY_RATIOS, GARTLEY_TOLERANCE, TESLA_PERIODS,
};
