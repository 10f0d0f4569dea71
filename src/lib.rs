//! Trade signal pipeline.
//!
//! Turns a window of market observations into at most one risk-checked
//! order: two prediction providers must agree, the position is sized from
//! price-series risk metrics and an amplitude-encoding weight optimizer, and a
//! portfolio risk manager applies its circuit breakers before anything is
//! emitted.

pub mod analysis;
pub mod metrics;
pub mod models;
pub mod optimizer;
pub mod trading;
