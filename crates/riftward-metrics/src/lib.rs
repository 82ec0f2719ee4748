//! Riftward — metric management.
//!
//! Metrics are named integers with per-metric clamp ranges. The volatile
//! `glitch` metric is additionally smoothed: each adjustment moves it by at
//! most a configured step, and the excess is carried into later adjustments.

pub mod manager;
pub mod policy;

pub use manager::MetricManager;
pub use policy::{MetricBounds, MetricPolicy, Volatility};
