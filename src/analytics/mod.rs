//! Aggregation of stored readings into energy totals and efficiency metrics.

pub mod efficiency;

pub use efficiency::{EfficiencyProof, EnergyTotals};
