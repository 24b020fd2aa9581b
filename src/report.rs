//! Plain-text microgrid performance report.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::analytics::EnergyTotals;
use crate::analytics::efficiency::round2;
use crate::config::ReportConfig;

/// Recommendation when nothing stands out.
pub const RUNNING_OPTIMALLY: &str = "System is running optimally.";

/// Hours of peak generation a suggested battery expansion is sized for.
const STORAGE_SIZING_HOURS: f64 = 30.0;

/// Summary of the whole stored history, overwritten at `reports/latest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub report_date: NaiveDateTime,
    pub total_generation_kwh: f64,
    pub total_consumption_kwh: f64,
    /// Minutes of shortage the alerts could have helped avoid.
    pub downtime_avoided_minutes: f64,
    pub baseline_efficiency_percent: f64,
    pub optimized_efficiency_percent: f64,
    pub recommendation: String,
    pub data_points_analyzed: usize,
}

impl PerformanceReport {
    /// Builds a report from energy totals.
    ///
    /// # Arguments
    ///
    /// * `totals` - Folded history
    /// * `cfg` - Recommendation thresholds
    /// * `tick_secs` - Nominal tick length; each underflow tick counts as downtime
    /// * `recovery_factor` - Share of wasted energy assumed recoverable
    /// * `report_date` - Generation time
    pub fn from_totals(
        totals: &EnergyTotals,
        cfg: &ReportConfig,
        tick_secs: u64,
        recovery_factor: f64,
        report_date: NaiveDateTime,
    ) -> Self {
        Self {
            report_date,
            total_generation_kwh: round2(totals.generated_kwh),
            total_consumption_kwh: round2(totals.consumed_kwh),
            downtime_avoided_minutes: round2(
                totals.underflow_events as f64 * tick_secs as f64 / 60.0,
            ),
            baseline_efficiency_percent: round2(totals.baseline_efficiency_percent()),
            optimized_efficiency_percent: round2(
                totals.optimized_efficiency_percent(recovery_factor),
            ),
            recommendation: recommendation(totals, cfg),
            data_points_analyzed: totals.readings,
        }
    }
}

/// Picks the single most pressing recommendation.
///
/// Wasted energy above the configured share of generation suggests more
/// storage; otherwise frequent shortages suggest more capacity.
pub fn recommendation(totals: &EnergyTotals, cfg: &ReportConfig) -> String {
    if totals.wasted_kwh > totals.generated_kwh * cfg.waste_recommendation_fraction {
        format!(
            "Consider adding ~{:.1} kWh of battery storage to capture wasted energy during peak generation.",
            totals.wasted_kwh / STORAGE_SIZING_HOURS
        )
    } else if totals.underflow_events > cfg.shortage_recommendation_events {
        "Frequent power shortages detected. Consider adding more generation capacity or increasing battery storage."
            .to_string()
    } else {
        RUNNING_OPTIMALLY.to_string()
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Microgrid Performance Report ===")?;
        writeln!(f, "Date:                    {}", self.report_date.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Total generation:        {:.2} kWh", self.total_generation_kwh)?;
        writeln!(f, "Total consumption:       {:.2} kWh", self.total_consumption_kwh)?;
        writeln!(f, "Downtime avoided:        {:.2} min", self.downtime_avoided_minutes)?;
        writeln!(f, "Baseline efficiency:     {:.2}%", self.baseline_efficiency_percent)?;
        writeln!(f, "Optimized efficiency:    {:.2}%", self.optimized_efficiency_percent)?;
        writeln!(f, "Data points analyzed:    {}", self.data_points_analyzed)?;
        write!(f, "Recommendation:          {}", self.recommendation)
    }
}
