//! Post-hoc energy totals and the baseline-vs-optimized efficiency comparison.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tracing::debug;

use crate::rules::RuleSet;
use crate::telemetry::Reading;

/// The part of a stored reading the energy totals need.
#[derive(Deserialize)]
struct EnergySample {
    generation: SampleGeneration,
    consumption_kw: f64,
    battery_soc_percent: f64,
}

#[derive(Deserialize)]
struct SampleGeneration {
    total_kw: f64,
}

/// Cumulative energy over a sequence of readings.
///
/// Every reading stands for one nominal tick, so energy is power times the
/// tick length. The fold is a plain sum and does not depend on reading
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyTotals {
    /// Σ `generation.total_kw` · interval (kWh).
    pub generated_kwh: f64,
    /// Σ `consumption_kw` · interval (kWh).
    pub consumed_kwh: f64,
    /// Surplus generated while the battery was full (kWh).
    pub wasted_kwh: f64,
    /// Ticks where demand went unmet with an empty battery.
    pub underflow_events: usize,
    /// Readings folded into the totals.
    pub readings: usize,
    /// Records skipped because they lacked the energy fields.
    pub skipped: usize,
}

impl EnergyTotals {
    /// Folds readings into energy totals.
    ///
    /// # Arguments
    ///
    /// * `readings` - Readings in any order
    /// * `interval_hours` - Nominal tick length each reading represents
    /// * `rules` - Supplies the full/empty battery predicates
    pub fn from_readings(readings: &[Reading], interval_hours: f64, rules: &RuleSet) -> Self {
        let mut totals = Self::default();
        for r in readings {
            totals.add(
                rules,
                interval_hours,
                r.generation.total_kw,
                r.consumption_kw,
                r.battery_soc_percent,
            );
        }
        totals
    }

    /// Folds raw store records.
    ///
    /// Only `generation.total_kw`, `consumption_kw` and
    /// `battery_soc_percent` are read, so a record missing its timestamp or
    /// grid status still counts. Records without those three are skipped.
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a Value>,
        interval_hours: f64,
        rules: &RuleSet,
    ) -> Self {
        let mut totals = Self::default();
        for record in records {
            match EnergySample::deserialize(record) {
                Ok(s) => totals.add(
                    rules,
                    interval_hours,
                    s.generation.total_kw,
                    s.consumption_kw,
                    s.battery_soc_percent,
                ),
                Err(err) => {
                    debug!(%err, "skipping record without energy fields");
                    totals.skipped += 1;
                }
            }
        }
        totals
    }

    fn add(
        &mut self,
        rules: &RuleSet,
        interval_hours: f64,
        total_kw: f64,
        consumption_kw: f64,
        soc_percent: f64,
    ) {
        self.readings += 1;
        self.generated_kwh += total_kw * interval_hours;
        self.consumed_kwh += consumption_kw * interval_hours;
        if rules.overflows(total_kw, consumption_kw, soc_percent) {
            self.wasted_kwh += (total_kw - consumption_kw) * interval_hours;
        }
        if rules.underflows(total_kw, consumption_kw, soc_percent) {
            self.underflow_events += 1;
        }
    }

    /// Consumed over generated energy (percent), 0 without generation.
    pub fn baseline_efficiency_percent(&self) -> f64 {
        percent(self.consumed_kwh, self.generated_kwh)
    }

    /// Efficiency if `recovery_factor` of the wasted energy had been consumed.
    pub fn optimized_efficiency_percent(&self, recovery_factor: f64) -> f64 {
        percent(
            self.consumed_kwh + recovery_factor * self.wasted_kwh,
            self.generated_kwh,
        )
    }
}

fn percent(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * 100.0
    } else {
        0.0
    }
}

/// Rounds to two decimals, the precision stored records carry.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Single overwrite-in-place record comparing efficiency with and without
/// recovered surplus.
///
/// `improvement_percent` is `optimized - baseline`, so it is never negative
/// for a non-negative recovery factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyProof {
    pub baseline_efficiency_percent: f64,
    pub optimized_efficiency_percent: f64,
    pub improvement_percent: f64,
    pub calculation_timestamp: NaiveDateTime,
}

impl EfficiencyProof {
    /// Derives the proof from energy totals. Values are rounded to two
    /// decimals.
    pub fn from_totals(
        totals: &EnergyTotals,
        recovery_factor: f64,
        calculated_at: NaiveDateTime,
    ) -> Self {
        let baseline = totals.baseline_efficiency_percent();
        let optimized = totals.optimized_efficiency_percent(recovery_factor);
        Self {
            baseline_efficiency_percent: round2(baseline),
            optimized_efficiency_percent: round2(optimized),
            improvement_percent: round2(optimized - baseline),
            calculation_timestamp: calculated_at,
        }
    }
}

impl fmt::Display for EfficiencyProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Efficiency Proof ---")?;
        writeln!(f, "Baseline efficiency:   {:.2}%", self.baseline_efficiency_percent)?;
        writeln!(f, "Optimized efficiency:  {:.2}%", self.optimized_efficiency_percent)?;
        write!(f, "Improvement:           {:.2}%", self.improvement_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Fault;
    use chrono::{Duration, NaiveDate};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use serde_json::json;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    fn reading(i: i64, total: f64, load: f64, soc: f64) -> Reading {
        Reading::new(
            start() + Duration::seconds(5 * i),
            total,
            0.0,
            load,
            soc,
            Fault::None,
        )
    }

    #[test]
    fn hundred_generated_eighty_consumed_is_eighty_percent() {
        // 10 ticks of one hour: 10 kW generated, 8 kW consumed, battery mid-range
        let readings: Vec<Reading> = (0..10).map(|i| reading(i, 10.0, 8.0, 50.0)).collect();
        let totals = EnergyTotals::from_readings(&readings, 1.0, &RuleSet::default());
        assert_eq!(totals.generated_kwh, 100.0);
        assert_eq!(totals.consumed_kwh, 80.0);
        assert_eq!(totals.wasted_kwh, 0.0);

        let proof = EfficiencyProof::from_totals(&totals, 0.8, start());
        assert_eq!(proof.baseline_efficiency_percent, 80.0);
        assert_eq!(proof.optimized_efficiency_percent, 80.0);
        assert_eq!(proof.improvement_percent, 0.0);
    }

    #[test]
    fn wasted_energy_only_counts_with_full_battery() {
        let readings = [
            reading(0, 6.0, 2.0, 96.0), // 4 kWh wasted
            reading(1, 6.0, 2.0, 50.0), // surplus absorbed
            reading(2, 1.0, 2.0, 99.0), // deficit
        ];
        let totals = EnergyTotals::from_readings(&readings, 1.0, &RuleSet::default());
        assert_eq!(totals.wasted_kwh, 4.0);
        assert_eq!(totals.generated_kwh, 13.0);
        assert_eq!(totals.consumed_kwh, 6.0);
    }

    #[test]
    fn optimized_adds_recovered_share() {
        let readings = [reading(0, 10.0, 5.0, 100.0)];
        let totals = EnergyTotals::from_readings(&readings, 1.0, &RuleSet::default());
        let proof = EfficiencyProof::from_totals(&totals, 0.8, start());
        assert_eq!(proof.baseline_efficiency_percent, 50.0);
        assert_eq!(proof.optimized_efficiency_percent, 90.0);
        assert_eq!(proof.improvement_percent, 40.0);
    }

    #[test]
    fn no_generation_is_zero_not_error() {
        let readings = [reading(0, 0.0, 2.0, 50.0)];
        let totals = EnergyTotals::from_readings(&readings, 1.0, &RuleSet::default());
        let proof = EfficiencyProof::from_totals(&totals, 0.8, start());
        assert_eq!(proof.baseline_efficiency_percent, 0.0);
        assert_eq!(proof.optimized_efficiency_percent, 0.0);
    }

    #[test]
    fn underflow_events_are_counted() {
        let readings = [reading(0, 0.0, 2.0, 0.0), reading(1, 0.0, 2.0, 0.4), reading(2, 0.0, 2.0, 10.0)];
        let totals = EnergyTotals::from_readings(&readings, 1.0, &RuleSet::default());
        assert_eq!(totals.underflow_events, 2);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let good = serde_json::to_value(reading(0, 4.0, 2.0, 50.0)).unwrap();
        let records = [good, json!({"generation": {"total_kw": 3.0}}), json!("garbage")];
        let totals = EnergyTotals::from_records(records.iter(), 1.0, &RuleSet::default());
        assert_eq!(totals.readings, 1);
        assert_eq!(totals.skipped, 2);
        assert_eq!(totals.generated_kwh, 4.0);
    }

    #[test]
    fn partial_records_still_count() {
        // Written by an older producer: no timestamp, no grid status
        let partial = json!({
            "generation": {"total_kw": 6.0},
            "consumption_kw": 2.0,
            "battery_soc_percent": 97.0
        });
        let full = serde_json::to_value(reading(0, 4.0, 2.0, 50.0)).unwrap();
        let records = [partial, full];

        let totals = EnergyTotals::from_records(records.iter(), 1.0, &RuleSet::default());
        assert_eq!(totals.readings, 2);
        assert_eq!(totals.skipped, 0);
        assert_eq!(totals.generated_kwh, 10.0);
        assert_eq!(totals.consumed_kwh, 4.0);
        assert_eq!(totals.wasted_kwh, 4.0);
    }

    #[test]
    fn records_and_readings_agree() {
        let readings: Vec<Reading> = (0..20)
            .map(|i| reading(i, f64::from((i % 5) as u32), 1.5, if i % 4 == 0 { 99.0 } else { 0.2 }))
            .collect();
        let records: Vec<Value> = readings.iter().map(|r| serde_json::to_value(r).unwrap()).collect();
        let rules = RuleSet::default();
        assert_eq!(
            EnergyTotals::from_records(records.iter(), 1.0, &rules),
            EnergyTotals::from_readings(&readings, 1.0, &rules)
        );
    }

    #[test]
    fn fold_is_order_independent() {
        // Quarter-kW steps keep every partial sum exact
        let mut readings: Vec<Reading> = (0..200)
            .map(|i| {
                let total = f64::from((i * 7 % 23) as u32) * 0.25;
                let load = f64::from((i * 5 % 17) as u32) * 0.25;
                let soc = if i % 3 == 0 { 99.0 } else { 40.0 };
                reading(i, total, load, soc)
            })
            .collect();
        let rules = RuleSet::default();
        let before = EnergyTotals::from_readings(&readings, 1.0, &rules);

        readings.shuffle(&mut StdRng::seed_from_u64(11));
        let after = EnergyTotals::from_readings(&readings, 1.0, &rules);
        assert_eq!(before, after);
    }
}
