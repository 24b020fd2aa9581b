//! Batch mode: event counts and rate alerts over a trailing window.

use std::fmt;

use chrono::NaiveDateTime;

use super::{Alert, AlertType, RuleSet, Severity};
use crate::telemetry::Reading;

/// Per-window counts produced by the batch detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSummary {
    /// Readings inside the window.
    pub readings: usize,
    /// Sum of `generation.total_kw` over the window.
    pub generated_kw_sum: f64,
    /// Sum of `consumption_kw` over the window.
    pub consumed_kw_sum: f64,
    pub overflow_events: usize,
    pub underflow_events: usize,
    pub low_battery_events: usize,
    pub panel_fault_events: usize,
}

impl WindowSummary {
    /// Classifies every reading in the window.
    pub fn from_readings(rules: &RuleSet, readings: &[Reading]) -> Self {
        let mut summary = Self::default();
        for r in readings {
            summary.readings += 1;
            summary.generated_kw_sum += r.generation.total_kw;
            summary.consumed_kw_sum += r.consumption_kw;
            summary.overflow_events += usize::from(rules.is_overflow(r));
            summary.underflow_events += usize::from(rules.is_underflow(r));
            summary.low_battery_events += usize::from(rules.is_low_battery(r));
            summary.panel_fault_events += usize::from(rules.is_panel_fault(r));
        }
        summary
    }

    /// Share of generated power consumed directly by the load (percent).
    ///
    /// Zero when nothing was generated.
    pub fn utilization_percent(&self) -> f64 {
        if self.generated_kw_sum > 0.0 {
            self.consumed_kw_sum / self.generated_kw_sum * 100.0
        } else {
            0.0
        }
    }

    /// Rate alerts for the window.
    ///
    /// One `HighOverflowRate` (WARNING) when overflow events exceed
    /// `threshold`, and one `PotentialShortage` (CRITICAL) when underflow
    /// events do. Both name the count.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Events allowed before an alert fires
    /// * `window_minutes` - Window length, quoted in the message
    /// * `detected_at` - Timestamp stamped on the alerts
    pub fn rate_alerts(
        &self,
        threshold: usize,
        window_minutes: i64,
        detected_at: NaiveDateTime,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();
        if self.overflow_events > threshold {
            alerts.push(Alert::new(
                detected_at,
                AlertType::HighOverflowRate,
                format!(
                    "High energy overflow detected ({} instances in {window_minutes} mins).",
                    self.overflow_events
                ),
                Severity::Warning,
            ));
        }
        if self.underflow_events > threshold {
            alerts.push(Alert::new(
                detected_at,
                AlertType::PotentialShortage,
                format!(
                    "Potential power shortage detected ({} instances in {window_minutes} mins).",
                    self.underflow_events
                ),
                Severity::Critical,
            ));
        }
        alerts
    }
}

impl fmt::Display for WindowSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Window Analysis ---")?;
        writeln!(f, "Data points:                  {}", self.readings)?;
        writeln!(f, "Grid utilization efficiency:  {:.2}%", self.utilization_percent())?;
        writeln!(f, "Overflow events (wasted):     {}", self.overflow_events)?;
        writeln!(f, "Underflow events (shortage):  {}", self.underflow_events)?;
        writeln!(f, "Low battery readings:         {}", self.low_battery_events)?;
        write!(f, "Panel fault readings:         {}", self.panel_fault_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Fault;
    use chrono::NaiveDate;

    fn at(m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(12, m, 0))
            .unwrap()
    }

    fn overflow(m: u32) -> Reading {
        Reading::new(at(m), 5.0, 1.0, 2.0, 98.0, Fault::None)
    }

    fn underflow(m: u32) -> Reading {
        Reading::new(at(m), 0.0, 0.2, 2.0, 0.0, Fault::None)
    }

    #[test]
    fn three_overflows_raise_one_rate_alert() {
        let readings = [overflow(1), overflow(2), overflow(3)];
        let summary = WindowSummary::from_readings(&RuleSet::default(), &readings);
        let alerts = summary.rate_alerts(2, 15, at(15));

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::HighOverflowRate);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert!(alerts[0].message.contains("3 instances"));
    }

    #[test]
    fn at_threshold_is_quiet() {
        let readings = [overflow(1), overflow(2)];
        let summary = WindowSummary::from_readings(&RuleSet::default(), &readings);
        assert!(summary.rate_alerts(2, 15, at(15)).is_empty());
    }

    #[test]
    fn underflows_raise_shortage_alert() {
        let readings = [underflow(1), underflow(2), underflow(3), overflow(4)];
        let summary = WindowSummary::from_readings(&RuleSet::default(), &readings);
        assert_eq!(summary.underflow_events, 3);
        assert_eq!(summary.overflow_events, 1);

        let alerts = summary.rate_alerts(2, 15, at(15));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::PotentialShortage);
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn utilization_is_consumed_over_generated() {
        let readings = [
            Reading::new(at(1), 3.0, 1.0, 2.0, 50.0, Fault::None),
            Reading::new(at(2), 3.0, 1.0, 1.0, 50.0, Fault::None),
        ];
        let summary = WindowSummary::from_readings(&RuleSet::default(), &readings);
        assert!((summary.utilization_percent() - 37.5).abs() < 1e-9);
    }

    #[test]
    fn no_generation_means_zero_utilization() {
        let readings = [Reading::new(at(1), 0.0, 0.0, 2.0, 50.0, Fault::None)];
        let summary = WindowSummary::from_readings(&RuleSet::default(), &readings);
        assert_eq!(summary.utilization_percent(), 0.0);
    }

    #[test]
    fn empty_window_is_quiet() {
        let summary = WindowSummary::from_readings(&RuleSet::default(), &[]);
        assert_eq!(summary.readings, 0);
        assert!(summary.rate_alerts(0, 15, at(15)).is_empty());
    }
}
